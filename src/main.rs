use anyhow::Result;
use clap::Parser;
use gutenshelf::config::{Cli, Command};
use gutenshelf::App;
use gutenshelf_common::genre::GenreTable;
use gutenshelf_storage::Storage;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "gutenshelf=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let storage = Storage::new(&cli.data_dir).await?;

    match cli.command {
        Command::Serve(args) => {
            let genres = args.genre_table()?;
            tracing::info!(
                "Starting Gutenshelf on port {} ({} genre rules)",
                args.port,
                genres.rules().len()
            );
            let app = App::new(storage, genres).with_max_page_size(args.max_page_size);
            gutenshelf::api::server::serve(args.port, app, args.cors_origin).await?;
        }
        Command::Seed(args) => {
            gutenshelf::seed::import_dir(&storage, &args.meta_dir, &args.content_dir).await?;
        }
        Command::Promote { email } => {
            let app = App::new(storage, GenreTable::default());
            app.promote(&email).await?;
        }
    }

    Ok(())
}
