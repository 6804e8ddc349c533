use clap::{Args, Parser, Subcommand};
use gutenshelf_common::genre::{GenreTable, GenreTableError};
use gutenshelf_common::utils::paging::MAX_LIMIT;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directory holding the SQLite database
    #[arg(short, long, global = true, env = "GUTENSHELF_DATA_DIR", default_value = "./data")]
    pub data_dir: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP API
    Serve(ServeArgs),
    /// Import every `*.json` metadata file from a directory
    Seed(SeedArgs),
    /// Grant the admin role to a registered user
    Promote {
        #[arg(long)]
        email: String,
    },
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 4000)]
    pub port: u16,

    /// TOML genre table replacing the built-in one
    #[arg(long, env = "GUTENSHELF_GENRES")]
    pub genres: Option<PathBuf>,

    /// Largest `limit` a listing will honor
    #[arg(long, default_value_t = MAX_LIMIT)]
    pub max_page_size: u64,

    /// Allowed CORS origin; any origin when unset
    #[arg(long)]
    pub cors_origin: Option<String>,
}

impl ServeArgs {
    pub fn genre_table(&self) -> Result<GenreTable, GenreTableError> {
        match &self.genres {
            Some(path) => GenreTable::load(path),
            None => Ok(GenreTable::default()),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct SeedArgs {
    /// Directory of Gutendex metadata JSON files
    #[arg(long, default_value = "./data/meta")]
    pub meta_dir: PathBuf,

    /// Root of the local book content; each book lives in `<content-dir>/<id>`
    #[arg(long, default_value = "./data/content")]
    pub content_dir: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_defaults() {
        let cli = Cli::try_parse_from(["gutenshelf", "serve"]).unwrap();
        let Command::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.max_page_size, MAX_LIMIT);
        assert!(args.genres.is_none());
        assert!(args.genre_table().is_ok());
    }

    #[test]
    fn promote_requires_email() {
        assert!(Cli::try_parse_from(["gutenshelf", "promote"]).is_err());
        let cli = Cli::try_parse_from(["gutenshelf", "--data-dir", "/tmp/x", "promote", "--email", "a@b.co"]).unwrap();
        assert_eq!(cli.data_dir, PathBuf::from("/tmp/x"));
        assert!(matches!(cli.command, Command::Promote { email } if email == "a@b.co"));
    }
}
