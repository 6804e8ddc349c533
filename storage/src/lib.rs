use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

mod books;
mod error;
mod users;

pub use books::BookFilter;
pub use error::{Error, Result};
pub use users::MAX_UPDATE_ATTEMPTS;

pub const DB_FILE: &str = "gutenshelf.db";

#[derive(Clone)]
pub struct Storage {
    pub pool: Pool<Sqlite>,
    pub data_dir: PathBuf,
}

impl Storage {
    pub async fn new(data_dir: impl AsRef<Path>) -> Result<Self> {
        let path = data_dir.as_ref().to_path_buf();
        if !path.exists() {
            fs::create_dir_all(&path).await?;
        }

        let db_path = path.join(DB_FILE);
        tracing::debug!("Opening database at {}", db_path.display());

        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        // Books: the full metadata document plus derived columns the catalog filters on.
        // `labels` is bookshelves followed by subjects; `*_folded` are lowercased copies.
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS books (
                gutenberg_id INTEGER PRIMARY KEY,
                source TEXT NOT NULL,
                title TEXT NOT NULL,
                title_folded TEXT NOT NULL,
                bookshelves TEXT NOT NULL,
                labels TEXT NOT NULL,
                labels_folded TEXT NOT NULL,
                data TEXT NOT NULL,
                content TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )",
        )
        .execute(&pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_books_title ON books (title, gutenberg_id)")
            .execute(&pool)
            .await?;

        // Users: one document per user; `version` guards read-modify-write cycles.
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                display_name TEXT,
                role TEXT NOT NULL,
                preferences TEXT NOT NULL,
                reading_progress TEXT NOT NULL,
                genre_stats TEXT NOT NULL,
                version INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )",
        )
        .execute(&pool)
        .await?;

        Ok(Self {
            pool,
            data_dir: path,
        })
    }
}
