pub(crate) mod exercise_repo;
pub mod metadata;
pub mod search;
mod seed;

pub use exercise_repo::ExerciseStore;
pub use search::SearchOptions;
pub use seed::{SeedError, SeedOutcome, Seeder, DEFAULT_EXERCISES_VERSION};

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use thiserror::Error;

/// Errors surfaced by the local exercise catalog.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("An exercise named '{0}' already exists")]
    DuplicateName(String),
    #[error("No custom exercise named '{0}'")]
    NotFound(String),
    #[error("Exercise name cannot be empty")]
    EmptyName,
    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("Failed to prepare database directory: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Maps a unique-index violation on `name` to [`StoreError::DuplicateName`].
    pub(crate) fn from_write(err: sqlx::Error, name: &str) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                StoreError::DuplicateName(name.to_string())
            }
            _ => StoreError::Storage(err),
        }
    }

    /// True for errors caused by the caller's input rather than the storage layer.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            StoreError::DuplicateName(_) | StoreError::NotFound(_) | StoreError::EmptyName
        )
    }
}

/// Initialize the database connection pool and run migrations
pub async fn init_db(path: &Path) -> Result<SqlitePool, StoreError> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}
