//! LiftLog exercise catalog
//!
//! An on-device directory of exercise names that stays usable offline and
//! converges with the backend's custom exercise collection.
//!
//! - [`db`]: SQLite catalog, prefix full-text search, default seeding
//! - [`remote`]: the backend's custom exercise REST resource
//! - [`sync`]: pull/push reconciliation between the two

pub mod config;
pub mod db;
pub mod models;
pub mod remote;
pub mod sync;

pub use config::{Config, ConfigError};
pub use db::{init_db, ExerciseStore, SeedOutcome, Seeder, StoreError};
pub use models::{ExerciseNameRecord, Mutation, MutationOutcome, SyncMeta};
pub use remote::{CustomExerciseRemote, HttpRemote, RemoteError, RemoteExercise};
pub use sync::{SyncEngine, SyncOutcome, SyncPhase, SyncReport};

/// Opens the catalog at `config.database_path` and seeds the bundled defaults.
///
/// Seeding failures are logged, not returned; the catalog is still usable.
pub async fn open_catalog(config: &Config) -> Result<ExerciseStore, StoreError> {
    let pool = init_db(&config.database_path.value).await?;
    let store = ExerciseStore::new(pool).with_search_options(config.search.clone());

    match Seeder::new(store.clone()) {
        Ok(seeder) => {
            seeder.run_or_log().await;
        }
        Err(e) => tracing::error!("Error loading default exercises: {}", e),
    }

    Ok(store)
}
