//! Versioned seeding of the bundled default exercise list.

use std::collections::HashSet;

use thiserror::Error;

use super::exercise_repo::{apply_in, live_names, ExerciseStore};
use super::metadata::{self, DEFAULT_EXERCISES_VERSION_KEY};
use super::StoreError;
use crate::models::{Mutation, MutationOutcome};

/// Bump when `data/default_exercises.json` gains entries.
pub const DEFAULT_EXERCISES_VERSION: i64 = 1;

const BUNDLED_DEFAULT_EXERCISES: &str = include_str!("../../data/default_exercises.json");

#[derive(Debug, Error)]
pub enum SeedError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Invalid bundled exercise list: {0}")]
    BundledData(#[from] serde_json::Error),
}

impl From<sqlx::Error> for SeedError {
    fn from(e: sqlx::Error) -> Self {
        SeedError::Store(StoreError::Storage(e))
    }
}

/// What a seeding pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    /// First run: structures built and the full list inserted.
    Seeded { version: i64, inserted: usize },
    /// Additive upgrade from an older list.
    Migrated {
        from: i64,
        to: i64,
        inserted: usize,
    },
    UpToDate { version: i64 },
}

/// Parses the default exercise list compiled into the binary.
pub fn bundled_default_exercises() -> Result<Vec<String>, SeedError> {
    Ok(serde_json::from_str(BUNDLED_DEFAULT_EXERCISES)?)
}

/// Ensures the default exercises are present exactly once per list version.
pub struct Seeder {
    store: ExerciseStore,
    defaults: Vec<String>,
    latest_version: i64,
}

impl Seeder {
    /// Seeder for the bundled list at [`DEFAULT_EXERCISES_VERSION`].
    pub fn new(store: ExerciseStore) -> Result<Self, SeedError> {
        Ok(Self::with_defaults(
            store,
            bundled_default_exercises()?,
            DEFAULT_EXERCISES_VERSION,
        ))
    }

    pub fn with_defaults(store: ExerciseStore, defaults: Vec<String>, latest_version: i64) -> Self {
        Self {
            store,
            defaults,
            latest_version,
        }
    }

    /// Runs the branch matching the stored version. The version marker is
    /// written in the same transaction as the rows, so a failed pass is
    /// retried in full on the next launch.
    pub async fn run(&self) -> Result<SeedOutcome, SeedError> {
        let stored = metadata::get_version(self.store.pool(), DEFAULT_EXERCISES_VERSION_KEY).await?;

        if stored >= self.latest_version {
            tracing::debug!("Default exercises up to date at version {}", stored);
            return Ok(SeedOutcome::UpToDate { version: stored });
        }

        tracing::info!(
            "Upgrading default exercises from version {} to {}",
            stored,
            self.latest_version
        );

        let mut tx = self.store.begin().await?;
        let mut inserted = 0;

        if stored == 0 {
            // Rebuild the search index from the table so it starts consistent
            sqlx::query("INSERT INTO exercise_names_fts(exercise_names_fts) VALUES ('rebuild')")
                .execute(&mut *tx)
                .await?;

            for name in dedup(&self.defaults) {
                let outcome = apply_in(
                    &mut tx,
                    Mutation::InsertDefault {
                        name: name.to_string(),
                    },
                )
                .await?;
                if outcome == MutationOutcome::Inserted {
                    inserted += 1;
                }
            }
        } else {
            let existing = live_names(&mut tx).await?;

            for name in dedup(&self.defaults) {
                if existing.contains(name) {
                    continue;
                }
                let outcome = apply_in(
                    &mut tx,
                    Mutation::InsertDefault {
                        name: name.to_string(),
                    },
                )
                .await?;
                if outcome == MutationOutcome::Inserted {
                    inserted += 1;
                }
            }
        }

        metadata::set(
            &mut *tx,
            DEFAULT_EXERCISES_VERSION_KEY,
            &self.latest_version.to_string(),
        )
        .await?;
        tx.commit().await?;

        tracing::info!("Inserted {} default exercise(s)", inserted);

        Ok(if stored == 0 {
            SeedOutcome::Seeded {
                version: self.latest_version,
                inserted,
            }
        } else {
            SeedOutcome::Migrated {
                from: stored,
                to: self.latest_version,
                inserted,
            }
        })
    }

    /// Runs seeding at startup. Failures are logged and never propagate, so
    /// the catalog stays usable with whatever it already holds.
    pub async fn run_or_log(&self) -> Option<SeedOutcome> {
        match self.run().await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                tracing::error!("Error initialising default exercises: {}", e);
                None
            }
        }
    }
}

/// Non-blank names in first-seen order, each once.
fn dedup(names: &[String]) -> Vec<&str> {
    let mut seen = HashSet::new();
    names
        .iter()
        .map(String::as_str)
        .filter(|name| !name.trim().is_empty())
        .filter(|name| seen.insert(*name))
        .collect()
}
