use std::collections::HashSet;

use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};

use super::search::{self, SearchOptions};
use super::StoreError;
use crate::models::{ExerciseNameRecord, Mutation, MutationOutcome, SyncMeta};

const SELECT_RECORD: &str =
    "SELECT id, name, is_custom, remote_id, needs_sync, is_deleted FROM exercise_names";

/// The on-device exercise catalog.
///
/// Every write goes through [`Mutation`] and runs inside a transaction, so a
/// failed operation never leaves partial state behind. Reads only ever see
/// committed rows.
#[derive(Debug, Clone)]
pub struct ExerciseStore {
    pool: SqlitePool,
    search: SearchOptions,
}

impl ExerciseStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            search: SearchOptions::default(),
        }
    }

    pub fn with_search_options(mut self, search: SearchOptions) -> Self {
        self.search = search;
        self
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub(crate) async fn begin(&self) -> Result<Transaction<'static, Sqlite>, StoreError> {
        Ok(self.pool.begin().await?)
    }

    /// Inserts a bundled default unless a live row already has this name.
    pub async fn insert_default(&self, name: &str) -> Result<MutationOutcome, StoreError> {
        self.apply(Mutation::InsertDefault {
            name: name.to_string(),
        })
        .await
    }

    /// Inserts a custom row, or links an unsynced local row of the same name
    /// when `meta` carries a remote id. Otherwise leaves the table unchanged.
    pub async fn add_custom(
        &self,
        name: &str,
        meta: SyncMeta,
    ) -> Result<MutationOutcome, StoreError> {
        self.apply(Mutation::InsertCustom {
            name: name.to_string(),
            meta,
        })
        .await
    }

    /// User-initiated create: like [`add_custom`](Self::add_custom) with local
    /// sync metadata, but an existing live name is reported instead of ignored.
    pub async fn create_custom(&self, name: &str) -> Result<MutationOutcome, StoreError> {
        let mut tx = self.begin().await?;
        if find_live(&mut tx, name).await?.is_some() {
            return Err(StoreError::DuplicateName(name.to_string()));
        }
        let outcome = apply_in(
            &mut tx,
            Mutation::InsertCustom {
                name: name.to_string(),
                meta: SyncMeta::local(),
            },
        )
        .await?;
        tx.commit().await?;
        Ok(outcome)
    }

    pub async fn rename(&self, old_name: &str, new_name: &str) -> Result<(), StoreError> {
        self.apply(Mutation::Rename {
            old_name: old_name.to_string(),
            new_name: new_name.to_string(),
        })
        .await?;
        Ok(())
    }

    /// Tombstones a live custom row. Returns `Unchanged` if there was none.
    pub async fn soft_delete(&self, name: &str) -> Result<MutationOutcome, StoreError> {
        self.apply(Mutation::SoftDelete {
            name: name.to_string(),
        })
        .await
    }

    /// Physically removes a row. Only the sync engine calls this, after the
    /// backend has confirmed the deletion.
    pub async fn hard_delete(&self, id: i64) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM exercise_names WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Applies one mutation in its own transaction.
    pub async fn apply(&self, mutation: Mutation) -> Result<MutationOutcome, StoreError> {
        let mut tx = self.begin().await?;
        let outcome = apply_in(&mut tx, mutation).await?;
        tx.commit().await?;
        Ok(outcome)
    }

    pub async fn search(&self, text: &str) -> Result<Vec<String>, StoreError> {
        Ok(search::query(&self.pool, text, &self.search).await?)
    }

    /// All live names, ordered by name.
    pub async fn list_all(&self) -> Result<Vec<String>, StoreError> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT name FROM exercise_names WHERE is_deleted = 0 ORDER BY name")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    /// Live custom names, ordered by name.
    pub async fn list_custom(&self) -> Result<Vec<String>, StoreError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM exercise_names WHERE is_deleted = 0 AND is_custom = 1 ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    /// Every dirty row, tombstones included.
    pub async fn list_pending_sync(&self) -> Result<Vec<ExerciseNameRecord>, StoreError> {
        let rows = sqlx::query_as::<_, ExerciseNameRecord>(&format!(
            "{} WHERE needs_sync = 1 ORDER BY id",
            SELECT_RECORD
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// The live row with this exact name, if any.
    pub async fn get(&self, name: &str) -> Result<Option<ExerciseNameRecord>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        find_live(&mut conn, name).await
    }

    pub async fn count_pending_sync(&self) -> Result<i64, StoreError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM exercise_names WHERE needs_sync = 1")
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }
}

/// Rows linked to the backend, tombstones included so a pending delete is
/// never re-inserted by a pull.
pub(crate) async fn list_linked(
    conn: &mut SqliteConnection,
) -> Result<Vec<ExerciseNameRecord>, StoreError> {
    let rows = sqlx::query_as::<_, ExerciseNameRecord>(&format!(
        "{} WHERE remote_id IS NOT NULL",
        SELECT_RECORD
    ))
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows)
}

/// Names of every live row.
pub(crate) async fn live_names(conn: &mut SqliteConnection) -> Result<HashSet<String>, StoreError> {
    let rows: Vec<(String,)> = sqlx::query_as("SELECT name FROM exercise_names WHERE is_deleted = 0")
        .fetch_all(&mut *conn)
        .await?;
    Ok(rows.into_iter().map(|(name,)| name).collect())
}

async fn find_live(
    conn: &mut SqliteConnection,
    name: &str,
) -> Result<Option<ExerciseNameRecord>, StoreError> {
    let row = sqlx::query_as::<_, ExerciseNameRecord>(&format!(
        "{} WHERE name = ? AND is_deleted = 0",
        SELECT_RECORD
    ))
    .bind(name)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row)
}

fn validate_name(name: &str) -> Result<(), StoreError> {
    if name.trim().is_empty() {
        return Err(StoreError::EmptyName);
    }
    Ok(())
}

/// Applies a mutation on an open connection, normally a transaction.
pub(crate) async fn apply_in(
    conn: &mut SqliteConnection,
    mutation: Mutation,
) -> Result<MutationOutcome, StoreError> {
    match mutation {
        Mutation::InsertDefault { name } => {
            validate_name(&name)?;
            let result = sqlx::query(
                r#"
                INSERT INTO exercise_names (name, is_custom)
                SELECT ?, 0
                WHERE NOT EXISTS (SELECT 1 FROM exercise_names WHERE name = ? AND is_deleted = 0)
                "#,
            )
            .bind(&name)
            .bind(&name)
            .execute(&mut *conn)
            .await?;
            Ok(if result.rows_affected() > 0 {
                MutationOutcome::Inserted
            } else {
                MutationOutcome::Unchanged
            })
        }

        Mutation::InsertCustom { name, meta } => {
            validate_name(&name)?;
            match find_live(conn, &name).await? {
                None => {
                    sqlx::query(
                        "INSERT INTO exercise_names (name, is_custom, remote_id, needs_sync) VALUES (?, 1, ?, ?)",
                    )
                    .bind(&name)
                    .bind(&meta.remote_id)
                    .bind(meta.needs_sync)
                    .execute(&mut *conn)
                    .await
                    .map_err(|e| StoreError::from_write(e, &name))?;
                    Ok(MutationOutcome::Inserted)
                }
                Some(existing) if existing.is_custom && existing.remote_id.is_none() => {
                    let Some(remote_id) = meta.remote_id else {
                        return Ok(MutationOutcome::Unchanged);
                    };
                    sqlx::query(
                        "UPDATE exercise_names SET remote_id = ?, needs_sync = 0 WHERE id = ?",
                    )
                    .bind(&remote_id)
                    .bind(existing.id)
                    .execute(&mut *conn)
                    .await?;
                    Ok(MutationOutcome::Linked)
                }
                Some(_) => Ok(MutationOutcome::Unchanged),
            }
        }

        Mutation::Rename { old_name, new_name } => {
            validate_name(&new_name)?;
            if find_live(conn, &new_name).await?.is_some() {
                return Err(StoreError::DuplicateName(new_name));
            }
            let existing = match find_live(conn, &old_name).await? {
                Some(row) if row.is_custom => row,
                _ => return Err(StoreError::NotFound(old_name)),
            };
            sqlx::query("UPDATE exercise_names SET name = ?, needs_sync = 1 WHERE id = ?")
                .bind(&new_name)
                .bind(existing.id)
                .execute(&mut *conn)
                .await
                .map_err(|e| StoreError::from_write(e, &new_name))?;
            Ok(MutationOutcome::Updated)
        }

        Mutation::ApplyRemoteName { id, name } => {
            validate_name(&name)?;
            if let Some(other) = find_live(conn, &name).await? {
                if other.id != id {
                    return Err(StoreError::DuplicateName(name));
                }
            }
            let result = sqlx::query(
                "UPDATE exercise_names SET name = ? WHERE id = ? AND needs_sync = 0 AND name != ?",
            )
            .bind(&name)
            .bind(id)
            .bind(&name)
            .execute(&mut *conn)
            .await
            .map_err(|e| StoreError::from_write(e, &name))?;
            Ok(if result.rows_affected() > 0 {
                MutationOutcome::Updated
            } else {
                MutationOutcome::Unchanged
            })
        }

        Mutation::SoftDelete { name } => {
            let result = sqlx::query(
                r#"
                UPDATE exercise_names SET is_deleted = 1, needs_sync = 1
                WHERE name = ? AND is_deleted = 0 AND is_custom = 1
                "#,
            )
            .bind(&name)
            .execute(&mut *conn)
            .await?;
            Ok(if result.rows_affected() > 0 {
                MutationOutcome::Updated
            } else {
                MutationOutcome::Unchanged
            })
        }

        Mutation::LinkRemote {
            id,
            remote_id,
            pushed_name,
        } => {
            // A rename or delete issued while the create was in flight keeps the row dirty.
            let result = sqlx::query(
                r#"
                UPDATE exercise_names
                SET remote_id = ?,
                    needs_sync = CASE WHEN name = ? AND is_deleted = 0 THEN 0 ELSE 1 END
                WHERE id = ? AND is_custom = 1
                "#,
            )
            .bind(&remote_id)
            .bind(&pushed_name)
            .bind(id)
            .execute(&mut *conn)
            .await?;
            Ok(if result.rows_affected() > 0 {
                MutationOutcome::Linked
            } else {
                MutationOutcome::Unchanged
            })
        }

        Mutation::ConfirmPushed { id, pushed_name } => {
            let result = sqlx::query(
                "UPDATE exercise_names SET needs_sync = 0 WHERE id = ? AND name = ? AND is_deleted = 0",
            )
            .bind(id)
            .bind(&pushed_name)
            .execute(&mut *conn)
            .await?;
            Ok(if result.rows_affected() > 0 {
                MutationOutcome::Updated
            } else {
                MutationOutcome::Unchanged
            })
        }
    }
}
