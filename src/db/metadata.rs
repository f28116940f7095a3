//! Small key/value table for values that must survive restarts.

use sqlx::sqlite::SqliteExecutor;

/// Version of the bundled default exercise list last applied.
pub const DEFAULT_EXERCISES_VERSION_KEY: &str = "default_exercises_version";
/// RFC 3339 timestamp of the last sync pass that completed.
pub const LAST_SYNCED_AT_KEY: &str = "last_synced_at";

pub async fn get<'e, E>(executor: E, key: &str) -> Result<Option<String>, sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    let row: Option<(String,)> = sqlx::query_as("SELECT value FROM metadata WHERE key = ?")
        .bind(key)
        .fetch_optional(executor)
        .await?;
    Ok(row.map(|(value,)| value))
}

pub async fn set<'e, E>(executor: E, key: &str, value: &str) -> Result<(), sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query(
        "INSERT INTO metadata (key, value) VALUES (?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )
    .bind(key)
    .bind(value)
    .execute(executor)
    .await?;
    Ok(())
}

/// Reads an integer value, treating a missing key, missing table, or garbage as 0.
pub async fn get_version<'e, E>(executor: E, key: &str) -> Result<i64, sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    match get(executor, key).await {
        Ok(value) => Ok(value.and_then(|v| v.trim().parse().ok()).unwrap_or(0)),
        Err(sqlx::Error::Database(e)) if e.message().contains("no such table") => Ok(0),
        Err(e) => Err(e),
    }
}
