use serde::{Deserialize, Serialize};
use std::fmt;

/// A single row of the exercise name catalog.
///
/// Bundled defaults have `is_custom = false` and never carry sync state.
/// Custom rows are dirty (`needs_sync`) until the backend has confirmed
/// their latest creation, rename, or deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ExerciseNameRecord {
    pub id: i64,
    pub name: String,
    pub is_custom: bool,
    pub remote_id: Option<String>,
    pub needs_sync: bool,
    pub is_deleted: bool,
}

impl ExerciseNameRecord {
    /// Kind of pending work the push phase has to perform for this row.
    pub fn pending_action(&self) -> Option<PendingAction> {
        if !self.needs_sync {
            return None;
        }
        if self.is_deleted {
            return Some(PendingAction::Delete);
        }
        match self.remote_id {
            None => Some(PendingAction::Create),
            Some(_) => Some(PendingAction::Rename),
        }
    }
}

impl fmt::Display for ExerciseNameRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if self.is_custom {
            write!(f, " (custom")?;
            if let Some(action) = self.pending_action() {
                write!(f, ", pending {}", action)?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PendingAction {
    Create,
    Rename,
    Delete,
}

impl fmt::Display for PendingAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PendingAction::Create => write!(f, "create"),
            PendingAction::Rename => write!(f, "rename"),
            PendingAction::Delete => write!(f, "delete"),
        }
    }
}

/// Sync metadata attached to a custom insert.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncMeta {
    pub needs_sync: bool,
    pub remote_id: Option<String>,
}

impl SyncMeta {
    /// A user-created row that the backend has not seen yet.
    pub fn local() -> Self {
        Self {
            needs_sync: true,
            remote_id: None,
        }
    }

    /// A row pulled from the backend.
    pub fn remote(remote_id: impl Into<String>) -> Self {
        Self {
            needs_sync: false,
            remote_id: Some(remote_id.into()),
        }
    }
}

/// The closed set of writes the catalog accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Insert a bundled default if the name is free.
    InsertDefault { name: String },
    /// Insert a custom row, or link a local-only row of the same name to `meta.remote_id`.
    InsertCustom { name: String, meta: SyncMeta },
    /// Rename a live custom row and mark it dirty.
    Rename { old_name: String, new_name: String },
    /// Overwrite the name of a clean remote-linked row with the backend's name.
    ApplyRemoteName { id: i64, name: String },
    /// Tombstone a live custom row.
    SoftDelete { name: String },
    /// Record the backend identifier for a pushed row.
    LinkRemote {
        id: i64,
        remote_id: String,
        pushed_name: String,
    },
    /// Clear the dirty flag after the backend accepted `pushed_name`.
    ConfirmPushed { id: i64, pushed_name: String },
}

/// What a [`Mutation`] actually did to the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    Inserted,
    Linked,
    Updated,
    Unchanged,
}
