//! Offline-tolerant synchronization of custom exercises with the backend.
//!
//! The local catalog stays fully usable without a connection. User edits mark
//! rows dirty; a sync pass started by the host application (at startup or on
//! request) pulls the backend's custom exercises, then pushes pending edits.
//! Rows with unpushed edits always win over the backend's copy.

pub mod auto_sync;
pub mod engine;

pub use auto_sync::try_startup_sync;
pub use engine::{
    last_synced_at, PullReport, PushReport, SyncEngine, SyncOutcome, SyncPhase, SyncReport,
};
