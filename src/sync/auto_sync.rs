//! Sync pass run when the application starts.

use crate::config::Config;
use crate::db::ExerciseStore;
use crate::remote::HttpRemote;
use crate::sync::{SyncEngine, SyncOutcome, SyncReport};

/// Runs one sync pass if the remote is configured and startup sync is enabled.
///
/// Any errors are logged and swallowed so the catalog keeps working offline
/// when the server is unavailable.
pub async fn try_startup_sync(store: &ExerciseStore, config: &Config) -> Option<SyncReport> {
    if !config.sync.on_startup || !config.remote.is_configured() {
        return None;
    }

    let remote = match HttpRemote::from_config(&config.remote) {
        Ok(remote) => remote,
        Err(e) => {
            tracing::warn!("Startup sync: {}", e);
            return None;
        }
    };

    let engine = SyncEngine::new(store.clone(), remote)
        .with_push_concurrency(config.sync.push_concurrency);

    match engine.run_sync().await {
        Ok(SyncOutcome::Completed(report)) => Some(report),
        Ok(SyncOutcome::AlreadyRunning) => None,
        Err(e) => {
            tracing::warn!("Startup sync failed: {}", e);
            None
        }
    }
}
