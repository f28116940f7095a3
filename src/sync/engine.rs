//! Bidirectional reconciliation of custom exercises with the backend.
//!
//! A pass pulls the backend's collection into the local catalog, then pushes
//! every dirty row. Remote failures are logged and isolated; the affected rows
//! stay dirty and are retried on the next pass.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};

use crate::db::exercise_repo::{apply_in, list_linked, live_names};
use crate::db::metadata::{self, LAST_SYNCED_AT_KEY};
use crate::db::{ExerciseStore, StoreError};
use crate::models::{ExerciseNameRecord, Mutation, MutationOutcome, SyncMeta};
use crate::remote::{CustomExerciseRemote, RemoteError};

/// Where the engine currently is in a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    Pulling,
    Pushing,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullReport {
    pub fetched: usize,
    pub inserted: usize,
    pub linked: usize,
    pub renamed: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushReport {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// `None` when the backend could not be listed.
    pub pull: Option<PullReport>,
    pub push: PushReport,
}

impl SyncReport {
    /// True when the pull succeeded and every pending row was confirmed.
    pub fn is_clean(&self) -> bool {
        self.pull.is_some() && self.push.failed == 0
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.pull {
            Some(pull) => write!(
                f,
                "pulled {} ({} new, {} linked, {} renamed, {} skipped)",
                pull.fetched, pull.inserted, pull.linked, pull.renamed, pull.skipped
            )?,
            None => write!(f, "pull failed")?,
        }
        write!(
            f,
            "; pushed {} created, {} renamed, {} deleted",
            self.push.created, self.push.updated, self.push.deleted
        )?;
        if self.push.failed > 0 {
            write!(f, ", {} failed", self.push.failed)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Completed(SyncReport),
    /// Another pass was in flight; this call did nothing.
    AlreadyRunning,
}

enum PullError {
    Remote(RemoteError),
    Store(StoreError),
}

impl From<StoreError> for PullError {
    fn from(e: StoreError) -> Self {
        PullError::Store(e)
    }
}

impl From<sqlx::Error> for PullError {
    fn from(e: sqlx::Error) -> Self {
        PullError::Store(StoreError::Storage(e))
    }
}

/// What the backend acknowledged for one pending row.
enum PushConfirmation {
    Created { remote_id: String },
    Updated,
    Deleted,
}

/// Resets the phase to idle however the pass ends.
struct PhaseReset<'a>(&'a Mutex<SyncPhase>);

impl Drop for PhaseReset<'_> {
    fn drop(&mut self) {
        if let Ok(mut phase) = self.0.lock() {
            *phase = SyncPhase::Idle;
        }
    }
}

pub struct SyncEngine<R> {
    store: ExerciseStore,
    remote: R,
    in_flight: tokio::sync::Mutex<()>,
    phase: Mutex<SyncPhase>,
    push_concurrency: usize,
}

impl<R: CustomExerciseRemote> SyncEngine<R> {
    pub fn new(store: ExerciseStore, remote: R) -> Self {
        Self {
            store,
            remote,
            in_flight: tokio::sync::Mutex::new(()),
            phase: Mutex::new(SyncPhase::Idle),
            push_concurrency: 4,
        }
    }

    /// Maximum number of remote calls the push phase keeps in flight.
    pub fn with_push_concurrency(mut self, push_concurrency: usize) -> Self {
        self.push_concurrency = push_concurrency.max(1);
        self
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn phase(&self) -> SyncPhase {
        self.phase
            .lock()
            .map(|phase| *phase)
            .unwrap_or(SyncPhase::Idle)
    }

    fn set_phase(&self, next: SyncPhase) {
        if let Ok(mut phase) = self.phase.lock() {
            *phase = next;
        }
    }

    /// Runs one pull-then-push pass.
    ///
    /// Returns [`SyncOutcome::AlreadyRunning`] without doing anything if a pass
    /// is in flight. Remote failures never surface here; only local storage
    /// failures do.
    pub async fn run_sync(&self) -> Result<SyncOutcome, StoreError> {
        let Ok(_in_flight) = self.in_flight.try_lock() else {
            tracing::debug!("Sync already in progress, skipping");
            return Ok(SyncOutcome::AlreadyRunning);
        };
        let _reset = PhaseReset(&self.phase);

        self.set_phase(SyncPhase::Pulling);
        let pull = match self.pull().await {
            Ok(report) => Some(report),
            Err(PullError::Remote(e)) => {
                tracing::warn!("Failed to fetch custom exercises: {}", e);
                None
            }
            Err(PullError::Store(e)) => return Err(e),
        };

        self.set_phase(SyncPhase::Pushing);
        let push = self.push().await?;

        let report = SyncReport { pull, push };
        if report.is_clean() {
            metadata::set(
                self.store.pool(),
                LAST_SYNCED_AT_KEY,
                &Utc::now().to_rfc3339(),
            )
            .await?;
        }
        tracing::info!("Sync finished: {}", report);

        Ok(SyncOutcome::Completed(report))
    }

    /// Merges the backend's collection into the catalog in one transaction.
    ///
    /// Renames of linked rows are applied before any insert, so a name given
    /// up by one row is free for a new remote record in the same pass.
    async fn pull(&self) -> Result<PullReport, PullError> {
        let remote_records = self.remote.list().await.map_err(PullError::Remote)?;

        let mut tx = self.store.begin().await?;
        let by_remote_id: HashMap<String, ExerciseNameRecord> = list_linked(&mut tx)
            .await?
            .into_iter()
            .filter_map(|row| row.remote_id.clone().map(|id| (id, row)))
            .collect();

        let mut report = PullReport {
            fetched: remote_records.len(),
            ..PullReport::default()
        };

        let mut renames = Vec::new();
        let mut unlinked = Vec::new();
        for remote in remote_records {
            match by_remote_id.get(&remote.id) {
                None => unlinked.push(remote),
                // A dirty row holds an unpushed edit and wins over the backend
                Some(local) if local.name != remote.name && !local.needs_sync => {
                    renames.push(RemoteRename {
                        id: local.id,
                        from: local.name.clone(),
                        to: remote.name,
                    });
                }
                Some(_) => {}
            }
        }

        let (renames, blocked) = plan_renames(renames, &live_names(&mut tx).await?);
        for rename in &blocked {
            tracing::warn!(
                "Not renaming '{}' to '{}': name is taken",
                rename.from,
                rename.to
            );
            report.skipped += 1;
        }

        // Park every renamed row first so swaps and chains never collide
        for rename in &renames {
            apply_in(
                &mut tx,
                Mutation::ApplyRemoteName {
                    id: rename.id,
                    name: parked_name(rename.id),
                },
            )
            .await?;
        }
        for rename in renames {
            apply_in(
                &mut tx,
                Mutation::ApplyRemoteName {
                    id: rename.id,
                    name: rename.to,
                },
            )
            .await?;
            report.renamed += 1;
        }

        for remote in unlinked {
            let mutation = Mutation::InsertCustom {
                name: remote.name.clone(),
                meta: SyncMeta::remote(remote.id.clone()),
            };
            match apply_in(&mut tx, mutation).await {
                Ok(MutationOutcome::Inserted) => report.inserted += 1,
                Ok(MutationOutcome::Linked) => report.linked += 1,
                Ok(_) => {
                    tracing::debug!(
                        "Remote exercise '{}' ({}) shadowed by a local row",
                        remote.name,
                        remote.id
                    );
                    report.skipped += 1;
                }
                Err(e) if e.is_validation() => {
                    tracing::warn!("Skipping remote exercise {}: {}", remote.id, e);
                    report.skipped += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }

        tx.commit().await?;
        Ok(report)
    }

    /// Pushes every dirty row. Remote calls run concurrently and each row
    /// succeeds or fails on its own.
    async fn push(&self) -> Result<PushReport, StoreError> {
        let pending = self.store.list_pending_sync().await?;
        if pending.is_empty() {
            return Ok(PushReport::default());
        }
        tracing::info!("Pushing {} pending change(s)", pending.len());

        let results: Vec<(ExerciseNameRecord, Result<PushConfirmation, RemoteError>)> =
            stream::iter(pending)
                .map(|record| async move {
                    let result = self.push_remote(&record).await;
                    (record, result)
                })
                .buffer_unordered(self.push_concurrency)
                .collect()
                .await;

        let mut report = PushReport::default();
        for (record, result) in results {
            match result {
                Ok(confirmation) => self.confirm(&record, confirmation, &mut report).await?,
                Err(e) => {
                    let action = record
                        .pending_action()
                        .map(|a| a.to_string())
                        .unwrap_or_default();
                    tracing::warn!(
                        "Failed to push {} of '{}', will retry next sync: {}",
                        action,
                        record.name,
                        e
                    );
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    async fn push_remote(
        &self,
        record: &ExerciseNameRecord,
    ) -> Result<PushConfirmation, RemoteError> {
        if record.is_deleted {
            if let Some(remote_id) = &record.remote_id {
                self.remote.delete(remote_id).await?;
            }
            return Ok(PushConfirmation::Deleted);
        }
        match &record.remote_id {
            None => {
                let created = self.remote.create(&record.name).await?;
                Ok(PushConfirmation::Created {
                    remote_id: created.id,
                })
            }
            Some(remote_id) => {
                self.remote.update(remote_id, &record.name).await?;
                Ok(PushConfirmation::Updated)
            }
        }
    }

    async fn confirm(
        &self,
        record: &ExerciseNameRecord,
        confirmation: PushConfirmation,
        report: &mut PushReport,
    ) -> Result<(), StoreError> {
        match confirmation {
            PushConfirmation::Deleted => {
                self.store.hard_delete(record.id).await?;
                report.deleted += 1;
            }
            PushConfirmation::Created { remote_id } => {
                tracing::debug!("Created '{}' on server as {}", record.name, remote_id);
                self.store
                    .apply(Mutation::LinkRemote {
                        id: record.id,
                        remote_id,
                        pushed_name: record.name.clone(),
                    })
                    .await?;
                report.created += 1;
            }
            PushConfirmation::Updated => {
                self.store
                    .apply(Mutation::ConfirmPushed {
                        id: record.id,
                        pushed_name: record.name.clone(),
                    })
                    .await?;
                report.updated += 1;
            }
        }
        Ok(())
    }
}

/// A backend name change for a clean linked row.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RemoteRename {
    id: i64,
    from: String,
    to: String,
}

/// Splits renames into a set that can be applied together and those blocked
/// by a name that stays taken.
///
/// A target is free if no live row holds it, or if the holder is itself being
/// renamed in the same set. Blocking one rename keeps its old name taken, so
/// the check repeats until nothing else is blocked.
fn plan_renames(
    mut pending: Vec<RemoteRename>,
    live_names: &HashSet<String>,
) -> (Vec<RemoteRename>, Vec<RemoteRename>) {
    let mut blocked = Vec::new();
    loop {
        let vacated: HashSet<String> = pending.iter().map(|r| r.from.clone()).collect();
        let mut targets = HashSet::new();
        let (ready, stuck): (Vec<_>, Vec<_>) = pending.into_iter().partition(|r| {
            !r.to.trim().is_empty()
                && (!live_names.contains(&r.to) || vacated.contains(&r.to))
                && targets.insert(r.to.clone())
        });
        pending = ready;
        if stuck.is_empty() {
            return (pending, blocked);
        }
        blocked.extend(stuck);
    }
}

/// Placeholder name held by a row between the two steps of a pull rename.
fn parked_name(id: i64) -> String {
    format!("\u{1f}pull-rename:{}", id)
}

/// Time of the last pass that pulled and pushed without failures.
pub async fn last_synced_at(store: &ExerciseStore) -> Result<Option<DateTime<Utc>>, StoreError> {
    let value = metadata::get(store.pool(), LAST_SYNCED_AT_KEY).await?;
    Ok(value
        .and_then(|v| DateTime::parse_from_rfc3339(&v).ok())
        .map(|dt| dt.with_timezone(&Utc)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use crate::remote::fake::FakeRemote;
    use crate::remote::RemoteExercise;
    use tempfile::TempDir;

    struct TestContext {
        store: ExerciseStore,
        _temp_dir: TempDir,
    }

    async fn setup_store() -> TestContext {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_db(&temp_dir.path().join("test.db")).await.unwrap();
        TestContext {
            store: ExerciseStore::new(pool),
            _temp_dir: temp_dir,
        }
    }

    async fn snapshot(store: &ExerciseStore) -> Vec<ExerciseNameRecord> {
        sqlx::query_as(
            "SELECT id, name, is_custom, remote_id, needs_sync, is_deleted FROM exercise_names ORDER BY id",
        )
        .fetch_all(store.pool())
        .await
        .unwrap()
    }

    fn completed(outcome: SyncOutcome) -> SyncReport {
        match outcome {
            SyncOutcome::Completed(report) => report,
            SyncOutcome::AlreadyRunning => panic!("sync unexpectedly skipped"),
        }
    }

    #[tokio::test]
    async fn test_pull_inserts_remote_records() {
        let ctx = setup_store().await;
        let remote = FakeRemote::new()
            .with_record("srv-1", "My Curl")
            .with_record("srv-2", "Cable Thing");
        let engine = SyncEngine::new(ctx.store.clone(), remote);

        let report = completed(engine.run_sync().await.unwrap());
        let pull = report.pull.unwrap();
        assert_eq!(pull.fetched, 2);
        assert_eq!(pull.inserted, 2);

        let row = ctx.store.get("My Curl").await.unwrap().unwrap();
        assert!(row.is_custom);
        assert!(!row.needs_sync);
        assert_eq!(row.remote_id.as_deref(), Some("srv-1"));
        assert!(engine.remote().calls().is_empty());
    }

    #[tokio::test]
    async fn test_pull_links_local_create_of_same_name() {
        let ctx = setup_store().await;
        ctx.store.create_custom("My Curl").await.unwrap();
        let engine = SyncEngine::new(
            ctx.store.clone(),
            FakeRemote::new().with_record("srv-5", "My Curl"),
        );

        let report = completed(engine.run_sync().await.unwrap());
        assert_eq!(report.pull.unwrap().linked, 1);

        let rows = snapshot(&ctx.store).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].remote_id.as_deref(), Some("srv-5"));
        assert!(!rows[0].needs_sync);
        // Linked during pull, so nothing left to create
        assert!(engine.remote().calls().is_empty());
    }

    #[tokio::test]
    async fn test_pull_is_idempotent() {
        let ctx = setup_store().await;
        ctx.store.insert_default("Squat").await.unwrap();
        ctx.store
            .add_custom("Old Name", SyncMeta::remote("srv-2"))
            .await
            .unwrap();
        ctx.store.create_custom("Local Only").await.unwrap();

        let engine = SyncEngine::new(
            ctx.store.clone(),
            FakeRemote::new()
                .with_record("srv-1", "My Curl")
                .with_record("srv-2", "New Name")
                .with_record("srv-3", "Squat"),
        );

        let first = engine.pull().await.ok().unwrap();
        let after_first = snapshot(&ctx.store).await;
        let second = engine.pull().await.ok().unwrap();
        let after_second = snapshot(&ctx.store).await;

        assert_eq!(first.inserted, 1);
        assert_eq!(first.renamed, 1);
        assert_eq!(second.inserted, 0);
        assert_eq!(second.renamed, 0);
        assert_eq!(after_first, after_second);
    }

    #[tokio::test]
    async fn test_pull_overwrites_clean_row_name() {
        let ctx = setup_store().await;
        ctx.store
            .add_custom("My Curl", SyncMeta::remote("srv-1"))
            .await
            .unwrap();
        let engine = SyncEngine::new(
            ctx.store.clone(),
            FakeRemote::new().with_record("srv-1", "Spider Curl"),
        );

        let report = completed(engine.run_sync().await.unwrap());
        assert_eq!(report.pull.unwrap().renamed, 1);
        assert!(ctx.store.get("My Curl").await.unwrap().is_none());
        let row = ctx.store.get("Spider Curl").await.unwrap().unwrap();
        assert!(!row.needs_sync);
        assert_eq!(ctx.store.search("spid").await.unwrap(), vec!["Spider Curl"]);
    }

    #[tokio::test]
    async fn test_pull_never_clobbers_dirty_row() {
        let ctx = setup_store().await;
        ctx.store
            .add_custom("My Curl", SyncMeta::remote("srv-123"))
            .await
            .unwrap();
        ctx.store.rename("My Curl", "Hammer Curl").await.unwrap();

        let engine = SyncEngine::new(
            ctx.store.clone(),
            FakeRemote::new().with_record("srv-123", "My Curl"),
        );
        let report = engine.pull().await.ok().unwrap();

        assert_eq!(report.renamed, 0);
        let row = ctx.store.get("Hammer Curl").await.unwrap().unwrap();
        assert!(row.needs_sync);
        assert!(ctx.store.get("My Curl").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_pull_leaves_rows_missing_remotely() {
        let ctx = setup_store().await;
        ctx.store
            .add_custom("Gone Upstream", SyncMeta::remote("srv-9"))
            .await
            .unwrap();
        let engine = SyncEngine::new(ctx.store.clone(), FakeRemote::new());

        completed(engine.run_sync().await.unwrap());

        let row = ctx.store.get("Gone Upstream").await.unwrap().unwrap();
        assert_eq!(row.remote_id.as_deref(), Some("srv-9"));
    }

    #[tokio::test]
    async fn test_pull_does_not_resurrect_pending_delete() {
        let ctx = setup_store().await;
        ctx.store
            .add_custom("My Curl", SyncMeta::remote("srv-1"))
            .await
            .unwrap();
        ctx.store.soft_delete("My Curl").await.unwrap();

        let engine = SyncEngine::new(
            ctx.store.clone(),
            FakeRemote::new().with_record("srv-1", "My Curl"),
        );
        engine.pull().await.ok().unwrap();

        assert!(ctx.store.list_all().await.unwrap().is_empty());
        assert_eq!(snapshot(&ctx.store).await.len(), 1);
    }

    #[tokio::test]
    async fn test_pull_skips_rename_onto_taken_name() {
        let ctx = setup_store().await;
        ctx.store.insert_default("Squat").await.unwrap();
        ctx.store
            .add_custom("My Squat", SyncMeta::remote("srv-1"))
            .await
            .unwrap();

        let engine = SyncEngine::new(
            ctx.store.clone(),
            FakeRemote::new()
                .with_record("srv-1", "Squat")
                .with_record("srv-2", "Fresh"),
        );
        let report = engine.pull().await.ok().unwrap();

        assert_eq!(report.skipped, 1);
        assert_eq!(report.inserted, 1);
        assert!(ctx.store.get("My Squat").await.unwrap().is_some());
        assert!(ctx.store.get("Fresh").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_pull_inserts_name_freed_by_remote_rename() {
        let ctx = setup_store().await;
        ctx.store
            .add_custom("Arnold Press", SyncMeta::remote("srv-2"))
            .await
            .unwrap();

        // The new record comes first, before the rename that frees its name
        let engine = SyncEngine::new(
            ctx.store.clone(),
            FakeRemote::new()
                .with_record("srv-1", "Arnold Press")
                .with_record("srv-2", "Seated Arnold Press"),
        );

        let first = engine.pull().await.ok().unwrap();
        assert_eq!(first.renamed, 1);
        assert_eq!(first.inserted, 1);
        assert_eq!(first.skipped, 0);

        let after_first = snapshot(&ctx.store).await;
        let second = engine.pull().await.ok().unwrap();
        assert_eq!(second.inserted + second.renamed + second.linked, 0);
        assert_eq!(snapshot(&ctx.store).await, after_first);

        let arnold = ctx.store.get("Arnold Press").await.unwrap().unwrap();
        assert_eq!(arnold.remote_id.as_deref(), Some("srv-1"));
        let seated = ctx.store.get("Seated Arnold Press").await.unwrap().unwrap();
        assert_eq!(seated.remote_id.as_deref(), Some("srv-2"));
    }

    #[tokio::test]
    async fn test_pull_applies_remote_name_swap() {
        let ctx = setup_store().await;
        ctx.store
            .add_custom("Pullover", SyncMeta::remote("srv-1"))
            .await
            .unwrap();
        ctx.store
            .add_custom("Pull Through", SyncMeta::remote("srv-2"))
            .await
            .unwrap();

        let engine = SyncEngine::new(
            ctx.store.clone(),
            FakeRemote::new()
                .with_record("srv-1", "Pull Through")
                .with_record("srv-2", "Pullover"),
        );

        let report = engine.pull().await.ok().unwrap();
        assert_eq!(report.renamed, 2);
        assert_eq!(report.skipped, 0);

        let through = ctx.store.get("Pull Through").await.unwrap().unwrap();
        assert_eq!(through.remote_id.as_deref(), Some("srv-1"));
        let over = ctx.store.get("Pullover").await.unwrap().unwrap();
        assert_eq!(over.remote_id.as_deref(), Some("srv-2"));
        assert_eq!(ctx.store.list_all().await.unwrap().len(), 2);
        assert_eq!(ctx.store.search("pullover").await.unwrap(), vec!["Pullover"]);

        let again = engine.pull().await.ok().unwrap();
        assert_eq!(again.renamed, 0);
    }

    #[tokio::test]
    async fn test_pull_rename_chain_blocked_by_dirty_row() {
        let ctx = setup_store().await;
        ctx.store
            .add_custom("Row A", SyncMeta::remote("srv-1"))
            .await
            .unwrap();
        ctx.store
            .add_custom("Row B", SyncMeta::remote("srv-2"))
            .await
            .unwrap();
        ctx.store.create_custom("Row C").await.unwrap();

        // srv-2 cannot take "Row C", so srv-1 cannot take "Row B"
        let engine = SyncEngine::new(
            ctx.store.clone(),
            FakeRemote::new()
                .with_record("srv-1", "Row B")
                .with_record("srv-2", "Row C"),
        );

        let report = engine.pull().await.ok().unwrap();
        assert_eq!(report.renamed, 0);
        assert_eq!(report.skipped, 2);
        assert_eq!(
            ctx.store.list_all().await.unwrap(),
            vec!["Row A", "Row B", "Row C"]
        );
    }

    #[test]
    fn test_plan_renames() {
        let rename = |id, from: &str, to: &str| RemoteRename {
            id,
            from: from.to_string(),
            to: to.to_string(),
        };
        let live: HashSet<String> = ["A", "B", "Taken"].iter().map(|n| n.to_string()).collect();

        let (ready, blocked) = plan_renames(vec![rename(1, "A", "B"), rename(2, "B", "A")], &live);
        assert_eq!(ready.len(), 2);
        assert!(blocked.is_empty());

        let (ready, blocked) = plan_renames(
            vec![rename(1, "A", "B"), rename(2, "B", "Taken")],
            &live,
        );
        assert!(ready.is_empty());
        assert_eq!(blocked.len(), 2);

        let (ready, blocked) = plan_renames(vec![rename(1, "A", "  ")], &live);
        assert!(ready.is_empty());
        assert_eq!(blocked, vec![rename(1, "A", "  ")]);
    }

    #[tokio::test]
    async fn test_failed_pull_leaves_store_untouched_and_still_pushes() {
        let ctx = setup_store().await;
        ctx.store.create_custom("My Curl").await.unwrap();
        let remote = FakeRemote::new().with_record("srv-1", "Remote Only");
        remote.fail_list();
        let engine = SyncEngine::new(ctx.store.clone(), remote);

        let report = completed(engine.run_sync().await.unwrap());

        assert!(report.pull.is_none());
        assert!(!report.is_clean());
        assert_eq!(report.push.created, 1);
        assert!(ctx.store.get("Remote Only").await.unwrap().is_none());
        assert!(last_synced_at(&ctx.store).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_offline_create_is_pushed() {
        let ctx = setup_store().await;
        ctx.store.create_custom("My Curl").await.unwrap();
        let row = ctx.store.get("My Curl").await.unwrap().unwrap();
        assert!(row.needs_sync);
        assert_eq!(row.remote_id, None);

        let engine = SyncEngine::new(ctx.store.clone(), FakeRemote::new().with_next_id(123));
        let report = completed(engine.run_sync().await.unwrap());

        assert_eq!(report.push.created, 1);
        let row = ctx.store.get("My Curl").await.unwrap().unwrap();
        assert!(!row.needs_sync);
        assert_eq!(row.remote_id.as_deref(), Some("srv-123"));
        assert_eq!(
            engine.remote().records(),
            vec![RemoteExercise::new("srv-123", "My Curl")]
        );
    }

    #[tokio::test]
    async fn test_push_then_pull_round_trip() {
        let ctx = setup_store().await;
        ctx.store.create_custom("My Curl").await.unwrap();
        let engine = SyncEngine::new(ctx.store.clone(), FakeRemote::new());

        completed(engine.run_sync().await.unwrap());
        let after_push = snapshot(&ctx.store).await;

        let report = completed(engine.run_sync().await.unwrap());
        let after_pull = snapshot(&ctx.store).await;

        assert_eq!(report.pull.unwrap().fetched, 1);
        assert_eq!(report.push, PushReport::default());
        assert_eq!(after_push, after_pull);
        assert_eq!(after_pull.len(), 1);
        assert_eq!(after_pull[0].name, "My Curl");
        assert!(!after_pull[0].needs_sync);
        assert!(last_synced_at(&ctx.store).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_offline_rename_survives_pull_then_pushes() {
        let ctx = setup_store().await;
        ctx.store.create_custom("My Curl").await.unwrap();
        let engine = SyncEngine::new(ctx.store.clone(), FakeRemote::new().with_next_id(123));
        completed(engine.run_sync().await.unwrap());

        ctx.store.rename("My Curl", "Hammer Curl").await.unwrap();

        // Backend still reports the old name when the next pass pulls
        let pull = engine.pull().await.ok().unwrap();
        assert_eq!(pull.renamed, 0);
        assert!(ctx.store.get("Hammer Curl").await.unwrap().unwrap().needs_sync);

        let push = engine.push().await.unwrap();
        assert_eq!(push.updated, 1);

        let row = ctx.store.get("Hammer Curl").await.unwrap().unwrap();
        assert!(!row.needs_sync);
        assert_eq!(row.remote_id.as_deref(), Some("srv-123"));
        assert_eq!(
            engine.remote().records(),
            vec![RemoteExercise::new("srv-123", "Hammer Curl")]
        );
    }

    #[tokio::test]
    async fn test_push_deletes() {
        let ctx = setup_store().await;
        ctx.store
            .add_custom("Synced", SyncMeta::remote("srv-1"))
            .await
            .unwrap();
        ctx.store.create_custom("Never Synced").await.unwrap();
        ctx.store.soft_delete("Synced").await.unwrap();
        ctx.store.soft_delete("Never Synced").await.unwrap();

        let engine = SyncEngine::new(
            ctx.store.clone(),
            FakeRemote::new().with_record("srv-1", "Synced"),
        );
        let push = engine.push().await.unwrap();

        assert_eq!(push.deleted, 2);
        assert!(snapshot(&ctx.store).await.is_empty());
        assert!(engine.remote().records().is_empty());
        assert_eq!(engine.remote().calls(), vec!["delete:srv-1"]);
    }

    #[tokio::test]
    async fn test_push_delete_tolerates_already_gone() {
        let ctx = setup_store().await;
        ctx.store
            .add_custom("My Curl", SyncMeta::remote("srv-7"))
            .await
            .unwrap();
        ctx.store.soft_delete("My Curl").await.unwrap();

        let engine = SyncEngine::new(ctx.store.clone(), FakeRemote::new());
        let push = engine.push().await.unwrap();

        assert_eq!(push.deleted, 1);
        assert_eq!(push.failed, 0);
        assert!(snapshot(&ctx.store).await.is_empty());
    }

    #[tokio::test]
    async fn test_partial_push_failure_is_isolated() {
        let ctx = setup_store().await;
        for name in ["First", "Second", "Third"] {
            ctx.store.create_custom(name).await.unwrap();
        }
        let remote = FakeRemote::new();
        remote.fail_on("Second");
        let engine = SyncEngine::new(ctx.store.clone(), remote).with_push_concurrency(3);

        let report = completed(engine.run_sync().await.unwrap());
        assert_eq!(report.push.created, 2);
        assert_eq!(report.push.failed, 1);

        assert!(!ctx.store.get("First").await.unwrap().unwrap().needs_sync);
        assert!(!ctx.store.get("Third").await.unwrap().unwrap().needs_sync);
        let second = ctx.store.get("Second").await.unwrap().unwrap();
        assert!(second.needs_sync);
        assert_eq!(second.remote_id, None);

        // Retried on the next pass without re-sending the others
        engine.remote().clear_failures();
        let report = completed(engine.run_sync().await.unwrap());
        assert_eq!(report.push.created, 1);
        assert!(!ctx.store.get("Second").await.unwrap().unwrap().needs_sync);

        let creates: Vec<String> = engine
            .remote()
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("create:"))
            .collect();
        assert_eq!(creates.len(), 4);
        assert_eq!(
            creates.iter().filter(|c| *c == "create:Second").count(),
            2
        );
    }

    #[tokio::test]
    async fn test_failed_rename_push_keeps_row_dirty() {
        let ctx = setup_store().await;
        ctx.store
            .add_custom("My Curl", SyncMeta::remote("srv-1"))
            .await
            .unwrap();
        ctx.store.rename("My Curl", "Hammer Curl").await.unwrap();

        let remote = FakeRemote::new().with_record("srv-1", "My Curl");
        remote.fail_on("Hammer Curl");
        let engine = SyncEngine::new(ctx.store.clone(), remote);

        let push = engine.push().await.unwrap();
        assert_eq!(push.failed, 1);
        let row = ctx.store.get("Hammer Curl").await.unwrap().unwrap();
        assert!(row.needs_sync);
        assert_eq!(row.remote_id.as_deref(), Some("srv-1"));
    }

    #[tokio::test]
    async fn test_push_is_idempotent() {
        let ctx = setup_store().await;
        ctx.store.create_custom("My Curl").await.unwrap();
        let engine = SyncEngine::new(ctx.store.clone(), FakeRemote::new());

        engine.push().await.unwrap();
        let calls_after_first = engine.remote().calls();
        let second = engine.push().await.unwrap();

        assert_eq!(second, PushReport::default());
        assert_eq!(engine.remote().calls(), calls_after_first);
        assert!(ctx.store.list_pending_sync().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_sync_is_skipped() {
        let ctx = setup_store().await;
        ctx.store.create_custom("My Curl").await.unwrap();
        let engine = SyncEngine::new(ctx.store.clone(), FakeRemote::new());

        {
            let _held = engine.in_flight.try_lock().unwrap();
            assert_eq!(
                engine.run_sync().await.unwrap(),
                SyncOutcome::AlreadyRunning
            );
        }
        assert!(engine.remote().calls().is_empty());

        completed(engine.run_sync().await.unwrap());
        assert_eq!(engine.phase(), SyncPhase::Idle);
        assert_eq!(engine.remote().calls(), vec!["create:My Curl"]);
    }

    #[tokio::test]
    async fn test_report_display() {
        let report = SyncReport {
            pull: Some(PullReport {
                fetched: 3,
                inserted: 1,
                linked: 1,
                renamed: 0,
                skipped: 1,
            }),
            push: PushReport {
                created: 2,
                updated: 0,
                deleted: 1,
                failed: 1,
            },
        };
        assert_eq!(
            report.to_string(),
            "pulled 3 (1 new, 1 linked, 0 renamed, 1 skipped); pushed 2 created, 0 renamed, 1 deleted, 1 failed"
        );
    }
}
