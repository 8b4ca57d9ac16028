//! Plan execution in three ordered phases: unfollow artists, remove liked
//! tracks, remove saved albums.
//!
//! Each phase deletes its ids in batches of 50 and reports cumulative progress
//! after every batch. Phases never overlap. The first unrecoverable error stops
//! the run; whatever was already deleted stays deleted and is recorded in the
//! local state so a later run can pick up from a fresh plan.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::{
    Res,
    management::StateManager,
    planner::normalize_label,
    spotify::{SpotifyClient, TransportObserver},
    types::{
        ApplyPhase, ApplyProgressEvent, OperationLogEntry, OperationStatus, Plan, RemovalReason,
        UnfollowLogEntry,
    },
};

/// Ids per delete request, for every phase.
pub const APPLY_BATCH: usize = 50;

pub type ApplyProgressFn<'a> = &'a (dyn Fn(ApplyProgressEvent) + Send + Sync);

/// Counts of what a run removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub unfollowed: usize,
    pub tracks_removed: usize,
    pub albums_removed: usize,
}

impl ApplyReport {
    fn add(&mut self, phase: ApplyPhase, n: usize) {
        match phase {
            ApplyPhase::Unfollow => self.unfollowed += n,
            ApplyPhase::Tracks => self.tracks_removed += n,
            ApplyPhase::Albums => self.albums_removed += n,
        }
    }
}

/// Turns transport hooks into progress events for the running phase.
struct PhaseObserver<'a> {
    phase: ApplyPhase,
    total: usize,
    done: AtomicUsize,
    retries: AtomicU32,
    on_progress: ApplyProgressFn<'a>,
}

impl<'a> PhaseObserver<'a> {
    fn new(phase: ApplyPhase, total: usize, on_progress: ApplyProgressFn<'a>) -> Self {
        Self {
            phase,
            total,
            done: AtomicUsize::new(0),
            retries: AtomicU32::new(0),
            on_progress,
        }
    }

    fn emit(&self, retry_after: Option<u64>) {
        (self.on_progress)(ApplyProgressEvent {
            phase: self.phase,
            done: self.done.load(Ordering::SeqCst),
            total: self.total,
            retries: self.retries.load(Ordering::SeqCst),
            retry_after,
        });
    }

    fn advance(&self, n: usize) {
        self.done.fetch_add(n, Ordering::SeqCst);
        self.emit(None);
    }
}

impl TransportObserver for PhaseObserver<'_> {
    fn on_rate_limit(&self, retry_after_secs: u64) {
        self.retries.fetch_add(1, Ordering::SeqCst);
        self.emit(Some(retry_after_secs));
    }

    fn on_retry(&self, _attempt: u32, _status: u16) {
        self.retries.fetch_add(1, Ordering::SeqCst);
        self.emit(None);
    }
}

pub struct ApplyExecutor {
    client: SpotifyClient,
    store: Option<StateManager>,
}

impl ApplyExecutor {
    pub fn new(client: SpotifyClient) -> Self {
        Self {
            client,
            store: None,
        }
    }

    /// Records unfollows, removals and the operation log in `store`.
    pub fn with_store(mut self, store: StateManager) -> Self {
        self.store = Some(store);
        self
    }

    /// Executes `plan`. `None` is a no-op and emits nothing.
    pub async fn run_plan(
        &self,
        plan: Option<&Plan>,
        on_progress: ApplyProgressFn<'_>,
    ) -> Res<ApplyReport> {
        let Some(plan) = plan else {
            return Ok(ApplyReport::default());
        };

        let started_at = Utc::now();
        self.record_operation(OperationLogEntry {
            started_at,
            finished_at: None,
            status: OperationStatus::Running,
            unfollowed: 0,
            tracks_removed: 0,
            albums_removed: 0,
            error: None,
        })
        .await?;

        let mut report = ApplyReport::default();
        let result = self.run_phases(plan, on_progress, &mut report).await;

        let (status, error) = match &result {
            Ok(()) => (OperationStatus::Completed, None),
            Err(e) => (OperationStatus::Failed, Some(e.to_string())),
        };
        let recorded = self
            .record_operation(OperationLogEntry {
                started_at,
                finished_at: Some(Utc::now()),
                status,
                unfollowed: report.unfollowed,
                tracks_removed: report.tracks_removed,
                albums_removed: report.albums_removed,
                error,
            })
            .await;

        match (result, recorded) {
            (Ok(()), Ok(())) => {
                info!(?report, "plan applied");
                Ok(report)
            }
            (Ok(()), Err(e)) => Err(e),
            (Err(e), recorded) => {
                if let Err(store_err) = recorded {
                    warn!(error = %store_err, "failed to record aborted apply");
                }
                warn!(error = %e, ?report, "apply aborted");
                Err(e)
            }
        }
    }

    async fn run_phases(
        &self,
        plan: &Plan,
        on_progress: ApplyProgressFn<'_>,
        report: &mut ApplyReport,
    ) -> Res<()> {
        for phase in ApplyPhase::ALL {
            let ids = match phase {
                ApplyPhase::Unfollow => &plan.artists_to_unfollow,
                ApplyPhase::Tracks => &plan.track_ids_to_remove,
                ApplyPhase::Albums => &plan.album_ids_to_remove,
            };
            let observer = PhaseObserver::new(phase, ids.len(), on_progress);

            if ids.is_empty() {
                observer.emit(None);
                continue;
            }
            if ids.len() > 1 {
                observer.emit(None);
            }

            for batch in ids.chunks(APPLY_BATCH) {
                debug!(phase = phase.as_str(), size = batch.len(), "deleting batch");
                match phase {
                    ApplyPhase::Unfollow => self.client.unfollow_artists(batch, &observer).await?,
                    ApplyPhase::Tracks => self.client.remove_liked_tracks(batch, &observer).await?,
                    ApplyPhase::Albums => self.client.remove_saved_albums(batch, &observer).await?,
                }
                report.add(phase, batch.len());
                self.record_batch(plan, phase, batch).await?;
                observer.advance(batch.len());
            }
        }
        Ok(())
    }

    async fn record_batch(&self, plan: &Plan, phase: ApplyPhase, batch: &[String]) -> Res<()> {
        let Some(store) = self.store.as_ref() else {
            return Ok(());
        };

        let now = Utc::now();
        store
            .update(|state| match phase {
                ApplyPhase::Unfollow => {
                    state
                        .unfollow_log
                        .extend(batch.iter().map(|id| UnfollowLogEntry {
                            artist_id: id.clone(),
                            at: now,
                        }));
                }
                ApplyPhase::Tracks => {
                    for removal in plan.tracks_to_remove.iter().filter(|t| batch.contains(&t.id)) {
                        for reason in &removal.reasons {
                            let log = match reason {
                                RemovalReason::Artist { id, .. } => {
                                    state.artist_removals.entry(id.clone()).or_default()
                                }
                                RemovalReason::Label { label } => state
                                    .label_removals
                                    .entry(normalize_label(label))
                                    .or_default(),
                            };
                            log.track_ids.push(removal.id.clone());
                            log.last_removed_at = Some(now);
                        }
                    }
                }
                ApplyPhase::Albums => {
                    for removal in plan.albums_to_remove.iter().filter(|a| batch.contains(&a.id)) {
                        for reason in &removal.reasons {
                            let log = match reason {
                                RemovalReason::Artist { id, .. } => {
                                    state.artist_removals.entry(id.clone()).or_default()
                                }
                                RemovalReason::Label { label } => state
                                    .label_removals
                                    .entry(normalize_label(label))
                                    .or_default(),
                            };
                            log.album_ids.push(removal.id.clone());
                            log.last_removed_at = Some(now);
                        }
                    }
                }
            })
            .await
    }

    /// Inserts or replaces the operation log entry started at `entry.started_at`.
    async fn record_operation(&self, entry: OperationLogEntry) -> Res<()> {
        let Some(store) = self.store.as_ref() else {
            return Ok(());
        };

        store
            .update(|state| {
                let existing = state
                    .operation_log
                    .iter()
                    .rposition(|e| e.started_at == entry.started_at);
                match existing {
                    Some(i) => state.operation_log[i] = entry,
                    None => state.push_operation(entry),
                }
            })
            .await
    }
}
