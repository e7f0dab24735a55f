//! Submit-and-poll coordinator.
//!
//! Owns the two cycle guards and drives record state through the store
//! and the API client. Each cycle type is serialized against itself; the
//! two types may overlap each other freely.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::api::ClassificationApi;
use crate::config::SyncConfig;
use crate::error::Result;
use crate::record::{ClassificationRecord, FodmapStatus};
use crate::store::RecordStore;

/// Why a cycle invocation did not run its body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The same cycle type is already in flight.
    AlreadyRunning,
    /// Sync is disabled by configuration.
    Disabled,
    /// No API endpoint is configured.
    NotConfigured,
    /// The classification service reported unhealthy.
    BackendUnhealthy,
}

/// Counts of work performed by a completed cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    /// Records handed to the API by a submit cycle.
    pub submitted: usize,
    /// Terminal classifications applied by a poll cycle.
    pub applied: usize,
    /// Records reset for resubmission by a poll cycle.
    pub reset: usize,
}

/// Result of one cycle invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The cycle body did not run.
    Skipped(SkipReason),
    /// The cycle ran but found no eligible records.
    NoWork,
    /// The cycle ran to completion.
    Completed(CycleStats),
}

/// Snapshot of guard and timestamp state, safe to query at any time.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub is_syncing: bool,
    pub is_polling: bool,
    pub last_sync_time: Option<DateTime<Utc>>,
    pub next_sync_time: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct SyncTimes {
    last_sync: Option<DateTime<Utc>>,
    next_sync: Option<DateTime<Utc>>,
}

/// Releases a cycle guard when dropped, so the flag clears on success,
/// error, and panic paths alike.
struct CycleGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> CycleGuard<'a> {
    /// Attempts to take the guard. Returns `None` when the cycle is
    /// already in flight.
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// The stateful sync coordinator. Constructed once at process start and
/// shared by handle with whatever owns the scheduler.
pub struct SyncOrchestrator {
    config: SyncConfig,
    api: Arc<dyn ClassificationApi>,
    store: Arc<dyn RecordStore>,
    is_syncing: AtomicBool,
    is_polling: AtomicBool,
    times: RwLock<SyncTimes>,
}

impl SyncOrchestrator {
    pub fn new(
        config: SyncConfig,
        api: Arc<dyn ClassificationApi>,
        store: Arc<dyn RecordStore>,
    ) -> Self {
        Self {
            config,
            api,
            store,
            is_syncing: AtomicBool::new(false),
            is_polling: AtomicBool::new(false),
            times: RwLock::new(SyncTimes::default()),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Snapshot of the current guard and timestamp state.
    pub fn status(&self) -> SyncStatus {
        let times = match self.times.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Sync time lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        SyncStatus {
            is_syncing: self.is_syncing.load(Ordering::Acquire),
            is_polling: self.is_polling.load(Ordering::Acquire),
            last_sync_time: times.last_sync,
            next_sync_time: times.next_sync,
        }
    }

    /// Records when the scheduler expects to run the next submit cycle.
    pub fn set_next_sync_time(&self, next: Option<DateTime<Utc>>) {
        self.with_times(|times| times.next_sync = next);
    }

    fn record_sync_time(&self, at: DateTime<Utc>) {
        self.with_times(|times| times.last_sync = Some(at));
    }

    fn with_times(&self, f: impl FnOnce(&mut SyncTimes)) {
        let mut times = match self.times.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Sync time lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        f(&mut times);
    }

    /// Submits all unsubmitted records. Periodic and manual entry point.
    pub async fn run_submit_cycle(&self) -> Result<CycleOutcome> {
        self.submit_cycle_inner(None).await
    }

    /// Submits only the given ids, filtered to records that are actually
    /// eligible. Used when freshly discovered products should not wait
    /// for the next scheduled cycle.
    pub async fn run_submit_cycle_for(&self, ids: &[String]) -> Result<CycleOutcome> {
        self.submit_cycle_inner(Some(ids)).await
    }

    /// Polls all submitted-but-unprocessed records. Periodic and manual
    /// entry point.
    pub async fn run_poll_cycle(&self) -> Result<CycleOutcome> {
        self.poll_cycle_inner(None).await
    }

    /// Polls only the given ids, filtered to eligible records.
    pub async fn run_poll_cycle_for(&self, ids: &[String]) -> Result<CycleOutcome> {
        self.poll_cycle_inner(Some(ids)).await
    }

    /// Manual repair: clears the submission stamp on the given ids so the
    /// next submit cycle picks them up again.
    pub async fn reset_for_resubmission(&self, ids: &[String]) -> Result<usize> {
        let reset = self.store.reset_submitted_at(ids).await?;
        log::info!("Manually reset {} of {} records for resubmission", reset, ids.len());
        Ok(reset)
    }

    fn preflight_skip(&self) -> Option<SkipReason> {
        if !self.config.sync_enabled {
            return Some(SkipReason::Disabled);
        }
        if !self.api.is_configured() {
            return Some(SkipReason::NotConfigured);
        }
        None
    }

    async fn submit_cycle_inner(&self, ids: Option<&[String]>) -> Result<CycleOutcome> {
        // The guard must be taken before the first await.
        let _guard = match CycleGuard::acquire(&self.is_syncing) {
            Some(guard) => guard,
            None => {
                log::debug!("Submit cycle skipped: another submit cycle is in flight");
                return Ok(CycleOutcome::Skipped(SkipReason::AlreadyRunning));
            }
        };

        if let Some(reason) = self.preflight_skip() {
            log::debug!("Submit cycle skipped: {:?}", reason);
            return Ok(CycleOutcome::Skipped(reason));
        }
        if !self.api.health_check().await.is_healthy {
            log::info!("Submit cycle skipped: classification service unhealthy");
            return Ok(CycleOutcome::Skipped(SkipReason::BackendUnhealthy));
        }

        let mut candidates = match ids {
            None => self.store.unsubmitted_records().await?,
            Some(ids) => self
                .store
                .records_by_ids(ids)
                .await?
                .into_iter()
                .filter(ClassificationRecord::is_submit_eligible)
                .collect(),
        };
        if candidates.is_empty() {
            return Ok(CycleOutcome::NoWork);
        }

        // Write-ahead: persist the submission stamp before the network
        // call. A crash mid-submission then costs at worst a duplicate
        // submission, never a silently dropped record.
        let stamped_at = Utc::now();
        for record in &mut candidates {
            record.submitted_at = Some(stamped_at);
        }
        self.store.apply_updates(&candidates).await?;

        let outcome = match self.api.submit_records(&candidates).await {
            Ok(outcome) => outcome,
            Err(e) => {
                // The stamps stay in place; these records now need a
                // missing-record reconciliation or a manual reset before
                // the submit cycle will touch them again.
                log::error!(
                    "Submit cycle failed after stamping {} records: {}",
                    candidates.len(),
                    e
                );
                return Err(e.into());
            }
        };
        if !outcome.success {
            log::warn!(
                "Server accepted submission only partially: {}",
                outcome.message.as_deref().unwrap_or("no detail")
            );
        }

        for record in &mut candidates {
            record.status = FodmapStatus::Pending;
        }
        self.store.apply_updates(&candidates).await?;
        self.record_sync_time(Utc::now());
        log::info!(
            "Submit cycle completed: {} records now pending ({} accepted by server)",
            candidates.len(),
            outcome.submitted_count
        );

        // Give the server a moment, then poll just this batch so quick
        // classifications land without waiting for the next scheduled poll.
        tokio::time::sleep(self.config.post_submit_poll_delay()).await;
        let batch_ids: Vec<String> = candidates.iter().map(|r| r.id.clone()).collect();
        match self.poll_cycle_inner(Some(&batch_ids)).await {
            Ok(poll_outcome) => log::debug!("Post-submit poll finished: {:?}", poll_outcome),
            Err(e) => log::warn!("Post-submit poll failed: {}", e),
        }

        Ok(CycleOutcome::Completed(CycleStats {
            submitted: candidates.len(),
            ..CycleStats::default()
        }))
    }

    async fn poll_cycle_inner(&self, ids: Option<&[String]>) -> Result<CycleOutcome> {
        let _guard = match CycleGuard::acquire(&self.is_polling) {
            Some(guard) => guard,
            None => {
                log::debug!("Poll cycle skipped: another poll cycle is in flight");
                return Ok(CycleOutcome::Skipped(SkipReason::AlreadyRunning));
            }
        };

        if let Some(reason) = self.preflight_skip() {
            log::debug!("Poll cycle skipped: {:?}", reason);
            return Ok(CycleOutcome::Skipped(reason));
        }
        if !self.api.health_check().await.is_healthy {
            log::info!("Poll cycle skipped: classification service unhealthy");
            return Ok(CycleOutcome::Skipped(SkipReason::BackendUnhealthy));
        }

        let candidates: Vec<ClassificationRecord> = match ids {
            None => self.store.submitted_unprocessed_records().await?,
            Some(ids) => self
                .store
                .records_by_ids(ids)
                .await?
                .into_iter()
                .filter(ClassificationRecord::is_poll_eligible)
                .collect(),
        };
        if candidates.is_empty() {
            return Ok(CycleOutcome::NoWork);
        }

        let requested: Vec<String> = candidates.iter().map(|r| r.id.clone()).collect();
        let outcome = self.api.poll_status(&requested).await?;

        // Terminal results first: apply status, processing stamp, and
        // enrichment. Results still pending stay untouched and remain
        // candidates for the next poll.
        let by_id: HashMap<&str, &ClassificationRecord> =
            candidates.iter().map(|r| (r.id.as_str(), r)).collect();
        let mut updates = Vec::new();
        for result in &outcome.results {
            if !result.status.is_terminal() {
                continue;
            }
            let Some(&record) = by_id.get(result.id.as_str()) else {
                log::warn!("Ignoring status result for unknown record '{}'", result.id);
                continue;
            };
            let mut updated = record.clone();
            updated.status = result.status;
            updated.processed_at = Some(result.processed_at.unwrap_or_else(Utc::now));
            if result.explanation.is_some() {
                updated.explanation = result.explanation.clone();
            }
            if result.is_food.is_some() {
                updated.is_food = result.is_food;
            }
            updates.push(updated);
        }
        if !updates.is_empty() {
            self.store.apply_updates(&updates).await?;
            log::info!("Applied {} terminal classifications", updates.len());
        }

        // Missing-record reconciliation, strictly separate from the pass
        // above: an id the server answered for must never also be reset.
        let requested_set: HashSet<&str> = requested.iter().map(String::as_str).collect();
        let answered: HashSet<&str> = outcome.results.iter().map(|r| r.id.as_str()).collect();
        let missing: Vec<String> = outcome
            .missing_ids
            .iter()
            .filter(|id| requested_set.contains(id.as_str()) && !answered.contains(id.as_str()))
            .cloned()
            .collect();
        let reset = if missing.is_empty() {
            0
        } else {
            self.store.reset_submitted_at(&missing).await?
        };
        if reset > 0 {
            log::info!(
                "Reset {} records the server does not know; they are eligible for resubmission",
                reset
            );
        }

        Ok(CycleOutcome::Completed(CycleStats {
            applied: updates.len(),
            reset,
            ..CycleStats::default()
        }))
    }
}
