//! Periodic cycle scheduler.
//!
//! Runs the submit and poll cycles on independent repeating timers with
//! manual trigger support via broadcast channels. `start` is idempotent;
//! `stop` halts future ticks but lets an in-flight cycle run to
//! completion.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::orchestrator::SyncOrchestrator;

/// Which cycle a scheduler loop drives.
#[derive(Debug, Clone, Copy)]
enum CycleKind {
    Submit,
    Poll,
}

impl CycleKind {
    fn label(&self) -> &'static str {
        match self {
            CycleKind::Submit => "submit",
            CycleKind::Poll => "poll",
        }
    }
}

/// Periodic scheduler owning the two cycle timers.
pub struct SyncScheduler {
    orchestrator: Arc<SyncOrchestrator>,
    shutdown: Arc<AtomicBool>,
    submit_trigger: broadcast::Sender<()>,
    poll_trigger: broadcast::Sender<()>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SyncScheduler {
    /// Creates a scheduler for the given orchestrator.
    pub fn new(orchestrator: Arc<SyncOrchestrator>) -> Self {
        let (submit_trigger, _) = broadcast::channel(16);
        let (poll_trigger, _) = broadcast::channel(16);
        Self {
            orchestrator,
            shutdown: Arc::new(AtomicBool::new(false)),
            submit_trigger,
            poll_trigger,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Starts both cycle timers. Calling `start` again while the
    /// scheduler is running is a logged no-op; no duplicate timers are
    /// created.
    pub fn start(&self) {
        let mut tasks = self.lock_tasks();
        if !tasks.is_empty() {
            log::warn!("Sync scheduler already started, ignoring duplicate start");
            return;
        }
        if !self.orchestrator.config().sync_enabled {
            log::info!("Sync is disabled, scheduler not started");
            return;
        }

        self.shutdown.store(false, Ordering::Release);
        let submit_interval = self.orchestrator.config().submit_interval();
        let poll_interval = self.orchestrator.config().poll_interval();

        tasks.push(self.spawn_loop(CycleKind::Submit, submit_interval));
        tasks.push(self.spawn_loop(CycleKind::Poll, poll_interval));
        log::info!(
            "Sync scheduler started (submit every {:?}, poll every {:?})",
            submit_interval,
            poll_interval
        );
    }

    /// Signals both loops to stop. In-flight cycles run to completion;
    /// only future ticks are cancelled.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Release);
        // Wake both loops so they notice the flag without waiting for
        // their next tick.
        let _ = self.submit_trigger.send(());
        let _ = self.poll_trigger.send(());
        self.orchestrator.set_next_sync_time(None);
        log::info!("Sync scheduler stopping");
    }

    /// Requests an immediate submit cycle on the scheduler's loop.
    pub fn trigger_submit(&self) {
        if self.submit_trigger.send(()).is_err() {
            log::debug!("Submit trigger ignored: scheduler loop not running");
        }
    }

    /// Requests an immediate poll cycle on the scheduler's loop.
    pub fn trigger_poll(&self) {
        if self.poll_trigger.send(()).is_err() {
            log::debug!("Poll trigger ignored: scheduler loop not running");
        }
    }

    /// Waits for the scheduler loops to finish after [`stop`].
    ///
    /// [`stop`]: SyncScheduler::stop
    pub async fn join(&self) {
        let tasks: Vec<JoinHandle<()>> = self.lock_tasks().drain(..).collect();
        for task in tasks {
            if let Err(e) = task.await {
                log::error!("Scheduler loop panicked: {}", e);
            }
        }
    }

    /// True while the scheduler loops are spawned.
    pub fn is_running(&self) -> bool {
        !self.lock_tasks().is_empty()
    }

    fn lock_tasks(&self) -> std::sync::MutexGuard<'_, Vec<JoinHandle<()>>> {
        match self.tasks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Scheduler task lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn spawn_loop(&self, kind: CycleKind, interval: Duration) -> JoinHandle<()> {
        let orchestrator = Arc::clone(&self.orchestrator);
        let shutdown = Arc::clone(&self.shutdown);
        let mut trigger_rx = match kind {
            CycleKind::Submit => self.submit_trigger.subscribe(),
            CycleKind::Poll => self.poll_trigger.subscribe(),
        };

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await; // skip immediate first tick

            if matches!(kind, CycleKind::Submit) {
                orchestrator.set_next_sync_time(next_tick_time(interval));
            }

            loop {
                if shutdown.load(Ordering::Acquire) {
                    break;
                }

                tokio::select! {
                    _ = ticker.tick() => {},
                    received = trigger_rx.recv() => {
                        match received {
                            Ok(()) => log::info!("Manual {} cycle triggered", kind.label()),
                            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                                log::debug!("{} trigger channel lagged by {}", kind.label(), skipped);
                            }
                            // Scheduler dropped; wind the loop down.
                            Err(broadcast::error::RecvError::Closed) => break,
                        }
                    }
                }

                if shutdown.load(Ordering::Acquire) {
                    break;
                }

                // Errors end the tick, never the timer.
                match kind {
                    CycleKind::Submit => {
                        if let Err(e) = orchestrator.run_submit_cycle().await {
                            log::error!("Submit cycle failed: {}", e);
                        }
                        orchestrator.set_next_sync_time(next_tick_time(interval));
                    }
                    CycleKind::Poll => {
                        if let Err(e) = orchestrator.run_poll_cycle().await {
                            log::error!("Poll cycle failed: {}", e);
                        }
                    }
                }
            }

            log::debug!("{} cycle loop stopped", kind.label());
        })
    }
}

fn next_tick_time(interval: Duration) -> Option<DateTime<Utc>> {
    chrono::Duration::from_std(interval)
        .ok()
        .map(|d| Utc::now() + d)
}
