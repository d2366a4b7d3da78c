//! Recurring import timer and single-flight run coordination.
//!
//! [`RunCoordinator`] owns the timer task and the run lock. Every batch,
//! scheduled or manual, goes through [`RunCoordinator::trigger_import`]'s
//! lock, so at most one `import_all` is ever in flight.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::ingest::{BatchSummary, ImportPipeline};

/// A batch was already executing when an import was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("an import batch is already running")]
pub struct AlreadyRunningError;

/// Point-in-time view of the coordinator. Reset on process restart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    /// The recurring timer is armed.
    pub is_running: bool,
    pub interval: Duration,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_run_summary: Option<BatchSummary>,
    pub total_runs_executed: u64,
    pub total_items_imported_lifetime: u64,
}

#[derive(Debug, Clone, Default)]
struct RunHistory {
    last_run_at: Option<DateTime<Utc>>,
    last_run_summary: Option<BatchSummary>,
    total_runs_executed: u64,
    total_items_imported_lifetime: u64,
}

struct Timer {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

struct Inner {
    pipeline: Arc<ImportPipeline>,
    interval: Duration,
    run_lock: tokio::sync::Mutex<()>,
    history: RwLock<RunHistory>,
    timer: Mutex<Option<Timer>>,
}

impl Inner {
    /// Runs one batch if none is executing. `None` means the lock was taken.
    async fn run_batch(&self) -> Option<BatchSummary> {
        let _guard = self.run_lock.try_lock().ok()?;

        let summary = self.pipeline.import_all().await;

        // Replace the whole history value so readers never see a partial update
        let mut next = self
            .history
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        next.last_run_at = Some(summary.finished_at);
        next.last_run_summary = Some(summary.clone());
        next.total_runs_executed += 1;
        next.total_items_imported_lifetime += summary.total_imported as u64;
        *self.history.write().unwrap_or_else(PoisonError::into_inner) = next;

        Some(summary)
    }
}

/// Single owner of the import timer, the run lock and run statistics.
///
/// Clones share the same state.
#[derive(Clone)]
pub struct RunCoordinator {
    inner: Arc<Inner>,
}

impl RunCoordinator {
    pub fn new(pipeline: Arc<ImportPipeline>, interval: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                pipeline,
                interval,
                run_lock: tokio::sync::Mutex::new(()),
                history: RwLock::new(RunHistory::default()),
                timer: Mutex::new(None),
            }),
        }
    }

    /// Arms the recurring timer. The first batch runs one interval from now.
    ///
    /// Does nothing if the timer is already armed. Must be called from
    /// within a Tokio runtime.
    pub fn start(&self) {
        let mut timer = self.inner.timer.lock().unwrap_or_else(PoisonError::into_inner);
        if timer.as_ref().is_some_and(|t| !t.task.is_finished()) {
            tracing::debug!("Scheduler already running");
            return;
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(run_timer(Arc::clone(&self.inner), stop_rx));
        *timer = Some(Timer { stop_tx, task });

        tracing::info!(
            interval_secs = self.inner.interval.as_secs(),
            "Scheduler started"
        );
    }

    /// Disarms the timer. A batch already executing runs to completion.
    pub fn stop(&self) {
        let timer = self
            .inner
            .timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(timer) = timer {
            // Receiver may already be gone if the task exited
            let _ = timer.stop_tx.send(true);
            tracing::info!("Scheduler stopped");
        }
    }

    /// Whether the recurring timer is armed, executing or not.
    pub fn is_scheduler_running(&self) -> bool {
        self.inner
            .timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|t| !t.task.is_finished())
    }

    /// Whether a batch is executing right now.
    pub fn is_import_running(&self) -> bool {
        self.inner.run_lock.try_lock().is_err()
    }

    pub fn get_stats(&self) -> SchedulerStats {
        let history = self
            .inner
            .history
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        SchedulerStats {
            is_running: self.is_scheduler_running(),
            interval: self.inner.interval,
            last_run_at: history.last_run_at,
            last_run_summary: history.last_run_summary,
            total_runs_executed: history.total_runs_executed,
            total_items_imported_lifetime: history.total_items_imported_lifetime,
        }
    }

    /// Runs a batch now.
    ///
    /// # Errors
    ///
    /// Returns [`AlreadyRunningError`] if a batch, scheduled or manual, is
    /// already executing.
    pub async fn trigger_import(&self) -> Result<BatchSummary, AlreadyRunningError> {
        tracing::info!("Manual import triggered");
        self.inner.run_batch().await.ok_or(AlreadyRunningError)
    }
}

async fn run_timer(inner: Arc<Inner>, mut stop_rx: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval_at(Instant::now() + inner.interval, inner.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            changed = stop_rx.changed() => {
                if changed.is_err() || *stop_rx.borrow() {
                    break;
                }
                continue;
            }
        }

        match inner.run_batch().await {
            Some(summary) => {
                let failed: Vec<&str> = summary
                    .failed_feeds()
                    .map(|r| r.feed_name.as_str())
                    .collect();
                tracing::info!(
                    imported = summary.total_imported,
                    successful_feeds = summary.successful_feeds,
                    total_feeds = summary.total_feeds,
                    failed = ?failed,
                    "Scheduled import finished"
                );
            }
            None => {
                tracing::info!("Import already running, skipping scheduled run");
            }
        }

        if *stop_rx.borrow() {
            break;
        }
    }

    tracing::debug!("Scheduler timer exited");
}
