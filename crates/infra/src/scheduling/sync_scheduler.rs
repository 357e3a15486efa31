//! Sync scheduler driving periodic reconciliation ticks.
//!
//! The first tick runs immediately on start, then one per interval. Ticks
//! are awaited inside the loop so they never overlap; a tick that overruns
//! its slot causes the missed slots to be skipped rather than queued.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use fluffer_infra::scheduling::{SyncScheduler, SyncSchedulerConfig};
//!
//! # async fn example(engine: Arc<fluffer_core::RsvpEngine>) -> Result<(), String> {
//! let mut scheduler = SyncScheduler::new(
//!     engine,
//!     SyncSchedulerConfig { interval: Duration::from_secs(60), ..Default::default() },
//! );
//!
//! scheduler.start().await.map_err(|e| e.to_string())?;
//! // ... application runs ...
//! scheduler.stop().await.map_err(|e| e.to_string())?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use fluffer_core::{RsvpEngine, TickSummary};
use fluffer_domain::Result;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::scheduling::error::{SchedulerError, SchedulerResult};

/// Something that can run one reconciliation pass.
#[async_trait]
pub trait TickRunner: Send + Sync {
    async fn run_tick(&self) -> Result<TickSummary>;
}

#[async_trait]
impl TickRunner for RsvpEngine {
    async fn run_tick(&self) -> Result<TickSummary> {
        RsvpEngine::run_tick(self).await
    }
}

/// Type alias for task handle to avoid complexity warnings
type TaskHandle = Arc<Mutex<Option<JoinHandle<()>>>>;

/// Configuration for sync scheduler
#[derive(Debug, Clone)]
pub struct SyncSchedulerConfig {
    /// Time between tick starts
    pub interval: Duration,
    /// Longest `stop` waits for an in-flight tick
    pub shutdown_timeout: Duration,
}

impl Default for SyncSchedulerConfig {
    fn default() -> Self {
        Self { interval: Duration::from_secs(60), shutdown_timeout: Duration::from_secs(30) }
    }
}

/// Sync scheduler for periodic reconciliation
pub struct SyncScheduler {
    runner: Arc<dyn TickRunner>,
    config: SyncSchedulerConfig,
    cancellation_token: CancellationToken,
    task_handle: TaskHandle,
}

impl SyncScheduler {
    pub fn new(runner: Arc<dyn TickRunner>, config: SyncSchedulerConfig) -> Self {
        Self {
            runner,
            config,
            cancellation_token: CancellationToken::new(),
            task_handle: Arc::new(Mutex::new(None)),
        }
    }

    /// Start the scheduler
    ///
    /// Spawns a background task that ticks immediately and then every
    /// `interval`.
    ///
    /// # Errors
    ///
    /// Returns error if scheduler is already running
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        info!(interval_secs = self.config.interval.as_secs(), "Starting sync scheduler");

        // Fresh token so the scheduler can be restarted after stop
        self.cancellation_token = CancellationToken::new();

        let runner = Arc::clone(&self.runner);
        let interval = self.config.interval;
        let cancel = self.cancellation_token.clone();

        let handle = tokio::spawn(async move {
            Self::sync_loop(runner, interval, cancel).await;
        });

        *self.task_handle.lock().await = Some(handle);

        info!("Sync scheduler started");
        Ok(())
    }

    /// Stop the scheduler gracefully
    ///
    /// Cancels the background task and awaits completion. An in-flight tick
    /// is allowed to finish within `shutdown_timeout`.
    ///
    /// # Errors
    ///
    /// Returns error if scheduler is not running
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        if !self.is_running() {
            return Err(SchedulerError::NotRunning);
        }

        info!("Stopping sync scheduler");

        self.cancellation_token.cancel();

        if let Some(handle) = self.task_handle.lock().await.take() {
            let join_timeout = self.config.shutdown_timeout;
            tokio::time::timeout(join_timeout, handle)
                .await
                .map_err(|source| SchedulerError::Timeout { duration: join_timeout, source })??;
        }

        info!("Sync scheduler stopped");
        Ok(())
    }

    /// Check if scheduler is running
    ///
    /// A scheduler is considered running if it has an active task handle that
    /// hasn't finished.
    pub fn is_running(&self) -> bool {
        self.task_handle
            .try_lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|h| !h.is_finished()))
            .unwrap_or(false)
    }

    async fn sync_loop(runner: Arc<dyn TickRunner>, interval: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Sync loop cancelled");
                    break;
                }
                _ = ticker.tick() => {
                    let started = Instant::now();
                    match runner.run_tick().await {
                        Ok(summary) if summary.skipped => {
                            debug!("Tick skipped, another tick in progress");
                        }
                        Ok(summary) => {
                            info!(
                                events_polled = summary.events_polled,
                                records_swept = summary.records_swept,
                                failures = summary.failures,
                                elapsed_ms = started.elapsed().as_millis() as u64,
                                "Tick completed"
                            );
                        }
                        Err(e) => {
                            error!(error = %e, "Tick failed");
                        }
                    }
                }
            }
        }
    }
}

/// Ensure scheduler is stopped when dropped
impl Drop for SyncScheduler {
    fn drop(&mut self) {
        if self.is_running() && !self.cancellation_token.is_cancelled() {
            warn!("SyncScheduler dropped while running; cancelling");
        }
        self.cancellation_token.cancel();
    }
}
