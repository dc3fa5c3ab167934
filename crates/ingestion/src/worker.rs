//! IngestionWorker - periodic drain loop with cooperative cancellation
//!
//! ```text
//! Stopped --start()--> Running --stop()--> Stopped
//! ```
//!
//! The loop runs as a Tokio task. Each cycle body is blocking (storage I/O)
//! and executes on the blocking pool; the sleep between cycles races a
//! `CancellationToken`, so `stop()` ends the sleep at once instead of waiting
//! out the interval. A cycle already in flight is allowed to finish.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use contracts::{SourceRegistry, Storage};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::collector::Collector;
use crate::config::{IngestionMetrics, WorkerSettings};
use crate::error::IngestionError;

/// How an interruptible sleep ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepOutcome {
    /// Full interval elapsed
    Elapsed,
    /// Token was cancelled first
    Interrupted,
}

/// Sleep for `duration` unless `token` is cancelled first
pub async fn interruptible_sleep(token: &CancellationToken, duration: Duration) -> SleepOutcome {
    tokio::select! {
        biased;
        _ = token.cancelled() => SleepOutcome::Interrupted,
        _ = tokio::time::sleep(duration) => SleepOutcome::Elapsed,
    }
}

/// Requests loop exit from any thread
///
/// Bound to the run it was taken from; a restarted worker hands out a new one.
#[derive(Clone)]
pub struct StopHandle {
    running: Arc<AtomicBool>,
    token: CancellationToken,
}

impl StopHandle {
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
        self.token.cancel();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

struct ActiveRun {
    stop: StopHandle,
    task: JoinHandle<()>,
}

/// Background ingestion worker
pub struct IngestionWorker<R, S> {
    settings: WorkerSettings,
    collector: Arc<Collector<R, S>>,
    metrics: Arc<IngestionMetrics>,
    run: Option<ActiveRun>,
}

impl<R, S> IngestionWorker<R, S>
where
    R: SourceRegistry + 'static,
    S: Storage + 'static,
{
    pub fn new(settings: WorkerSettings, registry: Arc<R>, storage: Arc<S>) -> Self {
        let collector = Arc::new(Collector::new(
            settings.app_scope.clone(),
            registry,
            storage,
        ));

        Self {
            settings,
            collector,
            metrics: Arc::new(IngestionMetrics::new()),
            run: None,
        }
    }

    /// Start the loop on the current Tokio runtime.
    ///
    /// Returns `false` (and logs) when already running, when a stopped run has
    /// not finished its last cycle yet, or when called outside a runtime;
    /// never fails otherwise.
    pub fn start(&mut self) -> bool {
        self.start_with_token(CancellationToken::new())
    }

    /// Start the loop tied to an outer shutdown token.
    ///
    /// Cancelling `shutdown` ends the loop like `stop()`, but is logged as an
    /// unexpected interruption since the worker never asked for it.
    pub fn start_with_shutdown(&mut self, shutdown: &CancellationToken) -> bool {
        self.start_with_token(shutdown.child_token())
    }

    #[instrument(
        name = "ingestion_worker_start",
        skip(self, token),
        fields(scope = %self.settings.app_scope)
    )]
    fn start_with_token(&mut self, token: CancellationToken) -> bool {
        if self.is_running() {
            warn!("ingestion worker already running");
            return false;
        }
        // A stopped run may still be finishing its last cycle.
        if self.run.as_ref().is_some_and(|r| !r.task.is_finished()) {
            warn!("previous ingestion loop still finishing a cycle, join() before restarting");
            return false;
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                error!(error = %e, "ingestion worker needs a Tokio runtime");
                return false;
            }
        };

        let stop = StopHandle {
            running: Arc::new(AtomicBool::new(true)),
            token,
        };
        let task = runtime.spawn(run_loop(
            Arc::clone(&self.collector),
            Arc::clone(&self.metrics),
            stop.clone(),
            self.settings.interval,
        ));

        info!(
            interval_ms = self.settings.interval.as_millis() as u64,
            "ingestion worker started"
        );
        self.run = Some(ActiveRun { stop, task });
        true
    }
}

impl<R, S> IngestionWorker<R, S> {
    /// Ask the loop to exit; returns immediately
    #[instrument(name = "ingestion_worker_stop", skip(self))]
    pub fn stop(&self) {
        if let Some(run) = &self.run {
            debug!("stop requested");
            run.stop.stop();
        }
    }

    /// Wait for the loop task to finish
    pub async fn join(&mut self) {
        if let Some(run) = self.run.take() {
            if let Err(e) = run.task.await {
                error!(error = ?e, "ingestion worker task panicked");
            }
        }
    }

    /// Stop and wait
    pub async fn shutdown(mut self) {
        self.stop();
        self.join().await;
    }

    pub fn is_running(&self) -> bool {
        self.run.as_ref().is_some_and(|r| r.stop.is_running())
    }

    /// Stop handle for the current run, if started
    pub fn stop_handle(&self) -> Option<StopHandle> {
        self.run.as_ref().map(|r| r.stop.clone())
    }

    pub fn metrics(&self) -> Arc<IngestionMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn settings(&self) -> &WorkerSettings {
        &self.settings
    }
}

impl<R, S> Drop for IngestionWorker<R, S> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[instrument(name = "ingestion_worker_loop", skip_all, fields(scope = %collector.scope()))]
async fn run_loop<R, S>(
    collector: Arc<Collector<R, S>>,
    metrics: Arc<IngestionMetrics>,
    stop: StopHandle,
    interval: Duration,
) where
    R: SourceRegistry + 'static,
    S: Storage + 'static,
{
    debug!("ingestion loop entered");

    while stop.running.load(Ordering::Acquire) {
        let cycle = Arc::clone(&collector);
        match tokio::task::spawn_blocking(move || cycle.run_cycle()).await {
            Ok(report) => metrics.record_cycle(&report),
            Err(e) => {
                let err = IngestionError::CycleTask {
                    message: e.to_string(),
                };
                metrics.record_failure();
                observability::record_failure(err.kind());
                error!(error = %err, "ingestion cycle aborted");
            }
        }

        if interruptible_sleep(&stop.token, interval).await == SleepOutcome::Interrupted
            && stop.running.load(Ordering::Acquire)
        {
            // The token cannot be re-armed, so an outside cancellation ends the run.
            warn!("ingestion worker interrupted while running, stopping");
            stop.running.store(false, Ordering::Release);
        }
    }

    info!("ingestion worker stopped");
}
