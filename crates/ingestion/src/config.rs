//! Worker settings and metrics

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use contracts::{AppScope, WorkerConfig};

use crate::collector::CycleReport;

/// Worker settings
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Scope enumerated each cycle
    pub app_scope: AppScope,

    /// Sleep between cycles
    pub interval: Duration,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            app_scope: AppScope::new("default"),
            interval: Duration::from_millis(1000),
        }
    }
}

impl WorkerSettings {
    pub fn new(app_scope: impl Into<AppScope>, interval: Duration) -> Self {
        Self {
            app_scope: app_scope.into(),
            interval,
        }
    }
}

impl From<&WorkerConfig> for WorkerSettings {
    fn from(config: &WorkerConfig) -> Self {
        Self {
            app_scope: config.scope(),
            interval: config.interval(),
        }
    }
}

/// Ingestion metrics
#[derive(Debug, Default)]
pub struct IngestionMetrics {
    /// Completed cycles
    pub cycles: AtomicU64,

    /// Bundles drained from sources
    pub bundles_drained: AtomicU64,

    /// Rows handed to the write primitive successfully
    pub rows_written: AtomicU64,

    /// Tables created by the provisioner
    pub tables_created: AtomicU64,

    /// Columns dropped for unrecognized type tags
    pub columns_skipped: AtomicU64,

    /// Sources that returned no buffer
    pub source_anomalies: AtomicU64,

    /// Schema, storage and task failures
    pub failures: AtomicU64,
}

impl IngestionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one cycle's report into the totals
    pub fn record_cycle(&self, report: &CycleReport) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
        self.bundles_drained
            .fetch_add(report.bundles_drained, Ordering::Relaxed);
        self.rows_written
            .fetch_add(report.rows_written, Ordering::Relaxed);
        self.tables_created
            .fetch_add(report.tables_created, Ordering::Relaxed);
        self.columns_skipped
            .fetch_add(report.columns_skipped, Ordering::Relaxed);
        self.source_anomalies
            .fetch_add(report.source_anomalies, Ordering::Relaxed);
        self.failures.fetch_add(report.failures, Ordering::Relaxed);
    }

    /// Record a failure outside a cycle report (e.g. a panicked cycle task)
    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            bundles_drained: self.bundles_drained.load(Ordering::Relaxed),
            rows_written: self.rows_written.load(Ordering::Relaxed),
            tables_created: self.tables_created.load(Ordering::Relaxed),
            columns_skipped: self.columns_skipped.load(Ordering::Relaxed),
            source_anomalies: self.source_anomalies.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub cycles: u64,
    pub bundles_drained: u64,
    pub rows_written: u64,
    pub tables_created: u64,
    pub columns_skipped: u64,
    pub source_anomalies: u64,
    pub failures: u64,
}
