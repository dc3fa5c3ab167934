//! Pipeline statistics.

use std::time::Duration;

use contracts::AppScope;
use ingestion::MetricsSnapshot;
use observability::{RunningStats, StatsSummary};

/// Row count of one destination table at the end of a run
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct TableStats {
    pub scope: String,
    pub table: String,
    /// None when the table was never created
    pub rows: Option<u64>,
}

impl TableStats {
    pub fn new(scope: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            table: table.into(),
            rows: None,
        }
    }
}

/// Statistics from a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Total duration of the run
    pub duration: Duration,

    /// Sensors simulated during the run
    pub active_sensors: usize,

    /// Scopes that had a worker
    pub scopes: Vec<String>,

    /// Readings produced by the simulated sensors
    pub readings_produced: u64,

    /// Readings still buffered at shutdown
    pub readings_pending: u64,

    /// Worker counters summed over every scope
    pub worker_metrics: MetricsSnapshot,

    /// Throughput samples taken by the progress ticker
    pub rows_per_sec: RunningStats,

    /// Destination tables
    pub tables: Vec<TableStats>,
}

impl PipelineStats {
    /// Rows written per second over the whole run
    pub fn throughput(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.worker_metrics.rows_written as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Fill in table row counts from the storage backend
    pub fn collect_table_counts<F>(&mut self, count: F)
    where
        F: Fn(&AppScope, &str) -> Option<u64>,
    {
        for table in &mut self.tables {
            table.rows = count(&AppScope::from(table.scope.as_str()), &table.table);
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        let m = &self.worker_metrics;

        println!("\n=== Ingestion Statistics ===\n");
        println!("Overview");
        println!("  Duration: {:.2}s", self.duration.as_secs_f64());
        println!("  Scopes: {}", self.scopes.join(", "));
        println!("  Active sensors: {}", self.active_sensors);
        println!("  Readings produced: {}", self.readings_produced);
        println!("  Readings left in buffers: {}", self.readings_pending);

        println!("\nWorker");
        println!("  Cycles: {}", m.cycles);
        println!("  Bundles drained: {}", m.bundles_drained);
        println!("  Rows written: {} ({:.2}/s)", m.rows_written, self.throughput());
        println!("  Tables created: {}", m.tables_created);
        println!("  Columns skipped: {}", m.columns_skipped);
        println!("  Source anomalies: {}", m.source_anomalies);
        println!("  Failures: {}", m.failures);
        println!("  Rows/s samples: {}", StatsSummary::from(&self.rows_per_sec));

        if !self.tables.is_empty() {
            println!("\nTables");
            for t in &self.tables {
                match t.rows {
                    Some(rows) => println!("  {}/{}: {} rows", t.scope, t.table, rows),
                    None => println!("  {}/{}: not created", t.scope, t.table),
                }
            }
        }

        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throughput() {
        let stats = PipelineStats {
            duration: Duration::from_secs(4),
            worker_metrics: MetricsSnapshot {
                rows_written: 10,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!((stats.throughput() - 2.5).abs() < 1e-9);
        assert_eq!(PipelineStats::default().throughput(), 0.0);
    }

    #[test]
    fn test_collect_table_counts() {
        let mut stats = PipelineStats {
            tables: vec![TableStats::new("default", "weather"), TableStats::new("lab", "gps")],
            ..Default::default()
        };
        stats.collect_table_counts(|scope, table| {
            (scope == "default" && table == "weather").then_some(7)
        });

        assert_eq!(stats.tables[0].rows, Some(7));
        assert_eq!(stats.tables[1].rows, None);
    }
}
