//! Pipeline orchestrator - wires storage, simulated sensors and workers.
//!
//! One ingestion worker is started per distinct app scope; every worker shares
//! the same registry and storage engine.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use contracts::{AppScope, IngestBlueprint, Storage, StorageBackend, TableDefinition};
use ingestion::{IngestionWorker, MetricsSnapshot, MockSensor, SensorRegistry, WorkerSettings};
use observability::RunningStats;
use storage::{MemoryStorage, SqliteStorage};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{PipelineStats, TableStats};
use crate::error::CliError;

/// Interval between progress log lines
const PROGRESS_INTERVAL: Duration = Duration::from_secs(5);

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// The ingestion blueprint
    pub blueprint: IngestBlueprint,

    /// Run duration (None = until shutdown)
    pub duration: Option<Duration>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// A simulated sensor and the table it feeds
struct SimulatedSensor {
    sensor: Arc<MockSensor>,
    scope: AppScope,
    definition: TableDefinition,
    frequency_hz: f64,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run until `shutdown` fires or the configured duration elapses
    pub async fn run(self, shutdown: CancellationToken) -> Result<PipelineStats> {
        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let storage_config = &self.config.blueprint.storage;
        match storage_config.backend {
            StorageBackend::Sqlite => {
                info!(data_dir = %storage_config.data_dir.display(), "Using SQLite storage");
                let storage = Arc::new(SqliteStorage::new(&storage_config.data_dir));
                let mut stats = self.run_with_storage(storage.clone(), shutdown).await?;
                stats.collect_table_counts(|scope, table| storage.count_rows(scope, table).ok());
                Ok(stats)
            }
            StorageBackend::Memory => {
                info!("Using in-memory storage (rows are discarded on exit)");
                let storage = Arc::new(MemoryStorage::new());
                let mut stats = self.run_with_storage(storage.clone(), shutdown).await?;
                stats.collect_table_counts(|scope, table| {
                    storage
                        .has_table(scope, table)
                        .then(|| storage.rows(scope, table).len() as u64)
                });
                Ok(stats)
            }
        }
    }

    async fn run_with_storage<S>(
        &self,
        storage: Arc<S>,
        shutdown: CancellationToken,
    ) -> Result<PipelineStats>
    where
        S: Storage + 'static,
    {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;

        let registry = Arc::new(SensorRegistry::new());
        let sensors = self.register_sensors(&registry)?;
        let scopes: BTreeSet<AppScope> = std::iter::once(blueprint.worker.scope())
            .chain(sensors.iter().map(|s| s.scope.clone()))
            .collect();

        // Start workers
        let mut workers = Vec::with_capacity(scopes.len());
        for scope in &scopes {
            let settings = WorkerSettings::new(scope.clone(), blueprint.worker.interval());
            let mut worker = IngestionWorker::new(settings, registry.clone(), storage.clone());
            if !worker.start() {
                return Err(CliError::worker_start(scope.as_str()).into());
            }
            workers.push(worker);
        }
        info!(
            workers = workers.len(),
            storage = storage.name(),
            interval_ms = blueprint.worker.interval_ms,
            "Ingestion workers started"
        );

        // Start simulated sensors
        for sim in &sensors {
            sim.sensor.start(sim.definition.clone(), sim.frequency_hz);
        }
        info!(sensors = sensors.len(), "Simulated sensors started");

        let mut stats = PipelineStats {
            active_sensors: sensors.len(),
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
            tables: sensors
                .iter()
                .map(|s| TableStats::new(s.scope.as_str(), &s.definition.table_name))
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect(),
            ..Default::default()
        };

        self.wait_for_exit(&workers, &shutdown, &mut stats.rows_per_sec)
            .await;

        // Shutdown: stop producers first, then let each worker finish its cycle
        info!("Shutting down ingestion...");
        for sim in &sensors {
            sim.sensor.stop();
        }
        for worker in &workers {
            worker.stop();
        }
        for worker in &mut workers {
            worker.join().await;
        }

        stats.worker_metrics = workers
            .iter()
            .map(|w| w.metrics().snapshot())
            .fold(MetricsSnapshot::default(), sum_snapshots);
        stats.readings_produced = sensors.iter().map(|s| s.sensor.frames_produced()).sum();
        stats.readings_pending = sensors.iter().map(|s| s.sensor.pending_len() as u64).sum();
        stats.duration = start_time.elapsed();

        info!(
            duration_secs = stats.duration.as_secs_f64(),
            rows_written = stats.worker_metrics.rows_written,
            "Ingestion shutdown complete"
        );

        Ok(stats)
    }

    /// Build one mock sensor per configured sensor and register it
    fn register_sensors(&self, registry: &SensorRegistry) -> Result<Vec<SimulatedSensor>> {
        let blueprint = &self.config.blueprint;
        let mut sensors = Vec::with_capacity(blueprint.sensors.len());

        for sensor_config in &blueprint.sensors {
            let driver = blueprint
                .driver(&sensor_config.driver)
                .ok_or_else(|| CliError::unknown_driver(&sensor_config.id, &sensor_config.driver))?;
            let definition = TableDefinition::from_document(&driver.table_definition)
                .with_context(|| format!("Driver '{}' has an invalid table definition", driver.name))?;

            let scope = blueprint.sensor_scope(sensor_config);
            let sensor = Arc::new(MockSensor::new(sensor_config.id.as_str(), scope.clone()));
            registry.register(sensor.clone(), Some(driver.table_definition.clone()));

            debug!(
                sensor_id = %sensor_config.id,
                driver = %driver.name,
                table = %definition.table_name,
                %scope,
                "Sensor registered"
            );

            sensors.push(SimulatedSensor {
                sensor,
                scope,
                definition,
                frequency_hz: sensor_config.frequency_hz,
            });
        }

        Ok(sensors)
    }

    /// Block until shutdown or the run duration, logging progress meanwhile
    async fn wait_for_exit<S>(
        &self,
        workers: &[IngestionWorker<SensorRegistry, S>],
        shutdown: &CancellationToken,
        rows_per_sec: &mut RunningStats,
    ) {
        let deadline = async {
            match self.config.duration {
                Some(duration) => tokio::time::sleep(duration).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(deadline);

        let mut progress = tokio::time::interval(PROGRESS_INTERVAL);
        progress.tick().await;
        let mut last_rows = 0u64;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    warn!("Received shutdown signal");
                    break;
                }
                _ = &mut deadline => {
                    info!("Run duration reached");
                    break;
                }
                _ = progress.tick() => {
                    let snapshot = workers
                        .iter()
                        .map(|w| w.metrics().snapshot())
                        .fold(MetricsSnapshot::default(), sum_snapshots);
                    let delta = snapshot.rows_written - last_rows;
                    last_rows = snapshot.rows_written;
                    rows_per_sec.push(delta as f64 / PROGRESS_INTERVAL.as_secs_f64());

                    info!(
                        cycles = snapshot.cycles,
                        rows_written = snapshot.rows_written,
                        tables_created = snapshot.tables_created,
                        failures = snapshot.failures,
                        "Ingestion progress"
                    );
                }
            }
        }
    }
}

fn sum_snapshots(mut acc: MetricsSnapshot, s: MetricsSnapshot) -> MetricsSnapshot {
    acc.cycles += s.cycles;
    acc.bundles_drained += s.bundles_drained;
    acc.rows_written += s.rows_written;
    acc.tables_created += s.tables_created;
    acc.columns_skipped += s.columns_skipped;
    acc.source_anomalies += s.source_anomalies;
    acc.failures += s.failures;
    acc
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
[worker]
interval_ms = 20

[storage]
backend = "memory"

[[drivers]]
name = "thermo"
table_definition = '{"table":{"name":"weather","columns":[{"name":"sensor_id","type":"string"},{"name":"temp","type":"number"}]}}'

[[sensors]]
id = "t1"
driver = "thermo"
frequency_hz = 50.0

[[sensors]]
id = "t2"
driver = "thermo"
frequency_hz = 50.0
app_scope = "lab"
"#;

    fn config(duration: Duration) -> PipelineConfig {
        PipelineConfig {
            blueprint: config_loader::ConfigLoader::load_from_str(
                CONFIG,
                config_loader::ConfigFormat::Toml,
            )
            .unwrap(),
            duration: Some(duration),
            metrics_port: None,
        }
    }

    #[tokio::test]
    async fn test_memory_run_writes_rows_per_scope() {
        let stats = Pipeline::new(config(Duration::from_millis(300)))
            .run(CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(stats.active_sensors, 2);
        assert_eq!(stats.scopes, vec!["default".to_string(), "lab".to_string()]);
        assert!(stats.worker_metrics.rows_written > 0);
        assert_eq!(stats.worker_metrics.failures, 0);
        assert_eq!(stats.tables.len(), 2);
        assert!(stats.tables.iter().all(|t| t.rows.is_some()));
    }

    #[tokio::test]
    async fn test_sqlite_run_and_shutdown_signal() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(Duration::from_secs(60));
        config.blueprint.storage.backend = StorageBackend::Sqlite;
        config.blueprint.storage.data_dir = dir.path().to_path_buf();

        let shutdown = CancellationToken::new();
        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            trigger.cancel();
        });

        let stats = Pipeline::new(config).run(shutdown).await.unwrap();

        assert!(stats.duration < Duration::from_secs(10));
        assert!(dir.path().join("default.sqlite").exists());
        assert!(dir.path().join("lab.sqlite").exists());
        let written: u64 = stats.tables.iter().filter_map(|t| t.rows).sum();
        assert_eq!(written, stats.worker_metrics.rows_written);
    }
}
