//! One ingestion cycle: drain every active source and persist its readings
//!
//! Failures stay inside the cycle. A bad table definition skips that source
//! until the next cycle; a storage failure skips that bundle. Nothing here
//! returns an error to the scheduler.

use std::sync::Arc;
use std::time::Instant;

use contracts::{
    AppScope, AttributeBundle, SensorSource, SourceRegistry, Storage, StorageHandle,
    TableDefinition,
};
use tracing::{debug, error, instrument, trace, warn};

use crate::error::{IngestionError, Result};
use crate::provisioner::{ensure_table, Provisioned};
use crate::translator::translate;

/// Counts for a single cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub sources_seen: u64,
    pub bundles_drained: u64,
    pub rows_written: u64,
    pub tables_created: u64,
    pub columns_skipped: u64,
    pub source_anomalies: u64,
    pub failures: u64,
}

/// What happened to one bundle
#[derive(Debug, Clone, Copy)]
struct BundleOutcome {
    provisioned: Provisioned,
    written: bool,
}

/// Runs cycles against a registry and a storage engine
pub struct Collector<R, S> {
    scope: AppScope,
    registry: Arc<R>,
    storage: Arc<S>,
}

impl<R, S> Collector<R, S>
where
    R: SourceRegistry,
    S: Storage,
{
    pub fn new(scope: AppScope, registry: Arc<R>, storage: Arc<S>) -> Self {
        Self {
            scope,
            registry,
            storage,
        }
    }

    pub fn scope(&self) -> &AppScope {
        &self.scope
    }

    /// Drain and persist every active source once, sequentially
    #[instrument(name = "ingestion_cycle", skip(self), fields(scope = %self.scope))]
    pub fn run_cycle(&self) -> CycleReport {
        let started = Instant::now();
        let sources = self.registry.active_sources(&self.scope);
        let mut report = CycleReport {
            sources_seen: sources.len() as u64,
            ..Default::default()
        };

        for source in &sources {
            if let Err(e) = self.collect_source(source.as_ref(), &mut report) {
                Self::record_failure(&e, &mut report);
            }
        }

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        observability::record_cycle(sources.len(), elapsed_ms);
        if report.bundles_drained > 0 {
            debug!(
                sources = report.sources_seen,
                bundles = report.bundles_drained,
                rows = report.rows_written,
                failures = report.failures,
                elapsed_ms,
                "cycle complete"
            );
        }

        report
    }

    fn collect_source(&self, source: &dyn SensorSource, report: &mut CycleReport) -> Result<()> {
        let sensor_id = source.sensor_id();

        let Some(bundles) = source.drain_pending() else {
            warn!(%sensor_id, "sensor returned no bundle list, nothing to ingest");
            report.source_anomalies += 1;
            observability::record_source_anomaly(sensor_id);
            return Ok(());
        };

        if bundles.is_empty() {
            trace!(%sensor_id, "no pending readings");
            return Ok(());
        }
        report.bundles_drained += bundles.len() as u64;

        let Some(document) = self.registry.table_definition_document(sensor_id) else {
            debug!(
                %sensor_id,
                discarded = bundles.len(),
                "sensor driver declares no table definition"
            );
            return Ok(());
        };

        let definition = TableDefinition::from_document(&document)
            .map_err(|e| IngestionError::schema_parse(sensor_id, e))?;
        let unknown_columns = definition.unknown_columns().count() as u64;

        for bundle in &bundles {
            report.columns_skipped += unknown_columns;
            match self.store_bundle(source, &definition, bundle) {
                Ok(outcome) => {
                    if outcome.provisioned == Provisioned::Created {
                        report.tables_created += 1;
                        observability::record_table_created(&definition.table_name);
                    }
                    if outcome.written {
                        report.rows_written += 1;
                        observability::record_row_written(&definition.table_name);
                    }
                }
                Err(e) => Self::record_failure(&e, report),
            }
        }

        Ok(())
    }

    /// Acquire a handle, provision, translate, write, release
    fn store_bundle(
        &self,
        source: &dyn SensorSource,
        definition: &TableDefinition,
        bundle: &AttributeBundle,
    ) -> Result<BundleOutcome> {
        let sensor_id = source.sensor_id();
        let mut handle = self
            .storage
            .acquire(source.app_scope())
            .map_err(|e| IngestionError::storage(sensor_id, e))?;

        let outcome = Self::write_bundle(&mut handle, source, definition, bundle);

        if let Err(e) = handle.close() {
            warn!(
                %sensor_id,
                storage = self.storage.name(),
                error = %e,
                "failed to release storage handle"
            );
        }

        outcome
    }

    fn write_bundle(
        handle: &mut S::Handle,
        source: &dyn SensorSource,
        definition: &TableDefinition,
        bundle: &AttributeBundle,
    ) -> Result<BundleOutcome> {
        let sensor_id = source.sensor_id();
        let provisioned = ensure_table(handle, definition, sensor_id, source.app_scope())
            .map_err(|e| IngestionError::storage(sensor_id, e))?;

        let row = translate(definition, bundle, sensor_id);
        if row.is_empty() {
            debug!(%sensor_id, table = %definition.table_name, "translated row is empty, not written");
            return Ok(BundleOutcome {
                provisioned,
                written: false,
            });
        }

        handle
            .write_row(&definition.table_name, &row)
            .map_err(|e| IngestionError::storage(sensor_id, e))?;
        debug!(%sensor_id, table = %definition.table_name, values = %row, "wrote sensor row");

        Ok(BundleOutcome {
            provisioned,
            written: true,
        })
    }

    fn record_failure(e: &IngestionError, report: &mut CycleReport) {
        report.failures += 1;
        observability::record_failure(e.kind());
        match e {
            IngestionError::SchemaParse { .. } => {
                warn!(error = %e, "skipping sensor for this cycle");
            }
            _ => {
                error!(error = %e, "failed to persist sensor reading");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockSensor;
    use crate::registry::SensorRegistry;
    use contracts::ColumnValue;
    use storage::MemoryStorage;

    const T1: &str = r#"{"table":{"name":"t1","columns":[{"name":"sensor_id","type":"string"},{"name":"val","type":"integer"}]}}"#;

    type TestCollector = Collector<SensorRegistry, MemoryStorage>;

    fn setup() -> (Arc<SensorRegistry>, Arc<MemoryStorage>, TestCollector) {
        let registry = Arc::new(SensorRegistry::new());
        let storage = Arc::new(MemoryStorage::new());
        let collector = Collector::new("default".into(), registry.clone(), storage.clone());
        (registry, storage, collector)
    }

    fn sensor(id: &str) -> Arc<MockSensor> {
        Arc::new(MockSensor::new(id, "default"))
    }

    #[test]
    fn test_scenario_row_written_after_provisioning() {
        let (registry, storage, collector) = setup();
        let s1 = sensor("s1");
        s1.push(AttributeBundle::new().with("val", 42i64));
        registry.register(s1, Some(T1.to_string()));

        let report = collector.run_cycle();

        assert_eq!(report.rows_written, 1);
        assert_eq!(report.tables_created, 1);
        let rows = storage.rows(&"default".into(), "t1");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("sensor_id"), Some(&ColumnValue::Text("s1".into())));
        assert_eq!(rows[0].get("val"), Some(&ColumnValue::Integer(42)));
    }

    #[test]
    fn test_empty_bundle_still_written_with_default() {
        let (registry, storage, collector) = setup();
        let s1 = sensor("s1");
        s1.push(AttributeBundle::new());
        registry.register(s1, Some(T1.to_string()));

        collector.run_cycle();

        let rows = storage.rows(&"default".into(), "t1");
        assert_eq!(rows[0].to_string(), "sensor_id=s1 val=0");
    }

    #[test]
    fn test_no_pending_means_no_storage_calls() {
        let (registry, storage, collector) = setup();
        registry.register(sensor("s1"), Some(T1.to_string()));

        let report = collector.run_cycle();

        assert_eq!(report.sources_seen, 1);
        assert_eq!(report.bundles_drained, 0);
        let stats = storage.stats();
        assert_eq!(stats.acquisitions, 0);
        assert_eq!(stats.existence_checks, 0);
        assert_eq!(stats.rows_written, 0);
    }

    #[test]
    fn test_missing_buffer_is_anomaly_not_failure() {
        let (registry, storage, collector) = setup();
        let s1 = sensor("s1");
        s1.simulate_missing_buffer(true);
        registry.register(s1, Some(T1.to_string()));

        let report = collector.run_cycle();

        assert_eq!(report.source_anomalies, 1);
        assert_eq!(report.failures, 0);
        assert_eq!(storage.stats().acquisitions, 0);
    }

    #[test]
    fn test_malformed_schema_skips_only_that_source() {
        let (registry, storage, collector) = setup();
        let bad = sensor("bad");
        bad.push(AttributeBundle::new().with("val", 1i64));
        registry.register(bad, Some("{not json".to_string()));
        let good = sensor("good");
        good.push(AttributeBundle::new().with("val", 2i64));
        registry.register(good, Some(T1.to_string()));

        let report = collector.run_cycle();

        assert_eq!(report.failures, 1);
        assert_eq!(report.rows_written, 1);
        let rows = storage.rows(&"default".into(), "t1");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("sensor_id"), Some(&ColumnValue::Text("good".into())));
    }

    #[test]
    fn test_no_table_definition_skips_source() {
        let (registry, storage, collector) = setup();
        let s1 = sensor("s1");
        s1.push(AttributeBundle::new().with("val", 1i64));
        registry.register(s1.clone(), None);

        let report = collector.run_cycle();

        assert_eq!(report.failures, 0);
        assert_eq!(storage.stats().acquisitions, 0);
        assert_eq!(s1.pending_len(), 0);
    }

    #[test]
    fn test_write_failure_does_not_stop_other_bundles() {
        let (registry, storage, collector) = setup();
        let s1 = sensor("s1");
        s1.push(AttributeBundle::new().with("val", 1i64));
        s1.push(AttributeBundle::new().with("val", 2i64));
        registry.register(s1, Some(T1.to_string()));
        storage.fail_writes(true);

        let report = collector.run_cycle();

        assert_eq!(report.failures, 2);
        assert_eq!(report.rows_written, 0);
        // every handle released even when the write failed
        assert_eq!(storage.stats().acquisitions, 2);
        assert_eq!(storage.stats().releases, 2);
    }

    #[test]
    fn test_existence_checked_per_bundle() {
        let (registry, storage, collector) = setup();
        let s1 = sensor("s1");
        for v in 0..3i64 {
            s1.push(AttributeBundle::new().with("val", v));
        }
        registry.register(s1, Some(T1.to_string()));

        let report = collector.run_cycle();

        assert_eq!(report.rows_written, 3);
        assert_eq!(report.tables_created, 1);
        assert_eq!(storage.stats().existence_checks, 3);
        assert_eq!(storage.stats().tables_created, 1);
    }

    #[test]
    fn test_unknown_columns_counted_per_bundle() {
        let (registry, _storage, collector) = setup();
        let s1 = sensor("s1");
        s1.push(AttributeBundle::new());
        s1.push(AttributeBundle::new());
        registry.register(
            s1,
            Some(
                r#"{"table":{"name":"t2","columns":[{"name":"sensor_id","type":"string"},{"name":"x","type":"unknown_type"}]}}"#
                    .to_string(),
            ),
        );

        let report = collector.run_cycle();

        assert_eq!(report.columns_skipped, 2);
        assert_eq!(report.rows_written, 2);
    }

    #[test]
    fn test_other_scope_not_enumerated() {
        let (registry, storage, collector) = setup();
        let other = Arc::new(MockSensor::new("elsewhere", "other"));
        other.push(AttributeBundle::new().with("val", 1i64));
        registry.register(other.clone(), Some(T1.to_string()));

        let report = collector.run_cycle();

        assert_eq!(report.sources_seen, 0);
        assert_eq!(other.pending_len(), 1);
        assert_eq!(storage.stats().acquisitions, 0);
    }
}
