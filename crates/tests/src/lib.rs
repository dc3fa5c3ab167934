//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试
//! - 模拟 e2e 测试（Memory / SQLite 存储）
//! - 停止延迟与故障隔离

#[cfg(test)]
mod contract_tests {
    use contracts::{TableDefinition, TypeTag, SENSOR_ID_COLUMN};

    #[test]
    fn test_contracts_compile() {
        let _ = contracts::ConfigVersion::V1;
        assert_eq!(SENSOR_ID_COLUMN, "sensor_id");
    }

    #[test]
    fn test_table_document_snapshot() {
        let doc = r#"{"table":{"name":"weather","columns":[{"name":"sensor_id","type":"string"},{"name":"temp","type":"number"}]}}"#;
        let def = TableDefinition::from_document(doc).unwrap();
        let reparsed = TableDefinition::from_document(&def.to_document().unwrap()).unwrap();

        assert_eq!(reparsed.table_name, "weather");
        assert_eq!(reparsed.columns[1].type_tag(), Some(TypeTag::Number));
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use contracts::{
        AppScope, AttributeBundle, SensorId, SensorSource, SourceRegistry, Storage,
        StorageHandle,
    };
    use ingestion::{IngestionWorker, MockSensor, SensorRegistry, WorkerSettings};
    use storage::{MemoryStorage, SqliteStorage};
    use tokio_util::sync::CancellationToken;

    const MIXED: &str = r#"{"table":{"name":"mixed","columns":[
        {"name":"sensor_id","type":"string"},
        {"name":"label","type":"string"},
        {"name":"ok","type":"boolean"},
        {"name":"count","type":"integer"},
        {"name":"lat","type":"GeoPoint"},
        {"name":"raw","type":"blob"}
    ]}}"#;

    const T1: &str = r#"{"table":{"name":"t1","columns":[{"name":"sensor_id","type":"string"},{"name":"val","type":"integer"}]}}"#;

    fn settings(scope: &str, interval: Duration) -> WorkerSettings {
        WorkerSettings::new(scope, interval)
    }

    /// Wait until `check` holds or the timeout expires
    async fn eventually(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if check() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        check()
    }

    /// End-to-end: MockSensor -> IngestionWorker -> SqliteStorage
    ///
    /// 验证：
    /// 1. 首次写入前自动建表
    /// 2. 各类型列按类型写入
    /// 3. 未识别类型的列被跳过
    #[tokio::test]
    async fn test_e2e_sqlite_typed_columns() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(SqliteStorage::new(dir.path()));
        let registry = Arc::new(SensorRegistry::new());

        let sensor = Arc::new(MockSensor::new("probe-1", "default"));
        sensor.push(
            AttributeBundle::new()
                .with("label", "north")
                .with("ok", "true")
                .with("count", 7i64)
                .with("lat", 47.25)
                .with("raw", "ignored"),
        );
        registry.register(sensor.clone(), Some(MIXED.to_string()));

        let mut worker = IngestionWorker::new(
            settings("default", Duration::from_millis(20)),
            registry,
            storage.clone(),
        );
        assert!(worker.start());
        let scope = AppScope::new("default");
        assert!(
            eventually(Duration::from_secs(5), || {
                storage.count_rows(&scope, "mixed").unwrap_or(0) == 1
            })
            .await
        );
        worker.shutdown().await;

        let conn = rusqlite::Connection::open(storage.database_path(&scope)).unwrap();
        let (id, label, ok, count, lat, raw): (String, String, i64, i64, f64, Option<String>) =
            conn.query_row(
                r#"SELECT "sensor_id", "label", "ok", "count", "lat", "raw" FROM "mixed""#,
                [],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?, r.get(5)?)),
            )
            .unwrap();

        assert_eq!(id, "probe-1");
        assert_eq!(label, "north");
        assert_eq!(ok, 1);
        assert_eq!(count, 7);
        assert!((lat - 47.25).abs() < 1e-9);
        assert_eq!(raw, None);
    }

    /// Stop during a long sleep returns well before the interval
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stop_latency_with_long_interval() {
        let storage = Arc::new(MemoryStorage::new());
        let registry = Arc::new(SensorRegistry::new());
        let mut worker = IngestionWorker::new(
            settings("default", Duration::from_secs(10)),
            registry,
            storage,
        );

        assert!(worker.start());
        tokio::time::sleep(Duration::from_millis(100)).await;

        let started = Instant::now();
        worker.stop();
        worker.join().await;

        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(!worker.is_running());
    }

    /// A restarted worker keeps writing into the already provisioned table
    #[tokio::test]
    async fn test_restart_reuses_table() {
        let storage = Arc::new(MemoryStorage::new());
        let registry = Arc::new(SensorRegistry::new());
        let sensor = Arc::new(MockSensor::new("s1", "default"));
        registry.register(sensor.clone(), Some(T1.to_string()));
        let mut worker = IngestionWorker::new(
            settings("default", Duration::from_millis(10)),
            registry,
            storage.clone(),
        );
        let scope = AppScope::new("default");

        for round in 1..=2 {
            assert!(worker.start());
            sensor.push(AttributeBundle::new().with("val", round as i64));
            assert!(
                eventually(Duration::from_secs(5), || storage.rows(&scope, "t1").len() == round)
                    .await
            );
            worker.stop();
            worker.join().await;
        }

        assert_eq!(storage.stats().tables_created, 1);
        let rows = storage.rows(&scope, "t1");
        assert_eq!(rows[1].to_string(), "sensor_id=s1 val=2");
    }

    /// Workers on different scopes never see each other's sources
    #[tokio::test]
    async fn test_scopes_are_isolated() {
        let storage = Arc::new(MemoryStorage::new());
        let registry = Arc::new(SensorRegistry::new());
        let a = Arc::new(MockSensor::new("a", "alpha"));
        let b = Arc::new(MockSensor::new("b", "beta"));
        registry.register(a.clone(), Some(T1.to_string()));
        registry.register(b.clone(), Some(T1.to_string()));
        a.push(AttributeBundle::new().with("val", 1i64));
        b.push(AttributeBundle::new().with("val", 2i64));

        let mut worker = IngestionWorker::new(
            settings("alpha", Duration::from_millis(10)),
            registry,
            storage.clone(),
        );
        assert!(worker.start());
        assert!(
            eventually(Duration::from_secs(5), || storage.total_rows() == 1).await
        );
        worker.shutdown().await;

        assert_eq!(storage.rows(&"alpha".into(), "t1").len(), 1);
        assert!(!storage.has_table(&"beta".into(), "t1"));
        assert_eq!(b.pending_len(), 1);
    }

    /// A source that never has a buffer, implemented outside the ingestion crate
    struct BrokenSource {
        id: SensorId,
        scope: AppScope,
    }

    impl SensorSource for BrokenSource {
        fn sensor_id(&self) -> &SensorId {
            &self.id
        }

        fn app_scope(&self) -> &AppScope {
            &self.scope
        }

        fn drain_pending(&self) -> Option<Vec<AttributeBundle>> {
            None
        }
    }

    /// Anomalous and malformed sources do not stop healthy ones
    #[tokio::test]
    async fn test_fault_isolation_across_sources() {
        let storage = Arc::new(MemoryStorage::new());
        let registry = Arc::new(SensorRegistry::new());

        registry.register(
            Arc::new(BrokenSource {
                id: "broken".into(),
                scope: "default".into(),
            }),
            Some(T1.to_string()),
        );
        let malformed = Arc::new(MockSensor::new("malformed", "default"));
        malformed.push(AttributeBundle::new().with("val", 9i64));
        registry.register(malformed, Some(r#"{"table":"nope"}"#.to_string()));
        let healthy = Arc::new(MockSensor::new("healthy", "default"));
        healthy.push(AttributeBundle::new().with("val", 5i64));
        registry.register(healthy, Some(T1.to_string()));

        assert_eq!(registry.active_sources(&"default".into()).len(), 3);

        let mut worker = IngestionWorker::new(
            settings("default", Duration::from_millis(10)),
            registry,
            storage.clone(),
        );
        let metrics = worker.metrics();
        assert!(worker.start());
        assert!(
            eventually(Duration::from_secs(5), || storage.total_rows() == 1).await
        );
        worker.shutdown().await;

        let snap = metrics.snapshot();
        assert!(snap.source_anomalies >= 1);
        assert!(snap.failures >= 1);
        assert_eq!(snap.rows_written, 1);
        assert_eq!(
            storage.rows(&"default".into(), "t1")[0].to_string(),
            "sensor_id=healthy val=5"
        );
    }

    /// Storage outage for a few cycles, then recovery
    #[tokio::test]
    async fn test_recovers_after_storage_outage() {
        let storage = Arc::new(MemoryStorage::new());
        storage.fail_acquire(true);
        let registry = Arc::new(SensorRegistry::new());
        let sensor = Arc::new(MockSensor::new("s1", "default"));
        registry.register(sensor.clone(), Some(T1.to_string()));

        let mut worker = IngestionWorker::new(
            settings("default", Duration::from_millis(10)),
            registry,
            storage.clone(),
        );
        let metrics = worker.metrics();
        assert!(worker.start());

        sensor.push(AttributeBundle::new().with("val", 1i64));
        assert!(eventually(Duration::from_secs(5), || metrics.snapshot().failures == 1).await);

        storage.fail_acquire(false);
        sensor.push(AttributeBundle::new().with("val", 2i64));
        assert!(eventually(Duration::from_secs(5), || storage.total_rows() == 1).await);
        worker.shutdown().await;

        // the reading drained during the outage is lost, the next one lands
        assert_eq!(
            storage.rows(&"default".into(), "t1")[0].to_string(),
            "sensor_id=s1 val=2"
        );
    }

    /// Outer shutdown token stops every worker started with it
    #[tokio::test]
    async fn test_shared_shutdown_token() {
        let storage = Arc::new(MemoryStorage::new());
        let registry = Arc::new(SensorRegistry::new());
        let shutdown = CancellationToken::new();

        let mut workers: Vec<_> = ["alpha", "beta"]
            .into_iter()
            .map(|scope| {
                IngestionWorker::new(
                    settings(scope, Duration::from_secs(30)),
                    registry.clone(),
                    storage.clone(),
                )
            })
            .collect();
        for worker in &mut workers {
            assert!(worker.start_with_shutdown(&shutdown));
        }

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.cancel();
        for worker in &mut workers {
            tokio::time::timeout(Duration::from_secs(2), worker.join())
                .await
                .unwrap();
            assert!(!worker.is_running());
        }
    }

    /// Config-driven wiring: loader output feeds registry and worker settings
    #[tokio::test]
    async fn test_config_to_worker() {
        let content = format!(
            r#"
[worker]
app_scope = "lab"
interval_ms = 15

[storage]
backend = "memory"

[[drivers]]
name = "counter"
table_definition = '{T1}'

[[sensors]]
id = "c1"
driver = "counter"
frequency_hz = 100.0
"#
        );
        let bp = config_loader::ConfigLoader::load_from_str(
            &content,
            config_loader::ConfigFormat::Toml,
        )
        .unwrap();

        let storage = Arc::new(MemoryStorage::new());
        let registry = Arc::new(SensorRegistry::new());
        let sensor_config = &bp.sensors[0];
        let driver = bp.driver(&sensor_config.driver).unwrap();
        let sensor = Arc::new(MockSensor::new(
            sensor_config.id.as_str(),
            bp.sensor_scope(sensor_config),
        ));
        registry.register(sensor.clone(), Some(driver.table_definition.clone()));
        sensor.start(
            contracts::TableDefinition::from_document(&driver.table_definition).unwrap(),
            sensor_config.frequency_hz,
        );

        let mut worker = IngestionWorker::new(
            WorkerSettings::from(&bp.worker),
            registry,
            storage.clone(),
        );
        assert!(worker.start());
        assert!(
            eventually(Duration::from_secs(5), || {
                storage.rows(&"lab".into(), "t1").len() >= 3
            })
            .await
        );
        sensor.stop();
        worker.shutdown().await;

        // handle discipline: every acquired handle was released
        let stats = storage.stats();
        assert_eq!(stats.acquisitions, stats.releases);
    }

    /// Storage handles are usable directly for out-of-band inspection
    #[test]
    fn test_sqlite_handle_direct_use() {
        let dir = tempfile::tempdir().unwrap();
        let storage = SqliteStorage::new(dir.path());
        let scope = AppScope::new("inspect");
        let mut handle = storage.acquire(&scope).unwrap();
        assert!(!handle.table_exists("t1").unwrap());
        handle.close().unwrap();
        assert_eq!(storage.name(), "sqlite");
    }
}
