//! Mock sensor source
//!
//! Buffered `SensorSource` for testing without a real transport. Readings are
//! pushed by hand or synthesised from the driver's table definition by a
//! background task.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use contracts::{
    AppScope, AttributeBundle, SensorId, SensorSource, TableDefinition, TypeTag, Value,
};
use parking_lot::Mutex;
use tracing::{debug, trace};

/// Mock sensor with an internal reading buffer
pub struct MockSensor {
    sensor_id: SensorId,
    app_scope: AppScope,
    buffer: Mutex<Vec<AttributeBundle>>,
    missing_buffer: AtomicBool,
    running: Arc<AtomicBool>,
    frames: AtomicU64,
}

impl MockSensor {
    pub fn new(sensor_id: impl Into<SensorId>, app_scope: impl Into<AppScope>) -> Self {
        Self {
            sensor_id: sensor_id.into(),
            app_scope: app_scope.into(),
            buffer: Mutex::new(Vec::new()),
            missing_buffer: AtomicBool::new(false),
            running: Arc::new(AtomicBool::new(false)),
            frames: AtomicU64::new(0),
        }
    }

    /// Buffer one reading
    pub fn push(&self, bundle: AttributeBundle) {
        self.buffer.lock().push(bundle);
        self.frames.fetch_add(1, Ordering::Relaxed);
    }

    /// Readings waiting for the next drain
    pub fn pending_len(&self) -> usize {
        self.buffer.lock().len()
    }

    /// Total readings ever buffered
    pub fn frames_produced(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    /// Make `drain_pending` hand back no list at all
    pub fn simulate_missing_buffer(&self, missing: bool) {
        self.missing_buffer.store(missing, Ordering::Relaxed);
    }

    /// Start producing synthetic readings at `frequency_hz`.
    ///
    /// Must be called within a Tokio runtime. Repeated calls while running are
    /// ignored.
    pub fn start(self: &Arc<Self>, definition: TableDefinition, frequency_hz: f64) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let sensor = Arc::clone(self);
        let running = Arc::clone(&self.running);
        let interval = Duration::from_secs_f64(1.0 / frequency_hz.max(f64::EPSILON));

        tokio::spawn(async move {
            debug!(
                sensor_id = %sensor.sensor_id,
                table = %definition.table_name,
                frequency_hz,
                "mock sensor started"
            );

            while running.load(Ordering::Relaxed) {
                let frame_id = sensor.frames_produced() + 1;
                sensor.push(synthesize_reading(&definition, frame_id));
                trace!(sensor_id = %sensor.sensor_id, frame_id, "mock reading buffered");

                tokio::time::sleep(interval).await;
            }

            debug!(sensor_id = %sensor.sensor_id, "mock sensor stopped");
        });
    }

    /// Stop the generator task
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }
}

impl SensorSource for MockSensor {
    fn sensor_id(&self) -> &SensorId {
        &self.sensor_id
    }

    fn app_scope(&self) -> &AppScope {
        &self.app_scope
    }

    fn drain_pending(&self) -> Option<Vec<AttributeBundle>> {
        if self.missing_buffer.load(Ordering::Relaxed) {
            return None;
        }
        Some(std::mem::take(&mut *self.buffer.lock()))
    }
}

/// Build a plausible reading for every recognized column of `definition`
pub fn synthesize_reading(definition: &TableDefinition, frame_id: u64) -> AttributeBundle {
    let now = Utc::now();
    let mut bundle = AttributeBundle::new();

    for column in &definition.columns {
        if column.is_sensor_id() {
            continue;
        }
        let Some(tag) = column.type_tag() else {
            continue;
        };

        let value: Value = match tag {
            TypeTag::String => format!("{}-{frame_id}", column.name).into(),
            TypeTag::MimeUri => format!("content://mock/{}/{frame_id}", column.name).into(),
            TypeTag::Array => format!("[{frame_id}]").into(),
            TypeTag::Date => now.format("%Y-%m-%d").to_string().into(),
            TypeTag::DateTime => now.to_rfc3339().into(),
            TypeTag::Time => now.format("%H:%M:%S%.3f").to_string().into(),
            TypeTag::Boolean => (frame_id % 2 == 0).into(),
            TypeTag::Integer => (frame_id as i64).into(),
            TypeTag::Number => (20.0 + (frame_id % 100) as f64 * 0.1).into(),
            TypeTag::GeoPoint => (47.0 + frame_id as f64 * 0.0001).into(),
        };
        bundle.insert(&column.name, value);
    }

    bundle
}
