//! In-memory sensor registry

use std::sync::Arc;

use contracts::{AppScope, SensorId, SensorSource, SourceRegistry};
use parking_lot::RwLock;
use tracing::debug;

struct RegisteredSensor {
    source: Arc<dyn SensorSource>,
    driver_document: Option<String>,
}

/// Registry of sources and their driver table definitions
///
/// Sources are returned in registration order.
#[derive(Default)]
pub struct SensorRegistry {
    entries: RwLock<Vec<RegisteredSensor>>,
}

impl SensorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source, replacing any existing entry with the same id
    pub fn register(&self, source: Arc<dyn SensorSource>, driver_document: Option<String>) {
        let sensor_id = source.sensor_id().clone();
        let entry = RegisteredSensor {
            source,
            driver_document,
        };

        let mut entries = self.entries.write();
        match entries
            .iter_mut()
            .find(|e| e.source.sensor_id() == &sensor_id)
        {
            Some(existing) => *existing = entry,
            None => entries.push(entry),
        }
        debug!(%sensor_id, "registered sensor source");
    }

    /// Remove a source; returns whether it was registered
    pub fn deregister(&self, sensor_id: &str) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|e| e.source.sensor_id() != sensor_id);
        before != entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl SourceRegistry for SensorRegistry {
    fn active_sources(&self, scope: &AppScope) -> Vec<Arc<dyn SensorSource>> {
        self.entries
            .read()
            .iter()
            .filter(|e| e.source.app_scope() == scope)
            .map(|e| Arc::clone(&e.source))
            .collect()
    }

    fn table_definition_document(&self, sensor_id: &SensorId) -> Option<String> {
        self.entries
            .read()
            .iter()
            .find(|e| e.source.sensor_id() == sensor_id)
            .and_then(|e| e.driver_document.clone())
    }
}
