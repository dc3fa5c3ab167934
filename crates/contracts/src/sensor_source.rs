//! SensorSource / SourceRegistry - data source abstraction
//!
//! The ingestion worker never creates or destroys sources; it asks the
//! registry for the active set once per cycle and drains each one.

use std::sync::Arc;

use crate::{AppScope, AttributeBundle, SensorId};

/// Registered producer of buffered readings
///
/// Implemented by real transports and by mock sensors alike.
pub trait SensorSource: Send + Sync {
    /// Stable sensor identifier
    fn sensor_id(&self) -> &SensorId;

    /// Scope whose storage receives this sensor's rows
    fn app_scope(&self) -> &AppScope;

    /// Take every reading buffered since the previous drain.
    ///
    /// Returns `Some(vec![])` when nothing is pending. `None` means the
    /// producer could not hand over a buffer at all; callers treat it as an
    /// anomaly for this cycle, never as an error.
    fn drain_pending(&self) -> Option<Vec<AttributeBundle>>;
}

/// Lookup of active sources and their driver descriptors
pub trait SourceRegistry: Send + Sync {
    /// Sources currently active for `scope`, in a stable order
    fn active_sources(&self, scope: &AppScope) -> Vec<Arc<dyn SensorSource>>;

    /// Raw table definition document declared by the sensor's driver
    fn table_definition_document(&self, sensor_id: &SensorId) -> Option<String>;
}

