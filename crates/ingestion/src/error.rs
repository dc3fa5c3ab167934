//! Ingestion error types

use contracts::{ContractError, SensorId};
use thiserror::Error;

/// Failure isolated to one source (or one bundle) within a cycle
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Driver table definition could not be parsed
    #[error("table definition for sensor {sensor_id} is invalid: {source}")]
    SchemaParse {
        sensor_id: SensorId,
        #[source]
        source: ContractError,
    },

    /// Storage acquire/query/create/write failure
    #[error("storage error for sensor {sensor_id}: {source}")]
    Storage {
        sensor_id: SensorId,
        #[source]
        source: ContractError,
    },

    /// Blocking cycle task panicked or was aborted
    #[error("cycle task failed: {message}")]
    CycleTask { message: String },
}

impl IngestionError {
    pub fn schema_parse(sensor_id: &SensorId, source: ContractError) -> Self {
        Self::SchemaParse {
            sensor_id: sensor_id.clone(),
            source,
        }
    }

    pub fn storage(sensor_id: &SensorId, source: ContractError) -> Self {
        Self::Storage {
            sensor_id: sensor_id.clone(),
            source,
        }
    }

    /// Short label used for the failure metric
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SchemaParse { .. } => "schema_parse",
            Self::Storage { .. } => "storage",
            Self::CycleTask { .. } => "cycle_task",
        }
    }
}

/// Ingestion Result type alias
pub type Result<T> = std::result::Result<T, IngestionError>;
