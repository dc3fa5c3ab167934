//! Error types for CLI operations.

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration loading or validation failure
    #[error("Invalid configuration: {0}")]
    Config(#[from] contracts::ContractError),

    /// Sensor bound to a driver the blueprint does not declare
    #[error("Sensor '{sensor_id}' references unknown driver '{driver}'")]
    UnknownDriver { sensor_id: String, driver: String },

    /// Ingestion worker could not be started
    #[error("Failed to start ingestion worker for scope '{scope}'")]
    WorkerStart { scope: String },
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn unknown_driver(sensor_id: impl Into<String>, driver: impl Into<String>) -> Self {
        Self::UnknownDriver {
            sensor_id: sensor_id.into(),
            driver: driver.into(),
        }
    }

    pub fn worker_start(scope: impl Into<String>) -> Self {
        Self::WorkerStart {
            scope: scope.into(),
        }
    }
}
