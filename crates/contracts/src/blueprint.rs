//! IngestBlueprint - Config Loader output
//!
//! Describes a complete ingestion deployment: worker schedule, storage backend,
//! driver table definitions and the sensors bound to them.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppScope;

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete ingestion blueprint
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct IngestBlueprint {
    #[serde(default)]
    pub version: ConfigVersion,

    /// Scheduler settings
    #[serde(default)]
    #[validate(nested)]
    pub worker: WorkerConfig,

    /// Storage backend
    #[serde(default)]
    pub storage: StorageConfig,

    /// Driver descriptors (table definitions)
    #[serde(default)]
    #[validate(nested)]
    pub drivers: Vec<DriverConfig>,

    /// Simulated sensors bound to drivers
    #[serde(default)]
    #[validate(nested)]
    pub sensors: Vec<SensorConfig>,
}

/// Scheduler settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct WorkerConfig {
    /// Data scope enumerated each cycle
    #[serde(default = "default_app_scope")]
    #[validate(length(min = 1, message = "app_scope cannot be empty"))]
    pub app_scope: String,

    /// Sleep between cycles (milliseconds)
    #[serde(default = "default_interval_ms")]
    #[validate(range(min = 1, message = "interval_ms must be > 0"))]
    pub interval_ms: u64,
}

impl WorkerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn scope(&self) -> AppScope {
        AppScope::from(self.app_scope.as_str())
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            app_scope: default_app_scope(),
            interval_ms: default_interval_ms(),
        }
    }
}

fn default_app_scope() -> String {
    "default".to_string()
}

fn default_interval_ms() -> u64 {
    1000
}

/// Storage backend selection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Directory holding one `<scope>.sqlite` file per app scope
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            data_dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

/// Storage backend type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// SQLite database files
    #[default]
    Sqlite,
    /// In-process tables, discarded on exit
    Memory,
}

/// Driver descriptor
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DriverConfig {
    #[validate(length(min = 1, message = "driver name cannot be empty"))]
    pub name: String,

    /// Table definition document (JSON)
    pub table_definition: String,
}

/// Simulated sensor
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SensorConfig {
    #[validate(length(min = 1, message = "sensor id cannot be empty"))]
    pub id: String,

    /// Name of the driver providing the table definition
    pub driver: String,

    /// Reading frequency (Hz), must be > 0
    #[serde(default = "default_frequency_hz")]
    pub frequency_hz: f64,

    /// Overrides `worker.app_scope`
    #[serde(default)]
    pub app_scope: Option<String>,
}

fn default_frequency_hz() -> f64 {
    1.0
}

impl IngestBlueprint {
    /// Driver by name
    pub fn driver(&self, name: &str) -> Option<&DriverConfig> {
        self.drivers.iter().find(|d| d.name == name)
    }

    /// Effective scope of a sensor
    pub fn sensor_scope(&self, sensor: &SensorConfig) -> AppScope {
        match &sensor.app_scope {
            Some(scope) => AppScope::from(scope.as_str()),
            None => self.worker.scope(),
        }
    }
}
