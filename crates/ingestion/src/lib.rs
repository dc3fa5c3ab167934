//! # Ingestion Worker
//!
//! Background ingestion of buffered sensor readings into per-scope storage.
//!
//! Responsibilities:
//! - Map column type tags to read strategies (`type_directory`)
//! - Make sure a sensor's table exists before writing (`provisioner`)
//! - Translate attribute bundles into rows (`translator`)
//! - Drain every active source of a scope once per cycle (`collector`)
//! - Run cycles periodically with an interruptible sleep (`worker`)
//!
//! ## Usage Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use ingestion::{IngestionWorker, MockSensor, SensorRegistry, WorkerSettings};
//! use storage::MemoryStorage;
//!
//! let registry = Arc::new(SensorRegistry::new());
//! registry.register(Arc::new(MockSensor::new("s1", "default")), Some(document));
//!
//! let mut worker = IngestionWorker::new(
//!     WorkerSettings::default(),
//!     registry,
//!     Arc::new(MemoryStorage::new()),
//! );
//! worker.start();
//! // ...
//! worker.shutdown().await;
//! ```

mod collector;
mod config;
mod error;
mod mock;
mod provisioner;
mod registry;
mod translator;
mod type_directory;
mod worker;

// Re-exports
pub use collector::{Collector, CycleReport};
pub use config::{IngestionMetrics, MetricsSnapshot, WorkerSettings};
pub use error::{IngestionError, Result};
pub use mock::{synthesize_reading, MockSensor};
pub use provisioner::{ensure_table, Provisioned};
pub use registry::SensorRegistry;
pub use translator::translate;
pub use type_directory::{coerce, coerce_tag, Coercion};
pub use worker::{interruptible_sleep, IngestionWorker, SleepOutcome, StopHandle};
