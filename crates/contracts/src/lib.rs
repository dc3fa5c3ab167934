//! # Contracts
//!
//! Frozen interface contracts, defining inter-module data structures and traits.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Data Model
//! - `AttributeBundle`: one reading, column name -> loosely-typed `Value`
//! - `TableDefinition`: destination schema declared by a sensor's driver
//! - `Row`: column name -> typed `ColumnValue`, ready for `StorageHandle::write_row`

mod blueprint;
mod error;
mod ids;
mod row;
mod sensor_source;
mod storage;
mod table;
mod value;

pub use blueprint::*;
pub use error::*;
pub use ids::{AppScope, SensorId};
pub use row::{ColumnValue, Row};
pub use sensor_source::{SensorSource, SourceRegistry};
pub use storage::{Storage, StorageHandle};
pub use table::{ColumnSpec, TableDefinition, TypeTag, SENSOR_ID_COLUMN};
pub use value::{AttributeBundle, Value};
