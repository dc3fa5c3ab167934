//! Storage traits - the write primitive consumed by the worker
//!
//! A handle is acquired per translated bundle and closed before the next
//! one; no handle outlives a single bundle.

use crate::{AppScope, ContractError, Row, SensorId, TableDefinition};

/// Storage engine: hands out per-scope handles
pub trait Storage: Send + Sync {
    type Handle: StorageHandle;

    /// Engine name (used for logging)
    fn name(&self) -> &str;

    /// Open a handle onto the scope's database
    ///
    /// # Errors
    /// `ContractError::StorageUnavailable` when the database cannot be opened
    fn acquire(&self, scope: &AppScope) -> Result<Self::Handle, ContractError>;
}

/// Open connection onto one scope's database
pub trait StorageHandle {
    /// Whether a table with exactly this name exists
    fn table_exists(&mut self, table_name: &str) -> Result<bool, ContractError>;

    /// Create the destination table for `definition`
    fn create_table(
        &mut self,
        definition: &TableDefinition,
        sensor_id: &SensorId,
        scope: &AppScope,
    ) -> Result<(), ContractError>;

    /// Insert one row into an existing table
    fn write_row(&mut self, table_name: &str, row: &Row) -> Result<(), ContractError>;

    /// Release the handle
    fn close(self) -> Result<(), ContractError>
    where
        Self: Sized;
}

