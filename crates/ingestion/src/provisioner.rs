//! Table provisioner: create a sensor's destination table on first use

use contracts::{AppScope, ContractError, SensorId, StorageHandle, TableDefinition};
use tracing::{debug, info};

/// Result of `ensure_table`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provisioned {
    /// Table was already present; nothing issued
    Existing,
    /// Table was missing and has been created
    Created,
}

/// Make sure `definition.table_name` exists, creating it if absent.
///
/// The existence check runs on every call; nothing is cached between calls.
///
/// # Errors
/// Metadata query or creation failure, recoverable for the current cycle.
pub fn ensure_table<H: StorageHandle>(
    handle: &mut H,
    definition: &TableDefinition,
    sensor_id: &SensorId,
    scope: &AppScope,
) -> Result<Provisioned, ContractError> {
    if handle.table_exists(&definition.table_name)? {
        debug!(table = %definition.table_name, "table already provisioned");
        return Ok(Provisioned::Existing);
    }

    handle.create_table(definition, sensor_id, scope)?;
    info!(
        table = %definition.table_name,
        %sensor_id,
        %scope,
        columns = definition.columns.len(),
        "provisioned sensor table"
    );
    Ok(Provisioned::Created)
}
