//! MemoryStorage - in-process tables, for tests and dry runs

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use contracts::{
    AppScope, ContractError, Row, SensorId, Storage, StorageHandle, TableDefinition,
};
use parking_lot::Mutex;
use tracing::trace;

struct MemoryTable {
    definition: TableDefinition,
    rows: Vec<Row>,
}

#[derive(Default)]
struct Counters {
    acquisitions: AtomicU64,
    releases: AtomicU64,
    existence_checks: AtomicU64,
    tables_created: AtomicU64,
    rows_written: AtomicU64,
}

#[derive(Default)]
struct Shared {
    tables: Mutex<HashMap<(AppScope, String), MemoryTable>>,
    counters: Counters,
    fail_acquire: AtomicBool,
    fail_existence_checks: AtomicBool,
    fail_writes: AtomicBool,
}

/// Call counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStats {
    pub acquisitions: u64,
    pub releases: u64,
    pub existence_checks: u64,
    pub tables_created: u64,
    pub rows_written: u64,
}

/// Storage engine keeping every scope's tables in memory
///
/// Clones share the same tables.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    shared: Arc<Shared>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_table(&self, scope: &AppScope, table_name: &str) -> bool {
        self.shared
            .tables
            .lock()
            .contains_key(&(scope.clone(), table_name.to_string()))
    }

    /// Rows written to a table, in insertion order
    pub fn rows(&self, scope: &AppScope, table_name: &str) -> Vec<Row> {
        self.shared
            .tables
            .lock()
            .get(&(scope.clone(), table_name.to_string()))
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    /// Total rows across every scope and table
    pub fn total_rows(&self) -> usize {
        self.shared.tables.lock().values().map(|t| t.rows.len()).sum()
    }

    /// `(scope, table)` pairs, sorted
    pub fn tables(&self) -> Vec<(AppScope, String)> {
        let mut keys: Vec<_> = self.shared.tables.lock().keys().cloned().collect();
        keys.sort_by(|a, b| (a.0.as_str(), &a.1).cmp(&(b.0.as_str(), &b.1)));
        keys
    }

    pub fn stats(&self) -> MemoryStats {
        let c = &self.shared.counters;
        MemoryStats {
            acquisitions: c.acquisitions.load(Ordering::Relaxed),
            releases: c.releases.load(Ordering::Relaxed),
            existence_checks: c.existence_checks.load(Ordering::Relaxed),
            tables_created: c.tables_created.load(Ordering::Relaxed),
            rows_written: c.rows_written.load(Ordering::Relaxed),
        }
    }

    /// Make `acquire` fail with `StorageUnavailable`
    pub fn fail_acquire(&self, fail: bool) {
        self.shared.fail_acquire.store(fail, Ordering::Relaxed);
    }

    /// Make `table_exists` fail with `StorageQuery`
    pub fn fail_existence_checks(&self, fail: bool) {
        self.shared
            .fail_existence_checks
            .store(fail, Ordering::Relaxed);
    }

    /// Make `write_row` fail with `StorageWrite`
    pub fn fail_writes(&self, fail: bool) {
        self.shared.fail_writes.store(fail, Ordering::Relaxed);
    }
}

impl Storage for MemoryStorage {
    type Handle = MemoryHandle;

    fn name(&self) -> &str {
        "memory"
    }

    fn acquire(&self, scope: &AppScope) -> Result<MemoryHandle, ContractError> {
        if self.shared.fail_acquire.load(Ordering::Relaxed) {
            return Err(ContractError::storage_unavailable(
                scope.as_str(),
                "injected acquire failure",
            ));
        }
        self.shared
            .counters
            .acquisitions
            .fetch_add(1, Ordering::Relaxed);

        Ok(MemoryHandle {
            shared: Arc::clone(&self.shared),
            scope: scope.clone(),
        })
    }
}

/// Handle onto one scope's in-memory tables
pub struct MemoryHandle {
    shared: Arc<Shared>,
    scope: AppScope,
}

impl MemoryHandle {
    fn key(&self, table_name: &str) -> (AppScope, String) {
        (self.scope.clone(), table_name.to_string())
    }
}

impl StorageHandle for MemoryHandle {
    fn table_exists(&mut self, table_name: &str) -> Result<bool, ContractError> {
        self.shared
            .counters
            .existence_checks
            .fetch_add(1, Ordering::Relaxed);
        if self.shared.fail_existence_checks.load(Ordering::Relaxed) {
            return Err(ContractError::storage_query(
                table_name,
                "injected metadata failure",
            ));
        }
        Ok(self.shared.tables.lock().contains_key(&self.key(table_name)))
    }

    fn create_table(
        &mut self,
        definition: &TableDefinition,
        sensor_id: &SensorId,
        _scope: &AppScope,
    ) -> Result<(), ContractError> {
        let key = self.key(&definition.table_name);
        let mut tables = self.shared.tables.lock();
        if tables.contains_key(&key) {
            return Ok(());
        }

        tables.insert(
            key,
            MemoryTable {
                definition: definition.clone(),
                rows: Vec::new(),
            },
        );
        self.shared
            .counters
            .tables_created
            .fetch_add(1, Ordering::Relaxed);
        trace!(table = %definition.table_name, %sensor_id, "memory table created");
        Ok(())
    }

    fn write_row(&mut self, table_name: &str, row: &Row) -> Result<(), ContractError> {
        if self.shared.fail_writes.load(Ordering::Relaxed) {
            return Err(ContractError::storage_write(
                table_name,
                "injected write failure",
            ));
        }

        let key = self.key(table_name);
        let mut tables = self.shared.tables.lock();
        let table = tables
            .get_mut(&key)
            .ok_or_else(|| ContractError::storage_write(table_name, "no such table"))?;

        if let Some(unknown) = row
            .column_names()
            .find(|name| !table.definition.columns.iter().any(|c| c.name == *name))
        {
            return Err(ContractError::storage_write(
                table_name,
                format!("no such column: {unknown}"),
            ));
        }

        table.rows.push(row.clone());
        self.shared
            .counters
            .rows_written
            .fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn close(self) -> Result<(), ContractError> {
        self.shared.counters.releases.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
