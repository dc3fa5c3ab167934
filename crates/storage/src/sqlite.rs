//! SqliteStorage - one database file per app scope

use std::fs;
use std::path::{Path, PathBuf};

use contracts::{
    AppScope, ColumnValue, ContractError, Row, SensorId, Storage, StorageHandle, TableDefinition,
};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};
use tracing::{debug, instrument};

use crate::schema::{create_table_sql, insert_sql, quote_identifier};

const TABLE_EXISTS_SQL: &str = "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1";

/// Storage engine backed by `<data_dir>/<scope>.sqlite`
#[derive(Debug, Clone)]
pub struct SqliteStorage {
    data_dir: PathBuf,
}

impl SqliteStorage {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Database file for a scope
    ///
    /// Bytes outside `[A-Za-z0-9_-]` are written as `%XX`, so a scope can
    /// never escape the data directory and distinct scopes never share a file.
    pub fn database_path(&self, scope: &AppScope) -> PathBuf {
        let mut file_stem = String::with_capacity(scope.len());
        for byte in scope.bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
                file_stem.push(char::from(byte));
            } else {
                file_stem.push_str(&format!("%{byte:02X}"));
            }
        }
        self.data_dir.join(format!("{file_stem}.sqlite"))
    }

    /// Number of rows in a scope's table
    pub fn count_rows(&self, scope: &AppScope, table_name: &str) -> Result<u64, ContractError> {
        let handle = self.acquire(scope)?;
        let sql = format!("SELECT COUNT(*) FROM {}", quote_identifier(table_name));
        let count: i64 = handle
            .conn
            .query_row(&sql, [], |r| r.get(0))
            .map_err(|e| ContractError::storage_query(table_name, e.to_string()))?;
        handle.close()?;
        Ok(count.max(0) as u64)
    }

    fn open(&self, scope: &AppScope) -> Result<Connection, ContractError> {
        fs::create_dir_all(&self.data_dir)
            .map_err(|e| ContractError::storage_unavailable(scope.as_str(), e.to_string()))?;

        let path = self.database_path(scope);
        let conn = Connection::open(&path)
            .map_err(|e| ContractError::storage_unavailable(scope.as_str(), e.to_string()))?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )
        .map_err(|e| ContractError::storage_unavailable(scope.as_str(), e.to_string()))?;

        Ok(conn)
    }
}

impl Storage for SqliteStorage {
    type Handle = SqliteHandle;

    fn name(&self) -> &str {
        "sqlite"
    }

    fn acquire(&self, scope: &AppScope) -> Result<SqliteHandle, ContractError> {
        Ok(SqliteHandle {
            conn: self.open(scope)?,
        })
    }
}

/// Open connection onto one scope's database file
pub struct SqliteHandle {
    conn: Connection,
}

impl StorageHandle for SqliteHandle {
    fn table_exists(&mut self, table_name: &str) -> Result<bool, ContractError> {
        let count: i64 = self
            .conn
            .query_row(TABLE_EXISTS_SQL, [table_name], |r| r.get(0))
            .map_err(|e| ContractError::storage_query(table_name, e.to_string()))?;
        Ok(count > 0)
    }

    #[instrument(skip(self, definition), fields(table = %definition.table_name))]
    fn create_table(
        &mut self,
        definition: &TableDefinition,
        sensor_id: &SensorId,
        scope: &AppScope,
    ) -> Result<(), ContractError> {
        let sql = create_table_sql(definition).ok_or_else(|| {
            ContractError::storage_create(&definition.table_name, "definition has no columns")
        })?;
        debug!(%sql, "creating table");

        self.conn
            .execute(&sql, [])
            .map_err(|e| ContractError::storage_create(&definition.table_name, e.to_string()))?;
        Ok(())
    }

    fn write_row(&mut self, table_name: &str, row: &Row) -> Result<(), ContractError> {
        let sql = insert_sql(table_name, row);
        let values = row.iter().map(|(_, v)| match v {
            ColumnValue::Integer(i) => SqlValue::Integer(*i),
            ColumnValue::Real(f) => SqlValue::Real(*f),
            ColumnValue::Text(s) => SqlValue::Text(s.clone()),
        });

        self.conn
            .prepare(&sql)
            .and_then(|mut stmt| stmt.execute(params_from_iter(values)))
            .map_err(|e| ContractError::storage_write(table_name, e.to_string()))?;
        Ok(())
    }

    fn close(self) -> Result<(), ContractError> {
        self.conn
            .close()
            .map_err(|(_, e)| ContractError::Other(format!("sqlite close failed: {e}")))
    }
}
