//! Layered error definitions
//!
//! Categorized by source: config / schema / storage

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Schema Errors =====
    /// Table definition document is malformed or missing expected fields
    #[error("table definition parse error: {message}")]
    SchemaParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // ===== Storage Errors =====
    /// Storage handle could not be acquired for a scope
    #[error("storage unavailable for scope '{scope}': {message}")]
    StorageUnavailable { scope: String, message: String },

    /// Metadata query (table existence) failed
    #[error("storage metadata query for table '{table}' failed: {message}")]
    StorageQuery { table: String, message: String },

    /// Table creation failed
    #[error("create table '{table}' failed: {message}")]
    StorageCreate { table: String, message: String },

    /// Row write failed
    #[error("write into table '{table}' failed: {message}")]
    StorageWrite { table: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create schema parse error without an underlying cause
    pub fn schema_parse(message: impl Into<String>) -> Self {
        Self::SchemaParse {
            message: message.into(),
            source: None,
        }
    }

    pub fn storage_unavailable(scope: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StorageUnavailable {
            scope: scope.into(),
            message: message.into(),
        }
    }

    pub fn storage_query(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StorageQuery {
            table: table.into(),
            message: message.into(),
        }
    }

    pub fn storage_create(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StorageCreate {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create storage write error
    pub fn storage_write(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StorageWrite {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Whether this error originated in the storage layer
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            Self::StorageUnavailable { .. }
                | Self::StorageQuery { .. }
                | Self::StorageCreate { .. }
                | Self::StorageWrite { .. }
        )
    }
}
