//! TableDefinition - driver-declared destination schema
//!
//! Document format:
//!
//! ```json
//! { "table": { "name": "t1",
//!              "columns": [ { "name": "sensor_id", "type": "string" },
//!                           { "name": "val", "type": "integer" } ] } }
//! ```

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::ContractError;

/// Name of the column that always carries the producing sensor's id
pub const SENSOR_ID_COLUMN: &str = "sensor_id";

/// Recognized column type tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    String,
    MimeUri,
    Date,
    DateTime,
    Time,
    Array,
    Boolean,
    Integer,
    Number,
    GeoPoint,
}

impl TypeTag {
    /// Resolve a tag as written in a table definition.
    ///
    /// Text and integer tags match exactly; `number` and `geopoint` match
    /// case-insensitively.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "string" => Some(Self::String),
            "mimeUri" => Some(Self::MimeUri),
            "date" => Some(Self::Date),
            "dateTime" => Some(Self::DateTime),
            "time" => Some(Self::Time),
            "array" => Some(Self::Array),
            "boolean" => Some(Self::Boolean),
            "integer" => Some(Self::Integer),
            _ if tag.eq_ignore_ascii_case("number") => Some(Self::Number),
            _ if tag.eq_ignore_ascii_case("geopoint") => Some(Self::GeoPoint),
            _ => None,
        }
    }

    /// Canonical spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::MimeUri => "mimeUri",
            Self::Date => "date",
            Self::DateTime => "dateTime",
            Self::Time => "time",
            Self::Array => "array",
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::GeoPoint => "geopoint",
        }
    }

    /// Stored as text
    pub fn is_text_like(&self) -> bool {
        matches!(
            self,
            Self::String | Self::MimeUri | Self::Date | Self::DateTime | Self::Time | Self::Array
        )
    }

    /// Stored as integer (booleans are 0/1)
    pub fn is_integer_like(&self) -> bool {
        matches!(self, Self::Boolean | Self::Integer)
    }

    /// Stored as floating point
    pub fn is_float_like(&self) -> bool {
        matches!(self, Self::Number | Self::GeoPoint)
    }
}

/// Column declaration
///
/// The type is kept as written; unrecognized tags survive parsing and are
/// dropped per column at translation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ColumnSpec {
    #[validate(length(min = 1, message = "column name cannot be empty"))]
    pub name: String,

    #[serde(rename = "type")]
    pub column_type: String,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, column_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: column_type.into(),
        }
    }

    /// Recognized type tag, if any
    pub fn type_tag(&self) -> Option<TypeTag> {
        TypeTag::parse(&self.column_type)
    }

    /// True for the identifier column declared with a text-like type
    pub fn is_sensor_id(&self) -> bool {
        self.name == SENSOR_ID_COLUMN && self.type_tag().is_some_and(|t| t.is_text_like())
    }
}

/// Destination table schema for one driver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct TableDefinition {
    #[serde(rename = "name")]
    #[validate(length(min = 1, message = "table name cannot be empty"))]
    pub table_name: String,

    #[validate(nested)]
    pub columns: Vec<ColumnSpec>,
}

#[derive(Serialize, Deserialize)]
struct TableDocument {
    table: TableDefinition,
}

impl TableDefinition {
    pub fn new(table_name: impl Into<String>, columns: Vec<ColumnSpec>) -> Self {
        Self {
            table_name: table_name.into(),
            columns,
        }
    }

    /// Parse and validate a driver's table definition document.
    ///
    /// # Errors
    /// `ContractError::SchemaParse` when the document is not valid JSON, lacks
    /// `table.name` / `table.columns`, or declares an empty name.
    pub fn from_document(document: &str) -> Result<Self, ContractError> {
        let doc: TableDocument =
            serde_json::from_str(document).map_err(|e| ContractError::SchemaParse {
                message: format!("invalid table definition document: {e}"),
                source: Some(Box::new(e)),
            })?;

        doc.table.validate().map_err(|e| ContractError::SchemaParse {
            message: format!("table definition failed validation: {e}"),
            source: Some(Box::new(e)),
        })?;

        Ok(doc.table)
    }

    /// Render back to the document format
    pub fn to_document(&self) -> Result<String, ContractError> {
        serde_json::to_string(&TableDocument {
            table: self.clone(),
        })
        .map_err(|e| ContractError::schema_parse(format!("serialize error: {e}")))
    }

    /// Columns whose type tag is not recognized
    pub fn unknown_columns(&self) -> impl Iterator<Item = &ColumnSpec> {
        self.columns.iter().filter(|c| c.type_tag().is_none())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T1: &str = r#"{"table":{"name":"t1","columns":[{"name":"sensor_id","type":"string"},{"name":"val","type":"integer"}]}}"#;

    #[test]
    fn test_parse_document() {
        let def = TableDefinition::from_document(T1).unwrap();
        assert_eq!(def.table_name, "t1");
        assert_eq!(def.columns.len(), 2);
        assert_eq!(def.columns[0], ColumnSpec::new("sensor_id", "string"));
        assert_eq!(def.columns[1].type_tag(), Some(TypeTag::Integer));
    }

    #[test]
    fn test_malformed_json_is_schema_error() {
        let err = TableDefinition::from_document("{\"table\": ").unwrap_err();
        assert!(matches!(err, ContractError::SchemaParse { .. }));
    }

    #[test]
    fn test_missing_columns_is_schema_error() {
        let err = TableDefinition::from_document(r#"{"table":{"name":"t1"}}"#).unwrap_err();
        assert!(matches!(err, ContractError::SchemaParse { .. }));
    }

    #[test]
    fn test_empty_names_rejected() {
        let err = TableDefinition::from_document(r#"{"table":{"name":"","columns":[]}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("validation"), "got: {err}");

        let err = TableDefinition::from_document(
            r#"{"table":{"name":"t","columns":[{"name":"","type":"string"}]}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ContractError::SchemaParse { .. }));
    }

    #[test]
    fn test_unknown_type_survives_parsing() {
        let def = TableDefinition::from_document(
            r#"{"table":{"name":"t","columns":[{"name":"x","type":"unknown_type"}]}}"#,
        )
        .unwrap();
        assert_eq!(def.unknown_columns().count(), 1);
    }

    #[test]
    fn test_tag_matching_rules() {
        assert_eq!(TypeTag::parse("dateTime"), Some(TypeTag::DateTime));
        assert_eq!(TypeTag::parse("DATETIME"), None);
        assert_eq!(TypeTag::parse("String"), None);
        assert_eq!(TypeTag::parse("NUMBER"), Some(TypeTag::Number));
        assert_eq!(TypeTag::parse("GeoPoint"), Some(TypeTag::GeoPoint));
    }

    #[test]
    fn test_sensor_id_column_requires_text_type() {
        assert!(ColumnSpec::new("sensor_id", "string").is_sensor_id());
        assert!(ColumnSpec::new("sensor_id", "mimeUri").is_sensor_id());
        assert!(!ColumnSpec::new("sensor_id", "integer").is_sensor_id());
        assert!(!ColumnSpec::new("other", "string").is_sensor_id());
    }

    #[test]
    fn test_document_round_trip() {
        let def = TableDefinition::from_document(T1).unwrap();
        let again = TableDefinition::from_document(&def.to_document().unwrap()).unwrap();
        assert_eq!(def, again);
    }
}
