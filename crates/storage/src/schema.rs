//! SQL text for table creation and row insertion

use contracts::{ColumnSpec, Row, TableDefinition, TypeTag};
use tracing::warn;

/// SQLite column affinity for a declared column type
pub fn column_affinity(column: &ColumnSpec) -> &'static str {
    match column.type_tag() {
        Some(tag) if tag.is_text_like() => "TEXT",
        Some(TypeTag::Boolean | TypeTag::Integer) => "INTEGER",
        Some(tag) if tag.is_float_like() => "REAL",
        Some(_) => "TEXT",
        None => {
            warn!(
                column = %column.name,
                column_type = %column.column_type,
                "unrecognized column type, declaring as TEXT"
            );
            "TEXT"
        }
    }
}

/// Double-quote an identifier, doubling embedded quotes
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// `CREATE TABLE IF NOT EXISTS` for a definition, `None` when it has no columns
pub fn create_table_sql(definition: &TableDefinition) -> Option<String> {
    if definition.columns.is_empty() {
        return None;
    }

    let columns = definition
        .columns
        .iter()
        .map(|c| format!("{} {}", quote_identifier(&c.name), column_affinity(c)))
        .collect::<Vec<_>>()
        .join(", ");

    Some(format!(
        "CREATE TABLE IF NOT EXISTS {} ({columns})",
        quote_identifier(&definition.table_name)
    ))
}

/// Parameterised INSERT naming exactly the row's columns
pub fn insert_sql(table_name: &str, row: &Row) -> String {
    let names = row
        .column_names()
        .map(quote_identifier)
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = (1..=row.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "INSERT INTO {} ({names}) VALUES ({placeholders})",
        quote_identifier(table_name)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::ColumnValue;

    #[test]
    fn test_affinities() {
        let cases = [
            ("string", "TEXT"),
            ("dateTime", "TEXT"),
            ("boolean", "INTEGER"),
            ("integer", "INTEGER"),
            ("Number", "REAL"),
            ("GEOPOINT", "REAL"),
            ("blob", "TEXT"),
        ];
        for (tag, expected) in cases {
            assert_eq!(column_affinity(&ColumnSpec::new("c", tag)), expected, "{tag}");
        }
    }

    #[test]
    fn test_create_table_sql() {
        let def = TableDefinition::new(
            "weather",
            vec![
                ColumnSpec::new("sensor_id", "string"),
                ColumnSpec::new("temp", "number"),
            ],
        );
        assert_eq!(
            create_table_sql(&def).unwrap(),
            r#"CREATE TABLE IF NOT EXISTS "weather" ("sensor_id" TEXT, "temp" REAL)"#
        );
        assert!(create_table_sql(&TableDefinition::new("empty", vec![])).is_none());
    }

    #[test]
    fn test_identifiers_are_escaped() {
        assert_eq!(quote_identifier(r#"we"ird"#), r#""we""ird""#);
    }

    #[test]
    fn test_insert_sql() {
        let mut row = Row::new();
        row.insert("sensor_id", ColumnValue::from("s1"));
        row.insert("val", ColumnValue::from(3i64));
        assert_eq!(
            insert_sql("t1", &row),
            r#"INSERT INTO "t1" ("sensor_id", "val") VALUES (?1, ?2)"#
        );
    }
}
