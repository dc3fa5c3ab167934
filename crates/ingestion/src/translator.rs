//! Row translator: (TableDefinition, AttributeBundle) -> Row

use contracts::{AttributeBundle, ColumnValue, Row, SensorId, TableDefinition};
use tracing::{info, trace};

use crate::type_directory::{coerce, Coercion};

/// Translate one bundle into a typed row.
///
/// Columns are visited in declaration order. The text-typed `sensor_id`
/// column is filled from `sensor_id`, never from the bundle. Text columns
/// with no value and columns with unrecognized types are left out; the row
/// may come back empty.
pub fn translate(
    definition: &TableDefinition,
    bundle: &AttributeBundle,
    sensor_id: &SensorId,
) -> Row {
    let mut row = Row::new();

    for column in &definition.columns {
        if column.is_sensor_id() {
            row.insert(&column.name, ColumnValue::Text(sensor_id.to_string()));
            continue;
        }

        match coerce(&column.column_type, bundle, &column.name) {
            Coercion::Present(value) => row.insert(&column.name, value),
            Coercion::Absent => {
                trace!(%sensor_id, column = %column.name, "no value for text column");
            }
            Coercion::Unsupported => {
                info!(
                    %sensor_id,
                    table = %definition.table_name,
                    column = %column.name,
                    column_type = %column.column_type,
                    "couldn't convert column type to a database type, column skipped"
                );
            }
        }
    }

    row
}
