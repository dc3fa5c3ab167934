//! Type directory: column type tag -> coercion rule
//!
//! | tags | read as | missing / null |
//! |---|---|---|
//! | string, mimeUri, date, dateTime, time, array | text | absent |
//! | boolean, integer | integer | 0 |
//! | number, geopoint | float | 0.0 |
//!
//! Integer and float reads never report "absent"; a zero reading and a
//! missing field are indistinguishable downstream.

use contracts::{AttributeBundle, ColumnValue, TypeTag, Value};

/// Outcome of looking up one column in a bundle
#[derive(Debug, Clone, PartialEq)]
pub enum Coercion {
    /// Value to store
    Present(ColumnValue),
    /// Text-like column with no usable value; omit it
    Absent,
    /// Tag not in the directory; omit it and log
    Unsupported,
}

/// Coerce `column` out of `bundle` according to a raw type tag
pub fn coerce(type_tag: &str, bundle: &AttributeBundle, column: &str) -> Coercion {
    match TypeTag::parse(type_tag) {
        Some(tag) => coerce_tag(tag, bundle, column),
        None => Coercion::Unsupported,
    }
}

/// Coerce `column` out of `bundle` for a recognized tag
pub fn coerce_tag(tag: TypeTag, bundle: &AttributeBundle, column: &str) -> Coercion {
    let value = bundle.get(column);
    if tag.is_text_like() {
        match value.and_then(read_text) {
            Some(text) => Coercion::Present(ColumnValue::Text(text)),
            None => Coercion::Absent,
        }
    } else if tag.is_integer_like() {
        Coercion::Present(ColumnValue::Integer(value.map_or(0, read_integer)))
    } else {
        Coercion::Present(ColumnValue::Real(value.map_or(0.0, read_float)))
    }
}

fn read_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Text(s) => Some(s.clone()),
        Value::Integer(v) => Some(v.to_string()),
        Value::Float(v) => Some(v.to_string()),
    }
}

fn read_integer(value: &Value) -> i64 {
    match value {
        Value::Null => 0,
        Value::Integer(v) => *v,
        Value::Float(v) => *v as i64,
        Value::Text(s) => {
            let s = s.trim();
            if s.eq_ignore_ascii_case("true") {
                1
            } else if s.eq_ignore_ascii_case("false") {
                0
            } else {
                s.parse().unwrap_or(0)
            }
        }
    }
}

fn read_float(value: &Value) -> f64 {
    match value {
        Value::Null => 0.0,
        Value::Float(v) => *v,
        Value::Integer(v) => *v as f64,
        Value::Text(s) => s.trim().parse().unwrap_or(0.0),
    }
}
