//! Flattening and field mapping
//!
//! Raw API records are nested JSON. [`flatten`] turns one into a map of
//! dot-joined paths (`teams.home.id`) to leaf values; a mapping table then
//! picks paths and coerces each leaf into the target column's type.

use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

use crate::errors::{EtlError, EtlResult};
use crate::models::{Entity, Record, Value};
use crate::schema::{ColumnType, TableSchema};
use crate::utils::datetime::parse_api_date;

/// Dot-joined path → leaf value
pub type FlatRecord = BTreeMap<String, JsonValue>;

/// `(source path, target column)` pairs
pub type FieldMapping<'a> = (&'a str, &'a str);

/// Flatten nested objects into dot-joined keys. Arrays and scalars are leaves;
/// an empty object is kept as a leaf under its own path.
pub fn flatten(value: &JsonValue) -> FlatRecord {
    let mut out = FlatRecord::new();
    match value {
        JsonValue::Object(map) => {
            for (key, child) in map {
                flatten_into(key, child, &mut out);
            }
        }
        other => {
            out.insert(String::new(), other.clone());
        }
    }
    out
}

fn flatten_into(path: &str, value: &JsonValue, out: &mut FlatRecord) {
    match value {
        JsonValue::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                flatten_into(&format!("{path}.{key}"), child, out);
            }
        }
        leaf => {
            out.insert(path.to_string(), leaf.clone());
        }
    }
}

/// Copy every mapped path of `flat` into `record`, coerced to the column type
/// declared by `schema`.
pub fn apply_mapping(
    entity: Entity,
    flat: &FlatRecord,
    mappings: &[FieldMapping<'_>],
    schema: &TableSchema,
    record: &mut Record,
) -> EtlResult<()> {
    for (path, column) in mappings {
        let column_type = schema
            .find_column(column)
            .map(|c| c.column_type)
            .ok_or_else(|| {
                EtlError::transform_failed(
                    entity.as_str(),
                    format!("mapping targets unknown column '{column}' of {}", schema.name()),
                )
            })?;
        let value = coerce(entity, path, flat.get(*path), column_type)?;
        record.insert(*column, value);
    }
    Ok(())
}

/// Convert a JSON leaf into a [`Value`] of `column_type`.
///
/// Missing paths, JSON null and blank strings become [`Value::Null`].
pub fn coerce(
    entity: Entity,
    path: &str,
    raw: Option<&JsonValue>,
    column_type: ColumnType,
) -> EtlResult<Value> {
    let raw = match raw {
        None | Some(JsonValue::Null) => return Ok(Value::Null),
        Some(JsonValue::String(s)) if s.trim().is_empty() => return Ok(Value::Null),
        Some(raw) => raw,
    };

    let invalid = || {
        EtlError::transform_failed(
            entity.as_str(),
            format!("value {raw} at '{path}' is not a valid {column_type}"),
        )
    };

    let value = match column_type {
        ColumnType::Integer => match raw {
            JsonValue::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().and_then(integral_f64))
                .map(Value::Integer)
                .ok_or_else(invalid)?,
            JsonValue::String(s) => parse_integer(s.trim()).map(Value::Integer).ok_or_else(invalid)?,
            _ => return Err(invalid()),
        },
        ColumnType::Float => match raw {
            JsonValue::Number(n) => n.as_f64().map(Value::Float).ok_or_else(invalid)?,
            JsonValue::String(s) => s
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| invalid())?,
            _ => return Err(invalid()),
        },
        ColumnType::String => match raw {
            JsonValue::String(s) => Value::Text(s.clone()),
            JsonValue::Number(n) => Value::Text(n.to_string()),
            JsonValue::Bool(b) => Value::Text(b.to_string()),
            _ => return Err(invalid()),
        },
        ColumnType::Date => match raw {
            JsonValue::String(s) => parse_api_date(s).map(Value::Date).ok_or_else(invalid)?,
            _ => return Err(invalid()),
        },
    };

    Ok(value)
}

fn parse_integer(s: &str) -> Option<i64> {
    s.parse::<i64>()
        .ok()
        .or_else(|| s.parse::<f64>().ok().and_then(integral_f64))
}

/// `f` as an integer when it is whole and within `i64` range
fn integral_f64(f: f64) -> Option<i64> {
    // i64::MAX as f64 rounds up to 2^63, which is itself out of range
    let in_range = f >= i64::MIN as f64 && f < i64::MAX as f64;
    (f.fract() == 0.0 && in_range).then_some(f as i64)
}
