//! Tagged variant for property values, replacing the source's dynamic
//! dispatch on GLib `GValue` types with an explicit enum + a conversion
//! table keyed by the property's declared range.

use crate::ontology::registry::DataType;
use chrono::{DateTime, NaiveDate, Utc};

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Int64(i64),
    Bool(bool),
    Double(f64),
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
    Resource(i64),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::Int64(_) => "int64",
            Value::Bool(_) => "bool",
            Value::Double(_) => "double",
            Value::Date(_) => "date",
            Value::DateTime(_) => "datetime",
            Value::Resource(_) => "resource",
        }
    }

    /// Coerces a literal string (as received from the extractor / SPARQL
    /// layer) into the storage representation for `data_type`. Resource
    /// values are never produced here: the caller resolves them via
    /// `ensure_id` before constructing a `Value::Resource`.
    pub fn coerce_literal(raw: &str, data_type: DataType) -> Result<Value, String> {
        match data_type {
            DataType::String => Ok(Value::String(raw.to_string())),
            DataType::Int64 => raw
                .parse::<i64>()
                .map(Value::Int64)
                .map_err(|e| format!("not an integer: {e}")),
            DataType::Bool => match raw {
                "true" | "1" => Ok(Value::Bool(true)),
                "false" | "0" => Ok(Value::Bool(false)),
                other => Err(format!("not a boolean literal: {other}")),
            },
            DataType::Double => raw
                .parse::<f64>()
                .map(Value::Double)
                .map_err(|e| format!("not a double: {e}")),
            DataType::Date => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map(Value::Date)
                .map_err(|e| format!("not an ISO date: {e}")),
            DataType::DateTime => DateTime::parse_from_rfc3339(raw)
                .map(|dt| Value::DateTime(dt.with_timezone(&Utc)))
                .map_err(|e| format!("not an ISO-8601 datetime: {e}")),
            DataType::Resource => Err("resource values must be resolved via ensure_id".into()),
        }
    }

    /// Integer encoding used for the `Resource` table / side tables: bools
    /// as 0/1, dates as unix-time seconds, resources as their id.
    pub fn as_sql_int(&self) -> Option<i64> {
        match self {
            Value::Int64(v) => Some(*v),
            Value::Bool(b) => Some(if *b { 1 } else { 0 }),
            Value::Date(d) => d
                .and_hms_opt(0, 0, 0)
                .map(|dt| dt.and_utc().timestamp()),
            Value::DateTime(dt) => Some(dt.timestamp()),
            Value::Resource(id) => Some(*id),
            Value::String(_) | Value::Double(_) => None,
        }
    }

    /// Renders a stored integer/text column back into the fixed ISO-8601
    /// format used by `DateTime` properties on read.
    pub fn format_datetime(unix_secs: i64) -> Option<String> {
        DateTime::<Utc>::from_timestamp(unix_secs, 0).map(|dt| dt.format("%Y-%m-%dT%H:%M:%S%z").to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coerces_bool_from_literal() {
        assert_eq!(
            Value::coerce_literal("true", DataType::Bool),
            Ok(Value::Bool(true))
        );
        assert_eq!(
            Value::coerce_literal("0", DataType::Bool),
            Ok(Value::Bool(false))
        );
        assert!(Value::coerce_literal("maybe", DataType::Bool).is_err());
    }

    #[test]
    fn bool_encodes_as_zero_or_one() {
        assert_eq!(Value::Bool(true).as_sql_int(), Some(1));
        assert_eq!(Value::Bool(false).as_sql_int(), Some(0));
    }

    #[test]
    fn datetime_roundtrips_through_unix_seconds() {
        let dt = Value::coerce_literal("2024-03-05T10:15:00+00:00", DataType::DateTime).unwrap();
        let secs = dt.as_sql_int().unwrap();
        let rendered = Value::format_datetime(secs).unwrap();
        assert_eq!(rendered, "2024-03-05T10:15:00+0000");
    }
}
