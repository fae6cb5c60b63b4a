//! Per-field JSON validators shared by the request-body parsers.
//!
//! Each helper checks one value against its declared column constraint and
//! names the field in the error so callers can report it verbatim.

use chrono::{DateTime, NaiveTime, Utc};
use serde_json::Value;

use crate::{Error, Result};

/// A parsed JSON request body.
pub type Body = serde_json::Map<String, Value>;

pub fn string(field: &str, value: &Value) -> Result<String> {
  match value {
    Value::String(s) => Ok(s.clone()),
    _ => Err(Error::invalid(field, "must be a string")),
  }
}

pub fn string_or_null(field: &str, value: &Value) -> Result<Option<String>> {
  match value {
    Value::Null => Ok(None),
    _ => string(field, value).map(Some),
  }
}

pub fn bool_or_null(field: &str, value: &Value) -> Result<Option<bool>> {
  match value {
    Value::Null => Ok(None),
    Value::Bool(b) => Ok(Some(*b)),
    _ => Err(Error::invalid(field, "must be a boolean or null")),
  }
}

pub fn integer(field: &str, value: &Value) -> Result<i64> {
  value
    .as_i64()
    .ok_or_else(|| Error::invalid(field, "must be an integer"))
}

pub fn timestamp_or_null(
  field: &str,
  value: &Value,
) -> Result<Option<DateTime<Utc>>> {
  match value {
    Value::Null => Ok(None),
    Value::String(s) => DateTime::parse_from_rfc3339(s)
      .map(|dt| Some(dt.with_timezone(&Utc)))
      .map_err(|_| Error::invalid(field, "must be an RFC 3339 timestamp")),
    _ => Err(Error::invalid(field, "must be an RFC 3339 timestamp or null")),
  }
}

/// `HH:MM:SS` with optional fractional seconds.
pub fn time_of_day(field: &str, value: &Value) -> Result<NaiveTime> {
  let Value::String(s) = value else {
    return Err(Error::invalid(field, "must be a time string like `00:00:05`"));
  };
  NaiveTime::parse_from_str(s, "%H:%M:%S%.f")
    .map_err(|_| Error::invalid(field, "must be a time string like `00:00:05`"))
}

pub fn read_only(field: &str) -> Error {
  Error::invalid(field, "field is read-only")
}

pub fn unknown(field: &str) -> Error { Error::invalid(field, "unknown field") }

pub fn missing(field: &str) -> Error {
  Error::invalid(field, "missing required field")
}
