//! Conversion of raw source values into staging values
//!
//! Temporal values are always interpreted in UTC.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use std::fmt;
use tabload_core::Value;

use crate::model::{FieldSpec, FieldType};
use crate::{ImportError, Result};

/// 1582-10-15 00:00:00 UTC, the earliest instant written as a real date
const CALENDAR_FLOOR_SECS: i64 = -12_219_292_800;

const ZERO_DATE: &str = "0000-00-00";
const ZERO_DATETIME: &str = "0000-00-00 00:00:00";

/// A value ready to be written to the staging file
#[derive(Debug, Clone, PartialEq)]
pub enum StagingValue {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl StagingValue {
    pub fn is_null(&self) -> bool {
        matches!(self, StagingValue::Null)
    }

    /// Bytes written to the staging file, `None` for NULL
    pub fn to_bytes(&self) -> Option<Vec<u8>> {
        match self {
            StagingValue::Null => None,
            StagingValue::Bytes(b) => Some(b.clone()),
            other => Some(other.to_string().into_bytes()),
        }
    }
}

impl fmt::Display for StagingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StagingValue::Null => f.write_str("NULL"),
            StagingValue::Integer(v) => write!(f, "{}", v),
            StagingValue::Float(v) => write!(f, "{}", v),
            StagingValue::Text(v) => f.write_str(v),
            StagingValue::Bytes(v) => f.write_str(&String::from_utf8_lossy(v)),
        }
    }
}

impl From<&str> for StagingValue {
    fn from(value: &str) -> Self {
        StagingValue::Text(value.to_string())
    }
}

impl From<i64> for StagingValue {
    fn from(value: i64) -> Self {
        StagingValue::Integer(value)
    }
}

/// Convert `raw` for the column described by `spec`
pub fn convert(raw: Value, spec: &FieldSpec) -> Result<StagingValue> {
    let name = spec.target_name.as_str();
    if raw.is_null() {
        if spec.nullable {
            return Ok(StagingValue::Null);
        }
        return Err(ImportError::data(name, "NULL", "field is not nullable"));
    }

    match spec.field_type {
        FieldType::Integer => to_integer(name, raw),
        FieldType::Float => to_float(name, raw).map(StagingValue::Float),
        FieldType::Boolean => to_boolean(name, raw),
        FieldType::String | FieldType::Text | FieldType::Blob => Ok(to_text(raw)),
        FieldType::Date | FieldType::DateTime => {
            let instant = to_timestamp(name, &raw)?;
            if instant.timestamp() < CALENDAR_FLOOR_SECS {
                if spec.nullable {
                    return Ok(StagingValue::Null);
                }
                let sentinel = if spec.field_type == FieldType::DateTime {
                    ZERO_DATETIME
                } else {
                    ZERO_DATE
                };
                return Ok(sentinel.into());
            }
            let format = if spec.field_type == FieldType::DateTime {
                "%Y-%m-%d %H:%M:%S"
            } else {
                "%Y-%m-%d"
            };
            Ok(StagingValue::Text(instant.format(format).to_string()))
        }
        FieldType::Time => {
            let time = match raw {
                Value::Time(t) => t,
                other => to_timestamp(name, &other)?.time(),
            };
            Ok(StagingValue::Text(time.format("%H:%M:%S").to_string()))
        }
    }
}

fn to_integer(name: &str, raw: Value) -> Result<StagingValue> {
    match raw {
        Value::Bool(b) => Ok(StagingValue::Integer(i64::from(b))),
        Value::Int64(v) => Ok(StagingValue::Integer(v)),
        // BIGINT UNSIGNED values above i64::MAX are kept as digits
        Value::UInt64(v) => Ok(i64::try_from(v)
            .map(StagingValue::Integer)
            .unwrap_or_else(|_| StagingValue::Text(v.to_string()))),
        Value::Float64(v) => truncate(name, v).map(StagingValue::Integer),
        Value::String(s) | Value::Decimal(s) => parse_integer(name, &s).map(StagingValue::Integer),
        Value::Bytes(b) => match String::from_utf8(b) {
            Ok(s) => parse_integer(name, &s).map(StagingValue::Integer),
            Err(_) => Err(ImportError::data(name, "<binary>", "not an integer")),
        },
        other => Err(ImportError::data(name, &other, "not an integer")),
    }
}

fn parse_integer(name: &str, s: &str) -> Result<i64> {
    let trimmed = s.trim();
    if let Ok(v) = trimmed.parse::<i64>() {
        return Ok(v);
    }
    match trimmed.parse::<f64>() {
        Ok(v) => truncate(name, v),
        Err(_) => Err(ImportError::data(name, s, "not an integer")),
    }
}

fn truncate(name: &str, v: f64) -> Result<i64> {
    if v.is_finite() && v >= i64::MIN as f64 && v <= i64::MAX as f64 {
        Ok(v.trunc() as i64)
    } else {
        Err(ImportError::data(name, v, "out of integer range"))
    }
}

fn to_float(name: &str, raw: Value) -> Result<f64> {
    match raw {
        Value::Bool(b) => Ok(if b { 1.0 } else { 0.0 }),
        Value::Int64(v) => Ok(v as f64),
        Value::UInt64(v) => Ok(v as f64),
        Value::Float64(v) => Ok(v),
        Value::String(s) | Value::Decimal(s) => parse_float(name, &s),
        Value::Bytes(b) => match String::from_utf8(b) {
            Ok(s) => parse_float(name, &s),
            Err(_) => Err(ImportError::data(name, "<binary>", "not a number")),
        },
        other => Err(ImportError::data(name, &other, "not a number")),
    }
}

fn parse_float(name: &str, s: &str) -> Result<f64> {
    s.trim()
        .parse::<f64>()
        .map_err(|_| ImportError::data(name, s, "not a number"))
}

fn to_boolean(name: &str, raw: Value) -> Result<StagingValue> {
    let truth = match raw {
        Value::Bool(b) => b,
        Value::Int64(v) => v != 0,
        Value::UInt64(v) => v != 0,
        Value::Float64(v) => v != 0.0,
        Value::String(s) | Value::Decimal(s) => match s.trim().to_ascii_lowercase().as_str() {
            "" | "0" | "false" | "no" | "off" => false,
            "1" | "true" | "yes" | "on" => true,
            other => match other.parse::<f64>() {
                Ok(v) => v != 0.0,
                Err(_) => return Err(ImportError::data(name, &s, "not a boolean")),
            },
        },
        other => return Err(ImportError::data(name, &other, "not a boolean")),
    };
    Ok(StagingValue::Integer(i64::from(truth)))
}

fn to_text(raw: Value) -> StagingValue {
    match raw {
        Value::Null => StagingValue::Null,
        Value::Bool(b) => StagingValue::Text(if b { "1" } else { "" }.to_string()),
        Value::Bytes(b) => StagingValue::Bytes(b),
        Value::Date(d) => StagingValue::Text(d.format("%Y-%m-%d").to_string()),
        Value::Time(t) => StagingValue::Text(t.format("%H:%M:%S").to_string()),
        Value::DateTime(dt) => StagingValue::Text(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
        Value::DateTimeUtc(dt) => StagingValue::Text(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
        other => StagingValue::Text(other.to_string()),
    }
}

fn to_timestamp(name: &str, raw: &Value) -> Result<DateTime<Utc>> {
    let parsed = match raw {
        Value::Date(d) => d.and_hms_opt(0, 0, 0).map(|n| n.and_utc()),
        Value::DateTime(n) => Some(n.and_utc()),
        Value::DateTimeUtc(dt) => Some(*dt),
        Value::Time(t) => Some(Utc::now().date_naive().and_time(*t).and_utc()),
        Value::Int64(secs) => Utc.timestamp_opt(*secs, 0).single(),
        Value::String(s) => parse_timestamp_text(s),
        Value::Bytes(b) => std::str::from_utf8(b).ok().and_then(parse_timestamp_text),
        _ => None,
    };
    parsed.ok_or_else(|| ImportError::data(name, raw, "not a valid date/time"))
}

/// Zero dates such as `0000-00-00` map to an instant before the calendar floor
fn parse_timestamp_text(s: &str) -> Option<DateTime<Utc>> {
    parse_utc_timestamp(s).or_else(|| is_zero_date(s).then_some(DateTime::<Utc>::MIN_UTC))
}

/// A `Y-m-d` date part with a zero year, month or day
fn is_zero_date(s: &str) -> bool {
    let date = s.trim().split([' ', 'T']).next().unwrap_or_default();
    let parts: Vec<&str> = date.split('-').collect();
    parts.len() == 3
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()))
        && parts.iter().any(|p| p.bytes().all(|b| b == b'0'))
}

/// Parse a date/time string as an instant in UTC.
///
/// Accepts RFC 3339, `Y-m-d H:i:s[.f]` (with a space or `T`), `Y-m-d H:i`,
/// `Y-m-d`, a bare time (on today's date) and `@<unix seconds>`.
pub fn parse_utc_timestamp(input: &str) -> Option<DateTime<Utc>> {
    let s = input.trim();
    if let Some(secs) = s.strip_prefix('@') {
        return secs
            .parse::<i64>()
            .ok()
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(n) = NaiveDateTime::parse_from_str(s, format) {
            return Some(n.and_utc());
        }
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return d.and_hms_opt(0, 0, 0).map(|n| n.and_utc());
    }
    for format in ["%H:%M:%S%.f", "%H:%M"] {
        if let Ok(t) = NaiveTime::parse_from_str(s, format) {
            return Some(Utc::now().date_naive().and_time(t).and_utc());
        }
    }
    None
}
