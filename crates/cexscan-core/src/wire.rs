//! Wire-format adapter for API payloads.
//!
//! The backend serializes documents in MongoDB extended JSON, so scalars may
//! arrive wrapped (`{"$oid": ..}`, `{"$date": ..}`, `{"$numberInt": ..}`).
//! `normalize` unwraps them once at the API boundary; the typed structs and
//! the deserializer helpers below only ever see plain scalars.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Number, Value};

use crate::error::{CoreError, Result};

/// Recursively replace extended-JSON wrappers with plain scalars.
pub fn normalize(value: Value) -> Value {
    match value {
        Value::Object(map) => match unwrap_scalar(&map) {
            Some(scalar) => scalar,
            None => Value::Object(
                map.into_iter()
                    .map(|(key, inner)| (key, normalize(inner)))
                    .collect(),
            ),
        },
        Value::Array(items) => Value::Array(items.into_iter().map(normalize).collect()),
        other => other,
    }
}

/// Unwrap a single-key wrapper object. Returns `None` for ordinary objects.
fn unwrap_scalar(map: &Map<String, Value>) -> Option<Value> {
    if map.len() != 1 {
        return None;
    }
    let (key, inner) = map.iter().next()?;
    match key.as_str() {
        "$oid" => Some(inner.clone()),
        "$numberInt" | "$numberLong" => Some(integer_value(inner)),
        "$numberDouble" | "$numberDecimal" => Some(float_value(inner)),
        "$date" => Some(date_value(inner)),
        _ => None,
    }
}

fn integer_value(inner: &Value) -> Value {
    match inner {
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(|n| Value::Number(n.into()))
            .unwrap_or(Value::Null),
        Value::Number(_) => inner.clone(),
        _ => Value::Null,
    }
}

fn float_value(inner: &Value) -> Value {
    let parsed = match inner {
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    };
    parsed
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

fn date_value(inner: &Value) -> Value {
    match inner {
        Value::String(_) => inner.clone(),
        Value::Number(n) => n
            .as_i64()
            .and_then(millis_to_rfc3339)
            .map(Value::String)
            .unwrap_or(Value::Null),
        Value::Object(map) => match unwrap_scalar(map) {
            Some(Value::Number(n)) => n
                .as_i64()
                .and_then(millis_to_rfc3339)
                .map(Value::String)
                .unwrap_or(Value::Null),
            Some(other) => other,
            None => Value::Null,
        },
        _ => Value::Null,
    }
}

fn millis_to_rfc3339(millis: i64) -> Option<String> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .map(|dt| dt.to_rfc3339())
}

/// Parse a timestamp string leniently.
///
/// Accepts RFC 3339, naive ISO-8601 (treated as UTC) and epoch milliseconds.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(millis) = raw.parse::<i64>() {
        if let Some(dt) = Utc.timestamp_millis_opt(millis).single() {
            return Ok(dt);
        }
    }
    Err(CoreError::InvalidTimestamp(raw.to_string()))
}

/// Deserialize an optional timestamp from a string or epoch milliseconds.
///
/// Unparseable values decode as `None` rather than failing the whole record.
pub fn de_opt_timestamp<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => parse_timestamp(&s).ok(),
        Some(Value::Number(n)) => n
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        _ => None,
    })
}

/// Deserialize an identifier that may be sent as a string or a number.
pub fn de_id<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {other}"
        ))),
    }
}

/// Deserialize a float that may arrive as a number, a numeric string or null.
pub fn de_f64_lenient<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| serde::de::Error::custom("number out of range")),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|e| serde::de::Error::custom(format!("invalid number {s:?}: {e}"))),
        Value::Null => Ok(0.0),
        other => Err(serde::de::Error::custom(format!(
            "expected number, got {other}"
        ))),
    }
}
