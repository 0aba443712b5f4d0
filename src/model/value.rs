//! Semantic field types and the typed values that flow through every layer.

use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldType {
    Identifier,
    String,
    /// Read and written like `String`; never rendered into logs.
    Secret,
    Integer,
    Float,
    Boolean,
    Timestamp,
}

impl FieldType {
    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::Identifier => "identifier",
            FieldType::String => "string",
            FieldType::Secret => "secret",
            FieldType::Integer => "integer",
            FieldType::Float => "float",
            FieldType::Boolean => "boolean",
            FieldType::Timestamp => "timestamp",
        }
    }

    /// Coerce a JSON value into this type. `Null` is handled by the caller.
    pub fn coerce(self, v: &Value) -> Result<FieldValue, String> {
        match (self, v) {
            (FieldType::Identifier, Value::String(s)) => Uuid::parse_str(s.trim())
                .map(FieldValue::Uuid)
                .map_err(|_| "must be a UUID".to_string()),
            (FieldType::String | FieldType::Secret, Value::String(s)) => {
                Ok(FieldValue::Text(s.clone()))
            }
            (FieldType::Integer, Value::Number(n)) => n
                .as_i64()
                .map(FieldValue::Integer)
                .ok_or_else(|| "must be an integer".to_string()),
            (FieldType::Float, Value::Number(n)) => n
                .as_f64()
                .map(FieldValue::Float)
                .ok_or_else(|| "must be a number".to_string()),
            (FieldType::Boolean, Value::Bool(b)) => Ok(FieldValue::Boolean(*b)),
            (FieldType::Timestamp, Value::String(s)) => parse_timestamp(s)
                .map(FieldValue::Timestamp)
                .ok_or_else(|| "must be an RFC 3339 timestamp".to_string()),
            (ty, _) => Err(format!("must be of type {}", ty.as_str())),
        }
    }

    /// Whether a stored value has the shape this type decodes to.
    pub fn accepts(self, v: &FieldValue) -> bool {
        matches!(
            (self, v),
            (_, FieldValue::Null)
                | (FieldType::Identifier, FieldValue::Uuid(_))
                | (FieldType::String | FieldType::Secret, FieldValue::Text(_))
                | (FieldType::Integer, FieldValue::Integer(_))
                | (FieldType::Float, FieldValue::Float(_))
                | (FieldType::Boolean, FieldValue::Boolean(_))
                | (FieldType::Timestamp, FieldValue::Timestamp(_))
        )
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "identifier" | "uuid" => FieldType::Identifier,
            "string" | "str" | "text" => FieldType::String,
            "secret" | "secret_string" | "password" => FieldType::Secret,
            "integer" | "int" => FieldType::Integer,
            "float" | "number" => FieldType::Float,
            "boolean" | "bool" => FieldType::Boolean,
            "timestamp" | "datetime" => FieldType::Timestamp,
            _ => return Err(s.to_string()),
        })
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|n| n.and_utc())
}

/// Current time at the precision SQL timestamp columns keep.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Null,
    Uuid(Uuid),
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Timestamp(DateTime<Utc>),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            FieldValue::Uuid(u) => Some(*u),
            _ => None,
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            FieldValue::Null => serializer.serialize_none(),
            FieldValue::Uuid(u) => serializer.collect_str(u),
            FieldValue::Text(s) => serializer.serialize_str(s),
            FieldValue::Integer(n) => serializer.serialize_i64(*n),
            FieldValue::Float(n) => serializer.serialize_f64(*n),
            FieldValue::Boolean(b) => serializer.serialize_bool(*b),
            FieldValue::Timestamp(t) => serializer.serialize_str(&t.to_rfc3339()),
        }
    }
}
