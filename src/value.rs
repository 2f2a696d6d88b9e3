//! The session value type.
//!
//! `SessionValue` is what the store maps keys to: an owned tree of scalars,
//! sequences, and string-keyed mappings that survives the binary round trip
//! unchanged. Conversions to and from `serde_json::Value` are provided so
//! callers can seed sessions from JSON payloads.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum SessionValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Seq(Vec<SessionValue>),
    Map(BTreeMap<String, SessionValue>),
}

impl SessionValue {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(value) => Some(*value),
            Self::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_seq(&self) -> Option<&[SessionValue]> {
        match self {
            Self::Seq(values) => Some(values),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_map(&self) -> Option<&BTreeMap<String, SessionValue>> {
        match self {
            Self::Map(entries) => Some(entries),
            _ => None,
        }
    }
}

impl From<bool> for SessionValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for SessionValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for SessionValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for SessionValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for SessionValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for SessionValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<SessionValue>> for SessionValue {
    fn from(values: Vec<SessionValue>) -> Self {
        Self::Seq(values)
    }
}

impl From<BTreeMap<String, SessionValue>> for SessionValue {
    fn from(entries: BTreeMap<String, SessionValue>) -> Self {
        Self::Map(entries)
    }
}

impl From<serde_json::Value> for SessionValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(value) => Self::Bool(value),
            serde_json::Value::Number(number) => match number.as_i64() {
                Some(value) => Self::Int(value),
                // u64 overflow and fractional numbers both land on Float.
                None => Self::Float(number.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(value) => Self::Text(value),
            serde_json::Value::Array(values) => {
                Self::Seq(values.into_iter().map(SessionValue::from).collect())
            }
            serde_json::Value::Object(entries) => Self::Map(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, SessionValue::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<SessionValue> for serde_json::Value {
    fn from(value: SessionValue) -> Self {
        match value {
            SessionValue::Null => serde_json::Value::Null,
            SessionValue::Bool(value) => serde_json::Value::Bool(value),
            SessionValue::Int(value) => serde_json::Value::from(value),
            SessionValue::Float(value) => serde_json::Value::from(value),
            SessionValue::Text(value) => serde_json::Value::String(value),
            SessionValue::Seq(values) => serde_json::Value::Array(
                values.into_iter().map(serde_json::Value::from).collect(),
            ),
            SessionValue::Map(entries) => serde_json::Value::Object(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, serde_json::Value::from(value)))
                    .collect(),
            ),
        }
    }
}
