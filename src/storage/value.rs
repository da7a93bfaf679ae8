//! Value Model
//!
//! Tagged variant over the three shapes a stored value may take, plus the
//! record pairing a value with its absolute expiration second.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A stored value: a free-form JSON scalar, an ordered list, or a
/// string-keyed dictionary.
///
/// Classification of incoming JSON is by shape: arrays become lists, objects
/// become dictionaries, everything else (including nested JSON inside list
/// and dictionary elements) is a scalar.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(serde_json::Value),
    List(Vec<serde_json::Value>),
    Dict(serde_json::Map<String, serde_json::Value>),
}

impl Value {
    /// Classify a JSON value by shape.
    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Array(items) => Value::List(items),
            serde_json::Value::Object(map) => Value::Dict(map),
            other => Value::Scalar(other),
        }
    }

    /// Convert back into plain JSON for the wire.
    pub fn into_json(self) -> serde_json::Value {
        match self {
            Value::Scalar(v) => v,
            Value::List(items) => serde_json::Value::Array(items),
            Value::Dict(map) => serde_json::Value::Object(map),
        }
    }

    /// The wire tag for this variant.
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Scalar(_) => ValueKind::General,
            Value::List(_) => ValueKind::List,
            Value::Dict(_) => ValueKind::Dict,
        }
    }
}

/// Wire tag distinguishing the stored variants in snapshot documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    General,
    List,
    Dict,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::General => write!(f, "general"),
            ValueKind::List => write!(f, "list"),
            ValueKind::Dict => write!(f, "dict"),
        }
    }
}

/// Stored record: a value and its absolute expiration second.
///
/// `expires_at == 0` means the record never expires.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub value: Value,
    pub expires_at: i64,
}

impl Record {
    pub fn new(value: Value, expires_at: i64) -> Self {
        Self { value, expires_at }
    }
}

impl Value {
    /// Convenience constructor used by tests and examples.
    pub fn scalar(value: impl Into<serde_json::Value>) -> Self {
        Value::Scalar(value.into())
    }
}
