//! Scalar values shared by expression literals and loaded rows.
//!
//! Loaders translate their backing representation into [`Scalar`] once, at
//! the boundary, so the evaluator only ever compares values from this closed
//! set.

use std::cmp::Ordering;
use std::fmt::{self, Display};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

// ============================================================================
// Scalar
// ============================================================================

/// A single field value.
///
/// `Int` and `Float` are both *numbers*: they compare with each other
/// numerically. Every other pair of distinct variants is a type mismatch.
///
/// On the wire a JSON string is always `Text`. Timestamps are tagged as
/// `{"timestamp": "<RFC 3339>"}` so they never capture a string value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    /// Absence of a value.
    #[default]
    Null,
    /// Boolean flag.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// Point in time.
    #[serde(with = "tagged_timestamp")]
    Timestamp(DateTime<Utc>),
    /// UTF-8 text.
    Text(String),
}

/// Runtime kind of a [`Scalar`], used for type-mismatch detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarKind {
    Null,
    Bool,
    Number,
    Text,
    Timestamp,
}

impl Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScalarKind::Null => "null",
            ScalarKind::Bool => "bool",
            ScalarKind::Number => "number",
            ScalarKind::Text => "text",
            ScalarKind::Timestamp => "timestamp",
        };
        f.write_str(name)
    }
}

impl Scalar {
    /// Returns the runtime kind of this value.
    pub fn kind(&self) -> ScalarKind {
        match self {
            Scalar::Null => ScalarKind::Null,
            Scalar::Bool(_) => ScalarKind::Bool,
            Scalar::Int(_) | Scalar::Float(_) => ScalarKind::Number,
            Scalar::Text(_) => ScalarKind::Text,
            Scalar::Timestamp(_) => ScalarKind::Timestamp,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    /// Value equality within a kind.
    ///
    /// Numbers compare numerically across `Int`/`Float`. Values of different
    /// kinds are never equal. `Null` equals only `Null`.
    pub fn value_eq(&self, other: &Scalar) -> bool {
        match (self, other) {
            (Scalar::Null, Scalar::Null) => true,
            (Scalar::Bool(a), Scalar::Bool(b)) => a == b,
            (Scalar::Int(a), Scalar::Int(b)) => a == b,
            (Scalar::Float(a), Scalar::Float(b)) => a == b,
            (Scalar::Int(a), Scalar::Float(b)) | (Scalar::Float(b), Scalar::Int(a)) => {
                cmp_int_float(*a, *b) == Some(Ordering::Equal)
            }
            (Scalar::Text(a), Scalar::Text(b)) => a == b,
            (Scalar::Timestamp(a), Scalar::Timestamp(b)) => a == b,
            _ => false,
        }
    }

    /// Natural ordering between two values of the same kind.
    ///
    /// Returns `None` when no ordering is defined: booleans, `Null`, NaN, or
    /// values of different kinds.
    pub fn natural_cmp(&self, other: &Scalar) -> Option<Ordering> {
        match (self, other) {
            (Scalar::Int(a), Scalar::Int(b)) => Some(a.cmp(b)),
            (Scalar::Float(a), Scalar::Float(b)) => a.partial_cmp(b),
            (Scalar::Int(a), Scalar::Float(b)) => cmp_int_float(*a, *b),
            (Scalar::Float(a), Scalar::Int(b)) => cmp_int_float(*b, *a).map(Ordering::reverse),
            (Scalar::Text(a), Scalar::Text(b)) => Some(a.cmp(b)),
            (Scalar::Timestamp(a), Scalar::Timestamp(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

/// Exact ordering of an integer against a float.
///
/// Casting the integer to `f64` rounds above 2^53, so the float is split into
/// its integral part (compared as `i64`) and its fraction instead.
#[allow(clippy::cast_possible_truncation)]
fn cmp_int_float(int: i64, float: f64) -> Option<Ordering> {
    // 2^63, the first float above i64::MAX
    const I64_END: f64 = 9_223_372_036_854_775_808.0;

    if float.is_nan() {
        return None;
    }
    if float >= I64_END {
        return Some(Ordering::Less);
    }
    if float < -I64_END {
        return Some(Ordering::Greater);
    }

    let whole = float.trunc();
    match int.cmp(&(whole as i64)) {
        Ordering::Equal if float > whole => Some(Ordering::Less),
        Ordering::Equal if float < whole => Some(Ordering::Greater),
        ordering => Some(ordering),
    }
}

/// Serde adapter for the `{"timestamp": "<RFC 3339>"}` wire form.
mod tagged_timestamp {
    use super::{DateTime, Deserialize, Deserializer, Serialize, Serializer, Utc};

    #[derive(Serialize, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Tagged {
        timestamp: DateTime<Utc>,
    }

    pub fn serialize<S: Serializer>(
        value: &DateTime<Utc>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        Tagged { timestamp: *value }.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        Tagged::deserialize(deserializer).map(|tagged| tagged.timestamp)
    }
}

impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        self.value_eq(other)
    }
}

impl Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => f.write_str("null"),
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Int(i) => write!(f, "{i}"),
            Scalar::Float(x) => write!(f, "{x}"),
            Scalar::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339()),
            Scalar::Text(s) => write!(f, "{s:?}"),
        }
    }
}

// ============================================================================
// Conversions
// ============================================================================

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Text(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Int(value)
    }
}

impl From<i32> for Scalar {
    fn from(value: i32) -> Self {
        Scalar::Int(i64::from(value))
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Float(value)
    }
}

impl From<DateTime<Utc>> for Scalar {
    fn from(value: DateTime<Utc>) -> Self {
        Scalar::Timestamp(value)
    }
}

impl<T: Into<Scalar>> From<Option<T>> for Scalar {
    fn from(value: Option<T>) -> Self {
        value.map_or(Scalar::Null, Into::into)
    }
}

/// Error translating a foreign value into a [`Scalar`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScalarError {
    /// Arrays and objects have no scalar representation.
    #[error("unsupported {0} value; only null, bool, number and string are scalars")]
    Unsupported(&'static str),

    /// A JSON number outside the `i64`/`f64` range.
    #[error("number {0} cannot be represented")]
    Number(String),

    /// A tagged timestamp that is not valid RFC 3339.
    #[error("invalid timestamp {0:?}")]
    Timestamp(String),
}

impl TryFrom<serde_json::Value> for Scalar {
    type Error = ScalarError;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        match value {
            serde_json::Value::Null => Ok(Scalar::Null),
            serde_json::Value::Bool(b) => Ok(Scalar::Bool(b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Scalar::Int(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(Scalar::Float(f))
                } else {
                    Err(ScalarError::Number(n.to_string()))
                }
            }
            serde_json::Value::String(s) => Ok(Scalar::Text(s)),
            serde_json::Value::Array(_) => Err(ScalarError::Unsupported("array")),
            serde_json::Value::Object(map) => match map.get("timestamp") {
                Some(serde_json::Value::String(raw)) if map.len() == 1 => {
                    DateTime::parse_from_rfc3339(raw)
                        .map(|ts| Scalar::Timestamp(ts.with_timezone(&Utc)))
                        .map_err(|_| ScalarError::Timestamp(raw.clone()))
                }
                _ => Err(ScalarError::Unsupported("object")),
            },
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
