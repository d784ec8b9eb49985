//! Value types, runtime values and three-valued boolean logic.
//!
//! The type set is closed: every expression and every dataset column carries
//! exactly one [`ValueType`]. Types are compared by equality, never by any
//! notion of assignability; the only implicit conversion in the engine is the
//! widening of `Int64` to `Float64` in mixed arithmetic and comparisons.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use super::numeric::compare_mixed;

// =============================================================================
// Value types
// =============================================================================

/// Static type of an expression or a column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    /// 64-bit signed integer (printed `Long`).
    #[serde(alias = "integer", alias = "long")]
    Int64,
    /// 64-bit float (printed `Double`).
    #[serde(alias = "number", alias = "double")]
    Float64,
    String,
    Boolean,
    /// Homogeneous list, only produced by list literals.
    List(Box<ValueType>),
    Dataset,
    /// Type of the bare `null` literal before any cast.
    Null,
}

impl ValueType {
    /// `Int64` or `Float64`.
    pub fn is_numeric(&self) -> bool {
        matches!(self, ValueType::Int64 | ValueType::Float64)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ValueType::Null)
    }

    /// Scalar types may be stored in dataset columns.
    pub fn is_scalar(&self) -> bool {
        !matches!(self, ValueType::List(_) | ValueType::Dataset)
    }

    /// Whether a value of type `other` may be compared with a value of this type.
    pub fn is_comparable_with(&self, other: &ValueType) -> bool {
        if !self.is_scalar() || !other.is_scalar() {
            return false;
        }
        self == other || (self.is_numeric() && other.is_numeric())
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Int64 => write!(f, "Long"),
            ValueType::Float64 => write!(f, "Double"),
            ValueType::String => write!(f, "String"),
            ValueType::Boolean => write!(f, "Boolean"),
            ValueType::List(inner) => write!(f, "List<{}>", inner),
            ValueType::Dataset => write!(f, "Dataset"),
            ValueType::Null => write!(f, "Null"),
        }
    }
}

// =============================================================================
// Values
// =============================================================================

/// A runtime scalar value. `Null` is permitted wherever a value is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Boolean(bool),
    Int64(i64),
    Float64(f64),
    String(String),
    List(Vec<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Runtime type of the value; `Null` for null.
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Null => ValueType::Null,
            Value::Boolean(_) => ValueType::Boolean,
            Value::Int64(_) => ValueType::Int64,
            Value::Float64(_) => ValueType::Float64,
            Value::String(_) => ValueType::String,
            Value::List(items) => ValueType::List(Box::new(
                items.first().map(Value::value_type).unwrap_or(ValueType::Null),
            )),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int64(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric value widened to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int64(i) => Some(*i as f64),
            Value::Float64(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Value used for hashing in group-by, join and de-duplication keys.
    pub fn key(&self) -> ValueKey {
        match self {
            Value::Null => ValueKey::Null,
            Value::Boolean(b) => ValueKey::Boolean(*b),
            Value::Int64(i) => ValueKey::Int64(*i),
            // Normalize -0.0 so that it groups with 0.0.
            Value::Float64(f) => ValueKey::Float64(if *f == 0.0 { 0 } else { f.to_bits() }),
            Value::String(s) => ValueKey::String(s.clone()),
            Value::List(items) => ValueKey::List(items.iter().map(Value::key).collect()),
        }
    }

    /// Ordering of two non-null values of comparable types.
    ///
    /// `Int64`/`Float64` mixes are compared exactly, without going through a
    /// lossy float conversion. Returns `None` for incomparable values and NaN.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int64(a), Value::Int64(b)) => Some(a.cmp(b)),
            (Value::Float64(a), Value::Float64(b)) => a.partial_cmp(b),
            (Value::Int64(a), Value::Float64(b)) => compare_mixed(*a, *b),
            (Value::Float64(a), Value::Int64(b)) => compare_mixed(*b, *a).map(Ordering::reverse),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Total order used for sorting: nulls first, then by [`Value::compare`].
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        match (self.is_null(), other.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => self.compare(other).unwrap_or(Ordering::Equal),
        }
    }

    /// Convert a JSON value into a value of the given column type.
    pub fn from_json(json: &serde_json::Value, value_type: &ValueType) -> Result<Value, String> {
        use serde_json::Value as Json;
        match (json, value_type) {
            (Json::Null, _) => Ok(Value::Null),
            (Json::Bool(b), ValueType::Boolean) => Ok(Value::Boolean(*b)),
            (Json::Number(n), ValueType::Int64) => n
                .as_i64()
                .map(Value::Int64)
                .ok_or_else(|| format!("{} is not a Long", n)),
            (Json::Number(n), ValueType::Float64) => n
                .as_f64()
                .map(Value::Float64)
                .ok_or_else(|| format!("{} is not a Double", n)),
            (Json::String(s), ValueType::String) => Ok(Value::String(s.clone())),
            (other, expected) => Err(format!("{} is not a {}", other, expected)),
        }
    }

    /// Check the value against a column type, widening `Int64` into `Float64`.
    pub fn conform(self, value_type: &ValueType) -> Result<Value, ValueType> {
        match (self, value_type) {
            (Value::Null, _) => Ok(Value::Null),
            (Value::Int64(i), ValueType::Float64) => Ok(Value::Float64(i as f64)),
            (value, expected) => {
                let found = value.value_type();
                if &found == expected || expected.is_null() {
                    Ok(value)
                } else {
                    Err(found)
                }
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Int64(i) => write!(f, "{}", i),
            Value::Float64(x) => write!(f, "{:?}", x),
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::List(items) => {
                write!(f, "{{")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Hashable projection of a [`Value`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueKey {
    Null,
    Boolean(bool),
    Int64(i64),
    Float64(u64),
    String(String),
    List(Vec<ValueKey>),
}

// =============================================================================
// Three-valued logic
// =============================================================================

/// Kleene conjunction: `false` dominates, otherwise unknown is contagious.
pub fn kleene_and(left: Option<bool>, right: Option<bool>) -> Option<bool> {
    match (left, right) {
        (Some(false), _) | (_, Some(false)) => Some(false),
        (Some(true), Some(true)) => Some(true),
        _ => None,
    }
}

/// Kleene disjunction: `true` dominates, otherwise unknown is contagious.
pub fn kleene_or(left: Option<bool>, right: Option<bool>) -> Option<bool> {
    match (left, right) {
        (Some(true), _) | (_, Some(true)) => Some(true),
        (Some(false), Some(false)) => Some(false),
        _ => None,
    }
}

pub fn kleene_xor(left: Option<bool>, right: Option<bool>) -> Option<bool> {
    Some(left? ^ right?)
}

pub fn kleene_not(value: Option<bool>) -> Option<bool> {
    value.map(|b| !b)
}
