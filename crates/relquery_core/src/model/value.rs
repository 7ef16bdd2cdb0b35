//! Runtime values and semantic type markers.
//!
//! # Responsibility
//! - Define the dynamic `Value` exchanged with the store adapter.
//! - Define the compile-time markers (`Int`, `Real`, `Text`, `Bool`) that
//!   tag typed expressions.
//!
//! # Invariants
//! - `Integer` widens to `Real` on read; no other implicit conversion.
//! - `Boolean` is stored as integer `0`/`1` by SQLite and decodes back.

use std::error::Error;
use std::fmt::{Debug, Display, Formatter};

/// Dynamically typed scalar value bound into or read out of statements.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Boolean(bool),
}

impl Value {
    /// Returns the semantic kind, or `None` for `Null`.
    pub fn kind(&self) -> Option<ValueKind> {
        match self {
            Self::Null => None,
            Self::Integer(_) => Some(ValueKind::Integer),
            Self::Real(_) => Some(ValueKind::Real),
            Self::Text(_) => Some(ValueKind::Text),
            Self::Boolean(_) => Some(ValueKind::Boolean),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Real(value) => write!(f, "{value}"),
            Self::Text(value) => write!(f, "{value}"),
            Self::Boolean(value) => write!(f, "{value}"),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Semantic kind of a non-null value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Integer,
    Real,
    Text,
    Boolean,
}

impl ValueKind {
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Integer | Self::Real)
    }

    /// Returns whether a value of kind `source` can be read as `self`.
    pub fn accepts(self, source: ValueKind) -> bool {
        self == source || (self == Self::Real && source == Self::Integer)
    }

    /// Returns whether two operands may meet in a comparison.
    pub fn comparable_with(self, other: ValueKind) -> bool {
        self == other || (self.is_numeric() && other.is_numeric())
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Real => "real",
            Self::Text => "text",
            Self::Boolean => "boolean",
        }
    }
}

impl Display for ValueKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Conversion failure from a runtime `Value` into a native Rust type.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueError {
    pub expected: ValueKind,
    pub found: Value,
}

impl Display for ValueError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.found.kind() {
            Some(kind) => write!(
                f,
                "expected {} value, found {kind} `{}`",
                self.expected, self.found
            ),
            None => write!(f, "expected {} value, found null", self.expected),
        }
    }
}

impl Error for ValueError {}

/// Native decoding from a runtime `Value`.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self, ValueError>;
}

fn mismatch<T>(expected: ValueKind, found: &Value) -> Result<T, ValueError> {
    Err(ValueError {
        expected,
        found: found.clone(),
    })
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self, ValueError> {
        match value {
            Value::Integer(v) => Ok(*v),
            other => mismatch(ValueKind::Integer, other),
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> Result<Self, ValueError> {
        match value {
            Value::Integer(v) => i32::try_from(*v).or_else(|_| mismatch(ValueKind::Integer, value)),
            other => mismatch(ValueKind::Integer, other),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self, ValueError> {
        match value {
            Value::Real(v) => Ok(*v),
            Value::Integer(v) => Ok(*v as f64),
            other => mismatch(ValueKind::Real, other),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, ValueError> {
        match value {
            Value::Text(v) => Ok(v.clone()),
            other => mismatch(ValueKind::Text, other),
        }
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, ValueError> {
        match value {
            Value::Boolean(v) => Ok(*v),
            Value::Integer(0) => Ok(false),
            Value::Integer(1) => Ok(true),
            other => mismatch(ValueKind::Boolean, other),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self, ValueError> {
        if value.is_null() {
            return Ok(None);
        }
        T::from_value(value).map(Some)
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self, ValueError> {
        Ok(value.clone())
    }
}

/// Compile-time semantic type carried by `Expr<T>`.
pub trait SqlType: 'static {
    const KIND: ValueKind;
    type Native: FromValue + Into<Value> + Clone + Debug;
}

/// Marker for types that support arithmetic, ranges and averages.
pub trait Numeric: SqlType {}

/// Marker for types that support `max`/`min`.
pub trait Comparable: SqlType {}

/// 64-bit integer column type.
#[derive(Debug)]
pub enum Int {}

/// Double precision floating point column type.
#[derive(Debug)]
pub enum Real {}

/// UTF-8 text column type.
#[derive(Debug)]
pub enum Text {}

/// Boolean column type.
#[derive(Debug)]
pub enum Bool {}

impl SqlType for Int {
    const KIND: ValueKind = ValueKind::Integer;
    type Native = i64;
}

impl SqlType for Real {
    const KIND: ValueKind = ValueKind::Real;
    type Native = f64;
}

impl SqlType for Text {
    const KIND: ValueKind = ValueKind::Text;
    type Native = String;
}

impl SqlType for Bool {
    const KIND: ValueKind = ValueKind::Boolean;
    type Native = bool;
}

impl Numeric for Int {}
impl Numeric for Real {}
impl Comparable for Int {}
impl Comparable for Real {}
impl Comparable for Text {}
