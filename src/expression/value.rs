//! Typed values flowing through expressions, and the parameter binding seam.

use super::evaluator::EvalError;
use crate::types::{IndexedValue, SequencedValue, Timestamp, Timestamped};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Static type of an expression.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Bool,
    Int,
    Decimal,
    String,
    Timestamp,
    /// An application record, accessed through its members.
    Record(String),
}

impl DataType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Int | DataType::Decimal)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Bool => f.write_str("bool"),
            DataType::Int => f.write_str("int"),
            DataType::Decimal => f.write_str("decimal"),
            DataType::String => f.write_str("string"),
            DataType::Timestamp => f.write_str("timestamp"),
            DataType::Record(name) => write!(f, "record {}", name),
        }
    }
}

/// A scalar produced or consumed by an evaluation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Decimal(f64),
    String(String),
    Timestamp(Timestamp),
}

impl Value {
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Bool(_) => DataType::Bool,
            Value::Int(_) => DataType::Int,
            Value::Decimal(_) => DataType::Decimal,
            Value::String(_) => DataType::String,
            Value::Timestamp(_) => DataType::Timestamp,
        }
    }
}

impl Timestamped for Value {
    fn timestamp(&self) -> Timestamp {
        match self {
            Value::Timestamp(t) => *t,
            _ => Timestamp::NotADateTime,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Decimal(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "\"{}\"", v),
            Value::Timestamp(v) => write!(f, "{}", v),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Decimal(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<Timestamp> for Value {
    fn from(v: Timestamp) -> Self {
        Value::Timestamp(v)
    }
}

/// Something that can be bound to an evaluator's parameter slot.
///
/// Scalars expose themselves through `as_value`; records expose named
/// members for `MemberAccess` expressions.
pub trait Bindable {
    fn member(&self, _name: &str) -> Option<Value> {
        None
    }

    fn as_value(&self) -> Option<Value> {
        None
    }
}

impl Bindable for Value {
    fn as_value(&self) -> Option<Value> {
        Some(self.clone())
    }
}

macro_rules! scalar_bindable {
    ($($t:ty),*) => {
        $(
            impl Bindable for $t {
                fn as_value(&self) -> Option<Value> {
                    Some(Value::from(self.clone()))
                }
            }
        )*
    };
}

scalar_bindable!(bool, i64, i32, f64, String, &str, Timestamp);

impl<T: Bindable> Bindable for SequencedValue<T> {
    fn member(&self, name: &str) -> Option<Value> {
        self.value.member(name)
    }

    fn as_value(&self) -> Option<Value> {
        self.value.as_value()
    }
}

impl<T: Bindable, I> Bindable for IndexedValue<T, I> {
    fn member(&self, name: &str) -> Option<Value> {
        self.value.member(name)
    }

    fn as_value(&self) -> Option<Value> {
        self.value.as_value()
    }
}

/// Conversion from an evaluation result to a concrete Rust type.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self, EvalError>;
}

fn mismatch(expected: DataType, value: &Value) -> EvalError {
    EvalError::TypeMismatch {
        expected: expected.to_string(),
        found: value.data_type().to_string(),
    }
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self, EvalError> {
        Ok(value)
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self, EvalError> {
        match value {
            Value::Bool(v) => Ok(v),
            other => Err(mismatch(DataType::Bool, &other)),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: Value) -> Result<Self, EvalError> {
        match value {
            Value::Int(v) => Ok(v),
            other => Err(mismatch(DataType::Int, &other)),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self, EvalError> {
        match value {
            Value::Decimal(v) => Ok(v),
            Value::Int(v) => Ok(v as f64),
            other => Err(mismatch(DataType::Decimal, &other)),
        }
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self, EvalError> {
        match value {
            Value::String(v) => Ok(v),
            other => Err(mismatch(DataType::String, &other)),
        }
    }
}

impl FromValue for Timestamp {
    fn from_value(value: Value) -> Result<Self, EvalError> {
        match value {
            Value::Timestamp(v) => Ok(v),
            other => Err(mismatch(DataType::Timestamp, &other)),
        }
    }
}
