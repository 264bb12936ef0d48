use std::fmt;

use chrono::{DateTime, Utc};
use factscript::ValueType;

/// A concrete value held in a scope during execution.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeValue {
    String(String),
    Integer(i64),
    Timestamp(DateTime<Utc>),
}

impl RuntimeValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            RuntimeValue::String(_) => ValueType::String,
            RuntimeValue::Integer(_) => ValueType::Integer,
            RuntimeValue::Timestamp(_) => ValueType::Timestamp,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            RuntimeValue::Integer(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for RuntimeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeValue::String(s) => write!(f, "{}", s),
            RuntimeValue::Integer(n) => write!(f, "{}", n),
            RuntimeValue::Timestamp(t) => write!(f, "{}", t.format("%Y-%m-%d %H:%M:%S UTC")),
        }
    }
}

impl From<String> for RuntimeValue {
    fn from(s: String) -> Self {
        RuntimeValue::String(s)
    }
}

impl From<&str> for RuntimeValue {
    fn from(s: &str) -> Self {
        RuntimeValue::String(s.to_string())
    }
}

impl From<i64> for RuntimeValue {
    fn from(n: i64) -> Self {
        RuntimeValue::Integer(n)
    }
}

impl From<DateTime<Utc>> for RuntimeValue {
    fn from(t: DateTime<Utc>) -> Self {
        RuntimeValue::Timestamp(t)
    }
}
