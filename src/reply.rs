use crate::value::{Number, Value};

/// The Redis-shaped return value of one command invocation.
///
/// A transaction aggregates one `Reply` per queued command, preserving
/// input order.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// The Redis nil: absent key, wrong-typed value, expired record.
    Nil,
    Bool(bool),
    Int(i64),
    Value(Value),
    Array(Vec<Reply>),
}

impl Reply {
    /// Shapes a decoded number the way Redis integer replies read.
    pub(crate) fn from_number(number: Number) -> Self {
        match number.as_i64() {
            Some(n) => Reply::Int(n),
            None => Reply::Value(Value::Number(number)),
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Reply::Nil)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Reply::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Reply::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Reply::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Reply]> {
        match self {
            Reply::Array(replies) => Some(replies),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_value().and_then(Value::as_str)
    }
}
