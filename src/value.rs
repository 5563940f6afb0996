use std::collections::HashMap;
use std::fmt;

use bytes::Bytes;
use thiserror::Error;

/// Errors raised while constructing a typed set.
#[derive(Error, Debug, PartialEq)]
pub enum SetError {
    /// Every member of a set must share the type of the first member.
    #[error("expected every set member to be a {expected}, but member {index} is a {found}")]
    MixedMembers {
        expected: &'static str,
        found: &'static str,
        index: usize,
    },
    #[error("expected at least one set member")]
    Empty,
}

/// A numeric value, kept as either an integer or a floating value.
///
/// Numbers travel over the wire as decimal text. Decoding re-parses the
/// text as an integer when it carries no `.` and as a float otherwise,
/// so values that only print in exponent notation (or need more than
/// f64 precision) do not survive a round trip. This mirrors the wire
/// format of the backing table and is a documented limitation rather
/// than something to fix locally.
#[derive(Debug, Clone, Copy)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    /// Parses canonical decimal text into a number.
    ///
    /// Text without a `.` is read as an integer first, falling back to
    /// a float for magnitudes outside the i64 range.
    pub fn parse(text: &str) -> Result<Self, std::num::ParseFloatError> {
        if !text.contains('.') {
            if let Ok(n) = text.parse::<i64>() {
                return Ok(Number::Int(n));
            }
        }
        text.parse::<f64>().map(Number::Float)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Number::Int(n) => Some(*n),
            Number::Float(f) if f.fract() == 0.0 && f.abs() < (i64::MAX as f64) => Some(*f as i64),
            Number::Float(_) => None,
        }
    }

    pub fn as_f64(&self) -> f64 {
        match self {
            Number::Int(n) => *n as f64,
            Number::Float(f) => *f,
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(n) => write!(f, "{}", n),
            Number::Float(n) => write!(f, "{}", n),
        }
    }
}

impl PartialEq for Number {
    /// Integers and floats compare by numeric value, matching the
    /// single number type of the wire format. `Int(2) == Float(2.0)`.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => a == b,
            _ => self.as_f64() == other.as_f64(),
        }
    }
}

impl From<i64> for Number {
    fn from(n: i64) -> Self {
        Number::Int(n)
    }
}

impl From<f64> for Number {
    fn from(n: f64) -> Self {
        Number::Float(n)
    }
}

/// The member type shared by every element of one typed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetKind {
    String,
    Number,
    Bytes,
}

impl SetKind {
    /// The wire discriminator for a set of this kind.
    pub fn tag(&self) -> &'static str {
        match self {
            SetKind::String => "SS",
            SetKind::Number => "NS",
            SetKind::Bytes => "BS",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SetKind::String => "string",
            SetKind::Number => "number",
            SetKind::Bytes => "byte string",
        }
    }
}

/// One member of a typed set: a string, a number or a byte string.
#[derive(Debug, Clone, PartialEq)]
pub enum SetMember {
    String(String),
    Number(Number),
    Bytes(Bytes),
}

impl SetMember {
    pub fn kind(&self) -> SetKind {
        match self {
            SetMember::String(_) => SetKind::String,
            SetMember::Number(_) => SetKind::Number,
            SetMember::Bytes(_) => SetKind::Bytes,
        }
    }
}

impl From<&str> for SetMember {
    fn from(s: &str) -> Self {
        SetMember::String(s.to_string())
    }
}

impl From<String> for SetMember {
    fn from(s: String) -> Self {
        SetMember::String(s)
    }
}

impl From<i64> for SetMember {
    fn from(n: i64) -> Self {
        SetMember::Number(Number::Int(n))
    }
}

impl From<f64> for SetMember {
    fn from(n: f64) -> Self {
        SetMember::Number(Number::Float(n))
    }
}

impl From<Bytes> for SetMember {
    fn from(b: Bytes) -> Self {
        SetMember::Bytes(b)
    }
}

/// A homogeneous set of strings, numbers or byte strings.
///
/// The member type is declared by the first member, and construction
/// fails before anything reaches the codec if a later member disagrees.
#[derive(Debug, Clone)]
pub struct ValueSet {
    kind: SetKind,
    members: Vec<SetMember>,
}

impl ValueSet {
    /// Builds a set from members, validating homogeneity.
    ///
    /// # Returns
    ///
    /// * `Ok(ValueSet)` - All members share the type of the first member
    /// * `Err(SetError::Empty)` - No members were given
    /// * `Err(SetError::MixedMembers)` - A member disagrees with the declared type
    pub fn new(members: Vec<SetMember>) -> Result<Self, SetError> {
        let first = members.first().ok_or(SetError::Empty)?;
        let kind = first.kind();

        for (index, member) in members.iter().enumerate() {
            if member.kind() != kind {
                return Err(SetError::MixedMembers {
                    expected: kind.name(),
                    found: member.kind().name(),
                    index,
                });
            }
        }

        Ok(ValueSet { kind, members })
    }

    pub fn kind(&self) -> SetKind {
        self.kind
    }

    pub fn members(&self) -> &[SetMember] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, member: &SetMember) -> bool {
        self.members.iter().any(|m| m == member)
    }
}

impl PartialEq for ValueSet {
    /// Sets compare by member-set equality; member order is not significant.
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.members.len() == other.members.len()
            && self.members.iter().all(|m| other.contains(m))
    }
}

/// An in-memory value: the full domain a stored record can hold.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Number(Number),
    Bool(bool),
    Null,
    Bytes(Bytes),
    List(Vec<Value>),
    Map(HashMap<String, Value>),
    Set(ValueSet),
}

impl Value {
    /// Builds a homogeneous set value, failing on mixed member types.
    pub fn set<I, M>(members: I) -> Result<Self, SetError>
    where
        I: IntoIterator<Item = M>,
        M: Into<SetMember>,
    {
        ValueSet::new(members.into_iter().map(Into::into).collect()).map(Value::Set)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<Number> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(elements) => Some(elements),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&HashMap<String, Value>> {
        match self {
            Value::Map(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn as_set(&self) -> Option<&ValueSet> {
        match self {
            Value::Set(set) => Some(set),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(Number::Int(n))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(Number::Float(n))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Bytes> for Value {
    fn from(b: Bytes) -> Self {
        Value::Bytes(b)
    }
}

impl From<SetMember> for Value {
    fn from(member: SetMember) -> Self {
        match member {
            SetMember::String(s) => Value::String(s),
            SetMember::Number(n) => Value::Number(n),
            SetMember::Bytes(b) => Value::Bytes(b),
        }
    }
}
