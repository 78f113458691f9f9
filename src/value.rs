//! Cell values - the dynamically-typed contents of one record column
//!
//! Every column of every table stores one of five primitive shapes:
//! - `Null`: explicit "no value"
//! - `Integer`: identifiers, counts, unix-epoch timestamps
//! - `Real`: quantities and nutrient amounts
//! - `Text`: names, notes, ISO dates, unit abbreviations
//! - `Boolean`: flags (stored as 0/1 in the store)
//!
//! The semantic column type (see [`crate::schema::ColumnType`]) decides which
//! shape a column is allowed to hold; `Value` itself is deliberately dumb.

/// A single cell value of an entity record.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Explicit absence of a value
    Null,
    /// Integer payload (also backs identifiers and timestamps)
    Integer(i64),
    /// Floating-point payload
    Real(f64),
    /// Text payload (also backs ISO dates)
    Text(String),
    /// Boolean payload
    Boolean(bool),
}

impl Value {
    /// Check whether this is the explicit "no value" marker
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Name of the payload shape, for error reporting
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::Text(_) => "text",
            Value::Boolean(_) => "boolean",
        }
    }

    /// Integer payload, if present
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Real payload, if present
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Real(r) => Some(*r),
            _ => None,
        }
    }

    /// Text payload, if present
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Boolean payload, if present
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Real(r) => write!(f, "{}", r),
            Value::Text(s) => write!(f, "{}", s),
            Value::Boolean(b) => write!(f, "{}", b),
        }
    }
}

/// Conversion between Rust values and cell values.
///
/// Implemented for the four payload types a typed column handle can carry.
/// `from_value` returns `None` for `Null` or for a mismatched shape; the
/// storage adapter guarantees shape by converting rows type-directed, so a
/// mismatch on a typed read means the caller picked the wrong value type.
pub trait ColumnValue: Clone {
    /// Wrap a Rust value as a cell value
    fn into_value(self) -> Value;
    /// Extract a Rust value from a cell value
    fn from_value(value: &Value) -> Option<Self>;
}

impl ColumnValue for i64 {
    fn into_value(self) -> Value {
        Value::Integer(self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_i64()
    }
}

impl ColumnValue for f64 {
    fn into_value(self) -> Value {
        Value::Real(self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_f64()
    }
}

impl ColumnValue for String {
    fn into_value(self) -> Value {
        Value::Text(self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_str().map(str::to_string)
    }
}

impl ColumnValue for bool {
    fn into_value(self) -> Value {
        Value::Boolean(self)
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_bool()
    }
}
