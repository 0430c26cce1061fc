//! AMQP values as seen by the management layer.
//!
//! Only the subset of the AMQP type system that management requests and
//! replies carry is modelled here. Encoding to and from the wire is the
//! job of the underlying AMQP stack.

use std::fmt;

/// An AMQP value.
#[derive(Debug, Clone, PartialEq)]
pub enum AmqpValue {
    /// The null value
    Null,
    /// Boolean
    Boolean(bool),
    /// Signed 32-bit integer
    Int(i32),
    /// Signed 64-bit integer
    Long(i64),
    /// Unsigned 32-bit integer
    Uint(u32),
    /// Unsigned 64-bit integer
    Ulong(u64),
    /// UTF-8 string
    String(String),
    /// Symbolic value from a constrained domain
    Symbol(String),
    /// Ordered map with unique keys
    Map(Vec<(AmqpValue, AmqpValue)>),
}

impl AmqpValue {
    /// Create a string value
    pub fn string(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }

    /// Create an empty map
    pub fn empty_map() -> Self {
        Self::Map(Vec::new())
    }

    /// Check whether this value is a map
    pub fn is_map(&self) -> bool {
        matches!(self, Self::Map(_))
    }

    /// Get the entry stored under `key`.
    ///
    /// Returns `None` when `self` is not a map or holds no such key.
    pub fn get_map_value(&self, key: &AmqpValue) -> Option<&AmqpValue> {
        match self {
            Self::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Get the entry stored under the string key `key`
    pub fn get_by_str(&self, key: &str) -> Option<&AmqpValue> {
        self.get_map_value(&AmqpValue::string(key))
    }

    /// Insert or replace a map entry.
    ///
    /// Returns `false` when `self` is not a map.
    pub fn set_map_value(&mut self, key: AmqpValue, value: AmqpValue) -> bool {
        match self {
            Self::Map(entries) => {
                match entries.iter_mut().find(|(k, _)| *k == key) {
                    Some(entry) => entry.1 = value,
                    None => entries.push((key, value)),
                }
                true
            },
            _ => false,
        }
    }

    /// Number of map entries (0 for non-map values)
    pub fn map_len(&self) -> usize {
        match self {
            Self::Map(entries) => entries.len(),
            _ => 0,
        }
    }

    /// Read an `int` value
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Read a `ulong` value
    pub fn as_ulong(&self) -> Option<u64> {
        match self {
            Self::Ulong(v) => Some(*v),
            _ => None,
        }
    }

    /// Read a `string` value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }
}

impl From<&str> for AmqpValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for AmqpValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i32> for AmqpValue {
    fn from(value: i32) -> Self {
        Self::Int(value)
    }
}

impl From<u64> for AmqpValue {
    fn from(value: u64) -> Self {
        Self::Ulong(value)
    }
}

impl fmt::Display for AmqpValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Boolean(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Long(v) => write!(f, "{v}L"),
            Self::Uint(v) => write!(f, "{v}u"),
            Self::Ulong(v) => write!(f, "{v}UL"),
            Self::String(v) => write!(f, "\"{v}\""),
            Self::Symbol(v) => write!(f, ":{v}"),
            Self::Map(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            },
        }
    }
}
