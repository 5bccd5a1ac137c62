use std::cmp::Ordering;
use std::fmt;

use crate::common::{MiniError, Result};

use super::DataType;

/// A typed field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i32),
    Float(f32),
    Char(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Whether this value can be stored in a column of `data_type`.
    /// Null passes every type; nullability is checked at the schema level.
    pub fn matches_type(&self, data_type: &DataType) -> bool {
        match (self, data_type) {
            (Value::Null, _) => true,
            (Value::Int(_), DataType::Int) => true,
            (Value::Float(_), DataType::Float) => true,
            (Value::Char(s), DataType::Char(n)) => s.as_bytes().len() <= *n as usize,
            _ => false,
        }
    }

    /// Serializes a non-null value to its fixed on-disk width. CHAR pads
    /// with NUL bytes up to the declared length.
    pub fn serialize(&self, data_type: &DataType) -> Result<Vec<u8>> {
        match (self, data_type) {
            (Value::Int(v), DataType::Int) => Ok(v.to_le_bytes().to_vec()),
            (Value::Float(v), DataType::Float) => Ok(v.to_le_bytes().to_vec()),
            (Value::Char(s), DataType::Char(n)) => {
                let n = *n as usize;
                let bytes = s.as_bytes();
                if bytes.len() > n {
                    return Err(MiniError::SchemaViolation(format!(
                        "string of {} bytes exceeds CHAR({})",
                        bytes.len(),
                        n
                    )));
                }
                let mut out = bytes.to_vec();
                out.resize(n, 0);
                Ok(out)
            }
            (Value::Null, _) => Err(MiniError::SchemaViolation(
                "null has no field encoding".to_string(),
            )),
            (v, dt) => Err(MiniError::SchemaViolation(format!(
                "value {v} does not fit column type {dt}"
            ))),
        }
    }

    /// Deserializes a value of `data_type`, returning it and the number of
    /// bytes consumed. CHAR trims trailing NUL padding.
    pub fn deserialize(data: &[u8], data_type: &DataType) -> Result<(Self, usize)> {
        let size = data_type.fixed_size();
        if data.len() < size {
            return Err(MiniError::Corruption(format!(
                "field of type {data_type} truncated at {} bytes",
                data.len()
            )));
        }
        let value = match data_type {
            DataType::Int => Value::Int(i32::from_le_bytes(data[..4].try_into().unwrap())),
            DataType::Float => Value::Float(f32::from_le_bytes(data[..4].try_into().unwrap())),
            DataType::Char(n) => {
                let raw = &data[..*n as usize];
                let end = raw.iter().rposition(|&b| b != 0).map_or(0, |p| p + 1);
                Value::Char(String::from_utf8_lossy(&raw[..end]).into_owned())
            }
        };
        Ok((value, size))
    }

    /// Total order used by index keys: NULL sorts before everything, INT as
    /// i32, FLOAT by IEEE total order, CHAR as unsigned bytes.
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::Char(a), Value::Char(b)) => a.as_bytes().cmp(b.as_bytes()),
            // Mixed types never reach a comparator behind a validated schema.
            _ => Ordering::Equal,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Char(s) => write!(f, "'{}'", s),
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Char(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Char(v)
    }
}
