use std::str::from_utf8;

use time::OffsetDateTime;

use crate::{Lob, Object, error::DecodeError};

enum_mode! {
    /// The external type a caller asks a native value to be converted to.
    pub ValueType {
        Bytes => "bytes",
        Int64 => "int64",
        Uint64 => "uint64",
        Double => "double",
        Float => "float",
        Boolean => "boolean",
        Timestamp => "timestamp",
        Object => "object",
        Lob => "lob",
    }
}

/// A value exchanged with the conversion engine.
#[derive(Clone, Debug)]
pub enum Value {
    Null,
    Bytes(Vec<u8>),
    Int64(i64),
    Uint64(u64),
    Double(f64),
    Float(f32),
    Boolean(bool),
    Timestamp(OffsetDateTime),
    Object(Object),
    Lob(Lob),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The external type of the value, or `None` for null.
    pub fn value_type(&self) -> Option<ValueType> {
        Some(match self {
            Value::Null => return None,
            Value::Bytes(_) => ValueType::Bytes,
            Value::Int64(_) => ValueType::Int64,
            Value::Uint64(_) => ValueType::Uint64,
            Value::Double(_) => ValueType::Double,
            Value::Float(_) => ValueType::Float,
            Value::Boolean(_) => ValueType::Boolean,
            Value::Timestamp(_) => ValueType::Timestamp,
            Value::Object(_) => ValueType::Object,
            Value::Lob(_) => ValueType::Lob,
        })
    }

    pub fn int64(&self) -> std::result::Result<i64, DecodeError> {
        match self {
            Value::Int64(v) => Ok(*v),
            Value::Uint64(v) => Ok(i64::try_from(*v)?),
            // Numbers read as doubles by default.
            Value::Double(v) if v.fract() == 0.0 && *v >= i64::MIN as f64 && *v < i64::MAX as f64 => {
                Ok(*v as i64)
            }
            _ => Err(DecodeError::Conversion("not an integer".into())),
        }
    }

    pub fn uint64(&self) -> std::result::Result<u64, DecodeError> {
        match self {
            Value::Uint64(v) => Ok(*v),
            Value::Int64(v) => Ok(u64::try_from(*v)?),
            Value::Double(v) if v.fract() == 0.0 && *v >= 0.0 && *v < u64::MAX as f64 => {
                Ok(*v as u64)
            }
            _ => Err(DecodeError::Conversion("not an integer".into())),
        }
    }

    pub fn double(&self) -> std::result::Result<f64, DecodeError> {
        match self {
            Value::Double(v) => Ok(*v),
            Value::Float(v) => Ok(f64::from(*v)),
            Value::Int64(v) => Ok(*v as f64),
            _ => Err(DecodeError::Conversion("not a float".into())),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        match self {
            Value::Bytes(v) => v.as_slice(),
            _ => &[],
        }
    }

    pub fn text(&self) -> std::result::Result<&str, DecodeError> {
        match self {
            Value::Bytes(v) => from_utf8(v).map_err(|e| DecodeError::Conversion(e.to_string())),
            _ => Err(DecodeError::Conversion("not text".into())),
        }
    }

    pub fn boolean(&self) -> std::result::Result<bool, DecodeError> {
        match self {
            Value::Boolean(v) => Ok(*v),
            _ => Err(DecodeError::Conversion("not a boolean".into())),
        }
    }

    pub fn timestamp(&self) -> std::result::Result<OffsetDateTime, DecodeError> {
        match self {
            Value::Timestamp(v) => Ok(*v),
            _ => Err(DecodeError::Conversion("not a timestamp".into())),
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_lob(&self) -> Option<&Lob> {
        match self {
            Value::Lob(v) => Some(v),
            _ => None,
        }
    }
}

// Objects and large objects compare by identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Int64(a), Value::Int64(b)) => a == b,
            (Value::Uint64(a), Value::Uint64(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Object::ptr_eq(a, b),
            (Value::Lob(a), Value::Lob(b)) => Lob::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<Object> for Value {
    fn from(obj: Object) -> Self {
        Value::Object(obj)
    }
}

impl From<Lob> for Value {
    fn from(lob: Lob) -> Self {
        Value::Lob(lob)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors() {
        assert_eq!(Value::Int64(7).int64().unwrap(), 7);
        assert_eq!(Value::Uint64(7).int64().unwrap(), 7);
        assert!(Value::Uint64(u64::MAX).int64().is_err());
        assert!(Value::Int64(-1).uint64().is_err());
        assert_eq!(Value::Bytes(b"abc".to_vec()).text().unwrap(), "abc");
        assert!(Value::Bytes(vec![0xff]).text().is_err());
        assert_eq!(Value::Null.bytes(), b"");
        assert_eq!(Value::Float(1.5).double().unwrap(), 1.5);
        assert_eq!(Value::Double(42.0).int64().unwrap(), 42);
        assert!(Value::Double(42.5).int64().is_err());
        assert!(Value::Double(-1.0).uint64().is_err());
    }

    #[test]
    fn value_types() {
        assert_eq!(Value::Null.value_type(), None);
        assert_eq!(Value::Double(1.0).value_type(), Some(ValueType::Double));
        assert_eq!(ValueType::Uint64.to_string(), "uint64");
    }
}
