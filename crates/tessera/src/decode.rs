//! Provides [`Decode`] for turning [`Value`]s into Rust values.
use std::result::Result as StdResult;

use crate::{Lob, Object, Value, ValueType, error::DecodeError};

/// A type that can be decoded from a value read out of an object.
pub trait Decode<'r>: Sized {
    /// Decode a new value of this type from a value read out of an object.
    fn decode(value: &'r Value) -> StdResult<Self, DecodeError>;
}

impl<'r, T> Decode<'r> for Option<T>
where
    T: Decode<'r>,
{
    fn decode(value: &'r Value) -> StdResult<Self, DecodeError> {
        if value.is_null() {
            Ok(None)
        } else {
            Ok(Some(T::decode(value)?))
        }
    }
}

impl<'r> Decode<'r> for Value {
    fn decode(value: &'r Value) -> StdResult<Self, DecodeError> {
        Ok(value.clone())
    }
}

impl<'r> Decode<'r> for Object {
    fn decode(value: &'r Value) -> StdResult<Self, DecodeError> {
        compatible!(value, ValueType::Object);
        value
            .as_object()
            .cloned()
            .ok_or_else(|| DecodeError::Conversion("not an object".into()))
    }
}

impl<'r> Decode<'r> for Lob {
    fn decode(value: &'r Value) -> StdResult<Self, DecodeError> {
        compatible!(value, ValueType::Lob);
        value
            .as_lob()
            .cloned()
            .ok_or_else(|| DecodeError::Conversion("not a large object".into()))
    }
}
