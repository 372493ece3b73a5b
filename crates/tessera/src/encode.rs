//! Provides [`Encode`] for turning Rust values into [`Value`]s.
use crate::{Lob, Object, Value, error::EncodeError};

/// Encode a single value to be written to an attribute or collection element.
pub trait Encode {
    /// Convert `self` into a [`Value`], consuming it. Encoders are implemented
    /// for reference counted types where a shift in ownership is not wanted.
    fn encode(self) -> Result<Value, EncodeError>
    where
        Self: Sized;
}

/// Marker trait for primitive types that can be encoded by reference
pub trait PrimitiveEncode: Encode + Copy + 'static {}

impl PrimitiveEncode for bool {}
impl PrimitiveEncode for i8 {}
impl PrimitiveEncode for i16 {}
impl PrimitiveEncode for i32 {}
impl PrimitiveEncode for i64 {}
impl PrimitiveEncode for u8 {}
impl PrimitiveEncode for u16 {}
impl PrimitiveEncode for u32 {}
impl PrimitiveEncode for u64 {}
impl PrimitiveEncode for f32 {}
impl PrimitiveEncode for f64 {}

impl<T> Encode for &T
where
    T: PrimitiveEncode,
{
    fn encode(self) -> Result<Value, EncodeError> {
        (*self).encode()
    }
}

impl<T> Encode for Option<T>
where
    T: Encode,
{
    fn encode(self) -> Result<Value, EncodeError> {
        if let Some(v) = self {
            v.encode()
        } else {
            Ok(Value::Null)
        }
    }
}

impl Encode for Value {
    fn encode(self) -> Result<Value, EncodeError> {
        Ok(self)
    }
}

impl Encode for Object {
    fn encode(self) -> Result<Value, EncodeError> {
        Ok(Value::Object(self))
    }
}

impl Encode for &Object {
    fn encode(self) -> Result<Value, EncodeError> {
        Ok(Value::Object(self.clone()))
    }
}

impl Encode for Lob {
    fn encode(self) -> Result<Value, EncodeError> {
        Ok(Value::Lob(self))
    }
}
