//! Conversions for [`bstr`] byte strings.
pub use bstr::{BStr, BString, ByteSlice};

use crate::{
    Value, ValueType,
    decode::Decode,
    encode::Encode,
    error::{DecodeError, EncodeError},
};

impl<'r> Decode<'r> for &'r BStr {
    fn decode(value: &'r Value) -> Result<Self, DecodeError> {
        compatible!(value, ValueType::Bytes);
        Ok(value.bytes().as_bstr())
    }
}

impl<'r> Decode<'r> for BString {
    fn decode(value: &'r Value) -> Result<Self, DecodeError> {
        compatible!(value, ValueType::Bytes);
        Ok(BString::from(value.bytes()))
    }
}

impl Encode for &BStr {
    fn encode(self) -> Result<Value, EncodeError> {
        Ok(Value::Bytes(self.to_vec()))
    }
}

impl Encode for BString {
    fn encode(self) -> Result<Value, EncodeError> {
        Ok(Value::Bytes(self.into()))
    }
}
