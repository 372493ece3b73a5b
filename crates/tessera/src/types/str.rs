use std::sync::Arc;

use crate::{
    Value, ValueType,
    decode::Decode,
    encode::Encode,
    error::{DecodeError, EncodeError},
};

impl Encode for &str {
    fn encode(self) -> Result<Value, EncodeError> {
        Ok(Value::Bytes(self.as_bytes().to_vec()))
    }
}

impl<'r> Decode<'r> for &'r str {
    fn decode(value: &'r Value) -> Result<Self, DecodeError> {
        compatible!(value, ValueType::Bytes);
        value.text()
    }
}

impl Encode for String {
    fn encode(self) -> Result<Value, EncodeError> {
        Ok(Value::Bytes(self.into_bytes()))
    }
}

impl Encode for &String {
    fn encode(self) -> Result<Value, EncodeError> {
        self.as_str().encode()
    }
}

impl<'r> Decode<'r> for String {
    fn decode(value: &'r Value) -> Result<Self, DecodeError> {
        compatible!(value, ValueType::Bytes);
        value.text().map(ToOwned::to_owned)
    }
}

impl Encode for Arc<String> {
    fn encode(self) -> Result<Value, EncodeError> {
        self.as_str().encode()
    }
}

impl<'r> Decode<'r> for Arc<String> {
    fn decode(value: &'r Value) -> Result<Self, DecodeError> {
        compatible!(value, ValueType::Bytes);
        value.text().map(|x| Arc::new(x.to_owned()))
    }
}
