use crate::{
    Value, ValueType,
    decode::Decode,
    encode::Encode,
    error::{DecodeError, EncodeError},
};

impl Encode for &[u8] {
    fn encode(self) -> Result<Value, EncodeError> {
        Ok(Value::Bytes(self.to_vec()))
    }
}

impl<'r> Decode<'r> for &'r [u8] {
    fn decode(value: &'r Value) -> Result<Self, DecodeError> {
        compatible!(value, ValueType::Bytes);
        Ok(value.bytes())
    }
}

impl Encode for Vec<u8> {
    fn encode(self) -> Result<Value, EncodeError> {
        Ok(Value::Bytes(self))
    }
}

impl<'r> Decode<'r> for Vec<u8> {
    fn decode(value: &'r Value) -> Result<Self, DecodeError> {
        compatible!(value, ValueType::Bytes);
        Ok(value.bytes().to_owned())
    }
}
