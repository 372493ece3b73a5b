use crate::{
    Value, ValueType,
    decode::Decode,
    encode::Encode,
    error::{DecodeError, EncodeError},
};

impl Encode for bool {
    fn encode(self) -> Result<Value, EncodeError> {
        Ok(Value::Boolean(self))
    }
}

impl<'r> Decode<'r> for bool {
    fn decode(value: &'r Value) -> Result<bool, DecodeError> {
        compatible!(value, ValueType::Boolean);
        value.boolean()
    }
}
