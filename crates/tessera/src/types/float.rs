use crate::{
    Value, ValueType,
    decode::Decode,
    encode::Encode,
    error::{DecodeError, EncodeError},
};

impl Encode for f32 {
    fn encode(self) -> Result<Value, EncodeError> {
        Ok(Value::Float(self))
    }
}

impl<'r> Decode<'r> for f32 {
    fn decode(value: &'r Value) -> std::result::Result<f32, DecodeError> {
        compatible!(value, ValueType::Float | ValueType::Double);
        match value {
            Value::Float(v) => Ok(*v),
            _ => Ok(value.double()? as f32),
        }
    }
}

impl Encode for f64 {
    fn encode(self) -> Result<Value, EncodeError> {
        Ok(Value::Double(self))
    }
}

impl<'r> Decode<'r> for f64 {
    fn decode(value: &'r Value) -> std::result::Result<f64, DecodeError> {
        compatible!(
            value,
            ValueType::Float | ValueType::Double | ValueType::Int64
        );
        value.double()
    }
}
