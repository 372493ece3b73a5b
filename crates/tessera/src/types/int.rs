use crate::{
    Value, ValueType,
    decode::Decode,
    encode::Encode,
    error::{DecodeError, EncodeError},
};

macro_rules! signed {
    ($($t:ty),+) => {
        $(
            impl Encode for $t {
                fn encode(self) -> Result<Value, EncodeError> {
                    Ok(Value::Int64(i64::from(self)))
                }
            }

            impl<'r> Decode<'r> for $t {
                fn decode(value: &'r Value) -> std::result::Result<Self, DecodeError> {
                    compatible!(value, ValueType::Int64 | ValueType::Uint64 | ValueType::Double);
                    Ok(value.int64()?.try_into()?)
                }
            }
        )+
    };
}

signed!(i8, i16, i32);

impl Encode for i64 {
    fn encode(self) -> Result<Value, EncodeError> {
        Ok(Value::Int64(self))
    }
}

impl<'r> Decode<'r> for i64 {
    fn decode(value: &'r Value) -> std::result::Result<Self, DecodeError> {
        compatible!(
            value,
            ValueType::Int64 | ValueType::Uint64 | ValueType::Double
        );
        value.int64()
    }
}
