use crate::{
    Value, ValueType,
    decode::Decode,
    encode::Encode,
    error::{DecodeError, EncodeError},
};

macro_rules! unsigned {
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
                    Ok(value.uint64()?.try_into()?)
                }
            }
        )+
    };
}

unsigned!(u8, u16, u32);

impl Encode for u64 {
    fn encode(self) -> Result<Value, EncodeError> {
        Ok(Value::Uint64(self))
    }
}

impl<'r> Decode<'r> for u64 {
    fn decode(value: &'r Value) -> std::result::Result<Self, DecodeError> {
        compatible!(
            value,
            ValueType::Int64 | ValueType::Uint64 | ValueType::Double
        );
        value.uint64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_narrow_unsigned_encode_signed() {
        assert_eq!(200u8.encode().unwrap(), Value::Int64(200));
        assert_eq!(u64::MAX.encode().unwrap(), Value::Uint64(u64::MAX));
        assert!(u16::decode(&Value::Int64(-1)).is_err());
        assert_eq!(u64::decode(&Value::Int64(5)).unwrap(), 5);
    }
}
