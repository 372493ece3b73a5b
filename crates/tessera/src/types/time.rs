//! Conversions for [`time`] types. Values without an offset are taken to be
//! UTC.
pub use time::{Date, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};

use crate::{
    Value, ValueType,
    decode::Decode,
    encode::Encode,
    error::{DecodeError, EncodeError},
};

impl Encode for OffsetDateTime {
    fn encode(self) -> Result<Value, EncodeError> {
        Ok(Value::Timestamp(self))
    }
}

impl Encode for PrimitiveDateTime {
    fn encode(self) -> Result<Value, EncodeError> {
        Ok(Value::Timestamp(self.assume_utc()))
    }
}

impl Encode for Date {
    fn encode(self) -> Result<Value, EncodeError> {
        Ok(Value::Timestamp(self.midnight().assume_utc()))
    }
}

impl<'r> Decode<'r> for OffsetDateTime {
    fn decode(value: &'r Value) -> std::result::Result<Self, DecodeError> {
        compatible!(value, ValueType::Timestamp);
        value.timestamp()
    }
}

impl<'r> Decode<'r> for PrimitiveDateTime {
    fn decode(value: &'r Value) -> std::result::Result<Self, DecodeError> {
        compatible!(value, ValueType::Timestamp);
        let ts = value.timestamp()?.to_offset(UtcOffset::UTC);
        Ok(PrimitiveDateTime::new(ts.date(), ts.time()))
    }
}

impl<'r> Decode<'r> for Date {
    fn decode(value: &'r Value) -> std::result::Result<Self, DecodeError> {
        compatible!(value, ValueType::Timestamp);
        Ok(value.timestamp()?.to_offset(UtcOffset::UTC).date())
    }
}
