//! Dates and timestamps. Doubles are milliseconds since the Unix epoch in UTC.

use time::{Duration, OffsetDateTime, PrimitiveDateTime, UtcOffset};

use crate::{DbType, Error, Result, Value, ValueType};

fn conversion(e: impl std::fmt::Display) -> Error {
    Error::Conversion(e.to_string())
}

pub(crate) fn to_millis(ts: OffsetDateTime) -> f64 {
    ts.unix_timestamp() as f64 * 1000.0 + f64::from(ts.nanosecond()) / 1_000_000.0
}

pub(crate) fn from_millis(ms: f64) -> Result<OffsetDateTime> {
    if !ms.is_finite() {
        return Err(Error::Conversion(format!("{ms} is not a valid timestamp")));
    }
    let secs = (ms / 1000.0).floor();
    let nanos = ((ms - secs * 1000.0) * 1_000_000.0).round() as i64;
    let base = OffsetDateTime::from_unix_timestamp(secs as i64).map_err(conversion)?;
    Ok(base + Duration::nanoseconds(nanos))
}

/// Read a `DATE`. Dates carry no time zone and are taken to be UTC.
pub(crate) fn from_date(dt: PrimitiveDateTime, value_type: ValueType) -> Result<Value> {
    let ts = dt.assume_utc();
    match value_type {
        ValueType::Timestamp => Ok(Value::Timestamp(ts)),
        ValueType::Double => Ok(Value::Double(to_millis(ts))),
        other => Err(Error::UnhandledConversion {
            db_type: DbType::Date,
            value_type: other,
        }),
    }
}

/// Encode a `DATE`. The offset is dropped and fractional seconds truncated.
pub(crate) fn to_date(value: &Value) -> Result<Option<PrimitiveDateTime>> {
    let ts = match value {
        Value::Timestamp(ts) => *ts,
        Value::Double(ms) => from_millis(*ms)?,
        _ => return Ok(None),
    };
    let ts = ts.replace_nanosecond(0).map_err(conversion)?;
    Ok(Some(PrimitiveDateTime::new(ts.date(), ts.time())))
}

pub(crate) fn from_timestamp(db_type: DbType, ts: OffsetDateTime, value_type: ValueType) -> Result<Value> {
    match value_type {
        ValueType::Timestamp => Ok(Value::Timestamp(ts)),
        ValueType::Double => Ok(Value::Double(to_millis(ts))),
        other => Err(Error::UnhandledConversion {
            db_type,
            value_type: other,
        }),
    }
}

/// Encode one of the timestamp types. Plain `TIMESTAMP` keeps the wall clock
/// fields and drops the offset.
pub(crate) fn to_timestamp(db_type: DbType, value: &Value) -> Result<Option<OffsetDateTime>> {
    let ts = match value {
        Value::Timestamp(ts) => *ts,
        Value::Double(ms) => from_millis(*ms)?,
        _ => return Ok(None),
    };
    Ok(Some(if db_type == DbType::Timestamp {
        ts.replace_offset(UtcOffset::UTC)
    } else {
        ts
    }))
}
