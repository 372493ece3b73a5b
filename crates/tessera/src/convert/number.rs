use std::str::{FromStr, from_utf8};

use bigdecimal::{BigDecimal, ToPrimitive};

use crate::{Error, Result, Value, ValueType};

/// Read a `NUMBER` as the requested external type. Integer reads truncate any
/// fractional part.
pub(crate) fn from_number(n: &BigDecimal, value_type: ValueType) -> Result<Value> {
    let out_of_range = || Error::Conversion(format!("number {n} out of range for {value_type}"));
    Ok(match value_type {
        ValueType::Double => Value::Double(n.to_f64().ok_or_else(out_of_range)?),
        ValueType::Int64 => Value::Int64(n.with_scale(0).to_i64().ok_or_else(out_of_range)?),
        ValueType::Uint64 => Value::Uint64(n.with_scale(0).to_u64().ok_or_else(out_of_range)?),
        ValueType::Bytes => Value::Bytes(number_text(n).into_bytes()),
        other => {
            return Err(Error::UnhandledConversion {
                db_type: crate::DbType::Number,
                value_type: other,
            });
        }
    })
}

/// Plain decimal text without trailing zeros, never in exponent form.
pub(crate) fn number_text(n: &BigDecimal) -> String {
    n.normalized().to_plain_string()
}

pub(crate) fn from_double(v: f64) -> Result<BigDecimal> {
    if !v.is_finite() {
        return Err(Error::Conversion(format!("{v} cannot be stored as a number")));
    }
    // Display gives the shortest text that reads back as the same double.
    BigDecimal::from_str(&v.to_string()).map_err(|e| Error::Conversion(e.to_string()))
}

pub(crate) fn from_text(bytes: &[u8]) -> Result<BigDecimal> {
    let text = from_utf8(bytes).map_err(|e| Error::Conversion(e.to_string()))?;
    BigDecimal::from_str(text.trim())
        .map_err(|_| Error::Conversion(format!("invalid number: {text:?}")))
}

/// Encode an external value as a `NUMBER`.
pub(crate) fn to_number(value: &Value) -> Result<Option<BigDecimal>> {
    Ok(Some(match value {
        Value::Int64(v) => BigDecimal::from(*v),
        Value::Uint64(v) => BigDecimal::from(*v),
        Value::Double(v) => from_double(*v)?,
        Value::Bytes(b) => from_text(b)?,
        _ => return Ok(None),
    }))
}
