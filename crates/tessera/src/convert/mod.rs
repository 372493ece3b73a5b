//! Conversion between native encodings and [`Value`].
//!
//! | Native type                            | External types                            |
//! |----------------------------------------|-------------------------------------------|
//! | CHAR, NCHAR, VARCHAR2, NVARCHAR2, RAW  | Bytes                                     |
//! | BINARY_INTEGER                         | Int64                                     |
//! | BINARY_FLOAT                           | Float (Double is also accepted on write)  |
//! | BINARY_DOUBLE                          | Double                                    |
//! | NUMBER                                 | Double, Int64, Uint64, Bytes              |
//! | DATE and the timestamp types           | Timestamp, Double                         |
//! | BOOLEAN                                | Boolean                                   |
//! | OBJECT                                 | Object                                    |
//! | CLOB, NCLOB, BLOB, BFILE               | Lob (Bytes is also accepted on write)     |
//!
//! Nulls short-circuit in both directions.

use crate::{
    DbType, Error, Lob, LobKind, Object, Result, Value, ValueType,
    native::{NativeData, NativeSlot},
    object_type::DataTypeInfo,
};

mod datetime;
pub(crate) mod number;
pub(crate) mod scratch;

use scratch::{Scratch, ScratchBuffer};

/// Read a native value as the requested external type.
///
/// Objects read here alias memory owned by `owner` and come back as
/// dependents of it.
pub(crate) fn from_native(
    owner: &Object,
    db_type: DbType,
    info: &DataTypeInfo,
    slot: &NativeSlot,
    value_type: ValueType,
) -> Result<Value> {
    owner
        .object_type()
        .log
        .conversion("from_native", db_type.name(), value_type.as_str(), slot.is_null);
    if slot.is_null {
        return Ok(Value::Null);
    }
    let Some(data) = &slot.data else {
        return Err(Error::Conversion(format!(
            "non-null {db_type} value without data"
        )));
    };
    let native = owner.native();

    Ok(match (db_type, value_type, data) {
        (t, ValueType::Bytes, NativeData::String(h)) if t.is_text() => Value::Bytes(
            native
                .string_bytes(*h)
                .map_err(Error::native("read string"))?,
        ),
        (DbType::Raw, ValueType::Bytes, NativeData::Raw(h)) => {
            Value::Bytes(native.raw_bytes(*h).map_err(Error::native("read raw"))?)
        }
        (DbType::NativeInt, ValueType::Int64, NativeData::Int32(v)) => Value::Int64(i64::from(*v)),
        (DbType::NativeFloat, ValueType::Float, NativeData::Float(v)) => Value::Float(*v),
        (DbType::NativeDouble, ValueType::Double, NativeData::Double(v)) => Value::Double(*v),
        (DbType::Number, vt, NativeData::Number(n)) => number::from_number(n, vt)?,
        (DbType::Date, vt, NativeData::Date(dt)) => datetime::from_date(*dt, vt)?,
        (t, vt, NativeData::Timestamp(h)) if t.is_timestamp() => {
            let ts = native
                .timestamp_get(*h)
                .map_err(Error::native("read timestamp"))?;
            datetime::from_timestamp(t, ts, vt)?
        }
        (DbType::Boolean, ValueType::Boolean, NativeData::Boolean(v)) => Value::Boolean(*v),
        (DbType::Object, ValueType::Object, NativeData::Object(instance)) => {
            let ty = info
                .object_type
                .as_ref()
                .ok_or(Error::UnhandledDataType(info.type_code))?;
            let indicator = slot
                .indicator
                .ok_or_else(|| Error::Conversion("object value without indicator".into()))?;
            Value::Object(Object::allocate(
                ty,
                Some((*instance, indicator)),
                Some(owner.clone()),
            )?)
        }
        (t, ValueType::Lob, NativeData::Lob(src)) if t.is_lob() => {
            let kind = LobKind::from_db_type(t).unwrap_or_default();
            // Dropped, and so freed, if the assignment fails.
            let lob = Lob::new(native, kind)?;
            native
                .lob_locator_assign(*src, lob.locator())
                .map_err(Error::native("assign large object locator"))?;
            Value::Lob(lob)
        }
        _ => return Err(Error::UnhandledConversion { db_type, value_type }),
    })
}

/// Encode an external value for the native layer.
///
/// Any storage allocated for the encoded form is held by `scratch` and must
/// outlive the native call the slot is passed to.
pub(crate) fn to_native(
    owner: &Object,
    db_type: DbType,
    info: &DataTypeInfo,
    value: &Value,
    scratch: &mut ScratchBuffer,
) -> Result<NativeSlot> {
    let log = &owner.object_type().log;
    let Some(value_type) = value.value_type() else {
        log.conversion("to_native", db_type.name(), "null", true);
        return Ok(NativeSlot::null());
    };
    log.conversion("to_native", db_type.name(), value_type.as_str(), false);
    let native = owner.native();
    let unhandled = || Error::UnhandledConversion { db_type, value_type };

    let data = match (db_type, value) {
        (t, Value::Bytes(b)) if t.is_text() => {
            let h = native
                .string_assign_text(None, b)
                .map_err(Error::native("assign text"))?;
            scratch.hold(Scratch::String(h));
            NativeData::String(h)
        }
        (DbType::Raw, Value::Bytes(b)) => {
            let h = native
                .raw_assign_bytes(None, b)
                .map_err(Error::native("assign raw"))?;
            scratch.hold(Scratch::Raw(h));
            NativeData::Raw(h)
        }
        (DbType::NativeInt, Value::Int64(v)) => NativeData::Int32(
            i32::try_from(*v)
                .map_err(|_| Error::Conversion(format!("{v} out of range for {db_type}")))?,
        ),
        (DbType::NativeFloat, Value::Float(v)) => NativeData::Float(*v),
        (DbType::NativeFloat, Value::Double(v)) => NativeData::Float(*v as f32),
        (DbType::NativeDouble, Value::Double(v)) => NativeData::Double(*v),
        (DbType::Number, v) => NativeData::Number(number::to_number(v)?.ok_or_else(unhandled)?),
        (DbType::Date, v) => NativeData::Date(datetime::to_date(v)?.ok_or_else(unhandled)?),
        (t, v) if t.is_timestamp() => {
            let ts = datetime::to_timestamp(t, v)?.ok_or_else(unhandled)?;
            let h = native
                .descriptor_alloc(t)
                .map_err(Error::native("allocate timestamp"))?;
            scratch.hold(Scratch::Timestamp(h));
            native
                .timestamp_set(h, ts)
                .map_err(Error::native("set timestamp"))?;
            NativeData::Timestamp(h)
        }
        (DbType::Boolean, Value::Boolean(v)) => NativeData::Boolean(*v),
        (DbType::Object, Value::Object(other)) => {
            let expected = info
                .object_type
                .as_ref()
                .ok_or(Error::UnhandledDataType(info.type_code))?;
            let actual = other.object_type();
            if actual.tdo() != expected.tdo() {
                return Err(Error::WrongType {
                    actual: actual.full_name(),
                    expected: expected.full_name(),
                });
            }
            let (instance, indicator) = other.handles()?;
            return Ok(NativeSlot::object(instance, indicator));
        }
        // The caller keeps its reference; the locator is only borrowed.
        (t, Value::Lob(lob)) if t.is_lob() => NativeData::Lob(lob.locator()),
        (t, Value::Bytes(b)) if t.is_lob() => {
            let kind = LobKind::from_db_type(t).unwrap_or_default();
            let lob = Lob::new(native, kind)?;
            lob.write_all(b)?;
            let locator = lob.locator();
            scratch.hold(Scratch::Lob(lob));
            NativeData::Lob(locator)
        }
        _ => return Err(unhandled()),
    };
    Ok(NativeSlot::value(data))
}
