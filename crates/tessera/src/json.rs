//! A JSON view of objects and collections.
//!
//! Objects map to JSON objects with their attributes in declaration order and
//! collections to arrays of their existing elements. Attributes of unmapped
//! types are left out. Scalars follow their native type:
//!
//! | Native type                     | JSON                                        |
//! |---------------------------------|---------------------------------------------|
//! | character types, CLOB, NCLOB    | string                                      |
//! | RAW, BLOB, BFILE                | lowercase hex string                        |
//! | NUMBER                          | number if exactly representable, else string |
//! | BINARY_INTEGER, BINARY_FLOAT/DOUBLE | number                                  |
//! | DATE and the timestamp types    | RFC 3339 string                             |
//! | BOOLEAN                         | boolean                                     |

use bigdecimal::BigDecimal;
use serde_json::{Map, Number, Value as JsonValue};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::{
    DbType, Error, Object, Result, Value, ValueType, convert::number, object_type::DataTypeInfo,
};

impl Object {
    /// Render the object, and everything it contains, as JSON.
    pub fn to_json(&self) -> Result<JsonValue> {
        let ty = self.object_type();
        if let (true, Some(info)) = (ty.is_collection, &ty.element_type_info) {
            let mut items = Vec::new();
            for index in self.indices()? {
                let index = index?;
                let db_type = info.mapped()?;
                let value = self.get_element_value_by_index(index, json_value_type(db_type))?;
                items.push(to_json_value(db_type, value)?);
            }
            return Ok(JsonValue::Array(items));
        }

        let mut map = Map::new();
        for attr in ty.attributes() {
            let Some(db_type) = attr.type_info.db_type else {
                continue;
            };
            let value = self.get_attribute_value(attr, json_value_type(db_type))?;
            map.insert(attr.name.clone(), to_json_value(db_type, value)?);
        }
        Ok(JsonValue::Object(map))
    }

    /// Populate the object from JSON. Keys of a JSON object are attribute
    /// names; the items of a JSON array are appended to a collection.
    pub fn from_json(&self, json: &JsonValue) -> Result<()> {
        let ty = self.object_type();
        match (ty.is_collection, &ty.element_type_info, json) {
            (true, Some(info), JsonValue::Array(items)) => {
                for item in items {
                    self.append_element(&from_json_value(info, item)?)?;
                }
                Ok(())
            }
            (false, _, JsonValue::Object(map)) => {
                for (name, item) in map {
                    let attr = self.attribute(name)?;
                    let value = from_json_value(&attr.type_info, item)?;
                    self.set_attribute_value(&attr, &value)?;
                }
                Ok(())
            }
            (true, _, other) => Err(mismatch("array", ty.full_name(), other)),
            (false, _, other) => Err(mismatch("object", ty.full_name(), other)),
        }
    }
}

fn mismatch(expected: &str, target: impl std::fmt::Display, got: &JsonValue) -> Error {
    Error::Json(format!("expected {expected} for {target}, got {got}"))
}

/// Numbers are read as text so that no precision is lost.
fn json_value_type(db_type: DbType) -> ValueType {
    match db_type {
        DbType::Number => ValueType::Bytes,
        other => other.default_value_type(),
    }
}

fn text(bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|e| Error::Conversion(e.to_string()))
}

fn number_json(text: &str) -> JsonValue {
    if let Ok(v) = text.parse::<i64>() {
        return v.into();
    }
    if let Ok(v) = text.parse::<u64>() {
        return v.into();
    }
    // Only numbers that survive the trip through a double are emitted as such.
    let exact = text
        .parse::<BigDecimal>()
        .ok()
        .zip(text.parse::<f64>().ok())
        .filter(|(n, v)| number::from_double(*v).is_ok_and(|back| back == *n))
        .and_then(|(_, v)| Number::from_f64(v));
    match exact {
        Some(n) => JsonValue::Number(n),
        None => JsonValue::String(text.to_string()),
    }
}

fn float_json(v: f64) -> JsonValue {
    Number::from_f64(v).map_or(JsonValue::Null, JsonValue::Number)
}

fn to_json_value(db_type: DbType, value: Value) -> Result<JsonValue> {
    Ok(match value {
        Value::Null => JsonValue::Null,
        Value::Bytes(b) => match db_type {
            DbType::Number => number_json(&text(b)?),
            DbType::Raw => JsonValue::String(hex::encode(&b)),
            _ => JsonValue::String(text(b)?),
        },
        Value::Int64(v) => v.into(),
        Value::Uint64(v) => v.into(),
        Value::Double(v) => float_json(v),
        Value::Float(v) => float_json(f64::from(v)),
        Value::Boolean(v) => v.into(),
        Value::Timestamp(ts) => JsonValue::String(
            ts.format(&Rfc3339)
                .map_err(|e| Error::Conversion(e.to_string()))?,
        ),
        Value::Object(obj) => obj.to_json()?,
        Value::Lob(lob) => {
            let bytes = lob.read_to_end()?;
            if lob.kind().is_character() {
                JsonValue::String(text(bytes)?)
            } else {
                JsonValue::String(hex::encode(&bytes))
            }
        }
    })
}

fn from_json_value(info: &DataTypeInfo, json: &JsonValue) -> Result<Value> {
    if json.is_null() {
        return Ok(Value::Null);
    }
    let db_type = info.mapped()?;
    let value = match (db_type, json) {
        (DbType::Raw | DbType::Blob | DbType::Bfile, JsonValue::String(s)) => Value::Bytes(unhex(s)?),
        (t, JsonValue::String(s)) if t.is_text() || t.is_lob() => Value::Bytes(s.as_bytes().to_vec()),
        (DbType::NativeInt, JsonValue::Number(n)) => match n.as_i64() {
            Some(v) => Value::Int64(v),
            None => return Err(mismatch("integer", db_type, json)),
        },
        (DbType::NativeFloat | DbType::NativeDouble, JsonValue::Number(n)) => match n.as_f64() {
            Some(v) => Value::Double(v),
            None => return Err(mismatch("number", db_type, json)),
        },
        (DbType::Number, JsonValue::Number(n)) => match (n.as_i64(), n.as_u64()) {
            (Some(v), _) => Value::Int64(v),
            (_, Some(v)) => Value::Uint64(v),
            _ => Value::Bytes(n.to_string().into_bytes()),
        },
        (DbType::Number, JsonValue::String(s)) => Value::Bytes(s.as_bytes().to_vec()),
        (t, JsonValue::String(s)) if t == DbType::Date || t.is_timestamp() => Value::Timestamp(
            OffsetDateTime::parse(s, &Rfc3339)
                .map_err(|e| Error::Json(format!("invalid timestamp {s:?}: {e}")))?,
        ),
        (t, JsonValue::Number(n)) if t == DbType::Date || t.is_timestamp() => match n.as_f64() {
            Some(ms) => Value::Double(ms),
            None => return Err(mismatch("number", db_type, json)),
        },
        (DbType::Boolean, JsonValue::Bool(b)) => Value::Boolean(*b),
        (DbType::Object, JsonValue::Object(_) | JsonValue::Array(_)) => {
            let ty = info
                .object_type
                .as_ref()
                .ok_or(Error::UnhandledDataType(info.type_code))?;
            let obj = ty.new_object()?;
            obj.from_json(json)?;
            Value::Object(obj)
        }
        _ => return Err(mismatch("a value", db_type, json)),
    };
    Ok(value)
}

fn unhex(s: &str) -> Result<Vec<u8>> {
    hex::decode(s).map_err(|e| Error::Json(format!("invalid hex string {s:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trip() {
        assert_eq!(hex::encode([0x00, 0xab, 0x10]), "00ab10");
        assert_eq!(unhex("00AB10").unwrap(), vec![0x00, 0xab, 0x10]);
        assert!(unhex("abc").is_err());
        assert!(matches!(unhex("zz"), Err(Error::Json(_))));
    }

    #[test]
    fn numbers_keep_precision() {
        assert_eq!(number_json("42"), JsonValue::from(42));
        assert_eq!(number_json("-0.5"), JsonValue::from(-0.5));
        assert_eq!(number_json("0.0000001"), JsonValue::from(1e-7));
        assert_eq!(number_json("-0.000000000012"), JsonValue::from(-1.2e-11));
        assert_eq!(
            number_json("123456789012345678901234567890"),
            JsonValue::String("123456789012345678901234567890".into())
        );
        assert_eq!(
            number_json("0.12345678901234567890"),
            JsonValue::String("0.12345678901234567890".into())
        );
    }
}
