//! Types for working with errors produced by Tessera.

use std::num::TryFromIntError;

use crate::{DbType, ValueType, native::NativeError};

/// A specialized `Result` type for Tessera.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    #[error("incompatible source value type: {0}")]
    ValueType(ValueType),
    #[error("decoding conversion error: {0}")]
    Conversion(String),
}

impl From<TryFromIntError> for DecodeError {
    fn from(err: TryFromIntError) -> Self {
        DecodeError::Conversion(err.to_string())
    }
}

impl From<String> for DecodeError {
    fn from(err: String) -> Self {
        DecodeError::Conversion(err)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum EncodeError {
    #[error("encoding conversion error: {0}")]
    Conversion(String),
}

/// Represents all the ways a method can fail within Tessera.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Error returned from the native layer, tagged with the action that was
    /// being attempted.
    #[error("{action}: {source}")]
    Native {
        action: &'static str,
        #[source]
        source: NativeError,
    },

    /// A collection operation was attempted on an object that is not a
    /// collection.
    #[error("object {schema}.{name} is not a collection")]
    NotCollection { schema: String, name: String },

    /// The attribute belongs to a different type than the object.
    #[error("attribute {attr} is part of type {attr_type} and cannot be used with objects of type {object_type}")]
    WrongAttr {
        attr: String,
        attr_type: String,
        object_type: String,
    },

    /// An object of one type was assigned where another type was expected.
    #[error("wrong object type: expected {expected}, got {actual}")]
    WrongType { actual: String, expected: String },

    /// The collection has no element at the index.
    #[error("element at index {0} does not exist")]
    InvalidIndex(i32),

    /// The native type cannot be converted to or from the external type.
    #[error("unhandled conversion from native type {db_type} to external type {value_type}")]
    UnhandledConversion {
        db_type: DbType,
        value_type: ValueType,
    },

    /// The native type has no mapping at all.
    #[error("unhandled data type {0}")]
    UnhandledDataType(u16),

    /// The connection has been closed.
    #[error("not connected")]
    NotConnected,

    /// The object has been closed and can no longer be used.
    #[error("object has been closed")]
    ObjectClosed,

    /// No attribute with the name exists on the type.
    #[error("type {type_name} has no attribute {name} (available: {available})")]
    NoSuchAttribute {
        type_name: String,
        name: String,
        available: String,
    },

    /// Type in a lookup doesn't exist. Likely due to typo or missing user type.
    #[error("type named {type_name} not found")]
    TypeNotFound { type_name: String },

    /// The type contains itself, directly or through its nested types.
    #[error("type {type_name} contains itself")]
    RecursiveType { type_name: String },

    /// A value is outside the range the native type can represent.
    #[error("conversion error: {0}")]
    Conversion(String),

    /// Error occurred while decoding a value.
    #[error("error occurred while decoding: {0}")]
    Decode(#[from] DecodeError),

    /// Error occurred while encoding a value.
    #[error("error occurred while encoding: {0}")]
    Encode(#[from] EncodeError),

    /// A JSON document did not fit the shape of the object type.
    #[error("json error: {0}")]
    Json(String),
}

impl Error {
    pub(crate) fn native(action: &'static str) -> impl FnOnce(NativeError) -> Error {
        move |source| Error::Native { action, source }
    }

    pub fn into_native_error(self) -> Option<NativeError> {
        match self {
            Error::Native { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err.to_string())
    }
}
