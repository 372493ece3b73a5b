//! Object instances and value conversion for database object types.
//!
//! A [`Connection`] describes named object and collection types as
//! [`ObjectType`]s. Instances of those types are [`Object`]s, whose attributes
//! and collection elements are read and written as [`Value`]s. Objects nested
//! inside other objects are handed out as dependents that share, and keep
//! alive, the memory of the object they were read from.
//!
//! All engine access goes through the [`Native`](native::Native) trait;
//! [`MemoryEngine`](native::memory::MemoryEngine) is an implementation that
//! keeps everything in process memory.

#[macro_use]
mod enum_mode;
#[macro_use]
pub mod types;

mod collection;
mod connection;
mod convert;
pub mod decode;
pub mod encode;
mod error;
mod json;
mod lob;
mod logger;
pub mod native;
mod object;
mod object_type;
mod registry;
mod tessera;
mod type_cache;
mod type_info;
mod value;

pub use crate::{
    collection::Indices,
    connection::Connection,
    decode::Decode,
    encode::Encode,
    error::{DecodeError, EncodeError, Error, Result},
    lob::{Lob, LobKind},
    logger::LogSettings,
    object::Object,
    object_type::{DataTypeInfo, ObjectAttr, ObjectType},
    tessera::Tessera,
    type_info::DbType,
    value::{Value, ValueType},
};
