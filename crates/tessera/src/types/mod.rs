//! Conversions between Rust types and [`Value`](crate::Value).
//!
//! # Types
//!
//! | Rust type                             | Value variant(s)              |
//! |---------------------------------------|-------------------------------|
//! | `bool`                                | Boolean                       |
//! | `i8`, `i16`, `i32`, `i64`             | Int64                         |
//! | `u8`, `u16`, `u32`                    | Int64                         |
//! | `u64`                                 | Uint64                        |
//! | `f32`                                 | Float                         |
//! | `f64`                                 | Double                        |
//! | `&str`, [`String`]                    | Bytes                         |
//! | `&[u8]`, `Vec<u8>`                    | Bytes                         |
//! | `time::OffsetDateTime`                | Timestamp                     |
//! | `time::PrimitiveDateTime`             | Timestamp (UTC)               |
//! | `time::Date`                          | Timestamp (UTC midnight)      |
//! | `bstr::BString`                       | Bytes                         |
//! | [`Object`](crate::Object)             | Object                        |
//! | [`Lob`](crate::Lob)                   | Lob                           |
//!
//! Integers decode from any integer variant, and from doubles with no
//! fractional part, since `NUMBER` attributes read as doubles by default.
//! Unsigned types narrower than 64 bits encode as `Int64` so that they can be
//! written to `BINARY_INTEGER` attributes.
//!
//! # Nullable
//!
//! `Option<T>` is supported where `T` implements `Encode` or `Decode`. An
//! `Option<T>` represents a potentially null value.

macro_rules! compatible {
    ($x:expr, $($y:path)|+) => {
        if let Some(t) = $x.value_type() {
            if !matches!(t, $($y)|+) {
                return Err(DecodeError::ValueType(t));
            }
        }
    };
}

pub mod bstr;
pub mod time;

mod bool;
mod bytes;
mod float;
mod int;
mod str;
mod uint;
