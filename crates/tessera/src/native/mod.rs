//! The synchronous call layer that object instances and conversions are built
//! on.
//!
//! Everything the engine owns is identified by an opaque handle. A [`Native`]
//! implementation validates handles itself and reports failures as
//! [`NativeError`]s, which the rest of the crate tags with the action being
//! attempted.

use std::fmt::Debug;

use bigdecimal::BigDecimal;
use time::{OffsetDateTime, PrimitiveDateTime};

use crate::{DbType, lob::LobKind};

mod error;
pub mod memory;

pub use error::NativeError;
pub(crate) use error::codes;

/// A specialized `Result` for native calls.
pub type NativeResult<T> = std::result::Result<T, NativeError>;

macro_rules! native_handle {
    ($( $(#[$meta:meta])* $name:ident, )+) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
            pub struct $name(u64);

            impl $name {
                pub fn from_raw(raw: u64) -> Self {
                    Self(raw)
                }

                pub fn as_raw(self) -> u64 {
                    self.0
                }
            }
        )+
    };
}

native_handle! {
    /// An object or collection instance.
    InstanceHandle,
    /// The null indicator structure belonging to an instance.
    IndicatorHandle,
    /// Variable length character data.
    StringHandle,
    /// Variable length binary data.
    RawHandle,
    /// A timestamp descriptor.
    DescriptorHandle,
    /// A large object locator.
    LocatorHandle,
    /// A type descriptor object. Two types are the same type exactly when their
    /// handles are equal.
    TypeHandle,
    /// An attribute of an object type.
    AttrHandle,
}

/// A value in the engine's own encoding.
///
/// Handle variants refer to storage owned by whoever produced the slot: the
/// instance it was read from, or the scratch buffer it was written into.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeData {
    String(StringHandle),
    Raw(RawHandle),
    Int32(i32),
    Float(f32),
    Double(f64),
    Number(BigDecimal),
    Date(PrimitiveDateTime),
    Timestamp(DescriptorHandle),
    Boolean(bool),
    Object(InstanceHandle),
    Lob(LocatorHandle),
}

/// A native value together with its null indicator.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NativeSlot {
    /// The encoded value. May hold stale content when `is_null` is set.
    pub data: Option<NativeData>,
    pub is_null: bool,
    /// For object values, the null indicator structure of the instance.
    pub indicator: Option<IndicatorHandle>,
}

impl NativeSlot {
    pub fn null() -> Self {
        Self {
            data: None,
            is_null: true,
            indicator: None,
        }
    }

    pub fn value(data: NativeData) -> Self {
        Self {
            data: Some(data),
            is_null: false,
            indicator: None,
        }
    }

    pub fn object(instance: InstanceHandle, indicator: IndicatorHandle) -> Self {
        Self {
            data: Some(NativeData::Object(instance)),
            is_null: false,
            indicator: Some(indicator),
        }
    }
}

/// The null indicator of a freshly created instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeIndicator {
    pub handle: IndicatorHandle,
    /// Set when the indicator was allocated apart from the instance and must be
    /// freed on its own.
    pub separate: bool,
}

/// A reference to a named object type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NativeTypeRef {
    pub schema: String,
    pub name: String,
}

/// Type information of an attribute or collection element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeDataTypeInfo {
    /// The engine's type code. Codes with no [`DbType`] mapping are passed
    /// through so callers can report them.
    pub type_code: u16,
    pub object_type: Option<NativeTypeRef>,
}

impl NativeDataTypeInfo {
    pub fn of(db_type: DbType) -> Self {
        Self {
            type_code: db_type.code(),
            object_type: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeAttrInfo {
    pub handle: AttrHandle,
    pub name: String,
    pub type_info: NativeDataTypeInfo,
}

/// Everything the engine knows about a named type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeTypeInfo {
    pub tdo: TypeHandle,
    pub schema: String,
    pub name: String,
    pub package_name: Option<String>,
    pub is_collection: bool,
    pub element: Option<NativeDataTypeInfo>,
    pub attributes: Vec<NativeAttrInfo>,
}

/// The engine interface.
///
/// Every call is synchronous and may be made from any thread.
pub trait Native: Send + Sync + Debug {
    /// Construct a new instance of the type.
    fn object_new(&self, tdo: TypeHandle) -> NativeResult<InstanceHandle>;
    /// Fetch the null indicator of an instance.
    fn object_get_ind(&self, instance: InstanceHandle) -> NativeResult<NativeIndicator>;
    /// Free an instance and everything it owns. With `check_error` unset,
    /// failures are swallowed and reported as success.
    fn object_free(&self, instance: InstanceHandle, check_error: bool) -> NativeResult<()>;
    /// Free a separately allocated indicator.
    fn indicator_free(&self, indicator: IndicatorHandle, check_error: bool) -> NativeResult<()>;
    /// Deep copy `src` over `dst`.
    fn object_copy(
        &self,
        src: InstanceHandle,
        src_ind: IndicatorHandle,
        dst: InstanceHandle,
        dst_ind: IndicatorHandle,
    ) -> NativeResult<()>;
    fn object_get_attr(&self, instance: InstanceHandle, attr: AttrHandle)
    -> NativeResult<NativeSlot>;
    /// Store a value into an attribute. Handle data is copied, never adopted.
    fn object_set_attr(
        &self,
        instance: InstanceHandle,
        attr: AttrHandle,
        value: &NativeSlot,
    ) -> NativeResult<()>;

    fn coll_append(&self, coll: InstanceHandle, value: &NativeSlot) -> NativeResult<()>;
    fn coll_assign_elem(
        &self,
        coll: InstanceHandle,
        index: i32,
        value: &NativeSlot,
    ) -> NativeResult<()>;
    /// Read an element. Absent indexes yield `None`.
    fn coll_get_elem(&self, coll: InstanceHandle, index: i32) -> NativeResult<Option<NativeSlot>>;
    /// Number of slots, deleted elements included.
    fn coll_size(&self, coll: InstanceHandle) -> NativeResult<i32>;
    fn coll_trim(&self, coll: InstanceHandle, count: u32) -> NativeResult<()>;
    fn table_delete(&self, coll: InstanceHandle, index: i32) -> NativeResult<()>;
    fn table_exists(&self, coll: InstanceHandle, index: i32) -> NativeResult<bool>;
    /// Number of elements that exist.
    fn table_size(&self, coll: InstanceHandle) -> NativeResult<i32>;
    fn table_first(&self, coll: InstanceHandle) -> NativeResult<i32>;
    fn table_last(&self, coll: InstanceHandle) -> NativeResult<i32>;
    fn table_next(&self, coll: InstanceHandle, index: i32) -> NativeResult<Option<i32>>;
    fn table_prev(&self, coll: InstanceHandle, index: i32) -> NativeResult<Option<i32>>;

    fn string_assign_text(&self, target: Option<StringHandle>, bytes: &[u8])
    -> NativeResult<StringHandle>;
    fn string_bytes(&self, handle: StringHandle) -> NativeResult<Vec<u8>>;
    fn string_free(&self, handle: StringHandle) -> NativeResult<()>;
    fn raw_assign_bytes(&self, target: Option<RawHandle>, bytes: &[u8]) -> NativeResult<RawHandle>;
    fn raw_bytes(&self, handle: RawHandle) -> NativeResult<Vec<u8>>;
    fn raw_free(&self, handle: RawHandle) -> NativeResult<()>;
    /// Allocate a timestamp descriptor for one of the timestamp types.
    fn descriptor_alloc(&self, db_type: DbType) -> NativeResult<DescriptorHandle>;
    fn descriptor_free(&self, handle: DescriptorHandle, db_type: DbType) -> NativeResult<()>;
    fn timestamp_set(&self, handle: DescriptorHandle, value: OffsetDateTime) -> NativeResult<()>;
    fn timestamp_get(&self, handle: DescriptorHandle) -> NativeResult<OffsetDateTime>;

    fn lob_alloc(&self, kind: LobKind) -> NativeResult<LocatorHandle>;
    fn lob_free(&self, handle: LocatorHandle) -> NativeResult<()>;
    /// Copy the locator `src` into `dst`, so both refer to the same content.
    fn lob_locator_assign(&self, src: LocatorHandle, dst: LocatorHandle) -> NativeResult<()>;
    /// Replace the content of the large object.
    fn lob_write(&self, handle: LocatorHandle, bytes: &[u8]) -> NativeResult<()>;
    fn lob_read(&self, handle: LocatorHandle) -> NativeResult<Vec<u8>>;

    /// Look up the metadata of a named type.
    fn describe_type(&self, schema: Option<&str>, name: &str) -> NativeResult<NativeTypeInfo>;
}
