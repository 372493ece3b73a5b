use std::{
    fmt::{self, Debug, Formatter},
    sync::{
        Arc, Mutex, MutexGuard, OnceLock, PoisonError,
        atomic::{AtomicU8, Ordering},
    },
};

use crate::{
    Error, Result, Value, ValueType,
    convert::{self, scratch::ScratchBuffer},
    decode::Decode,
    encode::Encode,
    native::{IndicatorHandle, InstanceHandle, Native},
    object_type::{ObjectAttr, ObjectType},
};

const OPEN: u8 = 0;
const CLOSING: u8 = 1;
const CLOSED: u8 = 2;

#[derive(Debug, Default)]
struct Handles {
    instance: Option<InstanceHandle>,
    indicator: Option<IndicatorHandle>,
    /// The indicator was allocated apart from the instance.
    free_indicator: bool,
}

pub(crate) struct ObjectInner {
    ty: Arc<ObjectType>,
    handles: Mutex<Handles>,
    parent: Option<Object>,
    state: AtomicU8,
    /// Registry slot of a top level instance.
    slot: OnceLock<usize>,
}

impl ObjectInner {
    fn handles(&self) -> MutexGuard<'_, Handles> {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn instance_id(&self) -> Option<u64> {
        self.handles().instance.map(InstanceHandle::as_raw)
    }

    /// Release the native memory of the instance. Only the caller that moves
    /// the instance out of the open state does any work; everyone else returns
    /// success at once.
    pub(crate) fn close(&self, check_error: bool) -> Result<()> {
        if self
            .state
            .compare_exchange(OPEN, CLOSING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(());
        }

        // Dependents alias their parent's memory and own nothing.
        if self.parent.is_none() {
            let mut handles = self.handles();
            let id = handles.instance.map(InstanceHandle::as_raw);
            if let Err(e) = self.free_handles(&mut handles, check_error) {
                self.state.store(OPEN, Ordering::Release);
                return Err(e);
            }
            drop(handles);
            if let Some(slot) = self.slot.get() {
                if let Some(conn) = self.ty.conn.upgrade() {
                    if !conn.is_closing() {
                        conn.registry.remove(*slot);
                    }
                }
            }
            self.ty.log.lifecycle("close", &self.ty.full_name(), id);
        }

        self.state.store(CLOSED, Ordering::Release);
        Ok(())
    }

    /// Free whatever handles are still set, nulling each once it is freed. A
    /// retry after a failure picks up where the failed attempt stopped.
    fn free_handles(&self, handles: &mut Handles, check_error: bool) -> Result<()> {
        let native = &self.ty.native;
        if let Some(instance) = handles.instance {
            native
                .object_free(instance, check_error)
                .map_err(Error::native("free object"))?;
            handles.instance = None;
        }
        if let Some(indicator) = handles.indicator {
            if handles.free_indicator {
                native
                    .indicator_free(indicator, check_error)
                    .map_err(Error::native("free object indicator"))?;
            }
            handles.indicator = None;
        }
        Ok(())
    }
}

impl Drop for ObjectInner {
    fn drop(&mut self) {
        let _ = self.close(false);
    }
}

/// An instance of an object or collection type.
///
/// `Object` is a reference counted handle: clones refer to the same instance,
/// and the instance is closed when the last one is dropped. Objects read out
/// of an attribute or collection element are *dependents* of the object they
/// were read from. They alias its memory, keep it alive, and never free
/// anything themselves.
#[derive(Clone)]
pub struct Object(pub(crate) Arc<ObjectInner>);

impl Object {
    /// Wrap a native instance. Without `existing` handles a new instance is
    /// created. Only top level instances are registered with the connection.
    pub(crate) fn allocate(
        ty: &Arc<ObjectType>,
        existing: Option<(InstanceHandle, IndicatorHandle)>,
        parent: Option<Object>,
    ) -> Result<Object> {
        let native = &ty.native;
        let (instance, indicator, free_indicator) = match existing {
            Some((instance, indicator)) => (instance, indicator, false),
            None => {
                let instance = native
                    .object_new(ty.tdo)
                    .map_err(Error::native("create object"))?;
                match native.object_get_ind(instance) {
                    Ok(indicator) => (instance, indicator.handle, indicator.separate),
                    Err(e) => {
                        let _ = native.object_free(instance, false);
                        return Err(Error::native("get object indicator")(e));
                    }
                }
            }
        };

        let is_top_level = parent.is_none();
        let inner = Arc::new(ObjectInner {
            ty: ty.clone(),
            handles: Mutex::new(Handles {
                instance: Some(instance),
                indicator: Some(indicator),
                free_indicator,
            }),
            parent,
            state: AtomicU8::new(OPEN),
            slot: OnceLock::new(),
        });
        if is_top_level {
            // Dropping the unregistered instance frees it again.
            let slot = ty
                .conn
                .upgrade()
                .and_then(|conn| conn.registry.add(&inner))
                .ok_or(Error::NotConnected)?;
            let _ = inner.slot.set(slot);
        }
        let action = if is_top_level { "allocate" } else { "allocate dependent" };
        ty.log
            .lifecycle(action, &ty.full_name(), Some(instance.as_raw()));
        Ok(Object(inner))
    }

    pub fn object_type(&self) -> &Arc<ObjectType> {
        &self.0.ty
    }

    pub(crate) fn native(&self) -> &Arc<dyn Native> {
        &self.0.ty.native
    }

    /// Take another reference to the instance.
    pub fn add_ref(&self) -> Object {
        self.clone()
    }

    /// Give up this reference. The instance is closed when the last reference
    /// is released.
    pub fn release(self) {
        drop(self);
    }

    /// Number of live references to the instance, counting those held by its
    /// dependents.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }

    pub fn ptr_eq(a: &Object, b: &Object) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    /// True if the instance aliases memory owned by another object.
    pub fn is_dependent(&self) -> bool {
        self.0.parent.is_some()
    }

    pub fn parent(&self) -> Option<&Object> {
        self.0.parent.as_ref()
    }

    pub fn is_closed(&self) -> bool {
        self.0.state.load(Ordering::Acquire) == CLOSED
    }

    /// Release the native memory of the instance now, reporting any failure.
    /// The object stays valid as a handle but can no longer be used. Closing
    /// a closed object does nothing.
    pub fn close(&self) -> Result<()> {
        self.0.close(true)
    }

    /// Create a new top level instance holding a deep copy of this one.
    pub fn copy(&self) -> Result<Object> {
        let (src, src_ind) = self.check()?;
        let copy = Object::allocate(&self.0.ty, None, None)?;
        let (dst, dst_ind) = copy.handles()?;
        // On failure the new instance is dropped, which frees it.
        self.native()
            .object_copy(src, src_ind, dst, dst_ind)
            .map_err(Error::native("copy object"))?;
        self.0
            .ty
            .log
            .lifecycle("copy", &self.0.ty.full_name(), Some(dst.as_raw()));
        Ok(copy)
    }

    /// Read an attribute as the given external type.
    pub fn get_attribute_value(&self, attr: &ObjectAttr, value_type: ValueType) -> Result<Value> {
        let (instance, _) = self.check()?;
        self.check_attr(attr)?;
        let db_type = attr.type_info.mapped()?;
        let slot = self
            .native()
            .object_get_attr(instance, attr.handle)
            .map_err(Error::native("get attribute value"))?;
        convert::from_native(self, db_type, &attr.type_info, &slot, value_type)
    }

    /// Write an attribute.
    pub fn set_attribute_value(&self, attr: &ObjectAttr, value: &Value) -> Result<()> {
        let (instance, _) = self.check()?;
        self.check_attr(attr)?;
        let db_type = attr.type_info.mapped()?;
        let mut scratch = ScratchBuffer::new(self.native().clone(), db_type);
        let result = convert::to_native(self, db_type, &attr.type_info, value, &mut scratch)
            .and_then(|slot| {
                self.native()
                    .object_set_attr(instance, attr.handle, &slot)
                    .map_err(Error::native("set attribute value"))
            });
        scratch.clear();
        result
    }

    /// Look up an attribute of this object's type by name.
    pub fn attribute(&self, name: &str) -> Result<Arc<ObjectAttr>> {
        self.0.ty.attribute(name).cloned()
    }

    /// Read an attribute by name as the default external type of its data
    /// type.
    pub fn get(&self, name: &str) -> Result<Value> {
        let attr = self.attribute(name)?;
        let value_type = attr.type_info.mapped()?.default_value_type();
        self.get_attribute_value(&attr, value_type)
    }

    /// Read an attribute by name and decode it.
    pub fn get_as<T>(&self, name: &str) -> Result<T>
    where
        T: for<'r> Decode<'r>,
    {
        let value = self.get(name)?;
        Ok(T::decode(&value)?)
    }

    /// Encode a value and write it to an attribute by name.
    pub fn set(&self, name: &str, value: impl Encode) -> Result<()> {
        let attr = self.attribute(name)?;
        let value = value.encode()?;
        self.set_attribute_value(&attr, &value)
    }

    /// Set every attribute to null. Attributes of unmapped types are left
    /// alone.
    pub fn reset_attributes(&self) -> Result<()> {
        for attr in self.0.ty.attributes() {
            if attr.type_info.db_type.is_some() {
                self.set_attribute_value(attr, &Value::Null)?;
            }
        }
        Ok(())
    }

    /// The native handles of a usable instance. An instance is usable while it
    /// is open and, for dependents, its parent is usable.
    pub(crate) fn handles(&self) -> Result<(InstanceHandle, IndicatorHandle)> {
        if let Some(parent) = &self.0.parent {
            parent.handles()?;
        }
        if self.0.state.load(Ordering::Acquire) != OPEN {
            return Err(Error::ObjectClosed);
        }
        let handles = self.0.handles();
        match (handles.instance, handles.indicator) {
            (Some(instance), Some(indicator)) => Ok((instance, indicator)),
            _ => Err(Error::ObjectClosed),
        }
    }

    /// Check the connection and the instance before a native call.
    pub(crate) fn check(&self) -> Result<(InstanceHandle, IndicatorHandle)> {
        self.0.ty.connection()?;
        self.handles()
    }

    fn check_attr(&self, attr: &ObjectAttr) -> Result<()> {
        if attr.belongs_to != self.0.ty.tdo {
            return Err(Error::WrongAttr {
                attr: attr.name.clone(),
                attr_type: attr.belongs_to_name.clone(),
                object_type: self.0.ty.full_name(),
            });
        }
        Ok(())
    }
}

impl Debug for Object {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("type", &self.0.ty.full_name())
            .field("instance", &self.0.instance_id())
            .field("dependent", &self.is_dependent())
            .field("closed", &self.is_closed())
            .finish()
    }
}
