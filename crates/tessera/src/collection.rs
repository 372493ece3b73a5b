//! Index based operations on collection instances.
//!
//! Indexes of nested tables may be sparse once elements have been deleted, so
//! iteration walks the existing elements with [`Object::first_index`] and
//! [`Object::next_index`] rather than counting up to [`Object::size`].

use crate::{
    DbType, Error, Object, Result, Value, ValueType,
    convert::{self, scratch::ScratchBuffer},
    native::{InstanceHandle, NativeSlot},
    object_type::DataTypeInfo,
};

impl Object {
    /// Check the instance and that it is a collection, returning the instance
    /// handle and the element type.
    fn check_collection(&self) -> Result<(InstanceHandle, &DataTypeInfo)> {
        let (instance, _) = self.check()?;
        let ty = self.object_type();
        match (ty.is_collection, &ty.element_type_info) {
            (true, Some(info)) => Ok((instance, info)),
            _ => Err(Error::NotCollection {
                schema: ty.schema.clone(),
                name: ty.name.clone(),
            }),
        }
    }

    /// Convert a value and hand the encoded slot to a native call, releasing
    /// scratch storage whatever the outcome.
    fn with_element<T>(
        &self,
        info: &DataTypeInfo,
        value: &Value,
        call: impl FnOnce(&NativeSlot) -> Result<T>,
    ) -> Result<T> {
        let db_type = info.mapped()?;
        let mut scratch = ScratchBuffer::new(self.native().clone(), db_type);
        let result =
            convert::to_native(self, db_type, info, value, &mut scratch).and_then(|slot| call(&slot));
        scratch.clear();
        result
    }

    /// Append an element to the end of the collection.
    pub fn append_element(&self, value: &Value) -> Result<()> {
        let (instance, info) = self.check_collection()?;
        self.with_element(info, value, |slot| {
            self.native()
                .coll_append(instance, slot)
                .map_err(Error::native("append element"))
        })
    }

    /// Read the element at `index` as the given external type.
    pub fn get_element_value_by_index(&self, index: i32, value_type: ValueType) -> Result<Value> {
        let (instance, info) = self.check_collection()?;
        let db_type = info.mapped()?;
        let slot = self
            .native()
            .coll_get_elem(instance, index)
            .map_err(Error::native("get element value"))?
            .ok_or(Error::InvalidIndex(index))?;
        convert::from_native(self, db_type, info, &slot, value_type)
    }

    /// Replace the element at `index`.
    pub fn set_element_value_by_index(&self, index: i32, value: &Value) -> Result<()> {
        let (instance, info) = self.check_collection()?;
        self.with_element(info, value, |slot| {
            self.native()
                .coll_assign_elem(instance, index, slot)
                .map_err(Error::native("set element value"))
        })
    }

    /// Delete the element at `index`, leaving a gap. Later indexes do not move.
    pub fn delete_element_by_index(&self, index: i32) -> Result<()> {
        let (instance, _) = self.check_collection()?;
        self.native()
            .table_delete(instance, index)
            .map_err(Error::native("delete element"))
    }

    pub fn element_exists_by_index(&self, index: i32) -> Result<bool> {
        let (instance, _) = self.check_collection()?;
        self.native()
            .table_exists(instance, index)
            .map_err(Error::native("check element exists"))
    }

    /// Number of element slots, including deleted ones.
    pub fn size(&self) -> Result<i32> {
        let (instance, _) = self.check_collection()?;
        self.native()
            .coll_size(instance)
            .map_err(Error::native("get size"))
    }

    /// Index of the first existing element, or `None` if there are none.
    pub fn first_index(&self) -> Result<Option<i32>> {
        let (instance, _) = self.check_collection()?;
        if self.existing_elements(instance)? == 0 {
            return Ok(None);
        }
        self.native()
            .table_first(instance)
            .map(Some)
            .map_err(Error::native("get first index"))
    }

    /// Index of the last existing element, or `None` if there are none.
    pub fn last_index(&self) -> Result<Option<i32>> {
        let (instance, _) = self.check_collection()?;
        if self.existing_elements(instance)? == 0 {
            return Ok(None);
        }
        self.native()
            .table_last(instance)
            .map(Some)
            .map_err(Error::native("get last index"))
    }

    /// Index of the next existing element after `index`.
    pub fn next_index(&self, index: i32) -> Result<Option<i32>> {
        let (instance, _) = self.check_collection()?;
        self.native()
            .table_next(instance, index)
            .map_err(Error::native("get next index"))
    }

    /// Index of the previous existing element before `index`.
    pub fn prev_index(&self, index: i32) -> Result<Option<i32>> {
        let (instance, _) = self.check_collection()?;
        self.native()
            .table_prev(instance, index)
            .map_err(Error::native("get prev index"))
    }

    /// Remove `count` elements from the end of the collection.
    pub fn trim(&self, count: u32) -> Result<()> {
        let (instance, _) = self.check_collection()?;
        self.native()
            .coll_trim(instance, count)
            .map_err(Error::native("trim"))
    }

    fn existing_elements(&self, instance: InstanceHandle) -> Result<i32> {
        self.native()
            .table_size(instance)
            .map_err(Error::native("get size"))
    }

    /// The indexes of existing elements, in order.
    pub fn indices(&self) -> Result<Indices<'_>> {
        Ok(Indices {
            object: self,
            next: self.first_index()?,
        })
    }

    /// Read every existing element as the given external type.
    pub fn to_vec(&self, value_type: ValueType) -> Result<Vec<Value>> {
        self.indices()?
            .map(|index| self.get_element_value_by_index(index?, value_type))
            .collect()
    }

    /// Append each of the values in turn.
    pub fn extend<'a>(&self, values: impl IntoIterator<Item = &'a Value>) -> Result<()> {
        for value in values {
            self.append_element(value)?;
        }
        Ok(())
    }

    /// Append a copy of `object` to the collection. The collection's element
    /// type must be an object type, and `object` must be of that type.
    pub fn append_object(&self, object: &Object) -> Result<()> {
        let (_, info) = self.check_collection()?;
        if info.object_type.is_none() {
            return Err(Error::UnhandledConversion {
                db_type: info.db_type.unwrap_or(DbType::Object),
                value_type: ValueType::Object,
            });
        }
        self.append_element(&Value::Object(object.clone()))
    }
}

/// Iterator over the indexes of existing collection elements.
#[derive(Debug)]
pub struct Indices<'a> {
    object: &'a Object,
    next: Option<i32>,
}

impl Iterator for Indices<'_> {
    type Item = Result<i32>;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.next?;
        match self.object.next_index(index) {
            Ok(next) => self.next = next,
            Err(e) => {
                self.next = None;
                return Some(Err(e));
            }
        }
        Some(Ok(index))
    }
}
