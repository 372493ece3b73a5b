use std::sync::{Arc, Weak};

use indexmap::IndexMap;

use crate::{
    DbType, Error, Object, Result,
    connection::ConnectionInner,
    logger::LogSettings,
    native::{AttrHandle, Native, TypeHandle},
};

/// The type of an attribute or collection element.
#[derive(Debug, Clone)]
pub struct DataTypeInfo {
    /// The native type code, reported when it has no [`DbType`] mapping.
    pub type_code: u16,
    pub db_type: Option<DbType>,
    /// Set for object typed attributes and elements.
    pub object_type: Option<Arc<ObjectType>>,
}

impl DataTypeInfo {
    /// The mapped data type, or [`Error::UnhandledDataType`].
    pub fn mapped(&self) -> Result<DbType> {
        self.db_type.ok_or(Error::UnhandledDataType(self.type_code))
    }
}

/// An attribute of an object type.
#[derive(Debug)]
pub struct ObjectAttr {
    pub(crate) handle: AttrHandle,
    pub(crate) name: String,
    pub(crate) belongs_to: TypeHandle,
    pub(crate) belongs_to_name: String,
    pub(crate) type_info: DataTypeInfo,
}

impl ObjectAttr {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_info(&self) -> &DataTypeInfo {
        &self.type_info
    }

    /// Full name of the type the attribute belongs to.
    pub fn belongs_to(&self) -> &str {
        &self.belongs_to_name
    }
}

/// Metadata for a named object or collection type. Two types are the same
/// type when their native descriptors are the same, whatever their names.
#[derive(Debug)]
pub struct ObjectType {
    pub(crate) tdo: TypeHandle,
    pub(crate) schema: String,
    pub(crate) name: String,
    pub(crate) package_name: Option<String>,
    pub(crate) is_collection: bool,
    pub(crate) element_type_info: Option<DataTypeInfo>,
    pub(crate) attributes: IndexMap<String, Arc<ObjectAttr>>,
    pub(crate) conn: Weak<ConnectionInner>,
    pub(crate) native: Arc<dyn Native>,
    pub(crate) log: LogSettings,
}

impl ObjectType {
    pub fn tdo(&self) -> TypeHandle {
        self.tdo
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn package_name(&self) -> Option<&str> {
        self.package_name.as_deref()
    }

    /// `SCHEMA.NAME`, or `SCHEMA.PACKAGE.NAME` for package types.
    pub fn full_name(&self) -> String {
        match &self.package_name {
            Some(package) => format!("{}.{}.{}", self.schema, package, self.name),
            None => format!("{}.{}", self.schema, self.name),
        }
    }

    pub fn is_collection(&self) -> bool {
        self.is_collection
    }

    /// Element type of a collection type.
    pub fn element_type_info(&self) -> Option<&DataTypeInfo> {
        self.element_type_info.as_ref()
    }

    /// Attributes in declaration order.
    pub fn attributes(&self) -> impl Iterator<Item = &Arc<ObjectAttr>> {
        self.attributes.values()
    }

    pub fn num_attributes(&self) -> usize {
        self.attributes.len()
    }

    /// Find an attribute by name. Exact matches win; otherwise quoted names
    /// are unquoted and plain names upper cased.
    pub fn attribute(&self, name: &str) -> Result<&Arc<ObjectAttr>> {
        if let Some(attr) = self.attributes.get(name) {
            return Ok(attr);
        }
        let folded = match name.strip_prefix('"').and_then(|n| n.strip_suffix('"')) {
            Some(quoted) => quoted.to_string(),
            None => name.to_uppercase(),
        };
        self.attributes
            .get(&folded)
            .ok_or_else(|| Error::NoSuchAttribute {
                type_name: self.full_name(),
                name: name.to_string(),
                available: self
                    .attributes
                    .keys()
                    .map(String::as_str)
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }

    /// Create a new, empty instance of this type.
    pub fn new_object(self: &Arc<Self>) -> Result<Object> {
        self.connection()?;
        Object::allocate(self, None, None)
    }

    /// The owning connection, if it is still connected.
    pub(crate) fn connection(&self) -> Result<Arc<ConnectionInner>> {
        self.conn
            .upgrade()
            .filter(|conn| conn.is_connected())
            .ok_or(Error::NotConnected)
    }
}
