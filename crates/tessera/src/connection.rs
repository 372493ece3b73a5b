use std::{
    fmt::{self, Debug, Formatter},
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
};

use indexmap::IndexMap;

use crate::{
    DbType, Error, Lob, LobKind, Result, Tessera,
    logger::LogSettings,
    native::{Native, NativeDataTypeInfo, NativeTypeInfo, codes},
    object_type::{DataTypeInfo, ObjectAttr, ObjectType},
    registry::HandleRegistry,
    type_cache::TypeCache,
};

/// A connection to a native engine, through which object types are looked up.
///
/// Clones share the same connection. Dropping the last clone tears the
/// connection down: every top level object still open on it is force closed
/// and further use of its objects fails with [`Error::NotConnected`].
#[derive(Clone)]
pub struct Connection {
    pub(crate) inner: Arc<ConnectionInner>,
}

pub(crate) struct ConnectionInner {
    pub(crate) native: Arc<dyn Native>,
    pub(crate) log_settings: LogSettings,
    pub(crate) registry: HandleRegistry,
    closing: AtomicBool,
    connected: AtomicBool,
    types: Mutex<TypeCache>,
}

impl Debug for Connection {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("connected", &self.is_connected())
            .field("open_objects", &self.open_objects())
            .field("cached_types_size", &self.cached_types_size())
            .finish()
    }
}

impl Debug for ConnectionInner {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionInner")
            .field("closing", &self.is_closing())
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

impl Connection {
    pub(crate) fn establish(options: &Tessera, native: Arc<dyn Native>) -> Self {
        Self {
            inner: Arc::new(ConnectionInner {
                native,
                log_settings: options.log_settings.clone(),
                registry: HandleRegistry::default(),
                closing: AtomicBool::new(false),
                connected: AtomicBool::new(true),
                types: Mutex::new(TypeCache::new(options.type_cache_capacity)),
            }),
        }
    }

    /// Establish a new connection with the provided options.
    pub fn connect_with(options: &Tessera, native: Arc<dyn Native>) -> Result<Self> {
        options.connect(native)
    }

    /// Look up an object or collection type by name.
    ///
    /// Names may be qualified with a schema. Unquoted names that are not found
    /// as given are retried upper cased; quoted names must match exactly.
    /// Results are cached.
    pub fn object_type(&self, name: &str) -> Result<Arc<ObjectType>> {
        self.inner.lookup_type(name)
    }

    /// Create a new, empty large object.
    pub fn create_lob(&self, kind: LobKind) -> Result<Lob> {
        self.inner.check_connected()?;
        Lob::new(&self.inner.native, kind)
    }

    pub fn native(&self) -> &Arc<dyn Native> {
        &self.inner.native
    }

    pub fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    /// Number of top level objects currently open on the connection.
    pub fn open_objects(&self) -> usize {
        self.inner.registry.len()
    }

    pub fn cached_types_size(&self) -> usize {
        self.inner.types().len()
    }

    pub fn clear_cached_types(&self) {
        self.inner.types().clear();
    }

    /// Close the connection, force closing every top level object still open
    /// on it. Closing a closed connection does nothing.
    pub fn close(&self) {
        self.inner.teardown();
    }
}

impl ConnectionInner {
    pub(crate) fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// True while the connection is being torn down.
    pub(crate) fn is_closing(&self) -> bool {
        self.closing.load(Ordering::Acquire)
    }

    fn check_connected(&self) -> Result<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(Error::NotConnected)
        }
    }

    fn types(&self) -> MutexGuard<'_, TypeCache> {
        self.types.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn teardown(&self) {
        if self.closing.swap(true, Ordering::AcqRel) {
            return;
        }
        let open = self.registry.drain();
        let count = open.len();
        for object in open {
            if let Err(e) = object.close(false) {
                tracing::warn!(target: "tessera::object", error = %e, "failed to force close object");
            }
        }
        self.types().clear();
        self.connected.store(false, Ordering::Release);
        tracing::debug!(target: "tessera::object", count, "connection closed");
    }

    fn lookup_type(self: &Arc<Self>, name: &str) -> Result<Arc<ObjectType>> {
        self.resolve_type(name, &mut Vec::new())
    }

    /// Look up a type, describing nested types as they are found. `resolving`
    /// holds the full names of the types being built further up the lookup.
    fn resolve_type(
        self: &Arc<Self>,
        name: &str,
        resolving: &mut Vec<String>,
    ) -> Result<Arc<ObjectType>> {
        self.check_connected()?;
        // The cache lock is not held while describing, as nested types are
        // looked up recursively.
        if let Some(ty) = self.types().get(name) {
            return Ok(ty);
        }
        let info = self.describe(name)?;
        let full_name = match &info.package_name {
            Some(package) => format!("{}.{}.{}", info.schema, package, info.name),
            None => format!("{}.{}", info.schema, info.name),
        };
        // A type cannot contain itself by value.
        if resolving.contains(&full_name) {
            return Err(Error::RecursiveType {
                type_name: full_name,
            });
        }
        resolving.push(full_name.clone());
        let ty = self.build_type(info, full_name, resolving);
        resolving.pop();
        let ty = ty?;
        self.types().insert(name, ty.clone());
        Ok(ty)
    }

    fn describe(&self, name: &str) -> Result<NativeTypeInfo> {
        let not_found = || Error::TypeNotFound {
            type_name: name.to_string(),
        };
        let mut parts = split_name(name);
        let (schema, ty) = match (parts.pop(), parts.pop(), parts.is_empty()) {
            (Some(ty), None, _) => (None, ty),
            (Some(ty), Some(schema), true) => (Some(schema), ty),
            _ => return Err(not_found()),
        };
        let schema = schema.map(|(s, quoted)| if quoted { s } else { s.to_uppercase() });

        let (ty, quoted) = ty;
        let mut candidates = vec![ty.clone()];
        if !quoted && ty.to_uppercase() != ty {
            candidates.push(ty.to_uppercase());
        }
        for candidate in candidates {
            match self.native.describe_type(schema.as_deref(), &candidate) {
                Ok(info) => return Ok(info),
                Err(e) if e.code == codes::TYPE_NOT_FOUND => continue,
                Err(e) => return Err(Error::native("get object type")(e)),
            }
        }
        Err(not_found())
    }

    fn build_type(
        self: &Arc<Self>,
        info: NativeTypeInfo,
        full_name: String,
        resolving: &mut Vec<String>,
    ) -> Result<Arc<ObjectType>> {
        let element_type_info = info
            .element
            .map(|element| self.data_type_info(element, resolving))
            .transpose()?;
        let mut attributes = IndexMap::with_capacity(info.attributes.len());
        for attr in info.attributes {
            let type_info = self.data_type_info(attr.type_info, resolving)?;
            attributes.insert(
                attr.name.clone(),
                Arc::new(ObjectAttr {
                    handle: attr.handle,
                    name: attr.name,
                    belongs_to: info.tdo,
                    belongs_to_name: full_name.clone(),
                    type_info,
                }),
            );
        }
        Ok(Arc::new(ObjectType {
            tdo: info.tdo,
            schema: info.schema,
            name: info.name,
            package_name: info.package_name,
            is_collection: info.is_collection,
            element_type_info,
            attributes,
            conn: Arc::downgrade(self),
            native: self.native.clone(),
            log: self.log_settings.clone(),
        }))
    }

    fn data_type_info(
        self: &Arc<Self>,
        info: NativeDataTypeInfo,
        resolving: &mut Vec<String>,
    ) -> Result<DataTypeInfo> {
        let object_type = match &info.object_type {
            Some(r) => Some(self.resolve_type(
                &format!("\"{}\".\"{}\"", r.schema, r.name),
                resolving,
            )?),
            None => None,
        };
        Ok(DataTypeInfo {
            type_code: info.type_code,
            db_type: DbType::from_code(info.type_code),
            object_type,
        })
    }
}

impl Drop for ConnectionInner {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Split a possibly qualified name into its parts, noting which were quoted.
fn split_name(name: &str) -> Vec<(String, bool)> {
    let mut parts = Vec::new();
    let mut rest = name.trim();
    loop {
        let (part, quoted, tail) = match rest.strip_prefix('"') {
            Some(q) => match q.find('"') {
                Some(end) => (&q[..end], true, &q[end + 1..]),
                None => (q, true, ""),
            },
            None => match rest.find('.') {
                Some(end) => (&rest[..end], false, &rest[end..]),
                None => (rest, false, ""),
            },
        };
        parts.push((part.trim().to_string(), quoted));
        match tail.trim_start().strip_prefix('.') {
            Some(tail) => rest = tail.trim_start(),
            None => break,
        }
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_qualified_names() {
        assert_eq!(split_name("person"), vec![("person".to_string(), false)]);
        assert_eq!(
            split_name("hr.\"Mixed.Case\""),
            vec![("hr".to_string(), false), ("Mixed.Case".to_string(), true)]
        );
        assert_eq!(
            split_name(" \"Sch\" . obj "),
            vec![("Sch".to_string(), true), ("obj".to_string(), false)]
        );
    }

    #[test]
    fn type_cache_evicts_least_recently_used() -> anyhow::Result<()> {
        let engine = Arc::new(crate::native::memory::MemoryEngine::new());
        engine.execute_ddl(
            "CREATE TYPE A AS OBJECT (X NUMBER); CREATE TYPE B AS OBJECT (X NUMBER);
             CREATE TYPE C AS OBJECT (X NUMBER);",
        )?;
        let conn = Tessera::new().type_cache_capacity(2).connect(engine)?;
        let a = conn.object_type("a")?;
        conn.object_type("b")?;
        assert_eq!(conn.cached_types_size(), 2);
        assert!(Arc::ptr_eq(&a, &conn.object_type("a")?));
        conn.object_type("c")?;
        assert_eq!(conn.cached_types_size(), 2);
        conn.clear_cached_types();
        assert_eq!(conn.cached_types_size(), 0);
        Ok(())
    }
}
