use std::{fmt, sync::Arc};

use crate::{
    DbType, Error, Result,
    native::{LocatorHandle, Native},
};

enum_mode! {
    /// The kinds of large object.
    pub LobKind {
        Clob => "CLOB",
        NClob => "NCLOB",
        Blob => "BLOB",
        Bfile => "BFILE",
    }
    default Blob
}

impl LobKind {
    /// The large object kind stored by a native type, if any.
    pub fn from_db_type(db_type: DbType) -> Option<Self> {
        match db_type {
            DbType::Clob => Some(LobKind::Clob),
            DbType::NClob => Some(LobKind::NClob),
            DbType::Blob => Some(LobKind::Blob),
            DbType::Bfile => Some(LobKind::Bfile),
            _ => None,
        }
    }

    pub fn is_character(&self) -> bool {
        matches!(self, LobKind::Clob | LobKind::NClob)
    }
}

struct LobInner {
    native: Arc<dyn Native>,
    locator: LocatorHandle,
    kind: LobKind,
}

impl Drop for LobInner {
    fn drop(&mut self) {
        if let Err(e) = self.native.lob_free(self.locator) {
            tracing::warn!(target: "tessera::lob", error = %e, "failed to free large object");
        }
    }
}

/// A reference counted handle to a large object. The locator is freed when the
/// last clone is dropped.
#[derive(Clone)]
pub struct Lob(Arc<LobInner>);

impl Lob {
    /// Allocate a new, empty large object.
    pub(crate) fn new(native: &Arc<dyn Native>, kind: LobKind) -> Result<Self> {
        let locator = native
            .lob_alloc(kind)
            .map_err(Error::native("allocate large object"))?;
        Ok(Lob(Arc::new(LobInner {
            native: native.clone(),
            locator,
            kind,
        })))
    }

    pub fn kind(&self) -> LobKind {
        self.0.kind
    }

    pub(crate) fn locator(&self) -> LocatorHandle {
        self.0.locator
    }

    /// Number of live handles to this large object.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }

    pub fn ptr_eq(a: &Lob, b: &Lob) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    /// Read the whole content of the large object.
    pub fn read_to_end(&self) -> Result<Vec<u8>> {
        self.0
            .native
            .lob_read(self.0.locator)
            .map_err(Error::native("read large object"))
    }

    /// Replace the content of the large object.
    pub fn write_all(&self, bytes: &[u8]) -> Result<()> {
        self.0
            .native
            .lob_write(self.0.locator, bytes)
            .map_err(Error::native("write large object"))
    }
}

impl fmt::Debug for Lob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lob")
            .field("kind", &self.0.kind)
            .field("locator", &self.0.locator)
            .finish()
    }
}
