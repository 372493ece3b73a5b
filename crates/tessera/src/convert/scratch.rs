use std::{mem, sync::Arc};

use crate::{
    DbType, Lob,
    native::{DescriptorHandle, Native, RawHandle, StringHandle},
};

/// What a scratch buffer currently holds.
#[derive(Debug, Default)]
pub(crate) enum Scratch {
    #[default]
    Empty,
    String(StringHandle),
    Raw(RawHandle),
    Timestamp(DescriptorHandle),
    Lob(Lob),
}

/// Native storage that lives for exactly one conversion into the native
/// encoding.
///
/// The buffer is keyed on the data type of the value being converted and is
/// released by [`ScratchBuffer::clear`], which runs once per conversion attempt
/// whether or not the conversion and the native call that used its result
/// succeeded. Dropping an uncleared buffer clears it.
#[derive(Debug)]
pub(crate) struct ScratchBuffer {
    native: Arc<dyn Native>,
    db_type: DbType,
    held: Scratch,
}

impl ScratchBuffer {
    pub fn new(native: Arc<dyn Native>, db_type: DbType) -> Self {
        Self {
            native,
            db_type,
            held: Scratch::Empty,
        }
    }

    pub fn hold(&mut self, scratch: Scratch) {
        self.clear();
        self.held = scratch;
    }

    /// Release whatever the buffer holds.
    pub fn clear(&mut self) {
        let held = mem::take(&mut self.held);
        let result = match held {
            Scratch::Empty => Ok(()),
            Scratch::String(h) => self.native.string_free(h),
            Scratch::Raw(h) => self.native.raw_free(h),
            // Descriptors are freed as the descriptor kind of the data type.
            Scratch::Timestamp(h) => self.native.descriptor_free(h, self.db_type),
            // Dropping our reference releases the large object.
            Scratch::Lob(lob) => {
                drop(lob);
                Ok(())
            }
        };
        if let Err(e) = result {
            tracing::warn!(
                target: "tessera::convert",
                db_type = %self.db_type,
                error = %e,
                "failed to release scratch buffer"
            );
        }
    }
}

impl Drop for ScratchBuffer {
    fn drop(&mut self) {
        self.clear();
    }
}
