/// Error codes raised by the in-process engine. The numbers follow the
/// server's own `ORA-` codes for the same conditions.
pub(crate) mod codes {
    pub const INVALID_HANDLE: i32 = 21_560;
    pub const TYPE_NOT_FOUND: i32 = 4_043;
    pub const ELEMENT_MISSING: i32 = 22_160;
    pub const SUBSCRIPT_OUTSIDE_LIMIT: i32 = 22_165;
    pub const TRIM_TOO_LARGE: i32 = 22_167;
    pub const LIMIT_EXCEEDED: i32 = 6_532;
    pub const INJECTED: i32 = 600;
}

/// An error returned from the native layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("(code: {code}) {message}")]
pub struct NativeError {
    pub code: i32,
    pub message: String,
}

impl NativeError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub(crate) fn invalid_handle(what: &str, raw: u64) -> Self {
        Self::new(codes::INVALID_HANDLE, format!("invalid {what} handle {raw}"))
    }

    /// True if the error reports an element missing from a collection.
    pub fn is_missing_element(&self) -> bool {
        self.code == codes::ELEMENT_MISSING
    }
}
