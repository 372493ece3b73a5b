use std::sync::Arc;

use log::LevelFilter;

use crate::{Connection, Result, logger::LogSettings, native::Native};

/// Options for opening a [`Connection`].
#[derive(Clone, Debug)]
pub struct Tessera {
    pub(crate) log_settings: LogSettings,
    pub(crate) type_cache_capacity: usize,
}

impl Default for Tessera {
    fn default() -> Self {
        Self::new()
    }
}

impl Tessera {
    /// Construct `Self` with default options.
    #[must_use]
    pub fn new() -> Self {
        Self {
            log_settings: Default::default(),
            type_cache_capacity: crate::type_cache::DEFAULT_CAPACITY,
        }
    }

    /// Set the level at which instance allocation, copy and close are logged.
    #[must_use]
    pub fn log_lifecycle(mut self, level: LevelFilter) -> Self {
        self.log_settings.log_lifecycle(level);
        self
    }

    /// Set the level at which individual value conversions are logged.
    #[must_use]
    pub fn log_conversions(mut self, level: LevelFilter) -> Self {
        self.log_settings.log_conversions(level);
        self
    }

    /// Sets the capacity of the connection's cache of described types.
    ///
    /// The default is 128.
    #[must_use]
    pub fn type_cache_capacity(mut self, capacity: usize) -> Self {
        self.type_cache_capacity = capacity;
        self
    }

    /// Open a connection over a native engine.
    pub fn connect(&self, native: Arc<dyn Native>) -> Result<Connection> {
        Ok(Connection::establish(self, native))
    }
}
