use log::LevelFilter;
use tracing::Level;

/// Target for instance lifecycle events.
pub const OBJECT_TARGET: &str = "tessera::object";
/// Target for value conversion events.
pub const CONVERT_TARGET: &str = "tessera::convert";

#[derive(Clone, Debug)]
#[non_exhaustive]
/// Logging configuration for object lifecycle and conversions.
pub struct LogSettings {
    /// Log level for allocate, copy and close events.
    pub lifecycle_level: LevelFilter,
    /// Log level for individual value conversions.
    pub conversion_level: LevelFilter,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            lifecycle_level: LevelFilter::Debug,
            conversion_level: LevelFilter::Trace,
        }
    }
}

impl LogSettings {
    /// Configure lifecycle logging level.
    pub fn log_lifecycle(&mut self, level: LevelFilter) {
        self.lifecycle_level = level;
    }

    /// Configure conversion logging level.
    pub fn log_conversions(&mut self, level: LevelFilter) {
        self.conversion_level = level;
    }

    /// Returns `true` if any logging level is enabled.
    pub fn is_enabled(&self) -> bool {
        self.lifecycle_level != LevelFilter::Off || self.conversion_level != LevelFilter::Off
    }

    /// Record a lifecycle transition of an instance.
    pub fn lifecycle(&self, action: &str, object_type: &str, instance: Option<u64>) {
        let Some(level) = enabled_level(self.lifecycle_level, OBJECT_TARGET) else {
            return;
        };
        let instance = instance.unwrap_or_default();
        match level {
            Level::ERROR => {
                tracing::event!(target: OBJECT_TARGET, Level::ERROR, action, object_type, instance)
            }
            Level::WARN => {
                tracing::event!(target: OBJECT_TARGET, Level::WARN, action, object_type, instance)
            }
            Level::INFO => {
                tracing::event!(target: OBJECT_TARGET, Level::INFO, action, object_type, instance)
            }
            Level::DEBUG => {
                tracing::event!(target: OBJECT_TARGET, Level::DEBUG, action, object_type, instance)
            }
            Level::TRACE => {
                tracing::event!(target: OBJECT_TARGET, Level::TRACE, action, object_type, instance)
            }
        }
    }

    /// Record a single conversion between a native type and an external type.
    pub fn conversion(&self, direction: &str, db_type: &str, value_type: &str, is_null: bool) {
        let Some(level) = enabled_level(self.conversion_level, CONVERT_TARGET) else {
            return;
        };
        match level {
            Level::ERROR => tracing::event!(
                target: CONVERT_TARGET,
                Level::ERROR,
                direction,
                db_type,
                value_type,
                is_null
            ),
            Level::WARN => tracing::event!(
                target: CONVERT_TARGET,
                Level::WARN,
                direction,
                db_type,
                value_type,
                is_null
            ),
            Level::INFO => tracing::event!(
                target: CONVERT_TARGET,
                Level::INFO,
                direction,
                db_type,
                value_type,
                is_null
            ),
            Level::DEBUG => tracing::event!(
                target: CONVERT_TARGET,
                Level::DEBUG,
                direction,
                db_type,
                value_type,
                is_null
            ),
            Level::TRACE => tracing::event!(
                target: CONVERT_TARGET,
                Level::TRACE,
                direction,
                db_type,
                value_type,
                is_null
            ),
        }
    }
}

#[doc(hidden)]
pub fn private_level_filter_to_levels(filter: log::LevelFilter) -> Option<(Level, log::Level)> {
    let tracing_level = match filter {
        log::LevelFilter::Error => Some(Level::ERROR),
        log::LevelFilter::Warn => Some(Level::WARN),
        log::LevelFilter::Info => Some(Level::INFO),
        log::LevelFilter::Debug => Some(Level::DEBUG),
        log::LevelFilter::Trace => Some(Level::TRACE),
        log::LevelFilter::Off => None,
    };

    tracing_level.zip(filter.to_level())
}

/// Resolve the configured filter to a tracing level, if anything listens at it.
fn enabled_level(filter: LevelFilter, target: &str) -> Option<Level> {
    let (tracing_level, log_level) = private_level_filter_to_levels(filter)?;
    // The enabled level could be set from either tracing world or log world, so check both.
    if log::log_enabled!(target: target, log_level) || tracing_enabled_for(tracing_level) {
        Some(tracing_level)
    } else {
        None
    }
}

/// Check whether tracing is enabled for our targets at the provided level.
fn tracing_enabled_for(level: Level) -> bool {
    match level {
        Level::ERROR => tracing::enabled!(Level::ERROR),
        Level::WARN => tracing::enabled!(Level::WARN),
        Level::INFO => tracing::enabled!(Level::INFO),
        Level::DEBUG => tracing::enabled!(Level::DEBUG),
        Level::TRACE => tracing::enabled!(Level::TRACE),
    }
}
