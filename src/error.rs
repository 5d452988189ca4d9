//! Error types for the migration execution core.
//!
//! One enum covers the whole crate:
//! - Configuration errors (bad or conflicting target inputs)
//! - State errors (no context configured yet)
//! - Driver errors from the live store, surfaced unmodified
//! - Render/output errors from the rendering sink

use thiserror::Error;

/// Boxed error produced by a live connection's driver.
pub type DriverError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error type for all migration operations.
#[derive(Debug, Error)]
pub enum MigrateError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("No migration context has been configured yet")]
    NotConfigured,

    #[error("The migration context is in use by a running migration")]
    ContextInUse,

    #[error("Invalid revision identifier {value:?}: {reason}")]
    InvalidRevision { value: String, reason: &'static str },

    #[error("Cannot render statement: {0}")]
    Render(String),

    #[error("Failed to write rendered output: {0}")]
    Output(#[from] std::io::Error),

    #[error(transparent)]
    Driver(DriverError),
}

impl MigrateError {
    /// Shorthand for building a [`MigrateError::Configuration`].
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Whether this error is a configuration problem rather than a runtime one.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::InvalidRevision { .. })
    }
}

impl From<rusqlite::Error> for MigrateError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Driver(Box::new(err))
    }
}

/// Result alias used throughout the crate.
pub type Result<T, E = MigrateError> = std::result::Result<T, E>;
