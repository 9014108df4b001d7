//! Error types for tenant database management.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while resolving, probing or provisioning tenant databases.
#[derive(Debug, Error)]
pub enum TenantError {
    /// Tenant identifier contains a character that is unsafe in a database name.
    #[error("Tenant name contains an invalid character: {0:?}")]
    InvalidIdentifier(String),

    /// Naming template does not contain exactly one placeholder.
    #[error("Malformed database template: {0}")]
    MalformedTemplate(String),

    /// The readiness lock could not be obtained or released cleanly.
    #[error("Readiness lock failed for {}: {source}", path.display())]
    LockAcquisition {
        /// Lock file the operation was working on.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// The target database does not exist.
    ///
    /// Collaborators report this condition; existence checks and drops
    /// recover it locally.
    #[error("Database does not exist: {0}")]
    NoDatabase(String),

    /// Connecting to the database server failed.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A catalog or administrative statement failed.
    #[error("Query error: {0}")]
    Query(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl TenantError {
    /// Whether this error is the recoverable "database does not exist" condition.
    pub fn is_no_database(&self) -> bool {
        matches!(self, TenantError::NoDatabase(_))
    }

    pub(crate) fn lock(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TenantError::LockAcquisition {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for tenant database operations.
pub type TenantResult<T> = Result<T, TenantError>;
