use std::io;

use thiserror::Error;

use crate::key::AccessLevel;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum StorageError {
    // Lifecycle
    #[error("storage plugin is not configured")]
    NotConfigured,

    #[error("storage plugin is already configured")]
    AlreadyConfigured,

    #[error("invalid storage configuration: {0}")]
    Configuration(String),

    // Request validation
    #[error("invalid key: {0}")]
    InvalidKey(String), // Contains the rejected key

    #[error("access level `{0}` requires an identity id")]
    MissingIdentity(AccessLevel),

    #[error("{0} not found")]
    NotFound(String), // Contains the user-facing key

    // Internal Errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{operation} failed: {source}")]
    Backend {
        operation: &'static str,
        #[source]
        source: BoxError,
    },
}

impl StorageError {
    /// Wraps a backend SDK failure, tagging it with the operation that failed.
    pub fn backend(operation: &'static str, source: impl Into<BoxError>) -> Self {
        Self::Backend {
            operation,
            source: source.into(),
        }
    }
}

pub type Result<T, E = StorageError> = std::result::Result<T, E>;
