//! Store gateway errors

use thiserror::Error;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Failures reported by a storage backend
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Credentials are not set; configure the connection before first use")]
    CredentialsNotSet,

    /// The only condition callers are expected to branch on
    #[error("Key not found: '{0}'")]
    NotFound(String),

    #[error("Authentication failed for user '{0}'")]
    AuthenticationFailed(String),

    #[error("Bucket '{0}' does not exist")]
    NoSuchBucket(String),

    #[error("Design document '{0}' does not exist")]
    NoSuchDesignDocument(String),

    #[error("Key '{0}' is locked")]
    Locked(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}
