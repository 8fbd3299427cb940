//! # Crate Errors
//!
//! Top-level error type returned by document and session operations.

use thiserror::Error;

use crate::schema::SchemaError;
use crate::store::StoreError;

/// Result type for document operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to callers of the mapping layer
#[derive(Debug, Error)]
pub enum Error {
    /// Store credentials missing or connection settings unusable
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Model declaration or instance data violates its structure
    #[error(transparent)]
    Structure(#[from] SchemaError),

    /// Document requested by key does not exist in the backend
    #[error("{model} document with the key '{key}' not found.")]
    NotFound { model: String, key: String },

    /// Raw stored value could not be decoded into its declared type
    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    /// Item access for a key absent from the mapping
    #[error("Key not found: '{0}'")]
    MissingKey(String),

    /// Attribute access for a field the model does not declare
    #[error("{model} has no field '{field}'")]
    UnknownField { model: String, field: String },

    /// Stored payload is not a JSON object
    #[error("Malformed payload for '{key}': {reason}")]
    Payload { key: String, reason: String },

    /// Anything else reported by the storage transport
    #[error("Backend error: {0}")]
    Backend(StoreError),
}

impl Error {
    pub(crate) fn invalid_value(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl ToString,
    ) -> Self {
        Error::InvalidValue {
            field: field.into(),
            value: value.into(),
            reason: reason.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// The structure error, if this is one.
    pub fn as_structure(&self) -> Option<&SchemaError> {
        match self {
            Error::Structure(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::CredentialsNotSet | StoreError::InvalidConfig(_) => {
                Error::Configuration(err.to_string())
            }
            other => Error::Backend(other),
        }
    }
}
