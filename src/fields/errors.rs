//! # Field Errors
//!
//! Error types for the custom field types.

use thiserror::Error;

/// Result type for custom field construction
pub type FieldResult<T> = Result<T, FieldError>;

/// Custom field construction and verification errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    /// Address does not match the email pattern
    #[error("Email address is invalid: '{0}'")]
    InvalidEmail(String),

    /// Choice key is not part of the choice set
    #[error("Choice '{choice}' for {set} must be within its choices")]
    InvalidChoice { set: String, choice: String },

    /// Choice sets must declare at least one choice
    #[error("Choice set '{0}' must have choices and cannot be empty")]
    EmptyChoices(String),

    /// Raw password was empty
    #[error("Password must not be empty")]
    EmptyPassword,

    /// Value looked like a stored hash but could not be parsed
    #[error("Malformed password hash")]
    MalformedHash,

    /// Password hashing failed
    #[error("Internal error: password hashing failed")]
    HashingFailed,
}
