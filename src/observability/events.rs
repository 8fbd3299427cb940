//! Observable events of the mapping layer
//!
//! Events are explicit and typed.

use std::fmt;

use super::logger::Severity;

/// Observable events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Store gateway
    /// Credentials set on a connection
    CredentialsConfigured,
    /// Shared connection opened (first use or after close)
    ConnectionOpen,
    /// Shared connection released
    ConnectionClose,

    // Models
    /// Model added to a registry
    ModelRegistered,
    /// Declaration files read from disk
    ModelsLoaded,

    // Documents
    /// Document payload fetched and merged
    DocumentFetch,
    /// Fetch found no document under the key
    DocumentFetchMiss,
    /// Document encoded and written
    DocumentSave,
    /// Validation rejected a document
    DocumentValidationFailed,
    /// Raw field value decoded and cached
    FieldDecoded,
    /// View or design document resolved for a model
    ViewResolved,
}

impl Event {
    /// Returns the string representation for logging
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::CredentialsConfigured => "CREDENTIALS_CONFIGURED",
            Event::ConnectionOpen => "CONNECTION_OPEN",
            Event::ConnectionClose => "CONNECTION_CLOSE",
            Event::ModelRegistered => "MODEL_REGISTERED",
            Event::ModelsLoaded => "MODELS_LOADED",
            Event::DocumentFetch => "DOCUMENT_FETCH",
            Event::DocumentFetchMiss => "DOCUMENT_FETCH_MISS",
            Event::DocumentSave => "DOCUMENT_SAVE",
            Event::DocumentValidationFailed => "DOCUMENT_VALIDATION_FAILED",
            Event::FieldDecoded => "FIELD_DECODED",
            Event::ViewResolved => "VIEW_RESOLVED",
        }
    }

    /// Severity the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::FieldDecoded | Event::ViewResolved | Event::DocumentFetchMiss => Severity::Trace,
            Event::DocumentValidationFailed => Severity::Warn,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
