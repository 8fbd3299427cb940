//! Schema error types
//!
//! Error codes:
//! - ODM_SCHEMA_INVALID_DECLARATION (model structure declared incorrectly)
//! - ODM_SCHEMA_REQUIRED_MISSING (required field absent or null)
//! - ODM_SCHEMA_KEY_FIELD_MISSING (declared key field not provided)
//! - ODM_SCHEMA_TYPE_MISMATCH (value does not fit its declared node)
//! - ODM_SCHEMA_UNHASHABLE_KEY (type-pair key type cannot key a mapping)
//! - ODM_SCHEMA_UNSAVED_REFERENCE (reference to a document without an id)
//! - ODM_SCHEMA_DUPLICATE_MODEL (doc_type registered twice)

use std::fmt;

/// Schema-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaErrorCode {
    /// Model declaration is not well formed
    InvalidDeclaration,
    /// Required field missing and no default registered
    RequiredMissing,
    /// Key field declared but not provided
    KeyFieldMissing,
    /// Instance value does not fit the structure
    TypeMismatch,
    /// Type-pair key type is not hashable
    UnhashableKey,
    /// Attempt to store a reference to an unsaved document
    UnsavedReference,
    /// Two models share a doc_type
    DuplicateModel,
}

impl SchemaErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            SchemaErrorCode::InvalidDeclaration => "ODM_SCHEMA_INVALID_DECLARATION",
            SchemaErrorCode::RequiredMissing => "ODM_SCHEMA_REQUIRED_MISSING",
            SchemaErrorCode::KeyFieldMissing => "ODM_SCHEMA_KEY_FIELD_MISSING",
            SchemaErrorCode::TypeMismatch => "ODM_SCHEMA_TYPE_MISMATCH",
            SchemaErrorCode::UnhashableKey => "ODM_SCHEMA_UNHASHABLE_KEY",
            SchemaErrorCode::UnsavedReference => "ODM_SCHEMA_UNSAVED_REFERENCE",
            SchemaErrorCode::DuplicateModel => "ODM_SCHEMA_DUPLICATE_MODEL",
        }
    }
}

impl fmt::Display for SchemaErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Field-level failure details
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationDetails {
    /// Field path (e.g., "category.Cooking.Turkish")
    pub field: String,
    /// Expected type description
    pub expected: String,
    /// Given type description
    pub given: String,
}

impl ValidationDetails {
    pub fn new(field: impl Into<String>, expected: impl Into<String>, given: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            expected: expected.into(),
            given: given.into(),
        }
    }

    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::new(field, "field to be present", "missing")
    }
}

impl fmt::Display for ValidationDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'{}' does not fit the required structure, expected {} but '{}' is given.",
            self.field, self.expected, self.given
        )
    }
}

/// Structure error with full context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaError {
    code: SchemaErrorCode,
    message: String,
    details: Option<ValidationDetails>,
}

impl SchemaError {
    /// Model declaration error with a free-form reason
    pub fn invalid_declaration(model: impl fmt::Display, reason: impl Into<String>) -> Self {
        Self {
            code: SchemaErrorCode::InvalidDeclaration,
            message: format!("Structure is not properly set for {}: {}", model, reason.into()),
            details: None,
        }
    }

    /// Required field absent (without default) or null
    pub fn required_missing(field: impl Into<String>) -> Self {
        let field = field.into();
        Self {
            code: SchemaErrorCode::RequiredMissing,
            message: format!("Required field for '{}' is missing.", field),
            details: Some(ValidationDetails::missing_field(field)),
        }
    }

    /// Key field declared on the model but not provided
    pub fn key_field_missing(field: impl Into<String>) -> Self {
        let field = field.into();
        Self {
            code: SchemaErrorCode::KeyFieldMissing,
            message: format!("Key field '{}' is defined but not provided.", field),
            details: Some(ValidationDetails::missing_field(field)),
        }
    }

    /// Value does not fit its node
    pub fn type_mismatch(
        field: impl Into<String>,
        expected: impl Into<String>,
        given: impl Into<String>,
    ) -> Self {
        let details = ValidationDetails::new(field, expected, given);
        Self {
            code: SchemaErrorCode::TypeMismatch,
            message: details.to_string(),
            details: Some(details),
        }
    }

    /// Type-pair key type cannot be used as a mapping key
    pub fn unhashable_key(field: impl Into<String>, key_type: impl Into<String>) -> Self {
        let details = ValidationDetails::new(field, "hashable key type", key_type);
        Self {
            code: SchemaErrorCode::UnhashableKey,
            message: format!("Structure keys must be hashable, '{}' given.", details.given),
            details: Some(details),
        }
    }

    /// Referenced document has no id yet
    pub fn unsaved_reference(field: impl Into<String>, model: impl Into<String>) -> Self {
        let model = model.into();
        Self {
            code: SchemaErrorCode::UnsavedReference,
            message: format!("Trying to relate an unsaved document; \"{}\"", model),
            details: Some(ValidationDetails::new(field, "saved document", model)),
        }
    }

    /// Second model registered under an existing doc_type
    pub fn duplicate_model(doc_type: impl Into<String>) -> Self {
        Self {
            code: SchemaErrorCode::DuplicateModel,
            message: format!("A model with doc_type '{}' is already registered", doc_type.into()),
            details: None,
        }
    }

    /// Returns the error code
    pub fn code(&self) -> SchemaErrorCode {
        self.code
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns field details if applicable
    pub fn details(&self) -> Option<&ValidationDetails> {
        self.details.as_ref()
    }

    /// Offending field path, if any
    pub fn field(&self) -> Option<&str> {
        self.details.as_ref().map(|d| d.field.as_str())
    }

    pub fn is_unsaved_reference(&self) -> bool {
        self.code == SchemaErrorCode::UnsavedReference
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.code(), self.message)
    }
}

impl std::error::Error for SchemaError {}

/// Result type for schema operations
pub type SchemaResult<T> = Result<T, SchemaError>;
