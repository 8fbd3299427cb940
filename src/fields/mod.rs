//! Custom field types
//!
//! Self-validating scalar wrappers with a canonical storage value. A schema
//! declares a field with a [`CustomKind`]; instances hold a [`CustomValue`].
//!
//! - [`EmailField`]: validated email address, stored as the address
//! - [`ChoiceField`]: one key of a [`ChoiceSet`], stored as the key
//! - [`PasswordField`]: Argon2id hash, stored as the PHC hash string

mod choice;
mod email;
mod errors;
mod password;

use std::fmt;
use std::sync::Arc;

pub use choice::{ChoiceField, ChoiceSet};
pub use email::EmailField;
pub use errors::{FieldError, FieldResult};
pub use password::PasswordField;

/// Behavior shared by all custom field types.
pub trait CustomField {
    /// The schema kind this value satisfies.
    fn kind(&self) -> CustomKind;

    /// Canonical value written to storage.
    fn value(&self) -> &str;
}

/// Custom field kind as it appears in a structure declaration.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CustomKind {
    Email,
    Password,
    Choice(Arc<ChoiceSet>),
}

impl CustomKind {
    /// Type name used in error messages.
    pub fn name(&self) -> &str {
        match self {
            CustomKind::Email => "email",
            CustomKind::Password => "password",
            CustomKind::Choice(set) => set.name(),
        }
    }

    /// Construct a value of this kind from its stored form.
    pub fn parse(&self, raw: &str) -> FieldResult<CustomValue> {
        match self {
            CustomKind::Email => EmailField::new(raw).map(CustomValue::Email),
            CustomKind::Password => PasswordField::new(raw).map(CustomValue::Password),
            CustomKind::Choice(set) => ChoiceField::new(set, raw).map(CustomValue::Choice),
        }
    }
}

impl fmt::Display for CustomKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A constructed custom field of any kind.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CustomValue {
    Email(EmailField),
    Password(PasswordField),
    Choice(ChoiceField),
}

impl CustomValue {
    /// Returns whether this value is an instance of `kind`.
    pub fn is_kind(&self, kind: &CustomKind) -> bool {
        match (self, kind) {
            (CustomValue::Email(_), CustomKind::Email) => true,
            (CustomValue::Password(_), CustomKind::Password) => true,
            (CustomValue::Choice(c), CustomKind::Choice(set)) => c.set() == set,
            _ => false,
        }
    }
}

impl CustomField for CustomValue {
    fn kind(&self) -> CustomKind {
        match self {
            CustomValue::Email(f) => f.kind(),
            CustomValue::Password(f) => f.kind(),
            CustomValue::Choice(f) => f.kind(),
        }
    }

    fn value(&self) -> &str {
        match self {
            CustomValue::Email(f) => f.value(),
            CustomValue::Password(f) => f.value(),
            CustomValue::Choice(f) => f.value(),
        }
    }
}

impl From<EmailField> for CustomValue {
    fn from(field: EmailField) -> Self {
        CustomValue::Email(field)
    }
}

impl From<PasswordField> for CustomValue {
    fn from(field: PasswordField) -> Self {
        CustomValue::Password(field)
    }
}

impl From<ChoiceField> for CustomValue {
    fn from(field: ChoiceField) -> Self {
        CustomValue::Choice(field)
    }
}
