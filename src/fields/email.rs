//! # Email Field
//!
//! Email address custom field, validated against a dot-atom or quoted local
//! part and a domain name or bracketed IPv4 literal.

use regex::Regex;
use std::sync::OnceLock;

use super::errors::{FieldError, FieldResult};
use super::{CustomField, CustomKind};

const EMAIL_PATTERN: &str = r#"(?i)^(?:[-!#$%&'*+/=?^_`{}|~0-9A-Z]+(?:\.[-!#$%&'*+/=?^_`{}|~0-9A-Z]+)*|"(?:[\x01-\x08\x0b\x0c\x0e-\x1f!#-\[\]-\x7f]|\\[\x01-\x09\x0b\x0c\x0e-\x7f])*")@(?:(?:[A-Z0-9](?:[A-Z0-9-]{0,61}[A-Z0-9])?\.)+[A-Z]{2,6}\.?|\[(?:25[0-5]|2[0-4]\d|[0-1]?\d?\d)(?:\.(?:25[0-5]|2[0-4]\d|[0-1]?\d?\d)){3}\])$"#;

static EMAIL_RE: OnceLock<Regex> = OnceLock::new();

fn email_regex() -> &'static Regex {
    EMAIL_RE.get_or_init(|| Regex::new(EMAIL_PATTERN).expect("email pattern compiles"))
}

/// A validated email address.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EmailField {
    address: String,
}

impl EmailField {
    /// Create an email field, rejecting invalid addresses.
    pub fn new(address: impl Into<String>) -> FieldResult<Self> {
        let address = address.into();
        if !Self::is_valid(&address) {
            return Err(FieldError::InvalidEmail(address));
        }
        Ok(Self { address })
    }

    /// Returns whether the address matches the email pattern.
    pub fn is_valid(address: &str) -> bool {
        email_regex().is_match(address)
    }

    /// The address as given.
    pub fn address(&self) -> &str {
        &self.address
    }
}

impl CustomField for EmailField {
    fn kind(&self) -> CustomKind {
        CustomKind::Email
    }

    fn value(&self) -> &str {
        &self.address
    }
}
