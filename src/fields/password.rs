//! # Password Field
//!
//! Holds an Argon2id password hash. Raw passwords are hashed on
//! construction; values that are already PHC-formatted Argon2 hashes (as
//! fetched from storage) are kept untouched.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;

use super::errors::{FieldError, FieldResult};
use super::{CustomField, CustomKind};

const HASH_PREFIX: &str = "$argon2";

/// A hashed password.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PasswordField {
    hash: String,
}

impl PasswordField {
    /// Create from either a raw password or a stored hash.
    pub fn new(password: &str) -> FieldResult<Self> {
        if password.is_empty() {
            return Err(FieldError::EmptyPassword);
        }
        if password.starts_with(HASH_PREFIX) {
            return Self::from_hash(password);
        }
        Ok(Self {
            hash: hash_password(password)?,
        })
    }

    /// Wrap an existing hash without rehashing.
    pub fn from_hash(hash: &str) -> FieldResult<Self> {
        PasswordHash::new(hash).map_err(|_| FieldError::MalformedHash)?;
        Ok(Self {
            hash: hash.to_string(),
        })
    }

    /// Verify a raw password against the stored hash.
    pub fn check_password(&self, raw_password: &str) -> bool {
        match PasswordHash::new(&self.hash) {
            Ok(parsed) => Argon2::default()
                .verify_password(raw_password.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }
}

impl CustomField for PasswordField {
    fn kind(&self) -> CustomKind {
        CustomKind::Password
    }

    fn value(&self) -> &str {
        &self.hash
    }
}

fn hash_password(password: &str) -> FieldResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| FieldError::HashingFailed)
}
