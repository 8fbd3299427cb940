//! Document subsystem
//!
//! - [`Document`]: one record bound to a model and a session
//! - [`Session`]: shared connection plus model registry, passed to every
//!   document
//! - [`ModelRegistry`]: models and their view registrations

mod document;
mod registry;
mod session;

pub use document::{Document, KeyOrData};
pub use registry::ModelRegistry;
pub use session::Session;

use sha2::{Digest, Sha256};

/// Length of ids derived from document content.
pub const HASHED_KEY_LEN: usize = 12;

/// Id for a keyless document: leading hex digits of the SHA-256 digest of
/// its serialized payload.
pub fn derive_hashed_key(payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..HASHED_KEY_LEN].to_string()
}
