//! Store gateway
//!
//! The document layer's only view of the storage backend:
//! - [`Connection`]: lazily opened, explicitly closed, reopened on demand
//! - [`Bucket`]: keyed reads (optionally locking) and writes with expiry
//! - [`DesignDocument`] / [`View`]: named server-side views
//!
//! [`MemoryConnector`] is a complete in-process backend.

mod config;
mod connection;
mod errors;
mod memory;
mod traits;

pub use config::ConnectionConfig;
pub use connection::Connection;
pub use errors::{StoreError, StoreResult};
pub use memory::MemoryConnector;
pub use traits::{Bucket, Cas, Cluster, Connector, DesignDocument, View};
