//! Store gateway contract
//!
//! A [`Connector`] opens a [`Cluster`] from credentials; a cluster hands out
//! [`Bucket`]s. Backends implement these traits; the document layer only
//! talks to them through [`super::Connection`].

use std::fmt;
use std::sync::Arc;

use super::config::ConnectionConfig;
use super::errors::StoreResult;

/// Opaque optimistic-concurrency token
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Cas(u64);

impl Cas {
    pub fn new(raw: u64) -> Self {
        Cas(raw)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Cas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opens connections to a storage backend.
pub trait Connector: Send + Sync {
    fn connect(&self, config: &ConnectionConfig) -> StoreResult<Arc<dyn Cluster>>;
}

/// A live connection.
pub trait Cluster: Send + Sync {
    /// Handle scoped to one bucket.
    fn bucket(&self, name: &str) -> StoreResult<Arc<dyn Bucket>>;

    /// Releases the connection.
    fn close(&self);
}

/// Key-value partition of the store.
pub trait Bucket: Send + Sync {
    fn name(&self) -> &str;

    /// Reads `key`, optionally taking a pessimistic lock.
    ///
    /// Fails with `StoreError::NotFound` when the key is absent.
    fn get(&self, key: &str, lock: bool) -> StoreResult<(Cas, String)>;

    /// Writes `payload` under `key`; an expiry of 0 never expires.
    fn set(&self, key: &str, expiry_secs: u32, payload: &str) -> StoreResult<Cas>;

    fn design_document(&self, name: &str) -> StoreResult<DesignDocument>;
}

/// Named server-side view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct View {
    pub design_doc: String,
    pub name: String,
    pub map: String,
    pub reduce: Option<String>,
}

impl View {
    pub fn new(design_doc: impl Into<String>, name: impl Into<String>, map: impl Into<String>) -> Self {
        Self {
            design_doc: design_doc.into(),
            name: name.into(),
            map: map.into(),
            reduce: None,
        }
    }

    pub fn with_reduce(mut self, reduce: impl Into<String>) -> Self {
        self.reduce = Some(reduce.into());
        self
    }
}

/// Group of views stored under `_design/<name>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesignDocument {
    name: String,
    views: Vec<View>,
}

impl DesignDocument {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            views: Vec::new(),
        }
    }

    /// Adds a view with the given map function.
    pub fn with_view(mut self, name: impl Into<String>, map: impl Into<String>) -> Self {
        let view = View::new(self.name.clone(), name, map);
        self.views.push(view);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Storage key of the design document.
    pub fn key(&self) -> String {
        format!("_design/{}", self.name)
    }

    pub fn views(&self) -> &[View] {
        &self.views
    }

    pub fn view(&self, name: &str) -> Option<&View> {
        self.views.iter().find(|v| v.name == name)
    }
}
