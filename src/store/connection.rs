//! Shared store connection
//!
//! Lifecycle:
//! - `configure` sets credentials; nothing is opened yet
//! - the first `bucket` call opens the connection and caches it
//! - `close` releases it and is a no-op when nothing is open
//! - a `bucket` call after `close` opens a fresh connection

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::config::ConnectionConfig;
use super::errors::{StoreError, StoreResult};
use super::traits::{Bucket, Cluster, Connector};
use crate::observability::{log_event_with_fields, Event};

/// Lazily opened connection shared by every document of a session.
pub struct Connection {
    connector: Arc<dyn Connector>,
    config: Mutex<Option<ConnectionConfig>>,
    cluster: Mutex<Option<Arc<dyn Cluster>>>,
}

impl Connection {
    /// Creates an unconfigured connection.
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            config: Mutex::new(None),
            cluster: Mutex::new(None),
        }
    }

    /// Creates a connection with credentials already set.
    pub fn with_config(connector: Arc<dyn Connector>, config: ConnectionConfig) -> Self {
        let connection = Self::new(connector);
        connection.configure(config);
        connection
    }

    /// Sets the credentials used by the next open.
    pub fn configure(&self, config: ConnectionConfig) {
        log_event_with_fields(
            Event::CredentialsConfigured,
            &[("server", &config.server_addr()), ("username", &config.username)],
        );
        *lock(&self.config) = Some(config);
    }

    pub fn is_configured(&self) -> bool {
        lock(&self.config).is_some()
    }

    pub fn is_open(&self) -> bool {
        lock(&self.cluster).is_some()
    }

    /// Handle scoped to bucket `name`, opening the connection if needed.
    ///
    /// # Errors
    ///
    /// - `StoreError::CredentialsNotSet` if `configure` was never called
    /// - whatever the backend reports while connecting or opening the bucket
    pub fn bucket(&self, name: &str) -> StoreResult<Arc<dyn Bucket>> {
        let cluster = self.cluster()?;
        cluster.bucket(name)
    }

    fn cluster(&self) -> StoreResult<Arc<dyn Cluster>> {
        let mut slot = lock(&self.cluster);
        if let Some(cluster) = slot.as_ref() {
            return Ok(Arc::clone(cluster));
        }

        let config = lock(&self.config)
            .clone()
            .ok_or(StoreError::CredentialsNotSet)?;
        let cluster = self.connector.connect(&config)?;
        log_event_with_fields(Event::ConnectionOpen, &[("server", &config.server_addr())]);
        *slot = Some(Arc::clone(&cluster));
        Ok(cluster)
    }

    /// Releases the connection if one is open.
    pub fn close(&self) {
        if let Some(cluster) = lock(&self.cluster).take() {
            cluster.close();
            log_event_with_fields(Event::ConnectionClose, &[]);
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
