//! In-memory store backend
//!
//! Keeps every bucket in process memory behind one mutex. Data survives
//! close and reopen of connections made through the same connector.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use super::config::ConnectionConfig;
use super::errors::{StoreError, StoreResult};
use super::traits::{Bucket, Cas, Cluster, Connector, DesignDocument};

#[derive(Debug)]
struct Entry {
    cas: Cas,
    payload: String,
    expires_at: Option<Instant>,
    locked: bool,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

#[derive(Debug, Default)]
struct BucketState {
    entries: HashMap<String, Entry>,
    design_docs: HashMap<String, DesignDocument>,
}

#[derive(Debug, Default)]
struct MemoryState {
    buckets: BTreeMap<String, BucketState>,
    /// When non-empty, only these buckets exist
    declared: BTreeSet<String>,
    last_cas: u64,
    connects: usize,
}

impl MemoryState {
    fn bucket_mut(&mut self, name: &str) -> StoreResult<&mut BucketState> {
        if !self.declared.is_empty() && !self.declared.contains(name) {
            return Err(StoreError::NoSuchBucket(name.to_string()));
        }
        Ok(self.buckets.entry(name.to_string()).or_default())
    }

    fn next_cas(&mut self) -> Cas {
        self.last_cas += 1;
        Cas::new(self.last_cas)
    }
}

/// Connector for the in-memory backend.
#[derive(Debug, Default)]
pub struct MemoryConnector {
    state: Arc<Mutex<MemoryState>>,
    credentials: Option<(String, String)>,
}

impl MemoryConnector {
    /// Accepts any credentials; buckets are created on first use.
    pub fn new() -> Self {
        Self::default()
    }

    /// Only the given username and password may connect.
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }

    /// Restricts the backend to the named buckets.
    pub fn with_bucket(self, name: impl Into<String>) -> Self {
        {
            let mut state = lock(&self.state);
            state.declared.insert(name.into());
        }
        self
    }

    /// Stores a design document in `bucket`.
    pub fn put_design_document(&self, bucket: &str, design: DesignDocument) -> StoreResult<()> {
        let mut state = lock(&self.state);
        let bucket = state.bucket_mut(bucket)?;
        bucket.design_docs.insert(design.name().to_string(), design);
        Ok(())
    }

    /// Writes a raw payload, bypassing the document layer.
    pub fn insert_raw(&self, bucket: &str, key: &str, payload: &str) -> StoreResult<Cas> {
        MemoryBucket::new(bucket, Arc::clone(&self.state)).set(key, 0, payload)
    }

    /// Raw stored payload, if the key exists and has not expired.
    pub fn get_raw(&self, bucket: &str, key: &str) -> Option<String> {
        let state = lock(&self.state);
        let entry = state.buckets.get(bucket)?.entries.get(key)?;
        entry.is_live(Instant::now()).then(|| entry.payload.clone())
    }

    /// Whether a read lock is held on the key.
    pub fn is_locked(&self, bucket: &str, key: &str) -> bool {
        let state = lock(&self.state);
        state
            .buckets
            .get(bucket)
            .and_then(|b| b.entries.get(key))
            .map_or(false, |entry| entry.locked)
    }

    /// Number of live keys in `bucket`.
    pub fn key_count(&self, bucket: &str) -> usize {
        let now = Instant::now();
        let state = lock(&self.state);
        state.buckets.get(bucket).map_or(0, |b| {
            b.entries.values().filter(|entry| entry.is_live(now)).count()
        })
    }

    /// Connections opened so far.
    pub fn connect_count(&self) -> usize {
        lock(&self.state).connects
    }
}

impl Connector for MemoryConnector {
    fn connect(&self, config: &ConnectionConfig) -> StoreResult<Arc<dyn Cluster>> {
        if let Some((username, password)) = &self.credentials {
            if *username != config.username || *password != config.password {
                return Err(StoreError::AuthenticationFailed(config.username.clone()));
            }
        }
        lock(&self.state).connects += 1;
        Ok(Arc::new(MemoryCluster {
            state: Arc::clone(&self.state),
            closed: AtomicBool::new(false),
        }))
    }
}

struct MemoryCluster {
    state: Arc<Mutex<MemoryState>>,
    closed: AtomicBool,
}

impl Cluster for MemoryCluster {
    fn bucket(&self, name: &str) -> StoreResult<Arc<dyn Bucket>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Transport("connection is closed".into()));
        }
        lock(&self.state).bucket_mut(name)?;
        Ok(Arc::new(MemoryBucket::new(name, Arc::clone(&self.state))))
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

struct MemoryBucket {
    name: String,
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryBucket {
    fn new(name: &str, state: Arc<Mutex<MemoryState>>) -> Self {
        Self {
            name: name.to_string(),
            state,
        }
    }
}

impl Bucket for MemoryBucket {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &str, lock_entry: bool) -> StoreResult<(Cas, String)> {
        let now = Instant::now();
        let mut state = lock(&self.state);
        let bucket = state.bucket_mut(&self.name)?;

        let live = bucket.entries.get(key).map_or(false, |entry| entry.is_live(now));
        if !live {
            bucket.entries.remove(key);
            return Err(StoreError::NotFound(key.to_string()));
        }
        let entry = bucket
            .entries
            .get_mut(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        if lock_entry {
            if entry.locked {
                return Err(StoreError::Locked(key.to_string()));
            }
            entry.locked = true;
        }
        Ok((entry.cas, entry.payload.clone()))
    }

    fn set(&self, key: &str, expiry_secs: u32, payload: &str) -> StoreResult<Cas> {
        let mut state = lock(&self.state);
        let cas = state.next_cas();
        let bucket = state.bucket_mut(&self.name)?;
        let expires_at = (expiry_secs > 0)
            .then(|| Instant::now() + Duration::from_secs(u64::from(expiry_secs)));
        bucket.entries.insert(
            key.to_string(),
            Entry {
                cas,
                payload: payload.to_string(),
                expires_at,
                locked: false,
            },
        );
        Ok(cas)
    }

    fn design_document(&self, name: &str) -> StoreResult<DesignDocument> {
        let mut state = lock(&self.state);
        let bucket = state.bucket_mut(&self.name)?;
        bucket
            .design_docs
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::NoSuchDesignDocument(name.to_string()))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
