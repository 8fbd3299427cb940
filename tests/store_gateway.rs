//! Store Gateway Tests
//!
//! Connection lifecycle and backend failures as seen through sessions:
//! - credentials must be configured before the first open
//! - the connection opens lazily, closes idempotently and reopens on demand
//! - backend failures other than a missing key propagate unchanged

use couchkit::document::{ModelRegistry, Session};
use couchkit::schema::{FieldMap, FieldValue, Model, SchemaNode};
use couchkit::store::{Connection, ConnectionConfig, MemoryConnector, StoreError};
use couchkit::Error;
use std::io::Write;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempfile::NamedTempFile;

// =============================================================================
// Helper Functions
// =============================================================================

fn registry(bucket: &str) -> Arc<ModelRegistry> {
    let mut registry = ModelRegistry::new();
    registry
        .register(
            Model::builder("Note", "note")
                .bucket(bucket)
                .key_field("slug")
                .field("slug", SchemaNode::string())
                .field("body", SchemaNode::string())
                .required(["slug"])
                .build()
                .unwrap(),
        )
        .unwrap();
    Arc::new(registry)
}

fn note(slug: &str) -> FieldMap {
    let mut data = FieldMap::new();
    data.insert("slug".to_string(), FieldValue::from(slug));
    data.insert("body".to_string(), FieldValue::from("remember the milk"));
    data
}

fn session_with(backend: &Arc<MemoryConnector>, config: ConnectionConfig) -> Session {
    let connection = Connection::with_config(backend.clone(), config);
    Session::new(Arc::new(connection), registry("default"))
}

// =============================================================================
// Credentials
// =============================================================================

/// Nothing opens before credentials are configured.
#[test]
fn test_credentials_required_before_use() {
    let backend = Arc::new(MemoryConnector::new());
    let connection = Arc::new(Connection::new(backend.clone()));
    let session = Session::new(connection.clone(), registry("default"));

    assert!(!connection.is_configured());
    assert!(matches!(session.load("note", "n1"), Err(Error::Configuration(_))));
    assert_eq!(backend.connect_count(), 0);

    connection.configure(ConnectionConfig::new("Administrator", "password"));
    assert!(connection.is_configured());
    assert!(session.load("note", "n1").unwrap_err().is_not_found());
    assert_eq!(backend.connect_count(), 1);
}

/// Rejected credentials surface as a backend failure.
#[test]
fn test_authentication_failure_propagates() {
    let backend = Arc::new(MemoryConnector::new().with_credentials("admin", "secret"));
    let session = session_with(&backend, ConnectionConfig::new("admin", "wrong"));

    let err = session.create("note", note("n1")).unwrap().save(0).unwrap_err();
    assert!(matches!(err, Error::Backend(StoreError::AuthenticationFailed(user)) if user == "admin"));
    assert!(!session.connection().is_open());
}

/// Unknown buckets surface as a backend failure, not a missing key.
#[test]
fn test_unknown_bucket_propagates() {
    let backend = Arc::new(MemoryConnector::new().with_bucket("notes"));
    let session = session_with(&backend, ConnectionConfig::new("u", "p"));

    let err = session.load("note", "n1").unwrap_err();
    assert!(!err.is_not_found());
    assert!(matches!(err, Error::Backend(StoreError::NoSuchBucket(name)) if name == "default"));
}

// =============================================================================
// Lifecycle
// =============================================================================

/// The connection opens on first use and is shared by every document.
#[test]
fn test_lazy_shared_open() {
    let backend = Arc::new(MemoryConnector::new());
    let session = session_with(&backend, ConnectionConfig::new("u", "p"));
    assert!(!session.connection().is_open());

    session.create("note", note("n1")).unwrap().save(0).unwrap();
    session.create("note", note("n2")).unwrap().save(0).unwrap();
    session.load("note", "n1").unwrap();

    assert!(session.connection().is_open());
    assert_eq!(backend.connect_count(), 1);
    assert_eq!(backend.key_count("default"), 2);
}

/// Close is idempotent and data survives a reopen.
#[test]
fn test_close_then_reopen() {
    let backend = Arc::new(MemoryConnector::new());
    let session = session_with(&backend, ConnectionConfig::new("u", "p"));

    session.close();
    session.create("note", note("n1")).unwrap().save(0).unwrap();
    session.close();
    session.close();
    assert!(!session.connection().is_open());

    let mut reloaded = session.load("note", "n1").unwrap();
    assert_eq!(reloaded.get("body").unwrap(), &FieldValue::from("remember the milk"));
    assert_eq!(backend.connect_count(), 2);
}

/// Dropping the last handle closes the connection.
#[test]
fn test_drop_closes() {
    let backend = Arc::new(MemoryConnector::new());
    {
        let session = session_with(&backend, ConnectionConfig::new("u", "p"));
        session.create("note", note("n1")).unwrap().save(0).unwrap();
    }

    let session = session_with(&backend, ConnectionConfig::new("u", "p"));
    assert!(session.load("note", "n1").is_ok());
    assert_eq!(backend.connect_count(), 2);
}

// =============================================================================
// Storage Semantics
// =============================================================================

/// Documents saved with an expiry disappear once it passes.
#[test]
fn test_expiry() {
    let backend = Arc::new(MemoryConnector::new());
    let session = session_with(&backend, ConnectionConfig::new("u", "p"));

    session.create("note", note("short")).unwrap().save(1).unwrap();
    session.create("note", note("long")).unwrap().save(0).unwrap();
    assert!(session.load("note", "short").is_ok());

    thread::sleep(Duration::from_millis(1100));

    assert!(session.load("note", "short").unwrap_err().is_not_found());
    assert!(session.load("note", "long").is_ok());
}

/// Saving releases a read lock.
#[test]
fn test_save_releases_lock() {
    let backend = Arc::new(MemoryConnector::new());
    let session = session_with(&backend, ConnectionConfig::new("u", "p"));
    session.create("note", note("n1")).unwrap().save(0).unwrap();

    let mut locked = session.load_locked("note", "n1").unwrap();
    assert!(backend.is_locked("default", "note_n1"));

    locked.set("body", "updated").unwrap();
    locked.save(0).unwrap();
    assert!(!backend.is_locked("default", "note_n1"));
    assert!(session.load_locked("note", "n1").is_ok());
}

/// Every write produces a fresh concurrency token.
#[test]
fn test_cas_advances() {
    let backend = Arc::new(MemoryConnector::new());
    let session = session_with(&backend, ConnectionConfig::new("u", "p"));

    let mut doc = session.create("note", note("n1")).unwrap();
    let first = doc.save(0).unwrap();
    let second = doc.save(0).unwrap();
    assert!(second.value() > first.value());
    assert_eq!(session.load("note", "n1").unwrap().cas(), Some(second));
}

// =============================================================================
// Configuration
// =============================================================================

/// Configuration files fill host and port defaults.
#[test]
fn test_config_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, r#"{{"username": "Administrator", "password": "password"}}"#).unwrap();

    let config = ConnectionConfig::from_file(file.path()).unwrap();
    assert_eq!(config.username, "Administrator");
    assert_eq!(config.server_addr(), "localhost:8091");

    let backend = Arc::new(MemoryConnector::new().with_credentials("Administrator", "password"));
    let session = session_with(&backend, config);
    session.create("note", note("n1")).unwrap().save(0).unwrap();
    assert!(backend.get_raw("default", "note_n1").is_some());
}

/// Unreadable configuration files are configuration errors.
#[test]
fn test_config_file_errors() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.json");
    assert!(matches!(
        ConnectionConfig::from_file(&missing),
        Err(StoreError::InvalidConfig(_))
    ));

    let mut file = NamedTempFile::new().unwrap();
    write!(file, r#"{{"username": "u", "password": "p", "host": ""}}"#).unwrap();
    let err: Error = ConnectionConfig::from_file(file.path()).unwrap_err().into();
    assert!(matches!(err, Error::Configuration(_)));
}
