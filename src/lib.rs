//! couchkit - schema-validated documents over a key-value document store
//!
//! Models declare a structure; documents are validated against it on save,
//! decoded lazily on read and encoded to flat JSON for storage.
//!
//! Lifecycle events are logged as JSON lines; only warnings and errors are
//! written unless [`observability::Logger::set_min_severity`] lowers the
//! threshold.
//!
//! ```
//! use std::sync::Arc;
//! use couchkit::document::{ModelRegistry, Session};
//! use couchkit::fields::EmailField;
//! use couchkit::schema::{DefaultValue, FieldMap, Model, SchemaNode};
//! use couchkit::store::{Connection, ConnectionConfig, MemoryConnector};
//!
//! let mut registry = ModelRegistry::new();
//! registry.register(
//!     Model::builder("Author", "author")
//!         .bucket("default")
//!         .key_field("slug")
//!         .field("slug", SchemaNode::string())
//!         .field("email", SchemaNode::email())
//!         .field("created_at", SchemaNode::datetime())
//!         .with_default("created_at", DefaultValue::now())
//!         .required(["slug", "email"])
//!         .build()?,
//! )?;
//!
//! let connection = Connection::with_config(
//!     Arc::new(MemoryConnector::new()),
//!     ConnectionConfig::new("Administrator", "password"),
//! );
//! let session = Session::new(Arc::new(connection), Arc::new(registry));
//!
//! let mut data = FieldMap::new();
//! data.insert("slug".into(), "jrrt".into());
//! data.insert("email".into(), EmailField::new("j@example.com")?.into());
//! let mut author = session.create("author", data)?;
//! author.save(0)?;
//! assert_eq!(author.doc_id().as_deref(), Some("author_jrrt"));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod document;
pub mod errors;
pub mod fields;
pub mod observability;
pub mod schema;
pub mod store;

pub use errors::{Error, Result};
