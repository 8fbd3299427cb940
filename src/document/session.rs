//! Session: the context every document carries
//!
//! Bundles the shared store connection with the model registry. Cloning is
//! cheap; all clones share the same connection.

use std::sync::Arc;

use super::document::{Document, KeyOrData};
use super::registry::ModelRegistry;
use crate::errors::Result;
use crate::schema::{FieldMap, Model, ReferenceResolver, SchemaError};
use crate::store::Connection;

#[derive(Clone)]
pub struct Session {
    connection: Arc<Connection>,
    registry: Arc<ModelRegistry>,
}

impl Session {
    pub fn new(connection: Arc<Connection>, registry: Arc<ModelRegistry>) -> Self {
        Self {
            connection,
            registry,
        }
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Registered model for `doc_type`.
    pub fn model(&self, doc_type: &str) -> Result<Arc<Model>> {
        self.registry
            .get(doc_type)
            .cloned()
            .ok_or_else(|| SchemaError::invalid_declaration(doc_type, "model is not registered").into())
    }

    /// New, unsaved document seeded from `data`.
    pub fn create(&self, doc_type: &str, data: FieldMap) -> Result<Document> {
        Ok(Document::new(self.clone(), self.model(doc_type)?, data))
    }

    /// Fetches a document by key; fails with `Error::NotFound` if absent.
    pub fn load(&self, doc_type: &str, key: &str) -> Result<Document> {
        Document::construct(self.clone(), self.model(doc_type)?, key, false, FieldMap::new())
    }

    /// Like [`Session::load`], also taking the backend's read lock.
    pub fn load_locked(&self, doc_type: &str, key: &str) -> Result<Document> {
        Document::construct(
            self.clone(),
            self.model(doc_type)?,
            KeyOrData::Key(key.to_string()),
            true,
            FieldMap::new(),
        )
    }

    /// Releases the shared connection; the next access reopens it.
    pub fn close(&self) {
        self.connection.close();
    }
}

impl ReferenceResolver for Session {
    fn model(&self, doc_type: &str) -> Option<Arc<Model>> {
        self.registry.get(doc_type).cloned()
    }

    fn fetch(&self, model: &Arc<Model>, key: &str) -> Result<Option<Document>> {
        Document::open(self.clone(), Arc::clone(model), key, false)
    }
}
