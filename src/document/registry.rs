//! Model registry
//!
//! Owned by the application, populated at startup: every model a session
//! may instantiate or decode a reference into, plus the design document
//! each model's views live in.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::observability::{log_event_with_fields, Event};
use crate::schema::{Model, ModelLoader, SchemaError, SchemaResult};

/// Models indexed by doc_type.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    models: BTreeMap<String, Arc<Model>>,
    views: HashMap<String, String>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every model of a loader.
    pub fn from_loader(loader: &ModelLoader) -> SchemaResult<Self> {
        let mut registry = Self::new();
        for model in loader.models() {
            registry.register(Arc::clone(model))?;
        }
        Ok(registry)
    }

    /// Adds a model.
    ///
    /// # Errors
    ///
    /// ODM_SCHEMA_DUPLICATE_MODEL if the doc_type is taken.
    pub fn register(&mut self, model: impl Into<Arc<Model>>) -> SchemaResult<Arc<Model>> {
        let model = model.into();
        if self.models.contains_key(model.doc_type()) {
            return Err(SchemaError::duplicate_model(model.doc_type()));
        }
        log_event_with_fields(
            Event::ModelRegistered,
            &[("model", model.name()), ("doc_type", model.doc_type())],
        );
        self.models
            .insert(model.doc_type().to_string(), Arc::clone(&model));
        Ok(model)
    }

    /// Associates a registered model with the design document holding its
    /// views.
    pub fn register_view(&mut self, doc_type: &str, design_doc: impl Into<String>) -> SchemaResult<()> {
        if !self.models.contains_key(doc_type) {
            return Err(SchemaError::invalid_declaration(
                doc_type,
                "cannot register a view for an unregistered model",
            ));
        }
        self.views.insert(doc_type.to_string(), design_doc.into());
        Ok(())
    }

    pub fn get(&self, doc_type: &str) -> Option<&Arc<Model>> {
        self.models.get(doc_type)
    }

    /// Design document registered for `doc_type`.
    pub fn view_name(&self, doc_type: &str) -> Option<&str> {
        self.views.get(doc_type).map(String::as_str)
    }

    pub fn models(&self) -> impl Iterator<Item = &Arc<Model>> {
        self.models.values()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Checks that every referenced doc_type is registered.
    pub fn verify(&self) -> SchemaResult<()> {
        for model in self.models.values() {
            for target in model.referenced_types() {
                if !self.models.contains_key(target) {
                    return Err(SchemaError::invalid_declaration(
                        model.name(),
                        format!("references unregistered doc_type '{}'", target),
                    ));
                }
            }
        }
        Ok(())
    }
}
