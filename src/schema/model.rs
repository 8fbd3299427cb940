//! Model declarations
//!
//! A model fixes a document kind: its `doc_type` tag, the bucket it lives
//! in, an optional key field, the structure declaration, defaults applied on
//! save and the fields that must be present.

use chrono::Utc;
use std::fmt;
use std::sync::Arc;

use super::errors::{SchemaError, SchemaResult};
use super::types::{SchemaNode, Structure};
use super::value::FieldValue;

/// Field every model carries implicitly.
pub const DOC_TYPE_FIELD: &str = "doc_type";

/// Default applied to absent fields on save.
#[derive(Clone)]
pub enum DefaultValue {
    /// Literal value, cloned into each document
    Value(FieldValue),
    /// Zero-argument producer, invoked once per save
    Producer(Arc<dyn Fn() -> FieldValue + Send + Sync>),
}

impl DefaultValue {
    /// Producer of the current UTC instant.
    pub fn now() -> Self {
        DefaultValue::Producer(Arc::new(|| FieldValue::DateTime(Utc::now())))
    }

    pub fn resolve(&self) -> FieldValue {
        match self {
            DefaultValue::Value(value) => value.clone(),
            DefaultValue::Producer(produce) => produce(),
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Value(value) => f.debug_tuple("Value").field(value).finish(),
            DefaultValue::Producer(_) => f.write_str("Producer(..)"),
        }
    }
}

/// Declared document kind.
#[derive(Debug, Clone)]
pub struct Model {
    name: String,
    doc_type: String,
    bucket: String,
    key_field: Option<String>,
    structure: Structure,
    defaults: Vec<(String, DefaultValue)>,
    required: Vec<String>,
}

impl Model {
    /// Starts a declaration for the model `name` tagged `doc_type`.
    pub fn builder(name: impl Into<String>, doc_type: impl Into<String>) -> ModelBuilder {
        ModelBuilder {
            name: name.into(),
            doc_type: doc_type.into(),
            bucket: String::new(),
            key_field: None,
            structure: Structure::new(),
            defaults: Vec::new(),
            required: Vec::new(),
        }
    }

    /// Human-readable model name used in errors.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn doc_type(&self) -> &str {
        &self.doc_type
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn key_field(&self) -> Option<&str> {
        self.key_field.as_deref()
    }

    pub fn structure(&self) -> &Structure {
        &self.structure
    }

    /// Node declared for `field`.
    pub fn node(&self, field: &str) -> Option<&SchemaNode> {
        self.structure.get(field)
    }

    pub fn declares(&self, field: &str) -> bool {
        self.structure.contains_key(field)
    }

    pub fn defaults(&self) -> &[(String, DefaultValue)] {
        &self.defaults
    }

    pub fn required(&self) -> &[String] {
        &self.required
    }

    /// Doc types referenced anywhere in the structure.
    pub fn referenced_types(&self) -> Vec<&str> {
        let mut out = Vec::new();
        for node in self.structure.values() {
            collect_references(node, &mut out);
        }
        out.sort_unstable();
        out.dedup();
        out
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

fn collect_references<'a>(node: &'a SchemaNode, out: &mut Vec<&'a str>) {
    match node {
        SchemaNode::Reference(types) => out.extend(types.iter().map(String::as_str)),
        SchemaNode::ListOf(element) => collect_references(element, out),
        SchemaNode::TypedMap { key, value } => {
            collect_references(key, out);
            collect_references(value, out);
        }
        SchemaNode::Object(structure) => {
            for node in structure.values() {
                collect_references(node, out);
            }
        }
        SchemaNode::Scalar(_) | SchemaNode::Custom(_) => {}
    }
}

/// Builder for [`Model`].
///
/// # Example
///
/// ```
/// use couchkit::schema::{DefaultValue, Model, SchemaNode};
///
/// let author = Model::builder("Author", "author")
///     .bucket("default")
///     .key_field("slug")
///     .field("slug", SchemaNode::string())
///     .field("email", SchemaNode::email())
///     .field("created_at", SchemaNode::datetime())
///     .with_default("created_at", DefaultValue::now())
///     .required(["slug", "email"])
///     .build()
///     .unwrap();
///
/// assert!(author.declares("doc_type"));
/// ```
#[derive(Debug)]
pub struct ModelBuilder {
    name: String,
    doc_type: String,
    bucket: String,
    key_field: Option<String>,
    structure: Structure,
    defaults: Vec<(String, DefaultValue)>,
    required: Vec<String>,
}

impl ModelBuilder {
    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self
    }

    pub fn key_field(mut self, field: impl Into<String>) -> Self {
        self.key_field = Some(field.into());
        self
    }

    pub fn field(mut self, name: impl Into<String>, node: SchemaNode) -> Self {
        self.structure.insert(name.into(), node);
        self
    }

    /// Registers a default; later registrations for the same field win.
    pub fn with_default(mut self, field: impl Into<String>, default: DefaultValue) -> Self {
        let field = field.into();
        self.defaults.retain(|(name, _)| *name != field);
        self.defaults.push((field, default));
        self
    }

    /// Registers a literal default.
    pub fn default_value(self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.with_default(field, DefaultValue::Value(value.into()))
    }

    /// Registers a producer invoked on every save that lacks the field.
    pub fn default_with<F>(self, field: impl Into<String>, produce: F) -> Self
    where
        F: Fn() -> FieldValue + Send + Sync + 'static,
    {
        self.with_default(field, DefaultValue::Producer(Arc::new(produce)))
    }

    pub fn required<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for field in fields {
            let field = field.into();
            if !self.required.contains(&field) {
                self.required.push(field);
            }
        }
        self
    }

    /// Checks the declaration and produces the model.
    ///
    /// # Errors
    ///
    /// Returns ODM_SCHEMA_INVALID_DECLARATION when:
    /// - `doc_type` is empty or contains `_`
    /// - the bucket is empty
    /// - the key field, a required field or a defaulted field is not declared
    /// - a reference node lists no document types
    pub fn build(mut self) -> SchemaResult<Model> {
        if self.doc_type.is_empty() {
            return Err(SchemaError::invalid_declaration(&self.name, "doc_type is not set"));
        }
        if self.doc_type.contains('_') {
            return Err(SchemaError::invalid_declaration(
                &self.name,
                format!("doc_type '{}' must not contain '_'", self.doc_type),
            ));
        }
        if self.bucket.is_empty() {
            return Err(SchemaError::invalid_declaration(&self.name, "bucket name is not set"));
        }

        self.structure
            .insert(DOC_TYPE_FIELD.to_string(), SchemaNode::string());

        if let Some(key_field) = &self.key_field {
            if !self.structure.contains_key(key_field) {
                return Err(SchemaError::invalid_declaration(
                    &self.name,
                    format!("key field '{}' is not declared in the structure", key_field),
                ));
            }
        }
        for field in &self.required {
            if !self.structure.contains_key(field) {
                return Err(SchemaError::invalid_declaration(
                    &self.name,
                    format!("required field '{}' is not declared in the structure", field),
                ));
            }
        }
        for (field, _) in &self.defaults {
            if !self.structure.contains_key(field) {
                return Err(SchemaError::invalid_declaration(
                    &self.name,
                    format!("default for '{}' is not declared in the structure", field),
                ));
            }
        }
        for (field, node) in &self.structure {
            check_node(node).map_err(|reason| {
                SchemaError::invalid_declaration(&self.name, format!("'{}' {}", field, reason))
            })?;
        }

        Ok(Model {
            name: self.name,
            doc_type: self.doc_type,
            bucket: self.bucket,
            key_field: self.key_field,
            structure: self.structure,
            defaults: self.defaults,
            required: self.required,
        })
    }
}

fn check_node(node: &SchemaNode) -> Result<(), String> {
    match node {
        SchemaNode::Reference(types) if types.is_empty() => {
            Err("references no document type".to_string())
        }
        SchemaNode::ListOf(element) => check_node(element),
        SchemaNode::TypedMap { key, value } => {
            check_node(key)?;
            check_node(value)
        }
        SchemaNode::Object(structure) => structure.values().try_for_each(check_node),
        _ => Ok(()),
    }
}
