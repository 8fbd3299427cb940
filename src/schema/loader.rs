//! Model loader for JSON declaration files
//!
//! One model per `*.json` file:
//!
//! ```json
//! {
//!   "name": "Author",
//!   "doc_type": "author",
//!   "bucket": "default",
//!   "key_field": "slug",
//!   "structure": {
//!     "slug": "string",
//!     "email": "email",
//!     "gender": "choice:gender",
//!     "books": ["ref:book"],
//!     "logins": {"datetime": "string"}
//!   },
//!   "required": ["slug", "email"],
//!   "defaults": {"created_at": "$now"}
//! }
//! ```
//!
//! Tags: `bool`, `int`, `float`, `string`, `date`, `datetime`, `time`,
//! `list`, `dict`, `email`, `password`, `choice:<set>`, `ref:<a>[|<b>...]`.
//! A single-element array is a list of that node. A nested object whose only
//! key is a tag is a type pair; any other object is a nested mapping, and a
//! tag may not appear among its keys. Top-level keys are always field names.

use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::codec::{decode_field, NoReferences};
use super::errors::{SchemaError, SchemaResult};
use super::model::{DefaultValue, Model};
use super::types::{ScalarKind, SchemaNode, Structure};
use super::value::FieldValue;
use crate::fields::ChoiceSet;
use crate::observability::{log_event_with_fields, Event};

/// Default literal standing for the current UTC datetime.
pub const NOW_DEFAULT: &str = "$now";

#[derive(Debug, Deserialize)]
struct ModelDeclaration {
    name: String,
    doc_type: String,
    bucket: String,
    #[serde(default)]
    key_field: Option<String>,
    #[serde(default)]
    structure: serde_json::Map<String, Value>,
    #[serde(default)]
    required: Vec<String>,
    #[serde(default)]
    defaults: serde_json::Map<String, Value>,
}

/// Reads model declarations from a directory.
pub struct ModelLoader {
    /// Directory containing declaration files
    model_dir: PathBuf,
    /// Choice sets referenced as `choice:<name>`
    choices: HashMap<String, Arc<ChoiceSet>>,
    /// Loaded models indexed by doc_type
    models: BTreeMap<String, Arc<Model>>,
}

impl ModelLoader {
    pub fn new(model_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_dir: model_dir.into(),
            choices: HashMap::new(),
            models: BTreeMap::new(),
        }
    }

    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    /// Makes a choice set available to `choice:<name>` tags.
    pub fn with_choices(mut self, set: Arc<ChoiceSet>) -> Self {
        self.choices.insert(set.name().to_string(), set);
        self
    }

    /// Loads every `*.json` file in the directory, in file name order.
    ///
    /// A missing directory loads nothing.
    pub fn load_all(&mut self) -> SchemaResult<usize> {
        if !self.model_dir.exists() {
            return Ok(0);
        }

        let entries = fs::read_dir(&self.model_dir).map_err(|e| {
            SchemaError::invalid_declaration(
                self.model_dir.display(),
                format!("Failed to read model directory: {}", e),
            )
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                SchemaError::invalid_declaration(
                    self.model_dir.display(),
                    format!("Failed to read directory entry: {}", e),
                )
            })?;
            let path = entry.path();
            if path.extension().map_or(false, |ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();

        for path in &paths {
            self.load_file(path)?;
        }

        let count = paths.len().to_string();
        log_event_with_fields(
            Event::ModelsLoaded,
            &[("dir", &self.model_dir.display().to_string()), ("count", &count)],
        );
        Ok(paths.len())
    }

    /// Loads a single declaration file.
    pub fn load_file(&mut self, path: &Path) -> SchemaResult<Arc<Model>> {
        let content = fs::read_to_string(path).map_err(|e| {
            SchemaError::invalid_declaration(path.display(), format!("Failed to read file: {}", e))
        })?;
        let model = self.parse(&content).map_err(|e| {
            SchemaError::invalid_declaration(path.display(), e.message().to_string())
        })?;
        self.insert(model)
    }

    /// Parses a declaration without registering it.
    pub fn parse(&self, content: &str) -> SchemaResult<Model> {
        let decl: ModelDeclaration = serde_json::from_str(content).map_err(|e| {
            SchemaError::invalid_declaration("<declaration>", format!("Invalid JSON: {}", e))
        })?;

        let structure = self.parse_structure(&decl.structure, "").map_err(|reason| {
            SchemaError::invalid_declaration(&decl.name, reason)
        })?;

        let mut builder = Model::builder(&decl.name, &decl.doc_type)
            .bucket(&decl.bucket)
            .required(decl.required);
        if let Some(key_field) = decl.key_field {
            builder = builder.key_field(key_field);
        }
        for (field, value) in decl.defaults {
            let default = parse_default(&field, value, &structure)
                .map_err(|reason| SchemaError::invalid_declaration(&decl.name, reason))?;
            builder = builder.with_default(field, default);
        }
        for (field, node) in structure {
            builder = builder.field(field, node);
        }
        builder.build()
    }

    /// Registers a model built in code.
    pub fn register(&mut self, model: Model) -> SchemaResult<Arc<Model>> {
        self.insert(model)
    }

    fn insert(&mut self, model: Model) -> SchemaResult<Arc<Model>> {
        if self.models.contains_key(model.doc_type()) {
            return Err(SchemaError::duplicate_model(model.doc_type()));
        }
        let model = Arc::new(model);
        self.models
            .insert(model.doc_type().to_string(), Arc::clone(&model));
        Ok(model)
    }

    /// Gets a model by doc_type.
    pub fn get(&self, doc_type: &str) -> Option<&Arc<Model>> {
        self.models.get(doc_type)
    }

    pub fn exists(&self, doc_type: &str) -> bool {
        self.models.contains_key(doc_type)
    }

    /// Returns all loaded models, ordered by doc_type.
    pub fn models(&self) -> impl Iterator<Item = &Arc<Model>> {
        self.models.values()
    }

    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    fn parse_structure(
        &self,
        fields: &serde_json::Map<String, Value>,
        prefix: &str,
    ) -> Result<Structure, String> {
        let mut structure = Structure::new();
        for (name, decl) in fields {
            let path = make_path(prefix, name);
            if !prefix.is_empty() && self.parse_tag(name).is_ok() {
                return Err(format!(
                    "type pair '{}' must be the only entry of its mapping",
                    path
                ));
            }
            structure.insert(name.clone(), self.parse_node(decl, &path)?);
        }
        Ok(structure)
    }

    fn parse_node(&self, decl: &Value, path: &str) -> Result<SchemaNode, String> {
        match decl {
            Value::String(tag) => self
                .parse_tag(tag)
                .map_err(|reason| format!("'{}': {}", path, reason)),
            Value::Array(items) => match items.as_slice() {
                [element] => Ok(SchemaNode::list_of(
                    self.parse_node(element, &format!("{}[0]", path))?,
                )),
                _ => Err(format!(
                    "list '{}' must have exactly one element, {} given",
                    path,
                    items.len()
                )),
            },
            Value::Object(map) if map.is_empty() => Ok(SchemaNode::dict()),
            Value::Object(map) => {
                if map.len() == 1 {
                    if let Some((key, value)) = map.iter().next() {
                        if let Ok(key_node) = self.parse_tag(key) {
                            if !key_node.is_hashable_key() {
                                return Err(format!(
                                    "'{}': structure keys must be hashable, '{}' given",
                                    path, key
                                ));
                            }
                            let value_node = self.parse_node(value, &make_path(path, key))?;
                            return Ok(SchemaNode::typed_map(key_node, value_node));
                        }
                    }
                }
                Ok(SchemaNode::Object(self.parse_structure(map, path)?))
            }
            other => Err(format!("'{}': unsupported declaration {}", path, other)),
        }
    }

    fn parse_tag(&self, tag: &str) -> Result<SchemaNode, String> {
        if let Some(kind) = ScalarKind::from_tag(tag) {
            return Ok(SchemaNode::Scalar(kind));
        }
        match tag {
            "email" => return Ok(SchemaNode::email()),
            "password" => return Ok(SchemaNode::password()),
            _ => {}
        }
        if let Some(set_name) = tag.strip_prefix("choice:") {
            return self
                .choices
                .get(set_name)
                .map(SchemaNode::choice)
                .ok_or_else(|| format!("unknown choice set '{}'", set_name));
        }
        if let Some(types) = tag.strip_prefix("ref:") {
            let types: Vec<&str> = types.split('|').filter(|t| !t.is_empty()).collect();
            if types.is_empty() {
                return Err("reference lists no document type".to_string());
            }
            return Ok(SchemaNode::one_of(types));
        }
        Err(format!("unknown type tag '{}'", tag))
    }
}

fn parse_default(field: &str, value: Value, structure: &Structure) -> Result<DefaultValue, String> {
    if value.as_str() == Some(NOW_DEFAULT) {
        return Ok(DefaultValue::now());
    }
    let raw = FieldValue::from_json(value);
    let decoded = match structure.get(field) {
        Some(node) => decode_field(raw, node, &NoReferences, field)
            .map_err(|e| format!("default for '{}': {}", field, e))?,
        None => raw,
    };
    Ok(DefaultValue::Value(decoded))
}

fn make_path(prefix: &str, field: &str) -> String {
    if prefix.is_empty() {
        field.to_string()
    } else {
        format!("{}.{}", prefix, field)
    }
}
