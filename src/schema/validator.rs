//! Structure validation for document mappings
//!
//! Validation semantics:
//! - Required fields (root only) must be present and non-null unless a
//!   default is registered
//! - A declared key field must be provided
//! - Present, non-null named fields must be instances of their node
//! - Type pairs check every key against the key node and every value
//!   against the value node; the key type must be hashable
//! - Undeclared fields pass through unchecked
//!
//! Validation never mutates the mapping and reports the first violation.

use std::collections::BTreeMap;

use super::errors::{SchemaError, SchemaResult};
use super::model::Model;
use super::types::{ScalarKind, SchemaNode, Structure};
use super::value::{FieldMap, FieldValue, MapKey};

/// Validator bound to one structure declaration.
pub struct SchemaValidator<'a> {
    structure: &'a Structure,
    required: Vec<&'a str>,
    defaulted: Vec<&'a str>,
    key_field: Option<&'a str>,
}

impl<'a> SchemaValidator<'a> {
    /// Creates a validator for a bare structure with no required fields.
    pub fn new(structure: &'a Structure) -> Self {
        Self {
            structure,
            required: Vec::new(),
            defaulted: Vec::new(),
            key_field: None,
        }
    }

    /// Creates a validator carrying the model's required, default and key
    /// field declarations.
    pub fn for_model(model: &'a Model) -> Self {
        Self {
            structure: model.structure(),
            required: model.required().iter().map(String::as_str).collect(),
            defaulted: model.defaults().iter().map(|(name, _)| name.as_str()).collect(),
            key_field: model.key_field(),
        }
    }

    /// Adds required fields.
    pub fn with_required(mut self, fields: &[&'a str]) -> Self {
        self.required.extend_from_slice(fields);
        self
    }

    /// Validates a root mapping.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError` for the first field that:
    /// - is required, has no default, and is absent or null (ODM_SCHEMA_REQUIRED_MISSING)
    /// - is the declared key field and is absent (ODM_SCHEMA_KEY_FIELD_MISSING)
    /// - does not fit its node at any depth (ODM_SCHEMA_TYPE_MISMATCH)
    /// - is a type pair with an unhashable key type (ODM_SCHEMA_UNHASHABLE_KEY)
    pub fn validate(&self, fields: &FieldMap) -> SchemaResult<()> {
        for name in &self.required {
            let missing = fields.get(*name).map_or(true, FieldValue::is_null);
            if missing && !self.defaulted.contains(name) {
                return Err(SchemaError::required_missing(*name));
            }
        }

        if let Some(key_field) = self.key_field {
            if fields.get(key_field).map_or(true, FieldValue::is_null) {
                return Err(SchemaError::key_field_missing(key_field));
            }
        }

        validate_fields(|name| fields.get(name), self.structure, "")
    }
}

/// Checks every declared field of one mapping level.
fn validate_fields<'v, F>(lookup: F, structure: &Structure, prefix: &str) -> SchemaResult<()>
where
    F: Fn(&str) -> Option<&'v FieldValue>,
{
    for (name, node) in structure {
        match lookup(name) {
            Some(value) if !value.is_null() => {
                validate_node(value, node, &make_path(prefix, name))?;
            }
            _ => {}
        }
    }
    Ok(())
}

/// Validates one value against its node.
pub(crate) fn validate_node(value: &FieldValue, node: &SchemaNode, path: &str) -> SchemaResult<()> {
    match node {
        SchemaNode::Scalar(_) | SchemaNode::Custom(_) | SchemaNode::Reference(_) => {
            if !is_instance(value, node) {
                return Err(mismatch(path, node, value));
            }
        }
        SchemaNode::ListOf(element) => {
            let items = value.as_list().ok_or_else(|| mismatch(path, node, value))?;
            for (i, item) in items.iter().enumerate() {
                let item_path = format!("{}[{}]", path, i);
                if item.is_null() {
                    return Err(mismatch(&item_path, element, item));
                }
                validate_node(item, element, &item_path)?;
            }
        }
        SchemaNode::Object(structure) => {
            let map = match value.as_map() {
                Some(map) if !map.is_empty() => map,
                _ => return Err(mismatch(path, node, value)),
            };
            validate_fields(|name| map.get(&MapKey::String(name.to_string())), structure, path)?;
        }
        SchemaNode::TypedMap { key, value: value_node } => {
            let map = value.as_map().ok_or_else(|| mismatch(path, node, value))?;
            if !key.is_hashable_key() {
                return Err(SchemaError::unhashable_key(path, key.describe()));
            }
            validate_type_pair(map, key, value_node, path)?;
        }
    }
    Ok(())
}

fn validate_type_pair(
    map: &BTreeMap<MapKey, FieldValue>,
    key_node: &SchemaNode,
    value_node: &SchemaNode,
    path: &str,
) -> SchemaResult<()> {
    for (key, value) in map {
        let entry_path = make_path(path, &key.to_string());
        let key_value = key.clone().into_value();
        if !is_instance(&key_value, key_node) {
            return Err(mismatch(&entry_path, key_node, &key_value));
        }
        if value.is_null() {
            return Err(mismatch(&entry_path, value_node, value));
        }
        validate_node(value, value_node, &entry_path)?;
    }
    Ok(())
}

/// Shallow instance check for leaf nodes.
fn is_instance(value: &FieldValue, node: &SchemaNode) -> bool {
    match (node, value) {
        (SchemaNode::Scalar(kind), value) => match (kind, value) {
            (ScalarKind::Bool, FieldValue::Bool(_)) => true,
            (ScalarKind::Int, FieldValue::Int(_)) => true,
            (ScalarKind::Float, FieldValue::Float(_) | FieldValue::Int(_)) => true,
            (ScalarKind::String, FieldValue::String(_)) => true,
            (ScalarKind::Date, FieldValue::Date(_)) => true,
            (ScalarKind::DateTime, FieldValue::DateTime(_)) => true,
            (ScalarKind::Time, FieldValue::Time(_)) => true,
            (ScalarKind::List, FieldValue::List(_)) => true,
            (ScalarKind::Map, FieldValue::Map(_)) => true,
            _ => false,
        },
        (SchemaNode::Custom(kind), FieldValue::Custom(custom)) => custom.is_kind(kind),
        (SchemaNode::Reference(alternatives), FieldValue::Reference(doc)) => {
            alternatives.iter().any(|t| t == doc.model().doc_type())
        }
        (SchemaNode::ListOf(_), FieldValue::List(_)) => true,
        (SchemaNode::Object(_) | SchemaNode::TypedMap { .. }, FieldValue::Map(_)) => true,
        _ => false,
    }
}

fn mismatch(path: &str, node: &SchemaNode, value: &FieldValue) -> SchemaError {
    SchemaError::type_mismatch(path, node.describe(), value.type_name())
}

/// Creates a field path from prefix and field name.
fn make_path(prefix: &str, field: &str) -> String {
    if prefix.is_empty() {
        field.to_string()
    } else {
        format!("{}.{}", prefix, field)
    }
}
