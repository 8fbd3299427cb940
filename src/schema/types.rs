//! Structure declaration types
//!
//! A structure is a recursive tree of [`SchemaNode`]s:
//! - scalar: bool, int, float, string, date, datetime, time, opaque list, opaque dict
//! - custom: a self-validating field kind (email, password, choice)
//! - reference: one or more document types, matched by doc_type
//! - list of T: every member satisfies T
//! - typed map: arbitrary mapping from key type to value type
//! - object: named fields, each with its own node

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::fields::{ChoiceSet, CustomKind};

/// Named fields of an object level, in key order.
pub type Structure = BTreeMap<String, SchemaNode>;

/// Scalar type tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Bool,
    Int,
    Float,
    String,
    Date,
    DateTime,
    Time,
    /// List with unchecked members
    List,
    /// Mapping with unchecked entries
    Map,
}

impl ScalarKind {
    /// Returns the type name for declarations and error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            ScalarKind::Bool => "bool",
            ScalarKind::Int => "int",
            ScalarKind::Float => "float",
            ScalarKind::String => "string",
            ScalarKind::Date => "date",
            ScalarKind::DateTime => "datetime",
            ScalarKind::Time => "time",
            ScalarKind::List => "list",
            ScalarKind::Map => "dict",
        }
    }

    /// Parses a declaration tag
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "bool" => Some(ScalarKind::Bool),
            "int" => Some(ScalarKind::Int),
            "float" => Some(ScalarKind::Float),
            "string" => Some(ScalarKind::String),
            "date" => Some(ScalarKind::Date),
            "datetime" => Some(ScalarKind::DateTime),
            "time" => Some(ScalarKind::Time),
            "list" => Some(ScalarKind::List),
            "dict" => Some(ScalarKind::Map),
            _ => None,
        }
    }

    /// Whether values of this kind may key a mapping.
    pub fn is_hashable(&self) -> bool {
        !matches!(self, ScalarKind::Float | ScalarKind::List | ScalarKind::Map)
    }
}

/// One node of a structure declaration.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
    Scalar(ScalarKind),
    Custom(CustomKind),
    /// Non-empty set of alternative doc_types
    Reference(Vec<String>),
    ListOf(Box<SchemaNode>),
    TypedMap {
        key: Box<SchemaNode>,
        value: Box<SchemaNode>,
    },
    Object(Structure),
}

impl SchemaNode {
    pub fn bool() -> Self {
        SchemaNode::Scalar(ScalarKind::Bool)
    }

    pub fn int() -> Self {
        SchemaNode::Scalar(ScalarKind::Int)
    }

    pub fn float() -> Self {
        SchemaNode::Scalar(ScalarKind::Float)
    }

    pub fn string() -> Self {
        SchemaNode::Scalar(ScalarKind::String)
    }

    pub fn date() -> Self {
        SchemaNode::Scalar(ScalarKind::Date)
    }

    pub fn datetime() -> Self {
        SchemaNode::Scalar(ScalarKind::DateTime)
    }

    pub fn time() -> Self {
        SchemaNode::Scalar(ScalarKind::Time)
    }

    /// Opaque list
    pub fn list() -> Self {
        SchemaNode::Scalar(ScalarKind::List)
    }

    /// Opaque mapping
    pub fn dict() -> Self {
        SchemaNode::Scalar(ScalarKind::Map)
    }

    pub fn email() -> Self {
        SchemaNode::Custom(CustomKind::Email)
    }

    pub fn password() -> Self {
        SchemaNode::Custom(CustomKind::Password)
    }

    pub fn choice(set: &Arc<ChoiceSet>) -> Self {
        SchemaNode::Custom(CustomKind::Choice(Arc::clone(set)))
    }

    /// Reference to a single document type
    pub fn reference(doc_type: impl Into<String>) -> Self {
        SchemaNode::Reference(vec![doc_type.into()])
    }

    /// Reference to any of several document types
    pub fn one_of<I, S>(doc_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        SchemaNode::Reference(doc_types.into_iter().map(Into::into).collect())
    }

    pub fn list_of(element: SchemaNode) -> Self {
        SchemaNode::ListOf(Box::new(element))
    }

    pub fn typed_map(key: SchemaNode, value: SchemaNode) -> Self {
        SchemaNode::TypedMap {
            key: Box::new(key),
            value: Box::new(value),
        }
    }

    pub fn object<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = (S, SchemaNode)>,
        S: Into<String>,
    {
        SchemaNode::Object(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Whether values of this node may key a mapping.
    pub fn is_hashable_key(&self) -> bool {
        match self {
            SchemaNode::Scalar(kind) => kind.is_hashable(),
            SchemaNode::Custom(_) => true,
            _ => false,
        }
    }

    /// Expected-type description used in structure errors.
    pub fn describe(&self) -> String {
        match self {
            SchemaNode::Scalar(kind) => kind.type_name().to_string(),
            SchemaNode::Custom(kind) => kind.name().to_string(),
            SchemaNode::Reference(types) if types.len() == 1 => types[0].clone(),
            SchemaNode::Reference(types) => format!("one of {}", types.join(", ")),
            SchemaNode::ListOf(element) => format!("list of {}", element.describe()),
            SchemaNode::TypedMap { key, value } => {
                format!("dict of {} to {}", key.describe(), value.describe())
            }
            SchemaNode::Object(_) => "dict".to_string(),
        }
    }
}

impl fmt::Display for SchemaNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.describe())
    }
}
