//! In-memory field values
//!
//! A document's backing mapping holds [`FieldValue`]s. Values fetched from
//! storage start out raw (strings, numbers, nested lists and mappings as
//! parsed from JSON) and are replaced by typed values (dates, custom fields,
//! documents) once decoded.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use super::codec::{format_date, format_datetime, format_time};
use crate::document::Document;
use crate::fields::{ChoiceField, CustomField, CustomValue, EmailField, PasswordField};

/// Field name to value, in key order.
pub type FieldMap = BTreeMap<String, FieldValue>;

/// A raw or decoded field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Date(NaiveDate),
    /// Always held as a UTC instant
    DateTime(DateTime<Utc>),
    /// UTC wall-clock time
    Time(NaiveTime),
    List(Vec<FieldValue>),
    Map(BTreeMap<MapKey, FieldValue>),
    Custom(CustomValue),
    Reference(Box<Document>),
}

/// Hashable values usable as mapping keys.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MapKey {
    Bool(bool),
    Int(i64),
    String(String),
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
    Time(NaiveTime),
    Custom(CustomValue),
}

impl FieldValue {
    /// Given-type description used in structure errors.
    pub fn type_name(&self) -> String {
        match self {
            FieldValue::Null => "null".into(),
            FieldValue::Bool(_) => "bool".into(),
            FieldValue::Int(_) => "int".into(),
            FieldValue::Float(_) => "float".into(),
            FieldValue::String(_) => "string".into(),
            FieldValue::Date(_) => "date".into(),
            FieldValue::DateTime(_) => "datetime".into(),
            FieldValue::Time(_) => "time".into(),
            FieldValue::List(_) => "list".into(),
            FieldValue::Map(_) => "dict".into(),
            FieldValue::Custom(custom) => custom.kind().name().to_string(),
            FieldValue::Reference(doc) => doc.model().name().to_string(),
        }
    }

    /// Converts a raw JSON value as returned by storage.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => FieldValue::Int(i),
                None => FieldValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => FieldValue::String(s),
            Value::Array(items) => {
                FieldValue::List(items.into_iter().map(FieldValue::from_json).collect())
            }
            Value::Object(map) => FieldValue::Map(
                map.into_iter()
                    .map(|(k, v)| (MapKey::String(k), FieldValue::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Builds a string-keyed mapping value.
    pub fn object<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, FieldValue)>,
        K: Into<String>,
    {
        FieldValue::Map(
            entries
                .into_iter()
                .map(|(k, v)| (MapKey::String(k.into()), v))
                .collect(),
        )
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Float(f) => Some(*f),
            FieldValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            FieldValue::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            FieldValue::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<NaiveTime> {
        match self {
            FieldValue::Time(t) => Some(*t),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[FieldValue]> {
        match self {
            FieldValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<MapKey, FieldValue>> {
        match self {
            FieldValue::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_custom(&self) -> Option<&CustomValue> {
        match self {
            FieldValue::Custom(custom) => Some(custom),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            FieldValue::Reference(doc) => Some(doc),
            _ => None,
        }
    }

    /// Entry of a string-keyed mapping.
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.as_map()
            .and_then(|map| map.get(&MapKey::String(key.to_string())))
    }

    /// Converts to a mapping key, if the value is hashable.
    pub fn into_key(self) -> Option<MapKey> {
        match self {
            FieldValue::Bool(b) => Some(MapKey::Bool(b)),
            FieldValue::Int(i) => Some(MapKey::Int(i)),
            FieldValue::String(s) => Some(MapKey::String(s)),
            FieldValue::Date(d) => Some(MapKey::Date(d)),
            FieldValue::DateTime(dt) => Some(MapKey::DateTime(dt)),
            FieldValue::Time(t) => Some(MapKey::Time(t)),
            FieldValue::Custom(c) => Some(MapKey::Custom(c)),
            _ => None,
        }
    }
}

impl MapKey {
    pub fn into_value(self) -> FieldValue {
        match self {
            MapKey::Bool(b) => FieldValue::Bool(b),
            MapKey::Int(i) => FieldValue::Int(i),
            MapKey::String(s) => FieldValue::String(s),
            MapKey::Date(d) => FieldValue::Date(d),
            MapKey::DateTime(dt) => FieldValue::DateTime(dt),
            MapKey::Time(t) => FieldValue::Time(t),
            MapKey::Custom(c) => FieldValue::Custom(c),
        }
    }
}

/// Canonical text form, as written for keys in the wire format.
impl fmt::Display for MapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapKey::Bool(b) => write!(f, "{}", b),
            MapKey::Int(i) => write!(f, "{}", i),
            MapKey::String(s) => write!(f, "{}", s),
            MapKey::Date(d) => write!(f, "{}", format_date(d)),
            MapKey::DateTime(dt) => write!(f, "{}", format_datetime(dt)),
            MapKey::Time(t) => write!(f, "{}", format_time(t)),
            MapKey::Custom(c) => write!(f, "{}", c.value()),
        }
    }
}

/// Converts a raw JSON object payload into a field mapping.
pub fn map_from_json(object: serde_json::Map<String, Value>) -> FieldMap {
    object
        .into_iter()
        .map(|(k, v)| (k, FieldValue::from_json(v)))
        .collect()
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for FieldValue {
                fn from(value: $ty) -> Self {
                    FieldValue::$variant(value.into())
                }
            }
        )*
    };
}

impl_from! {
    bool => Bool,
    i64 => Int,
    i32 => Int,
    f64 => Float,
    String => String,
    &str => String,
    NaiveDate => Date,
    DateTime<Utc> => DateTime,
    NaiveTime => Time,
    Vec<FieldValue> => List,
    CustomValue => Custom,
    EmailField => Custom,
    PasswordField => Custom,
    ChoiceField => Custom,
}

impl From<Document> for FieldValue {
    fn from(doc: Document) -> Self {
        FieldValue::Reference(Box::new(doc))
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(FieldValue::Null, Into::into)
    }
}

impl From<&str> for MapKey {
    fn from(value: &str) -> Self {
        MapKey::String(value.to_string())
    }
}

impl From<String> for MapKey {
    fn from(value: String) -> Self {
        MapKey::String(value)
    }
}

impl From<i64> for MapKey {
    fn from(value: i64) -> Self {
        MapKey::Int(value)
    }
}

impl From<NaiveDate> for MapKey {
    fn from(value: NaiveDate) -> Self {
        MapKey::Date(value)
    }
}

impl From<DateTime<Utc>> for MapKey {
    fn from(value: DateTime<Utc>) -> Self {
        MapKey::DateTime(value)
    }
}

impl From<NaiveTime> for MapKey {
    fn from(value: NaiveTime) -> Self {
        MapKey::Time(value)
    }
}
