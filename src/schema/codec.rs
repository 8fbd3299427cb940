//! Lazy decoding and storage encoding
//!
//! [`decode_field`] turns a raw stored value into the typed value its node
//! declares. It is idempotent: already-typed values pass through unchanged.
//! [`encode_fields`] turns a mapping back into a JSON object, dropping null
//! entries at every depth.
//!
//! Canonical text forms:
//! - date: `YYYY-MM-DD`
//! - datetime: RFC 3339 with explicit `+00:00` offset
//! - time: `HH:MM:SS[.f]+00:00`

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, TimeZone, Utc};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::errors::{SchemaError, SchemaResult};
use super::model::Model;
use super::types::{ScalarKind, SchemaNode, Structure};
use super::value::{FieldMap, FieldValue, MapKey};
use crate::document::Document;
use crate::errors::{Error, Result};
use crate::fields::CustomField;

/// Resolves document references while decoding.
pub trait ReferenceResolver {
    /// Model registered under `doc_type`.
    fn model(&self, doc_type: &str) -> Option<Arc<Model>>;

    /// Fetch a document of `model` by key (or raw id for keyless models).
    ///
    /// Returns `Ok(None)` when the backend has no such document.
    fn fetch(&self, model: &Arc<Model>, key: &str) -> Result<Option<Document>>;
}

/// Resolver for contexts without a store; every reference fails to decode.
pub struct NoReferences;

impl ReferenceResolver for NoReferences {
    fn model(&self, _doc_type: &str) -> Option<Arc<Model>> {
        None
    }

    fn fetch(&self, _model: &Arc<Model>, _key: &str) -> Result<Option<Document>> {
        Ok(None)
    }
}

/// Decodes `value` according to `node`.
///
/// `path` names the field for error messages.
pub fn decode_field(
    value: FieldValue,
    node: &SchemaNode,
    resolver: &dyn ReferenceResolver,
    path: &str,
) -> Result<FieldValue> {
    match node {
        SchemaNode::Scalar(kind) => decode_scalar(value, *kind, path),
        SchemaNode::Custom(kind) => match value {
            FieldValue::String(raw) => kind
                .parse(&raw)
                .map(FieldValue::Custom)
                .map_err(|e| Error::invalid_value(path, raw, e)),
            other => Ok(other),
        },
        SchemaNode::Reference(alternatives) => match value {
            FieldValue::String(raw) => decode_reference(&raw, alternatives, resolver, path)
                .map(|doc| FieldValue::Reference(Box::new(doc))),
            other => Ok(other),
        },
        SchemaNode::ListOf(element) => match value {
            FieldValue::List(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| decode_field(item, element, resolver, &format!("{}[{}]", path, i)))
                .collect::<Result<Vec<_>>>()
                .map(FieldValue::List),
            other => Ok(other),
        },
        SchemaNode::Object(structure) => match value {
            FieldValue::Map(map) => decode_object(map, structure, resolver, path).map(FieldValue::Map),
            other => Ok(other),
        },
        SchemaNode::TypedMap { key, value: value_node } => match value {
            FieldValue::Map(map) => {
                let mut decoded = BTreeMap::new();
                for (k, v) in map {
                    let entry_path = make_path(path, &k.to_string());
                    let new_key = decode_map_key(k, key, resolver, &entry_path)?;
                    let new_value = decode_field(v, value_node, resolver, &entry_path)?;
                    decoded.insert(new_key, new_value);
                }
                Ok(FieldValue::Map(decoded))
            }
            other => Ok(other),
        },
    }
}

/// Decodes a type-pair key. Stored object keys are always text, so int and
/// bool keys are parsed back from their canonical form.
fn decode_map_key(
    key: MapKey,
    node: &SchemaNode,
    resolver: &dyn ReferenceResolver,
    path: &str,
) -> Result<MapKey> {
    let key_text = key.to_string();
    let value = match (node, key) {
        (SchemaNode::Scalar(ScalarKind::Int), MapKey::String(raw)) => raw
            .trim()
            .parse::<i64>()
            .map(FieldValue::Int)
            .map_err(|e| Error::invalid_value(path, raw.as_str(), e))?,
        (SchemaNode::Scalar(ScalarKind::Bool), MapKey::String(raw)) => match raw.as_str() {
            "true" => FieldValue::Bool(true),
            "false" => FieldValue::Bool(false),
            _ => return Err(Error::invalid_value(path, raw, "expected 'true' or 'false'")),
        },
        (node, key) => decode_field(key.into_value(), node, resolver, path)?,
    };
    value
        .into_key()
        .ok_or_else(|| Error::invalid_value(path, key_text, "not a hashable key"))
}

fn decode_scalar(value: FieldValue, kind: ScalarKind, path: &str) -> Result<FieldValue> {
    match (kind, value) {
        (ScalarKind::Date, FieldValue::String(raw)) => parse_date(&raw)
            .map(FieldValue::Date)
            .map_err(|reason| Error::invalid_value(path, raw, reason)),
        (ScalarKind::DateTime, FieldValue::String(raw)) => parse_datetime(&raw)
            .map(FieldValue::DateTime)
            .map_err(|reason| Error::invalid_value(path, raw, reason)),
        (ScalarKind::Time, FieldValue::String(raw)) => parse_time(&raw)
            .map(FieldValue::Time)
            .map_err(|reason| Error::invalid_value(path, raw, reason)),
        (_, other) => Ok(other),
    }
}

fn decode_object(
    map: BTreeMap<MapKey, FieldValue>,
    structure: &Structure,
    resolver: &dyn ReferenceResolver,
    path: &str,
) -> Result<BTreeMap<MapKey, FieldValue>> {
    let mut decoded = BTreeMap::new();
    for (k, v) in map {
        let node = match &k {
            MapKey::String(name) => structure.get(name),
            _ => None,
        };
        let v = match node {
            Some(node) => decode_field(v, node, resolver, &make_path(path, &k.to_string()))?,
            None => v,
        };
        decoded.insert(k, v);
    }
    Ok(decoded)
}

/// Splits `"{doc_type}_{key}"` and re-instantiates the matching alternative.
///
/// Keyless models are stored under their bare hashed id, so strings that
/// match no keyed alternative are tried as raw ids against the keyless ones.
fn decode_reference(
    raw: &str,
    alternatives: &[String],
    resolver: &dyn ReferenceResolver,
    path: &str,
) -> Result<Document> {
    let models: Vec<Arc<Model>> = alternatives.iter().filter_map(|t| resolver.model(t)).collect();
    if models.is_empty() {
        return Err(Error::invalid_value(
            path,
            raw,
            format!("no registered model among {}", alternatives.join(", ")),
        ));
    }

    if let Some((doc_type, key)) = raw.split_once('_') {
        if let Some(model) = models
            .iter()
            .find(|m| m.doc_type() == doc_type && m.key_field().is_some())
        {
            return resolver.fetch(model, key)?.ok_or_else(|| Error::NotFound {
                model: model.name().to_string(),
                key: raw.to_string(),
            });
        }
    }

    let keyless: Vec<&Arc<Model>> = models.iter().filter(|m| m.key_field().is_none()).collect();
    if keyless.is_empty() {
        return Err(Error::invalid_value(
            path,
            raw,
            format!("doc_type matches none of {}", alternatives.join(", ")),
        ));
    }
    for model in &keyless {
        if let Some(doc) = resolver.fetch(model, raw)? {
            let stored_type = doc.peek("doc_type").and_then(FieldValue::as_str);
            if stored_type.map_or(true, |t| t == model.doc_type()) {
                return Ok(doc);
            }
        }
    }
    Err(Error::NotFound {
        model: keyless
            .iter()
            .map(|m| m.name())
            .collect::<Vec<_>>()
            .join(" or "),
        key: raw.to_string(),
    })
}

/// Encodes a whole mapping into a storage-safe JSON object.
pub fn encode_fields(fields: &FieldMap) -> SchemaResult<Map<String, Value>> {
    let mut out = Map::new();
    for (key, value) in fields {
        if let Some(encoded) = encode_value(value, key)? {
            out.insert(key.clone(), encoded);
        }
    }
    Ok(out)
}

/// Encodes one value; `None` means the value is null and is dropped.
pub fn encode_value(value: &FieldValue, path: &str) -> SchemaResult<Option<Value>> {
    let encoded = match value {
        FieldValue::Null => return Ok(None),
        FieldValue::Bool(b) => Value::Bool(*b),
        FieldValue::Int(i) => Value::from(*i),
        FieldValue::Float(f) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .ok_or_else(|| SchemaError::type_mismatch(path, "finite float", f.to_string()))?,
        FieldValue::String(s) => Value::String(s.clone()),
        FieldValue::Date(d) => Value::String(format_date(d)),
        FieldValue::DateTime(dt) => Value::String(format_datetime(dt)),
        FieldValue::Time(t) => Value::String(format_time(t)),
        FieldValue::List(items) => {
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                let encoded = encode_value(item, &format!("{}[{}]", path, i))?;
                out.push(encoded.unwrap_or(Value::Null));
            }
            Value::Array(out)
        }
        FieldValue::Map(map) => {
            let mut out = Map::new();
            for (k, v) in map {
                let key = k.to_string();
                if let Some(encoded) = encode_value(v, &make_path(path, &key))? {
                    out.insert(key, encoded);
                }
            }
            Value::Object(out)
        }
        FieldValue::Custom(custom) => Value::String(custom.value().to_string()),
        FieldValue::Reference(doc) => match doc.doc_id() {
            Some(id) => Value::String(id),
            None => return Err(SchemaError::unsaved_reference(path, doc.model().name())),
        },
    };
    Ok(Some(encoded))
}

pub fn format_date(date: &NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn format_datetime(datetime: &DateTime<Utc>) -> String {
    datetime.to_rfc3339_opts(SecondsFormat::AutoSi, false)
}

pub fn format_time(time: &NaiveTime) -> String {
    format!("{}+00:00", time.format("%H:%M:%S%.f"))
}

/// Parses a datetime permissively; naive text is taken as UTC.
pub fn parse_datetime(raw: &str) -> std::result::Result<DateTime<Utc>, String> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"] {
        if let Ok(dt) = DateTime::parse_from_str(raw, fmt) {
            return Ok(dt.with_timezone(&Utc));
        }
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    Err(format!("unrecognized datetime '{}'", raw))
}

/// Parses a date, or the date part of a datetime.
pub fn parse_date(raw: &str) -> std::result::Result<NaiveDate, String> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date);
    }
    parse_datetime(raw)
        .map(|dt| dt.date_naive())
        .map_err(|_| format!("unrecognized date '{}'", raw))
}

/// Parses a wall-clock time, shifting any explicit offset to UTC.
pub fn parse_time(raw: &str) -> std::result::Result<NaiveTime, String> {
    let raw = raw.trim();
    let (clock, offset_secs) = split_offset(raw).ok_or_else(|| format!("bad offset in '{}'", raw))?;
    for fmt in ["%H:%M:%S%.f", "%H:%M"] {
        if let Ok(time) = NaiveTime::parse_from_str(clock, fmt) {
            return Ok(time.overflowing_sub_signed(Duration::seconds(offset_secs)).0);
        }
    }
    Err(format!("unrecognized time '{}'", raw))
}

/// Separates a trailing `Z` or `±HH:MM` offset, returning it in seconds.
fn split_offset(raw: &str) -> Option<(&str, i64)> {
    if let Some(clock) = raw.strip_suffix('Z') {
        return Some((clock, 0));
    }
    let bytes = raw.as_bytes();
    if bytes.len() > 6 && matches!(bytes[bytes.len() - 6], b'+' | b'-') && bytes[bytes.len() - 3] == b':' {
        let (clock, offset) = raw.split_at(raw.len() - 6);
        let hours: i64 = offset[1..3].parse().ok()?;
        let minutes: i64 = offset[4..6].parse().ok()?;
        let secs = hours * 3600 + minutes * 60;
        return Some((clock, if offset.starts_with('-') { -secs } else { secs }));
    }
    Some((raw, 0))
}

fn make_path(prefix: &str, field: &str) -> String {
    if prefix.is_empty() {
        field.to_string()
    } else {
        format!("{}.{}", prefix, field)
    }
}
