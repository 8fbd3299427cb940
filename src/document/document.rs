//! Document entity
//!
//! A document is a key-ordered mapping of field name to raw-or-decoded
//! value, bound to a model and a session.
//!
//! State machine:
//! - New: constructed from a mapping, never confirmed in the backend
//! - Persisted: after a successful fetch or save
//!
//! Fetched values stay raw until first read; the decoded value then
//! replaces the raw one and is never decoded again.

use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use super::session::Session;
use super::derive_hashed_key;
use crate::errors::{Error, Result};
use crate::observability::{log_event_with_fields, Event};
use crate::schema::{
    decode_field, encode_fields, map_from_json, FieldMap, FieldValue, Model, SchemaValidator,
    DOC_TYPE_FIELD,
};
use crate::store::{Bucket, Cas, DesignDocument, View};

/// What a document is constructed from.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyOrData {
    /// Key field value, or the hashed id for keyless models
    Key(String),
    /// Initial field values of a new record
    Data(FieldMap),
}

impl From<&str> for KeyOrData {
    fn from(key: &str) -> Self {
        KeyOrData::Key(key.to_string())
    }
}

impl From<String> for KeyOrData {
    fn from(key: String) -> Self {
        KeyOrData::Key(key)
    }
}

impl From<FieldMap> for KeyOrData {
    fn from(data: FieldMap) -> Self {
        KeyOrData::Data(data)
    }
}

#[derive(Clone)]
pub struct Document {
    session: Session,
    model: Arc<Model>,
    fields: FieldMap,
    /// Fields whose slot already holds the decoded value
    decoded: BTreeSet<String>,
    is_new_record: bool,
    cas: Option<Cas>,
    hashed_key: Option<String>,
    bucket: Option<Arc<dyn Bucket>>,
    design_doc: Option<DesignDocument>,
}

impl Document {
    /// New record seeded from `data`.
    pub fn new(session: Session, model: Arc<Model>, data: FieldMap) -> Self {
        let mut doc = Self::blank(session, model);
        doc.fields = data;
        doc
    }

    fn blank(session: Session, model: Arc<Model>) -> Self {
        Self {
            session,
            model,
            fields: FieldMap::new(),
            decoded: BTreeSet::new(),
            is_new_record: true,
            cas: None,
            hashed_key: None,
            bucket: None,
            design_doc: None,
        }
    }

    /// Builds a document from a key or a mapping, merging `extra` fields.
    ///
    /// A key sets the key field (or the hashed id for keyless models) and
    /// fetches immediately.
    ///
    /// # Errors
    ///
    /// `Error::NotFound` if a key was given and the backend has no such
    /// document; backend failures otherwise.
    pub fn construct(
        session: Session,
        model: Arc<Model>,
        key_or_data: impl Into<KeyOrData>,
        lock: bool,
        extra: FieldMap,
    ) -> Result<Self> {
        match key_or_data.into() {
            KeyOrData::Data(mut data) => {
                data.extend(extra);
                Ok(Self::new(session, model, data))
            }
            KeyOrData::Key(key) => {
                let mut doc = Self::new(session, model, extra);
                doc.assign_key(&key);
                if doc.fetch(lock)? {
                    Ok(doc)
                } else {
                    Err(Error::NotFound {
                        model: doc.model.name().to_string(),
                        key: doc.doc_id().unwrap_or(key),
                    })
                }
            }
        }
    }

    /// Fetches by key, returning `None` when the backend has no document.
    pub fn open(session: Session, model: Arc<Model>, key: &str, lock: bool) -> Result<Option<Self>> {
        let mut doc = Self::blank(session, model);
        doc.assign_key(key);
        Ok(doc.fetch(lock)?.then_some(doc))
    }

    fn assign_key(&mut self, key: &str) {
        match self.model.key_field() {
            Some(key_field) => {
                self.fields
                    .insert(key_field.to_string(), FieldValue::String(key.to_string()));
            }
            None => self.hashed_key = Some(key.to_string()),
        }
    }

    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn is_new_record(&self) -> bool {
        self.is_new_record
    }

    /// Concurrency token of the last successful fetch or save.
    pub fn cas(&self) -> Option<Cas> {
        self.cas
    }

    /// Key field value, if the model declares one and it is set.
    pub fn id(&self) -> Option<String> {
        let key_field = self.model.key_field()?;
        let value = self.fields.get(key_field)?;
        value.clone().into_key().map(|key| key.to_string())
    }

    /// Storage key: `{doc_type}_{id}` lowercased, else the hashed id
    /// assigned at first save.
    pub fn doc_id(&self) -> Option<String> {
        match self.id() {
            Some(id) => Some(format!("{}_{}", self.model.doc_type(), id.to_lowercase())),
            None => self.hashed_key.clone(),
        }
    }

    fn bucket(&mut self) -> Result<Arc<dyn Bucket>> {
        if let Some(bucket) = &self.bucket {
            return Ok(Arc::clone(bucket));
        }
        let bucket = self.session.connection().bucket(self.model.bucket())?;
        self.bucket = Some(Arc::clone(&bucket));
        Ok(bucket)
    }

    /// Reads the stored payload and merges it into the mapping.
    ///
    /// Returns `false` when there is nothing stored under the document's
    /// id (or it has no id yet).
    pub fn fetch(&mut self, lock: bool) -> Result<bool> {
        let doc_id = match self.doc_id() {
            Some(doc_id) => doc_id,
            None => return Ok(false),
        };

        let (cas, payload) = match self.bucket()?.get(&doc_id, lock) {
            Ok(found) => found,
            Err(e) if e.is_not_found() => {
                log_event_with_fields(Event::DocumentFetchMiss, &[("key", &doc_id)]);
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        };

        let object = match serde_json::from_str::<Value>(&payload) {
            Ok(Value::Object(object)) => object,
            Ok(_) => {
                return Err(Error::Payload {
                    key: doc_id,
                    reason: "stored payload is not a JSON object".into(),
                })
            }
            Err(e) => {
                return Err(Error::Payload {
                    key: doc_id,
                    reason: e.to_string(),
                })
            }
        };

        for (key, value) in map_from_json(object) {
            self.decoded.remove(&key);
            self.fields.insert(key, value);
        }
        self.cas = Some(cas);
        self.is_new_record = false;

        log_event_with_fields(
            Event::DocumentFetch,
            &[("key", &doc_id), ("cas", &cas.to_string()), ("locked", if lock { "true" } else { "false" })],
        );
        Ok(true)
    }

    /// Item read: decodes a declared field on first access and caches it.
    ///
    /// Undeclared keys are returned raw.
    ///
    /// # Errors
    ///
    /// `Error::MissingKey` if the key is absent; `Error::InvalidValue` or
    /// `Error::NotFound` if decoding fails.
    pub fn get(&mut self, key: &str) -> Result<&FieldValue> {
        let raw = self
            .fields
            .get(key)
            .ok_or_else(|| Error::MissingKey(key.to_string()))?;

        if !self.is_new_record && !self.decoded.contains(key) {
            let model = Arc::clone(&self.model);
            if let Some(node) = model.node(key) {
                let decoded = decode_field(raw.clone(), node, &self.session, key)?;
                self.fields.insert(key.to_string(), decoded);
                self.decoded.insert(key.to_string());
                log_event_with_fields(
                    Event::FieldDecoded,
                    &[("model", model.name()), ("field", key)],
                );
            }
        }

        self.fields
            .get(key)
            .ok_or_else(|| Error::MissingKey(key.to_string()))
    }

    /// Attribute read of a declared field; `None` when it is unset.
    ///
    /// # Errors
    ///
    /// `Error::UnknownField` if the model does not declare `name`.
    pub fn field(&mut self, name: &str) -> Result<Option<&FieldValue>> {
        if !self.model.declares(name) {
            return Err(self.unknown_field(name));
        }
        if !self.fields.contains_key(name) {
            return Ok(None);
        }
        self.get(name).map(Some)
    }

    /// Attribute write of a declared field.
    pub fn set(&mut self, name: &str, value: impl Into<FieldValue>) -> Result<()> {
        if !self.model.declares(name) {
            return Err(self.unknown_field(name));
        }
        self.insert(name, value);
        Ok(())
    }

    /// Item write; undeclared keys are stored as given.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Option<FieldValue> {
        let key = key.into();
        self.decoded.remove(&key);
        self.fields.insert(key, value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<FieldValue> {
        self.decoded.remove(key);
        self.fields.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Current slot value, without decoding.
    pub fn peek(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    /// The backing mapping as it stands, raw and decoded values mixed.
    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }

    /// Decodes every present field.
    pub fn load_all(&mut self) -> Result<()> {
        let keys: Vec<String> = self.fields.keys().cloned().collect();
        for key in keys {
            self.get(&key)?;
        }
        Ok(())
    }

    /// Decodes everything, then checks the mapping against the model.
    pub fn validate(&mut self) -> Result<()> {
        self.load_all()?;
        SchemaValidator::for_model(&self.model)
            .validate(&self.fields)
            .map_err(|e| {
                log_event_with_fields(
                    Event::DocumentValidationFailed,
                    &[("model", self.model.name()), ("reason", &e.to_string())],
                );
                e.into()
            })
    }

    /// Applies defaults, validates, encodes and writes the document.
    ///
    /// Keyless documents without an id get one derived from the encoded
    /// payload. `expiry_secs` of 0 never expires.
    pub fn save(&mut self, expiry_secs: u32) -> Result<Cas> {
        let model = Arc::clone(&self.model);
        for (field, default) in model.defaults() {
            if !self.fields.contains_key(field) {
                self.insert(field.clone(), default.resolve());
            }
        }
        self.insert(DOC_TYPE_FIELD, model.doc_type());

        self.validate()?;

        let encoded = encode_fields(&self.fields)?;
        let payload = serde_json::to_string(&Value::Object(encoded)).map_err(|e| Error::Payload {
            key: self.doc_id().unwrap_or_default(),
            reason: e.to_string(),
        })?;

        let doc_id = match self.doc_id() {
            Some(doc_id) => doc_id,
            None => {
                let hashed = derive_hashed_key(&payload);
                self.hashed_key = Some(hashed.clone());
                hashed
            }
        };

        let cas = self.bucket()?.set(&doc_id, expiry_secs, &payload)?;
        self.cas = Some(cas);
        self.is_new_record = false;

        log_event_with_fields(
            Event::DocumentSave,
            &[("key", &doc_id), ("cas", &cas.to_string()), ("expiry", &expiry_secs.to_string())],
        );
        Ok(cas)
    }

    /// Design document registered for this model, fetched once per
    /// instance.
    pub fn design_document(&mut self) -> Result<Option<&DesignDocument>> {
        let name = match self.session.registry().view_name(self.model.doc_type()) {
            Some(name) => name.to_string(),
            None => return Ok(None),
        };
        if self.design_doc.is_none() {
            let design = self.bucket()?.design_document(&name)?;
            log_event_with_fields(
                Event::ViewResolved,
                &[("model", self.model.name()), ("design_doc", &name)],
            );
            self.design_doc = Some(design);
        }
        Ok(self.design_doc.as_ref())
    }

    /// Named view of the model's design document; `None` without a
    /// registered design document or when no view has that name.
    pub fn view(&mut self, name: &str) -> Result<Option<&View>> {
        Ok(self.design_document()?.and_then(|design| design.view(name)))
    }

    fn unknown_field(&self, name: &str) -> Error {
        Error::UnknownField {
            model: self.model.name().to_string(),
            field: name.to_string(),
        }
    }
}

/// Same model, same concurrency token and equal mappings.
impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        (Arc::ptr_eq(&self.model, &other.model) || self.model.doc_type() == other.model.doc_type())
            && self.cas == other.cas
            && self.fields == other.fields
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("model", &self.model.name())
            .field("doc_id", &self.doc_id())
            .field("is_new_record", &self.is_new_record)
            .field("cas", &self.cas)
            .field("fields", &self.fields)
            .finish()
    }
}
