//! Schema engine
//!
//! Structure declarations are trees of [`SchemaNode`]s. The engine:
//! - validates mappings against a structure ([`SchemaValidator`])
//! - lazily decodes raw stored values into typed values ([`decode_field`])
//! - encodes typed values back into storage-safe JSON ([`encode_fields`])
//!
//! # Design Principles
//!
//! - Validation reports the first violation with field, expected and given
//! - Decoding is idempotent
//! - Null mapping entries never reach storage

mod codec;
mod errors;
mod loader;
mod model;
mod types;
mod validator;
mod value;

pub use codec::{
    decode_field, encode_fields, encode_value, format_date, format_datetime, format_time,
    parse_date, parse_datetime, parse_time, NoReferences, ReferenceResolver,
};
pub use errors::{SchemaError, SchemaErrorCode, SchemaResult, ValidationDetails};
pub use loader::{ModelLoader, NOW_DEFAULT};
pub use model::{DefaultValue, Model, ModelBuilder, DOC_TYPE_FIELD};
pub use types::{ScalarKind, SchemaNode, Structure};
pub use validator::SchemaValidator;
pub use value::{map_from_json, FieldMap, FieldValue, MapKey};
