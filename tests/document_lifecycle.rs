//! Document Lifecycle Tests
//!
//! End-to-end behavior of documents over the in-memory backend:
//! - save applies defaults, validates, encodes and derives ids
//! - fetch merges raw payloads that decode lazily on first read
//! - references are stored by id and re-instantiated on read
//! - views resolve through the registry

use chrono::{Datelike, Utc};
use couchkit::document::{Document, KeyOrData, ModelRegistry, Session};
use couchkit::fields::{ChoiceField, ChoiceSet, CustomValue, EmailField};
use couchkit::schema::{
    DefaultValue, FieldMap, FieldValue, MapKey, Model, SchemaErrorCode, SchemaNode,
};
use couchkit::store::{Connection, ConnectionConfig, DesignDocument, MemoryConnector};
use couchkit::Error;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

// =============================================================================
// Helper Functions
// =============================================================================

fn gender() -> Arc<ChoiceSet> {
    ChoiceSet::new("gender", [("m", "Male"), ("f", "Female")]).unwrap()
}

fn registry() -> ModelRegistry {
    let mut registry = ModelRegistry::new();
    registry
        .register(
            Model::builder("Author", "author")
                .bucket("default")
                .key_field("slug")
                .field("slug", SchemaNode::string())
                .field("first_name", SchemaNode::string())
                .field("last_name", SchemaNode::string())
                .field("email", SchemaNode::email())
                .field("gender", SchemaNode::choice(&gender()))
                .field("birthday", SchemaNode::date())
                .field("tags", SchemaNode::list_of(SchemaNode::string()))
                .field("created_at", SchemaNode::datetime())
                .with_default("created_at", DefaultValue::now())
                .required(["slug", "first_name", "last_name", "email"])
                .build()
                .unwrap(),
        )
        .unwrap();
    registry
        .register(
            Model::builder("Publisher", "publisher")
                .bucket("default")
                .field("name", SchemaNode::string())
                .field("founded", SchemaNode::int())
                .required(["name"])
                .build()
                .unwrap(),
        )
        .unwrap();
    registry
        .register(
            Model::builder("Book", "book")
                .bucket("default")
                .field("title", SchemaNode::string())
                .field("author", SchemaNode::reference("author"))
                .field("sponsor", SchemaNode::one_of(["author", "publisher"]))
                .field(
                    "contributors",
                    SchemaNode::list_of(SchemaNode::one_of(["author", "publisher"])),
                )
                .field("pages", SchemaNode::int())
                .default_value("pages", 0)
                .required(["title"])
                .build()
                .unwrap(),
        )
        .unwrap();
    registry
        .register(
            Model::builder("User", "user")
                .bucket("accounts")
                .key_field("username")
                .field("username", SchemaNode::string())
                .field("password", SchemaNode::password())
                .field(
                    "logins",
                    SchemaNode::typed_map(SchemaNode::datetime(), SchemaNode::string()),
                )
                .required(["username", "password"])
                .build()
                .unwrap(),
        )
        .unwrap();
    registry
        .register(
            Model::builder("Scoreboard", "scoreboard")
                .bucket("default")
                .key_field("name")
                .field("name", SchemaNode::string())
                .field("scores", SchemaNode::typed_map(SchemaNode::int(), SchemaNode::string()))
                .field("flags", SchemaNode::typed_map(SchemaNode::bool(), SchemaNode::int()))
                .build()
                .unwrap(),
        )
        .unwrap();
    registry.register_view("book", "books").unwrap();
    registry.verify().unwrap();
    registry
}

fn setup() -> (Arc<MemoryConnector>, Session) {
    let backend = Arc::new(MemoryConnector::new());
    let connection = Connection::with_config(
        backend.clone(),
        ConnectionConfig::new("Administrator", "password"),
    );
    (backend, Session::new(Arc::new(connection), Arc::new(registry())))
}

fn data<const N: usize>(entries: [(&str, FieldValue); N]) -> FieldMap {
    entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

fn tolkien(session: &Session) -> Document {
    session
        .create(
            "author",
            data([
                ("slug", "jrrt".into()),
                ("first_name", "J.R.R.".into()),
                ("last_name", "Tolkien".into()),
                ("email", EmailField::new("j@example.com").unwrap().into()),
            ]),
        )
        .unwrap()
}

fn stored(backend: &MemoryConnector, bucket: &str, key: &str) -> Value {
    serde_json::from_str(&backend.get_raw(bucket, key).unwrap()).unwrap()
}

// =============================================================================
// Save
// =============================================================================

/// Saving a keyed document derives its id and fills defaults.
#[test]
fn test_save_author() {
    let (backend, session) = setup();
    let mut author = tolkien(&session);
    assert!(author.is_new_record());

    let before = Utc::now();
    let cas = author.save(0).unwrap();

    assert_eq!(author.doc_id().as_deref(), Some("author_jrrt"));
    assert_eq!(author.cas(), Some(cas));
    assert!(!author.is_new_record());

    let created_at = author.get("created_at").unwrap().as_datetime().unwrap();
    assert!(created_at >= before && created_at <= Utc::now());

    let payload = stored(&backend, "default", "author_jrrt");
    assert_eq!(payload["doc_type"], "author");
    assert_eq!(payload["email"], "j@example.com");
    assert!(payload["created_at"].as_str().unwrap().ends_with("+00:00"));
}

/// Missing required fields are reported in declaration order.
#[test]
fn test_missing_required_field() {
    let (_backend, session) = setup();
    let mut author = session
        .create("author", data([("slug", "x".into()), ("first_name", "A".into())]))
        .unwrap();

    let err = author.validate().unwrap_err();
    let structure = err.as_structure().unwrap();
    assert_eq!(structure.code(), SchemaErrorCode::RequiredMissing);
    assert_eq!(structure.field(), Some("last_name"));

    assert!(author.save(0).is_err());
    assert!(author.is_new_record());
}

/// Literal defaults fill only absent fields.
#[test]
fn test_literal_default_only_when_absent() {
    let (backend, session) = setup();
    let mut short = session.create("book", data([("title", "Leaf by Niggle".into())])).unwrap();
    let mut long = session
        .create("book", data([("title", "The Silmarillion".into()), ("pages", 365.into())]))
        .unwrap();
    short.save(0).unwrap();
    long.save(0).unwrap();

    assert_eq!(stored(&backend, "default", &short.doc_id().unwrap())["pages"], 0);
    assert_eq!(stored(&backend, "default", &long.doc_id().unwrap())["pages"], 365);
}

/// Wrongly typed values abort the save.
#[test]
fn test_type_mismatch_aborts_save() {
    let (backend, session) = setup();
    let mut author = tolkien(&session);
    author.set("tags", FieldValue::List(vec!["a".into(), 1.into()])).unwrap();

    let err = author.save(0).unwrap_err();
    assert_eq!(err.as_structure().unwrap().field(), Some("tags[1]"));
    assert!(backend.get_raw("default", "author_jrrt").is_none());
}

// =============================================================================
// Hashed Ids
// =============================================================================

/// Keyless documents with identical content derive the same id.
#[test]
fn test_hashed_id_determinism() {
    let (backend, session) = setup();
    let fields = data([("name", "Allen & Unwin".into()), ("founded", 1914.into())]);
    let mut first = session.create("publisher", fields.clone()).unwrap();
    let mut second = session.create("publisher", fields).unwrap();
    assert_eq!(first.doc_id(), None);

    first.save(0).unwrap();
    second.save(0).unwrap();

    let id = first.doc_id().unwrap();
    assert_eq!(id.len(), 12);
    assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(second.doc_id(), Some(id));
    assert_eq!(backend.key_count("default"), 1);
}

/// Keyed ids come from the lowercased key field, never the content.
#[test]
fn test_keyed_id_ignores_content() {
    let (_backend, session) = setup();
    let mut author = tolkien(&session);
    author.set("slug", "JRRT").unwrap();
    author.save(0).unwrap();
    assert_eq!(author.doc_id().as_deref(), Some("author_jrrt"));

    author.set("tags", FieldValue::List(vec!["legendarium".into()])).unwrap();
    author.save(0).unwrap();
    assert_eq!(author.doc_id().as_deref(), Some("author_jrrt"));
}

/// Keyless documents stay under their hashed id across saves.
#[test]
fn test_hashed_id_kept_after_changes() {
    let (_backend, session) = setup();
    let mut publisher = session.create("publisher", data([("name", "Ace".into())])).unwrap();
    publisher.save(0).unwrap();
    let id = publisher.doc_id().unwrap();

    publisher.set("founded", 1952).unwrap();
    publisher.save(0).unwrap();
    assert_eq!(publisher.doc_id(), Some(id.clone()));

    let mut loaded = session.load("publisher", &id).unwrap();
    assert_eq!(loaded.get("founded").unwrap(), &FieldValue::Int(1952));
}

// =============================================================================
// Fetch
// =============================================================================

/// Loading an absent key fails with the model and derived key.
#[test]
fn test_load_missing_author() {
    let (_backend, session) = setup();
    match session.load("author", "jrrt").unwrap_err() {
        Error::NotFound { model, key } => {
            assert_eq!(model, "Author");
            assert_eq!(key, "author_jrrt");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

/// Lists of strings decode to themselves and stay cached.
#[test]
fn test_stored_tags_read_back() {
    let (backend, session) = setup();
    backend
        .insert_raw("default", "author_jrrt", &json!({"slug": "jrrt", "tags": ["a", "b"]}).to_string())
        .unwrap();

    let mut author = session.load("author", "jrrt").unwrap();
    let expected = FieldValue::List(vec!["a".into(), "b".into()]);
    assert_eq!(author.get("tags").unwrap(), &expected);
    assert_eq!(author.peek("tags"), Some(&expected));
}

/// Stored date strings decode to dates on first read.
#[test]
fn test_stored_birthday_decodes() {
    let (backend, session) = setup();
    backend
        .insert_raw("default", "author_jrrt", r#"{"slug":"jrrt","birthday":"1892-01-03"}"#)
        .unwrap();

    let mut author = session.load("author", "jrrt").unwrap();
    let birthday = author.field("birthday").unwrap().unwrap().as_date().unwrap();
    assert_eq!((birthday.year(), birthday.month(), birthday.day()), (1892, 1, 3));
    assert_eq!(author.peek("birthday"), Some(&FieldValue::Date(birthday)));
}

/// Unparsable stored values fail with the field and raw value.
#[test]
fn test_unparsable_stored_value() {
    let (backend, session) = setup();
    backend
        .insert_raw("default", "author_jrrt", r#"{"slug":"jrrt","birthday":"someday"}"#)
        .unwrap();

    let mut author = session.load("author", "jrrt").unwrap();
    match author.get("birthday").unwrap_err() {
        Error::InvalidValue { field, value, .. } => {
            assert_eq!(field, "birthday");
            assert_eq!(value, "someday");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(author.peek("birthday"), Some(&FieldValue::from("someday")));
    assert!(matches!(author.validate(), Err(Error::InvalidValue { .. })));
}

/// A saved document loads back equal once fully decoded.
#[test]
fn test_save_then_load_equal() {
    let (_backend, session) = setup();
    let mut author = tolkien(&session);
    author.set("gender", ChoiceField::new(&gender(), "m").unwrap()).unwrap();
    author.save(0).unwrap();

    let mut loaded = session.load("author", "jrrt").unwrap();
    loaded.load_all().unwrap();
    assert_eq!(loaded, author);

    match loaded.get("gender").unwrap().as_custom() {
        Some(CustomValue::Choice(choice)) => assert_eq!(choice.text(), "Male"),
        other => panic!("expected choice, got {other:?}"),
    }
}

/// Documents with different concurrency tokens are not equal.
#[test]
fn test_equality_tracks_cas() {
    let (_backend, session) = setup();
    tolkien(&session).save(0).unwrap();

    let mut first = session.load("author", "jrrt").unwrap();
    let second = session.load("author", "jrrt").unwrap();
    assert_eq!(first, second);

    first.save(0).unwrap();
    assert_ne!(first, second);
}

/// Locked loads take the backend lock.
#[test]
fn test_load_locked() {
    let (backend, session) = setup();
    tolkien(&session).save(0).unwrap();

    session.load_locked("author", "jrrt").unwrap();
    assert!(backend.is_locked("default", "author_jrrt"));
    assert!(matches!(session.load_locked("author", "jrrt"), Err(Error::Backend(_))));
}

/// Construction by key merges extra fields before fetching.
#[test]
fn test_construct_with_extra_fields() {
    let (_backend, session) = setup();
    tolkien(&session).save(0).unwrap();

    let model = session.model("author").unwrap();
    let mut doc = Document::construct(
        session.clone(),
        model.clone(),
        "jrrt",
        false,
        data([("nickname", "Tollers".into())]),
    )
    .unwrap();
    assert_eq!(doc.get("nickname").unwrap(), &FieldValue::from("Tollers"));
    assert_eq!(doc.get("last_name").unwrap(), &FieldValue::from("Tolkien"));

    let fresh = Document::construct(
        session.clone(),
        model,
        KeyOrData::Data(data([("slug", "cs".into())])),
        false,
        data([("first_name", "Clive".into())]),
    )
    .unwrap();
    assert!(fresh.is_new_record());
    assert_eq!(fresh.peek("first_name"), Some(&FieldValue::from("Clive")));
}

// =============================================================================
// References
// =============================================================================

/// References are stored by id and come back as documents.
#[test]
fn test_reference_round_trip() {
    let (backend, session) = setup();
    let mut author = tolkien(&session);
    author.save(0).unwrap();

    let mut book = session.create("book", data([("title", "The Hobbit".into())])).unwrap();
    book.set("author", author.clone()).unwrap();
    book.save(0).unwrap();
    let book_id = book.doc_id().unwrap();

    assert_eq!(stored(&backend, "default", &book_id)["author"], "author_jrrt");

    let mut loaded = session.load("book", &book_id).unwrap();
    let mut linked = loaded.get("author").unwrap().as_document().unwrap().clone();
    linked.load_all().unwrap();
    assert_eq!(linked, author);
}

/// Polymorphic references resolve keyed and keyless alternatives.
#[test]
fn test_polymorphic_references() {
    let (_backend, session) = setup();
    let mut author = tolkien(&session);
    author.save(0).unwrap();
    let mut publisher = session.create("publisher", data([("name", "Allen & Unwin".into())])).unwrap();
    publisher.save(0).unwrap();

    let mut book = session.create("book", data([("title", "The Hobbit".into())])).unwrap();
    book.set("sponsor", publisher.clone()).unwrap();
    book.set(
        "contributors",
        FieldValue::List(vec![author.clone().into(), publisher.clone().into()]),
    )
    .unwrap();
    book.save(0).unwrap();

    let mut loaded = session.load("book", &book.doc_id().unwrap()).unwrap();
    let sponsor = loaded.get("sponsor").unwrap().as_document().unwrap();
    assert_eq!(sponsor.model().doc_type(), "publisher");
    assert_eq!(sponsor.doc_id(), publisher.doc_id());

    let contributors = loaded.get("contributors").unwrap().as_list().unwrap();
    let types: Vec<&str> = contributors
        .iter()
        .map(|c| c.as_document().unwrap().model().doc_type())
        .collect();
    assert_eq!(types, vec!["author", "publisher"]);

    loaded.validate().unwrap();
}

/// Referencing an unsaved document is its own error.
#[test]
fn test_unsaved_reference_rejected() {
    let (_backend, session) = setup();
    let publisher = session.create("publisher", data([("name", "Ace".into())])).unwrap();
    let mut book = session.create("book", data([("title", "Dune".into())])).unwrap();
    book.set("sponsor", publisher).unwrap();

    let err = book.save(0).unwrap_err();
    let structure = err.as_structure().unwrap();
    assert_eq!(structure.code(), SchemaErrorCode::UnsavedReference);
    assert!(structure.is_unsaved_reference());
}

/// Wrong document types in a reference field fail validation.
#[test]
fn test_reference_type_checked() {
    let (_backend, session) = setup();
    let mut publisher = session.create("publisher", data([("name", "Ace".into())])).unwrap();
    publisher.save(0).unwrap();

    let mut book = session.create("book", data([("title", "Dune".into())])).unwrap();
    book.set("author", publisher).unwrap();
    let err = book.validate().unwrap_err();
    let details = err.as_structure().unwrap().details().unwrap().clone();
    assert_eq!(details.expected, "author");
    assert_eq!(details.given, "Publisher");
}

/// A stored reference to a vanished document surfaces as not found.
#[test]
fn test_dangling_reference() {
    let (backend, session) = setup();
    backend
        .insert_raw("default", "b1", r#"{"doc_type":"book","title":"Lost","author":"author_ghost"}"#)
        .unwrap();

    let mut book = session.load("book", "b1").unwrap();
    assert!(book.get("author").unwrap_err().is_not_found());
}

// =============================================================================
// Custom Fields
// =============================================================================

/// Passwords are stored hashed and verify after loading.
#[test]
fn test_password_stored_hashed() {
    let (backend, session) = setup();
    let mut user = session
        .create(
            "user",
            data([
                ("username", "Bilbo".into()),
                ("password", couchkit::fields::PasswordField::new("precious").unwrap().into()),
            ]),
        )
        .unwrap();
    user.save(0).unwrap();

    let raw = stored(&backend, "accounts", "user_bilbo");
    assert!(raw["password"].as_str().unwrap().starts_with("$argon2"));

    let mut loaded = session.load("user", "bilbo").unwrap();
    match loaded.get("password").unwrap().as_custom() {
        Some(CustomValue::Password(password)) => {
            assert!(password.check_password("precious"));
            assert!(!password.check_password("ring"));
        }
        other => panic!("expected password, got {other:?}"),
    }
}

/// Type-pair fields decode their keys.
#[test]
fn test_type_pair_field_decodes_keys() {
    let (backend, session) = setup();
    backend
        .insert_raw(
            "accounts",
            "user_bilbo",
            &json!({
                "username": "bilbo",
                "password": couchkit::fields::PasswordField::new("precious").unwrap().hash(),
                "logins": {"2013-01-01T08:00:00+02:00": "10.0.0.1"}
            })
            .to_string(),
        )
        .unwrap();

    let mut user = session.load("user", "bilbo").unwrap();
    let logins = user.get("logins").unwrap().as_map().unwrap();
    let (key, _) = logins.iter().next().unwrap();
    assert_eq!(key.to_string(), "2013-01-01T06:00:00+00:00");
    user.validate().unwrap();
}

/// Int and bool type-pair keys survive a save and reload.
#[test]
fn test_int_and_bool_keys_round_trip() {
    let (backend, session) = setup();
    let mut scores = BTreeMap::new();
    scores.insert(MapKey::Int(5), FieldValue::from("five"));
    scores.insert(MapKey::Int(-12), FieldValue::from("minus twelve"));
    let mut flags = BTreeMap::new();
    flags.insert(MapKey::Bool(true), FieldValue::Int(1));

    let mut board = session.create("scoreboard", data([("name", "weekly".into())])).unwrap();
    board.set("scores", FieldValue::Map(scores.clone())).unwrap();
    board.set("flags", FieldValue::Map(flags.clone())).unwrap();
    board.save(0).unwrap();

    let raw = stored(&backend, "default", "scoreboard_weekly");
    assert_eq!(raw["scores"], json!({"-12": "minus twelve", "5": "five"}));
    assert_eq!(raw["flags"], json!({"true": 1}));

    let mut loaded = session.load("scoreboard", "weekly").unwrap();
    assert_eq!(loaded.get("scores").unwrap(), &FieldValue::Map(scores));
    assert_eq!(loaded.get("flags").unwrap(), &FieldValue::Map(flags));

    loaded.save(0).unwrap();
    assert_eq!(stored(&backend, "default", "scoreboard_weekly")["scores"]["5"], "five");
}

/// Stored keys that do not parse as the declared key type are decode errors.
#[test]
fn test_unparsable_int_key() {
    let (backend, session) = setup();
    backend
        .insert_raw("default", "scoreboard_weekly", r#"{"name":"weekly","scores":{"five":"5"}}"#)
        .unwrap();

    let mut loaded = session.load("scoreboard", "weekly").unwrap();
    match loaded.get("scores").unwrap_err() {
        Error::InvalidValue { field, value, .. } => {
            assert_eq!(field, "scores.five");
            assert_eq!(value, "five");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

// =============================================================================
// Views and Connection
// =============================================================================

/// Views resolve through the registered design document.
#[test]
fn test_views() {
    let (backend, session) = setup();
    backend
        .put_design_document(
            "default",
            DesignDocument::new("books")
                .with_view("by_author", "function (doc) { emit(doc.author, null); }"),
        )
        .unwrap();

    let mut book = session.create("book", data([("title", "The Hobbit".into())])).unwrap();
    assert_eq!(book.design_document().unwrap().unwrap().name(), "books");
    assert_eq!(book.view("by_author").unwrap().unwrap().name, "by_author");
    assert!(book.view("by_title").unwrap().is_none());

    let mut author = tolkien(&session);
    assert!(author.design_document().unwrap().is_none());
    assert!(author.view("by_author").unwrap().is_none());
}

/// Closing the session's connection is idempotent; the next save reopens it.
#[test]
fn test_close_and_reopen() {
    let (backend, session) = setup();
    session.close();

    tolkien(&session).save(0).unwrap();
    session.close();
    session.close();
    assert!(!session.connection().is_open());

    let mut author = session.load("author", "jrrt").unwrap();
    author.save(0).unwrap();
    assert_eq!(backend.connect_count(), 2);
}

/// Without credentials every store access is a configuration error.
#[test]
fn test_credentials_not_set() {
    let connection = Connection::new(Arc::new(MemoryConnector::new()));
    let session = Session::new(Arc::new(connection), Arc::new(registry()));

    let err = tolkien(&session).save(0).unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
}

// =============================================================================
// Declaration Files
// =============================================================================

/// Models loaded from declaration files behave like models built in code.
#[test]
fn test_models_from_declaration_files() {
    let dir = tempfile::tempdir().unwrap();
    let author = json!({
        "name": "Author",
        "doc_type": "author",
        "bucket": "default",
        "key_field": "slug",
        "structure": {"slug": "string", "email": "email", "created_at": "datetime"},
        "required": ["slug", "email"],
        "defaults": {"created_at": "$now"}
    });
    let book = json!({
        "name": "Book",
        "doc_type": "book",
        "bucket": "default",
        "structure": {"title": "string", "authors": ["ref:author"]},
        "required": ["title"]
    });
    std::fs::write(dir.path().join("author.json"), author.to_string()).unwrap();
    std::fs::write(dir.path().join("book.json"), book.to_string()).unwrap();

    let mut loader = couchkit::schema::ModelLoader::new(dir.path());
    assert_eq!(loader.load_all().unwrap(), 2);
    let registry = ModelRegistry::from_loader(&loader).unwrap();
    assert_eq!(registry.len(), 2);

    let connection = Connection::with_config(
        Arc::new(MemoryConnector::new()),
        ConnectionConfig::new("Administrator", "password"),
    );
    let session = Session::new(Arc::new(connection), Arc::new(registry));

    let mut author = session
        .create(
            "author",
            data([("slug", "jrrt".into()), ("email", EmailField::new("j@example.com").unwrap().into())]),
        )
        .unwrap();
    author.save(0).unwrap();
    assert!(author.peek("created_at").unwrap().as_datetime().is_some());

    let mut book = session.create("book", data([("title", "The Hobbit".into())])).unwrap();
    book.set("authors", FieldValue::List(vec![author.into()])).unwrap();
    book.save(0).unwrap();

    let mut loaded = session.load("book", &book.doc_id().unwrap()).unwrap();
    let authors = loaded.get("authors").unwrap().as_list().unwrap();
    assert_eq!(authors[0].as_document().unwrap().doc_id().as_deref(), Some("author_jrrt"));
}
