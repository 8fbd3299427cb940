//! Observability subsystem
//!
//! Structured JSON logging of typed lifecycle events.
//!
//! # Principles
//!
//! 1. Observability is read-only
//! 2. No async or background threads
//! 3. Deterministic output
//!
//! # Usage
//!
//! Only `Warn` and `Error` events are written by default. Connection,
//! fetch and save events are `Info`; per-field decoding is `Trace`.
//!
//! ```
//! use couchkit::observability::{log_event_with_fields, Event, Logger, Severity};
//!
//! Logger::set_min_severity(Severity::Info);
//! log_event_with_fields(Event::DocumentSave, &[("key", "author_jrrt")]);
//! ```

mod events;
mod logger;

pub use events::Event;
pub use logger::{Logger, Severity};

/// Log a lifecycle event
pub fn log_event(event: Event) {
    Logger::log(event.severity(), event.as_str(), &[]);
}

/// Log a lifecycle event with fields
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}
