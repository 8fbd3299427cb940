//! # Choice Field
//!
//! Enumerated options such as gender or a static category list. A
//! [`ChoiceSet`] names the options (key to display text) and a
//! [`ChoiceField`] holds one selected key.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::errors::{FieldError, FieldResult};
use super::{CustomField, CustomKind};

/// A named, non-empty set of choices mapping stored keys to display text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChoiceSet {
    name: String,
    choices: BTreeMap<String, String>,
}

impl ChoiceSet {
    /// Create a shared choice set.
    ///
    /// ```
    /// use couchkit::fields::ChoiceSet;
    ///
    /// let gender = ChoiceSet::new("Gender", [("M", "Male"), ("F", "Female")]).unwrap();
    /// assert_eq!(gender.text("F"), Some("Female"));
    /// ```
    pub fn new<I, K, V>(name: impl Into<String>, choices: I) -> FieldResult<Arc<Self>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let name = name.into();
        let choices: BTreeMap<String, String> = choices
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        if choices.is_empty() {
            return Err(FieldError::EmptyChoices(name));
        }
        Ok(Arc::new(Self { name, choices }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Display text for a key.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.choices.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.choices.contains_key(key)
    }

    /// Iterate `(key, text)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.choices.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.choices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.choices.is_empty()
    }
}

/// One selected key out of a [`ChoiceSet`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChoiceField {
    set: Arc<ChoiceSet>,
    choice: String,
}

impl ChoiceField {
    /// Select `choice` from `set`; the key must be one of the set's choices.
    pub fn new(set: &Arc<ChoiceSet>, choice: impl Into<String>) -> FieldResult<Self> {
        let choice = choice.into();
        if !set.contains(&choice) {
            return Err(FieldError::InvalidChoice {
                set: set.name().to_string(),
                choice,
            });
        }
        Ok(Self {
            set: Arc::clone(set),
            choice,
        })
    }

    /// Display text of the current choice.
    pub fn text(&self) -> &str {
        self.set.text(&self.choice).unwrap_or_default()
    }

    pub fn set(&self) -> &Arc<ChoiceSet> {
        &self.set
    }
}

impl CustomField for ChoiceField {
    fn kind(&self) -> CustomKind {
        CustomKind::Choice(Arc::clone(&self.set))
    }

    fn value(&self) -> &str {
        &self.choice
    }
}
