//! Models that own uploaded files.
//!
//! A model exposes a base upload path and a set of named attributes whose
//! values are storage keys. The router reads those keys through
//! [`Uploadable::attribute`]; it never stores them itself.

use crate::traits::{StorageError, StorageResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A model whose attributes hold storage keys.
pub trait Uploadable: Send + Sync {
    /// Path uploads go under when the caller does not pass one.
    fn base_upload_path(&self) -> String;

    /// Attributes that hold storage keys, used by bulk deletion.
    fn uploadable_attributes(&self) -> Vec<&str> {
        Vec::new()
    }

    /// Storage key held by `name`.
    ///
    /// `Ok(None)` means the attribute exists but holds no key.
    /// Names the model does not know must return [`StorageError::UnknownAttribute`].
    fn attribute(&self, name: &str) -> StorageResult<Option<&str>>;
}

/// Typed key-value record implementing [`Uploadable`] for callers without a model type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributeRecord {
    base_upload_path: String,
    attributes: BTreeMap<String, Option<String>>,
    tracked: Vec<String>,
}

impl AttributeRecord {
    pub fn new(base_upload_path: impl Into<String>) -> Self {
        Self {
            base_upload_path: base_upload_path.into(),
            ..Self::default()
        }
    }

    /// Declare an attribute with an initial value.
    pub fn with_attribute(mut self, name: impl Into<String>, key: Option<String>) -> Self {
        self.attributes.insert(name.into(), key);
        self
    }

    /// Declare an attribute and mark it for bulk deletion.
    pub fn tracked(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.attributes.entry(name.clone()).or_insert(None);
        if !self.tracked.contains(&name) {
            self.tracked.push(name);
        }
        self
    }

    /// Store `key` in an attribute, declaring it if needed.
    pub fn set(&mut self, name: impl Into<String>, key: impl Into<String>) {
        self.attributes.insert(name.into(), Some(key.into()));
    }

    pub fn clear(&mut self, name: &str) {
        if let Some(value) = self.attributes.get_mut(name) {
            *value = None;
        }
    }
}

impl Uploadable for AttributeRecord {
    fn base_upload_path(&self) -> String {
        self.base_upload_path.clone()
    }

    fn uploadable_attributes(&self) -> Vec<&str> {
        self.tracked.iter().map(String::as_str).collect()
    }

    fn attribute(&self, name: &str) -> StorageResult<Option<&str>> {
        self.attributes
            .get(name)
            .map(|value| value.as_deref())
            .ok_or_else(|| StorageError::UnknownAttribute(name.to_string()))
    }
}
