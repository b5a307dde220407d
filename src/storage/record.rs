//! Storage Record Module
//!
//! The record shape exchanged with storage backends: named sub-records, each
//! a flat map from field name to value.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Sub-record holding the entry timestamps and value
pub const ITEM: &str = "Item";
/// Sub-record holding the expiration settings
pub const POLICY: &str = "Policy";

pub const FIELD_ADDED: &str = "Added";
pub const FIELD_LAST_ACCESSED: &str = "LastAccessed";
pub const FIELD_VALUE: &str = "Value";
pub const FIELD_SLIDING_EXPIRATION: &str = "SlidingExpiration";
pub const FIELD_ABSOLUTE_EXPIRATION: &str = "AbsoluteExpiration";

/// Field map of a single sub-record.
pub type Fields = Map<String, Value>;

// == Storage Record ==
/// One stored row, keyed by sub-record name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageRecord {
    sub_records: BTreeMap<String, Fields>,
}

impl StorageRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Fields> {
        self.sub_records.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Fields> {
        self.sub_records.get_mut(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, fields: Fields) {
        self.sub_records.insert(name.into(), fields);
    }

    pub fn remove(&mut self, name: &str) -> Option<Fields> {
        self.sub_records.remove(name)
    }
}
