//! Source Registry: keyed storage of raw, unresolved records.
//!
//! Registration and resolution are two separate passes. Every record is
//! visible to the [`CopyResolver`](super::copier::CopyResolver) as soon as it
//! is registered, so a copy may reference a base that arrives in a later file.
//!
//! # Document shapes
//!
//! | Top-level shape | Record type |
//! |-----------------|-------------|
//! | `{"monster": [..], "spell": [..]}` | the member name (members starting with `_` are skipped) |
//! | `[{..}, {..}]` | each record's `__prop`, else the registering default |
//! | `{"name": .., ..}` | a single record of the registering default type |

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, warn};

use super::error::{ContentError, EntityFailure, Result};
use super::types::{IndexKey, RawRecord, DEFAULT_CONTENT_TYPE, PROP_FIELD};

/// Raw record store keyed by `(name, type, source)`.
///
/// Iteration follows registration order, grouped per source, so batch runs
/// are deterministic regardless of hash seeds.
#[derive(Debug, Default)]
pub struct SourceRegistry {
    /// All registered records in registration order.
    records: IndexMap<IndexKey, Arc<RawRecord>>,

    /// Keys per lower-cased source, in registration order.
    sources: IndexMap<String, Vec<IndexKey>>,

    /// Registration failures not yet collected by the caller.
    failures: Vec<EntityFailure>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Split a document into records and register each one.
    ///
    /// Records that fail (no name, bad copy directive, duplicate key) are
    /// skipped and kept for [`take_failures`](Self::take_failures).
    pub fn register(&mut self, source: &str, tree: Value) -> Vec<Arc<RawRecord>> {
        self.register_typed(source, DEFAULT_CONTENT_TYPE, tree)
    }

    /// Like [`register`](Self::register), with the content type to use when
    /// the document shape does not name one.
    pub fn register_typed(
        &mut self,
        source: &str,
        default_type: &str,
        tree: Value,
    ) -> Vec<Arc<RawRecord>> {
        let mut registered = Vec::new();

        match tree {
            Value::Object(map) if map.get("name").is_some_and(Value::is_string) => {
                self.register_one(source, default_type, Value::Object(map), &mut registered);
            }
            Value::Object(map) => {
                for (prop, value) in map {
                    if prop.starts_with('_') {
                        continue;
                    }
                    match value {
                        Value::Array(items) => {
                            for item in items {
                                self.register_one(source, &prop, item, &mut registered);
                            }
                        }
                        _ => debug!(source, prop = %prop, "Skipping non-array member"),
                    }
                }
            }
            Value::Array(items) => {
                for item in items {
                    let content_type = item
                        .get(PROP_FIELD)
                        .and_then(Value::as_str)
                        .unwrap_or(default_type)
                        .to_string();
                    self.register_one(source, &content_type, item, &mut registered);
                }
            }
            _ => {
                let error = ContentError::InvalidRecord {
                    source_id: source.to_string(),
                    reason: "document is neither an object nor an array".to_string(),
                };
                warn!(source, "{}", error);
                self.failures.push(EntityFailure::unkeyed(error));
            }
        }

        debug!(source, count = registered.len(), "Registered records");
        registered
    }

    fn register_one(
        &mut self,
        source: &str,
        content_type: &str,
        tree: Value,
        registered: &mut Vec<Arc<RawRecord>>,
    ) {
        match self.register_record(source, content_type, tree) {
            Ok(record) => registered.push(record),
            Err(error) => {
                warn!(source, "{}", error);
                let key = match &error {
                    ContentError::DuplicateKey { key, .. }
                    | ContentError::InvalidPatch { key, .. } => Some(key.clone()),
                    _ => None,
                };
                self.failures.push(EntityFailure { key, error });
            }
        }
    }

    /// Register a single record of a known type.
    ///
    /// Fails with [`ContentError::DuplicateKey`] if the key already exists;
    /// the first registration wins.
    pub fn register_record(
        &mut self,
        source: &str,
        content_type: &str,
        tree: Value,
    ) -> Result<Arc<RawRecord>> {
        let record = RawRecord::from_tree(source, content_type, tree)?;

        if self.records.contains_key(&record.key) {
            return Err(ContentError::DuplicateKey {
                key: record.key,
                source_id: record.source,
            });
        }

        let record = Arc::new(record);
        self.sources
            .entry(record.source.to_lowercase())
            .or_default()
            .push(record.key.clone());
        self.records.insert(record.key.clone(), Arc::clone(&record));

        Ok(record)
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    pub fn get(&self, key: &IndexKey) -> Option<&Arc<RawRecord>> {
        self.records.get(key)
    }

    pub fn contains(&self, key: &IndexKey) -> bool {
        self.records.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All keys, in registration order.
    pub fn keys(&self) -> impl Iterator<Item = &IndexKey> {
        self.records.keys()
    }

    /// All records, in registration order.
    pub fn records(&self) -> impl Iterator<Item = &Arc<RawRecord>> {
        self.records.values()
    }

    /// Keys registered under `source` (case-insensitive), in registration order.
    pub fn keys_for_source(&self, source: &str) -> &[IndexKey] {
        self.sources
            .get(&source.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Lower-cased source identifiers seen so far.
    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }

    /// Failures recorded so far.
    pub fn failures(&self) -> &[EntityFailure] {
        &self.failures
    }

    /// Drain recorded failures.
    pub fn take_failures(&mut self) -> Vec<EntityFailure> {
        std::mem::take(&mut self.failures)
    }
}
