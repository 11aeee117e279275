//! Cross-reference index and source/key filtering.
//!
//! The full index holds every materialized entity after reprint selection.
//! The filtered index keeps the subset an [`IndexFilter`] admits; link
//! resolution during markup expansion only targets the filtered index, so a
//! link never points at content that will not be emitted.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use super::types::{IndexKey, MaterializedEntity};
use crate::config::{CompendiumConfig, ConfigError, ALL_SOURCES};
use crate::ingestion::markup::LinkResolver;

// ============================================================================
// Filtering
// ============================================================================

/// Outcome of the explicit key rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDecision {
    Included,
    Excluded,
    /// No explicit rule; the source allow-list decides.
    Deferred,
}

/// Source allow-list plus key include/exclude rules.
#[derive(Debug, Clone, Default)]
pub struct IndexFilter {
    all_sources: bool,
    sources: HashSet<String>,
    include: HashSet<String>,
    exclude: HashSet<String>,
    exclude_patterns: Vec<Regex>,
    include_groups: HashSet<String>,
}

fn normalize_key(raw: &str) -> String {
    IndexKey::parse(raw)
        .map(|k| k.as_str().to_string())
        .unwrap_or_else(|| raw.trim().to_lowercase())
}

impl IndexFilter {
    /// Filter that admits everything not explicitly excluded.
    pub fn all_sources() -> Self {
        Self {
            all_sources: true,
            ..Self::default()
        }
    }

    /// Build from configuration. Invalid exclude patterns are rejected here
    /// rather than skipped at match time.
    pub fn from_config(config: &CompendiumConfig) -> Result<Self, ConfigError> {
        let exclude_patterns = config
            .exclude_pattern
            .iter()
            .map(|pattern| {
                RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|source| ConfigError::InvalidPattern {
                        pattern: pattern.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            all_sources: config.all_sources(),
            sources: config
                .sources
                .iter()
                .map(|s| s.trim().to_lowercase())
                .filter(|s| s != ALL_SOURCES)
                .collect(),
            include: config.include.iter().map(|k| normalize_key(k)).collect(),
            exclude: config.exclude.iter().map(|k| normalize_key(k)).collect(),
            exclude_patterns,
            include_groups: config
                .include_group
                .iter()
                .map(|g| g.trim().to_lowercase())
                .collect(),
        })
    }

    pub fn with_sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for source in sources {
            let source = source.as_ref().trim().to_lowercase();
            if source == ALL_SOURCES {
                self.all_sources = true;
            } else {
                self.sources.insert(source);
            }
        }
        self
    }

    pub fn include_key(mut self, key: &str) -> Self {
        self.include.insert(normalize_key(key));
        self
    }

    pub fn exclude_key(mut self, key: &str) -> Self {
        self.exclude.insert(normalize_key(key));
        self
    }

    pub fn include_group(mut self, group: &str) -> Self {
        self.include_groups.insert(group.trim().to_lowercase());
        self
    }

    /// Whether `source` is on the allow-list (case-insensitive).
    pub fn source_included(&self, source: &str) -> bool {
        self.all_sources || self.sources.contains(&source.trim().to_lowercase())
    }

    /// Explicit key rules. An explicit include beats any exclusion.
    pub fn key_included(&self, key: &IndexKey) -> KeyDecision {
        if self.include.contains(key.as_str()) {
            return KeyDecision::Included;
        }
        if self.exclude.contains(key.as_str())
            || self.exclude_patterns.iter().any(|p| p.is_match(key.as_str()))
        {
            return KeyDecision::Excluded;
        }
        if self.all_sources {
            KeyDecision::Included
        } else {
            KeyDecision::Deferred
        }
    }

    pub fn group_included(&self, group: &str) -> bool {
        self.include_groups.contains(&group.to_lowercase())
    }

    /// Final admission decision for one entity.
    pub fn admits(&self, entity: &MaterializedEntity) -> bool {
        match self.key_included(&entity.key) {
            KeyDecision::Included => true,
            KeyDecision::Excluded => false,
            KeyDecision::Deferred => {
                entity.tags.iter().any(|tag| self.group_included(tag))
                    || self.source_included(&entity.source)
            }
        }
    }
}

// ============================================================================
// Index
// ============================================================================

/// Key → entity map used for link resolution and index export.
#[derive(Debug, Clone, Default)]
pub struct CrossReferenceIndex {
    entries: BTreeMap<IndexKey, Arc<MaterializedEntity>>,
}

impl CrossReferenceIndex {
    pub fn build(entities: impl IntoIterator<Item = Arc<MaterializedEntity>>) -> Self {
        Self {
            entries: entities
                .into_iter()
                .map(|entity| (entity.key.clone(), entity))
                .collect(),
        }
    }

    /// Sub-index of the entries matching `predicate`.
    pub fn filter(&self, predicate: impl Fn(&MaterializedEntity) -> bool) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .filter(|(_, entity)| predicate(entity))
                .map(|(key, entity)| (key.clone(), Arc::clone(entity)))
                .collect(),
        }
    }

    pub fn filter_with(&self, filter: &IndexFilter) -> Self {
        self.filter(|entity| filter.admits(entity))
    }

    pub fn get(&self, key: &IndexKey) -> Option<&Arc<MaterializedEntity>> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &IndexKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &IndexKey> {
        self.entries.keys()
    }

    pub fn entities(&self) -> impl Iterator<Item = &Arc<MaterializedEntity>> {
        self.entries.values()
    }

    /// Serializable list of the indexed keys.
    pub fn snapshot(&self) -> IndexSnapshot {
        IndexSnapshot {
            keys: self.entries.keys().cloned().collect(),
        }
    }
}

impl LinkResolver for CrossReferenceIndex {
    fn resolve_link(&self, key: &IndexKey) -> Option<String> {
        self.contains(key)
            .then(|| format!("{}/{}", key.content_type(), key.slug()))
    }
}

/// Exported index file: `{"keys": ["name|type|source", ...]}`, sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSnapshot {
    pub keys: Vec<IndexKey>,
}

impl IndexSnapshot {
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
