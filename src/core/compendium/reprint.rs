//! Reprint grouping and selection.
//!
//! The same logical entity (same name and type) is often published again in
//! a later book. The [`ReprintResolver`] groups such entities and keeps the
//! members a [`ReprintPolicy`] asks for.
//!
//! Groups are formed by two rules, merged with a union-find:
//!
//! - equal `name|type` identity, regardless of source
//! - a `reprintedAs` reference (`"Name|SRC"`, `"Name|type|SRC"` or
//!   `{"uid": "Name|SRC", "tag": "type"}`), which also catches renamed reprints
//!
//! Publication order comes from a [`SourceCatalog`]; the engine never
//! computes it itself.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::types::{IndexKey, MaterializedEntity};

// ============================================================================
// Policy
// ============================================================================

/// Which members of a reprint group survive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReprintPolicy {
    /// One winner: the most recently published member
    #[default]
    Newest,
    /// One winner: the newest member of the configured edition, else the newest overall
    Edition,
    /// No collapsing
    All,
}

impl fmt::Display for ReprintPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Newest => "newest",
            Self::Edition => "edition",
            Self::All => "all",
        })
    }
}

impl FromStr for ReprintPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "newest" => Ok(Self::Newest),
            "edition" => Ok(Self::Edition),
            "all" => Ok(Self::All),
            other => Err(format!("unknown reprint policy '{}'", other)),
        }
    }
}

// ============================================================================
// Source catalog
// ============================================================================

/// Publication metadata for one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    /// Source identifier as used in records, e.g. `PHB`
    pub id: String,
    /// Full title
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub published: Option<NaiveDate>,
    /// Game edition label, e.g. `classic` or `one`
    #[serde(default)]
    pub edition: Option<String>,
}

impl SourceInfo {
    pub fn new(id: impl Into<String>, published: Option<NaiveDate>, edition: Option<&str>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            published,
            edition: edition.map(str::to_string),
        }
    }
}

/// Source publication metadata consumed by reprint selection.
pub trait SourceCatalog {
    /// Higher ranks are newer. Unknown sources rank below every known one.
    fn publication_rank(&self, source: &str) -> i64;

    /// Edition label of `source`, if known.
    fn edition(&self, source: &str) -> Option<&str>;
}

/// [`SourceCatalog`] backed by a table of [`SourceInfo`], keyed case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct CatalogTable {
    sources: HashMap<String, SourceInfo>,
}

impl CatalogTable {
    pub fn new(sources: impl IntoIterator<Item = SourceInfo>) -> Self {
        let mut table = Self::default();
        for info in sources {
            table.insert(info);
        }
        table
    }

    pub fn insert(&mut self, info: SourceInfo) {
        self.sources.insert(info.id.to_lowercase(), info);
    }

    pub fn get(&self, source: &str) -> Option<&SourceInfo> {
        self.sources.get(&source.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl SourceCatalog for CatalogTable {
    fn publication_rank(&self, source: &str) -> i64 {
        self.get(source)
            .and_then(|info| info.published)
            .map(|date| i64::from(date.num_days_from_ce()))
            .unwrap_or(i64::MIN)
    }

    fn edition(&self, source: &str) -> Option<&str> {
        self.get(source).and_then(|info| info.edition.as_deref())
    }
}

// ============================================================================
// Groups
// ============================================================================

/// Entities sharing one logical identity, newest member first.
#[derive(Debug, Clone)]
pub struct ReprintGroup {
    /// `name|type` of the first member encountered
    pub identity: String,
    pub members: Vec<Arc<MaterializedEntity>>,
}

impl ReprintGroup {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Whether more than one publication carries this entity.
    pub fn is_reprinted(&self) -> bool {
        self.members.len() > 1
    }
}

/// Groups reprints and applies a [`ReprintPolicy`].
pub struct ReprintResolver<'c> {
    catalog: &'c dyn SourceCatalog,
    default_edition: Option<String>,
}

impl<'c> ReprintResolver<'c> {
    pub fn new(catalog: &'c dyn SourceCatalog) -> Self {
        Self {
            catalog,
            default_edition: None,
        }
    }

    /// Edition preferred by [`ReprintPolicy::Edition`].
    pub fn with_default_edition(mut self, edition: Option<String>) -> Self {
        self.default_edition = edition;
        self
    }

    /// Partition `entities` into reprint groups, in order of first appearance.
    pub fn group(&self, entities: &[Arc<MaterializedEntity>]) -> Vec<ReprintGroup> {
        let mut sets = DisjointSets::new(entities.len());

        let by_key: HashMap<&IndexKey, usize> = entities
            .iter()
            .enumerate()
            .map(|(i, e)| (&e.key, i))
            .collect();

        let mut by_identity: HashMap<String, usize> = HashMap::new();
        for (i, entity) in entities.iter().enumerate() {
            match by_identity.get(&entity.key.identity()) {
                Some(&first) => sets.union(first, i),
                None => {
                    by_identity.insert(entity.key.identity(), i);
                }
            }
        }

        for (i, entity) in entities.iter().enumerate() {
            let Some(Value::Array(links)) = entity.get("reprintedAs") else {
                continue;
            };
            for link in links {
                let Some(target) = reprint_target(link, &entity.content_type) else {
                    continue;
                };
                match by_key.get(&target) {
                    Some(&j) => sets.union(i, j),
                    None => debug!(key = %entity.key, target = %target, "Reprint target not loaded"),
                }
            }
        }

        let mut order: Vec<usize> = Vec::new();
        let mut members: HashMap<usize, Vec<usize>> = HashMap::new();
        for i in 0..entities.len() {
            let root = sets.find(i);
            let slot = members.entry(root).or_default();
            if slot.is_empty() {
                order.push(root);
            }
            slot.push(i);
        }

        order
            .into_iter()
            .map(|root| {
                let mut indices = members.remove(&root).unwrap_or_default();
                let identity = indices
                    .first()
                    .map(|&i| entities[i].key.identity())
                    .unwrap_or_default();
                // Newest first; ties keep appearance order
                indices.sort_by_key(|&i| std::cmp::Reverse(self.rank(&entities[i])));
                ReprintGroup {
                    identity,
                    members: indices.into_iter().map(|i| Arc::clone(&entities[i])).collect(),
                }
            })
            .collect()
    }

    /// Members of `group` that survive `policy`.
    pub fn select(
        &self,
        group: &ReprintGroup,
        policy: ReprintPolicy,
    ) -> Vec<Arc<MaterializedEntity>> {
        let newest = || -> Vec<Arc<MaterializedEntity>> {
            group.members.first().cloned().into_iter().collect()
        };

        match policy {
            ReprintPolicy::All => group.members.clone(),
            ReprintPolicy::Newest => newest(),
            ReprintPolicy::Edition => {
                let Some(wanted) = self.default_edition.as_deref() else {
                    return newest();
                };
                group
                    .members
                    .iter()
                    .find(|member| {
                        self.catalog
                            .edition(&member.source)
                            .is_some_and(|edition| edition.eq_ignore_ascii_case(wanted))
                    })
                    .map(|member| vec![Arc::clone(member)])
                    .unwrap_or_else(newest)
            }
        }
    }

    /// Group and select in one pass, keeping group order.
    pub fn resolve(
        &self,
        entities: &[Arc<MaterializedEntity>],
        policy: ReprintPolicy,
    ) -> Vec<Arc<MaterializedEntity>> {
        let groups = self.group(entities);
        let selected: Vec<_> = groups
            .iter()
            .flat_map(|group| self.select(group, policy))
            .collect();
        debug!(
            policy = %policy,
            groups = groups.len(),
            input = entities.len(),
            selected = selected.len(),
            "Reprint selection finished"
        );
        selected
    }

    fn rank(&self, entity: &MaterializedEntity) -> i64 {
        self.catalog.publication_rank(&entity.source)
    }
}

/// Parse one `reprintedAs` entry into a key.
fn reprint_target(link: &Value, content_type: &str) -> Option<IndexKey> {
    let (uid, tag) = match link {
        Value::String(uid) => (uid.as_str(), None),
        Value::Object(map) => (
            map.get("uid")?.as_str()?,
            map.get("tag").and_then(Value::as_str),
        ),
        _ => return None,
    };

    if let Some(key) = IndexKey::parse(uid) {
        if tag.is_none() {
            return Some(key);
        }
    }
    let (name, source) = uid.split_once('|')?;
    let source = source.rsplit('|').next().unwrap_or(source);
    let content_type = match tag {
        Some("creature") => "monster",
        Some(tag) => tag,
        None => content_type,
    };
    Some(IndexKey::new(name, content_type, source))
}

/// Minimal union-find over dense indices.
struct DisjointSets {
    parent: Vec<usize>,
}

impl DisjointSets {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
        }
    }

    fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    /// Join two sets; the smaller index stays the root so group order is stable.
    fn union(&mut self, a: usize, b: usize) {
        let (a, b) = (self.find(a), self.find(b));
        if a != b {
            let (root, child) = if a < b { (a, b) } else { (b, a) };
            self.parent[child] = root;
        }
    }
}
