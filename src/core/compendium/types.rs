//! Core data models for the content resolution engine.
//!
//! - [`IndexKey`]: normalized `name|type|source` lookup key
//! - [`RawRecord`]: an as-ingested record, before copy resolution
//! - [`CopyDirective`] / [`PatchOp`] / [`FieldOp`]: the parsed `_copy` block
//! - [`MaterializedEntity`]: a fully resolved record

use std::collections::BTreeSet;
use std::fmt;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::{ContentError, Result};
use crate::core::document::{as_integer, is_truthy};

/// Name of the member carrying a copy directive.
pub const COPY_FIELD: &str = "_copy";

/// Member used to carry a record's content type when it cannot be inferred
/// from the enclosing document.
pub const PROP_FIELD: &str = "__prop";

/// Content type assigned when nothing else names one.
pub const DEFAULT_CONTENT_TYPE: &str = "entry";

// ============================================================================
// IndexKey
// ============================================================================

/// Normalized lookup key: lower-cased `name|type|source`.
///
/// Keys are derived once and never mutated. Ordering is lexical on the
/// normalized string, which keeps index snapshots stable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IndexKey(String);

impl IndexKey {
    /// Build a key from its three components.
    pub fn new(name: &str, content_type: &str, source: &str) -> Self {
        Self(format!("{}|{}|{}", name.trim(), content_type.trim(), source.trim()).to_lowercase())
    }

    /// Parse an already-joined `name|type|source` string.
    ///
    /// The name may itself contain `|`; type and source are taken from the right.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.rsplitn(3, '|');
        let source = parts.next()?;
        let content_type = parts.next()?;
        let name = parts.next()?;
        if name.trim().is_empty() || content_type.trim().is_empty() || source.trim().is_empty() {
            return None;
        }
        Some(Self::new(name, content_type, source))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn parts(&self) -> (&str, &str, &str) {
        let mut parts = self.0.rsplitn(3, '|');
        let source = parts.next().unwrap_or_default();
        let content_type = parts.next().unwrap_or_default();
        let name = parts.next().unwrap_or_default();
        (name, content_type, source)
    }

    pub fn name(&self) -> &str {
        self.parts().0
    }

    pub fn content_type(&self) -> &str {
        self.parts().1
    }

    pub fn source(&self) -> &str {
        self.parts().2
    }

    /// Logical identity shared by reprints: `name|type`, ignoring source.
    pub fn identity(&self) -> String {
        let (name, content_type, _) = self.parts();
        format!("{}|{}", name, content_type)
    }

    /// URL-safe slug, e.g. `longsword-1-dmg` for `longsword+1|item|dmg`.
    pub fn slug(&self) -> String {
        let (name, _, source) = self.parts();
        slugify(&format!("{} {}", name, source))
    }
}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for IndexKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Lower-case, collapse anything non-alphanumeric into single dashes.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in text.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

// ============================================================================
// Patch Operations
// ============================================================================

/// A regex text replacement (`replaceTxt`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextReplace {
    /// Regex pattern to search for
    pub replace: String,
    /// Replacement text (`$1` style group references allowed)
    pub with: String,
    /// Regex flags; `i` makes the match case-insensitive
    #[serde(default)]
    pub flags: String,
}

/// Edit applied to a single top-level field, addressed by name.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOp {
    /// Append items to the array (created if absent).
    AppendArr(Vec<Value>),
    /// Append items whose value is not already present.
    AppendIfNotExistsArr(Vec<Value>),
    /// Prepend items to the array (created if absent).
    PrependArr(Vec<Value>),
    /// Insert items at `index`.
    InsertArr { index: usize, items: Vec<Value> },
    /// Remove items matching any of the given names or values.
    RemoveArr(Vec<Value>),
    /// Replace the item matching `replace` (a name, or `{"index": n}`) with `items`.
    ReplaceArr { replace: Value, items: Vec<Value> },
    /// Regex replace across every string under the field.
    ReplaceTxt(TextReplace),
    /// Add `scalar` to numeric member `prop` (or every member for `*`).
    ScalarAddProp { prop: String, scalar: f64 },
    /// Multiply numeric member `prop` (or every member for `*`) by `scalar`.
    ScalarMultProp {
        prop: String,
        scalar: f64,
        floor: bool,
    },
}

/// One structural edit, applied in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub enum PatchOp {
    /// Append to an array or insert at an index addressed by `path`.
    Insert { path: String, value: Value },
    /// Overwrite the value at `path`.
    Replace { path: String, value: Value },
    /// Delete the subtree at `path`; missing paths are ignored.
    Remove { path: String },
    /// Field-mode edit on the named top-level member.
    Field { field: String, op: FieldOp },
}

impl PatchOp {
    /// Path or field this op targets, for error reporting.
    pub fn target(&self) -> &str {
        match self {
            Self::Insert { path, .. } | Self::Replace { path, .. } | Self::Remove { path } => path,
            Self::Field { field, .. } => field,
        }
    }
}

// ============================================================================
// CopyDirective
// ============================================================================

/// "This record is a modified copy of another" instruction, parsed once.
#[derive(Debug, Clone, PartialEq)]
pub struct CopyDirective {
    /// The base record to copy from
    pub source_key: IndexKey,
    /// Keys kept from the base even when the target declares them
    pub preserve: IndexSet<String>,
    /// Structural edits, in declaration order
    pub ops: Vec<PatchOp>,
    /// Whole-record text substitutions (`_mod["*"]` replaceTxt)
    pub substitutions: Vec<TextReplace>,
}

impl CopyDirective {
    /// Parse a `_copy` block belonging to record `key`.
    ///
    /// `content_type` is the target's type, used for the base key unless the
    /// block names its own `__prop`.
    pub fn parse(key: &IndexKey, content_type: &str, copy: &Value) -> Result<Self> {
        let invalid = |path: &str, reason: &str| ContentError::InvalidPatch {
            key: key.clone(),
            path: path.to_string(),
            reason: reason.to_string(),
        };

        let copy = copy
            .as_object()
            .ok_or_else(|| invalid(COPY_FIELD, "copy directive must be an object"))?;

        let name = copy
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| invalid(COPY_FIELD, "copy directive has no name"))?;
        let source = copy
            .get("source")
            .and_then(Value::as_str)
            .ok_or_else(|| invalid(COPY_FIELD, "copy directive has no source"))?;
        let base_type = copy
            .get(PROP_FIELD)
            .and_then(Value::as_str)
            .unwrap_or(content_type);

        let preserve = match copy.get("_preserve") {
            None | Some(Value::Null) => IndexSet::new(),
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            Some(Value::Object(map)) => map
                .iter()
                .filter(|(_, v)| is_truthy(Some(v)))
                .map(|(k, _)| k.clone())
                .collect(),
            Some(_) => return Err(invalid("_preserve", "expected an array or object")),
        };

        let mut ops = Vec::new();
        let mut substitutions = Vec::new();

        if let Some(modifications) = copy.get("_mod") {
            let modifications = modifications
                .as_object()
                .ok_or_else(|| invalid("_mod", "expected an object"))?;

            for (name, spec) in modifications {
                match name.as_str() {
                    "insert" | "replace" => {
                        let entries = spec
                            .as_object()
                            .ok_or_else(|| invalid(name, "expected a map of path to value"))?;
                        for (path, value) in entries {
                            let path = path.clone();
                            let value = value.clone();
                            ops.push(if name == "insert" {
                                PatchOp::Insert { path, value }
                            } else {
                                PatchOp::Replace { path, value }
                            });
                        }
                    }
                    "remove" => match spec {
                        Value::String(path) => ops.push(PatchOp::Remove { path: path.clone() }),
                        Value::Array(paths) => {
                            for path in paths {
                                let path = path
                                    .as_str()
                                    .ok_or_else(|| invalid(name, "remove paths must be strings"))?;
                                ops.push(PatchOp::Remove {
                                    path: path.to_string(),
                                });
                            }
                        }
                        Value::Object(paths) => {
                            for path in paths.keys() {
                                ops.push(PatchOp::Remove { path: path.clone() });
                            }
                        }
                        _ => return Err(invalid(name, "expected path list")),
                    },
                    "*" => {
                        for field_op in parse_field_ops(spec).map_err(|r| invalid(name, &r))? {
                            match field_op {
                                FieldOp::ReplaceTxt(replace) => substitutions.push(replace),
                                _ => {
                                    return Err(invalid(
                                        name,
                                        "only replaceTxt may target every field",
                                    ))
                                }
                            }
                        }
                    }
                    field => {
                        if spec.as_str() == Some("remove") {
                            ops.push(PatchOp::Remove {
                                path: field.to_string(),
                            });
                            continue;
                        }
                        for op in parse_field_ops(spec).map_err(|r| invalid(field, &r))? {
                            ops.push(PatchOp::Field {
                                field: field.to_string(),
                                op,
                            });
                        }
                    }
                }
            }
        }

        Ok(Self {
            source_key: IndexKey::new(name, base_type, source),
            preserve,
            ops,
            substitutions,
        })
    }
}

fn items_of(spec: &serde_json::Map<String, Value>) -> Vec<Value> {
    match spec.get("items") {
        Some(Value::Array(items)) => items.clone(),
        Some(item) => vec![item.clone()],
        None => Vec::new(),
    }
}

/// Parse one field-mode op or an array of them.
fn parse_field_ops(spec: &Value) -> std::result::Result<Vec<FieldOp>, String> {
    match spec {
        Value::Array(specs) => specs.iter().map(parse_field_op).collect(),
        other => Ok(vec![parse_field_op(other)?]),
    }
}

fn parse_field_op(spec: &Value) -> std::result::Result<FieldOp, String> {
    let spec = spec
        .as_object()
        .ok_or_else(|| "field modification must be an object".to_string())?;
    let mode = spec
        .get("mode")
        .and_then(Value::as_str)
        .ok_or_else(|| "field modification has no mode".to_string())?;

    let string_member = |member: &str| -> std::result::Result<String, String> {
        spec.get(member)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| format!("{} requires '{}'", mode, member))
    };
    let scalar = || -> std::result::Result<f64, String> {
        spec.get("scalar")
            .and_then(Value::as_f64)
            .ok_or_else(|| format!("{} requires a numeric 'scalar'", mode))
    };

    Ok(match mode {
        "appendArr" => FieldOp::AppendArr(items_of(spec)),
        "appendIfNotExistsArr" => FieldOp::AppendIfNotExistsArr(items_of(spec)),
        "prependArr" => FieldOp::PrependArr(items_of(spec)),
        "insertArr" => FieldOp::InsertArr {
            index: spec
                .get("index")
                .and_then(as_integer)
                .and_then(|i| usize::try_from(i).ok())
                .ok_or_else(|| "insertArr requires a non-negative 'index'".to_string())?,
            items: items_of(spec),
        },
        "removeArr" => FieldOp::RemoveArr(match spec.get("names") {
            Some(Value::Array(names)) => names.clone(),
            Some(name) => vec![name.clone()],
            None => items_of(spec),
        }),
        "replaceArr" => FieldOp::ReplaceArr {
            replace: spec
                .get("replace")
                .cloned()
                .ok_or_else(|| "replaceArr requires 'replace'".to_string())?,
            items: items_of(spec),
        },
        "replaceTxt" => FieldOp::ReplaceTxt(TextReplace {
            replace: string_member("replace")?,
            with: string_member("with")?,
            flags: spec
                .get("flags")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        }),
        "scalarAddProp" => FieldOp::ScalarAddProp {
            prop: string_member("prop")?,
            scalar: scalar()?,
        },
        "scalarMultProp" => FieldOp::ScalarMultProp {
            prop: string_member("prop")?,
            scalar: scalar()?,
            floor: is_truthy(spec.get("floor")),
        },
        other => return Err(format!("unsupported modification mode '{}'", other)),
    })
}

// ============================================================================
// RawRecord
// ============================================================================

/// An as-ingested record. Immutable once registered.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub key: IndexKey,
    pub name: String,
    pub content_type: String,
    pub source: String,
    pub page: Option<u32>,
    /// The record as it appeared in the input, with `source` filled in
    pub tree: Value,
    pub copy: Option<CopyDirective>,
}

impl RawRecord {
    /// Build a record from one input object.
    ///
    /// `default_source` fills in a missing `source` member.
    pub fn from_tree(default_source: &str, content_type: &str, mut tree: Value) -> Result<Self> {
        let invalid = |reason: &str| ContentError::InvalidRecord {
            source_id: default_source.to_string(),
            reason: reason.to_string(),
        };

        let object = tree
            .as_object_mut()
            .ok_or_else(|| invalid("record is not an object"))?;

        let name = object
            .get("name")
            .and_then(Value::as_str)
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| invalid("record has no name"))?
            .to_string();

        let declared = object
            .get("source")
            .and_then(Value::as_str)
            .map(str::to_string);
        let source = match declared {
            Some(source) => source,
            None => {
                object.insert("source".to_string(), Value::String(default_source.to_string()));
                default_source.to_string()
            }
        };

        let page = object
            .get("page")
            .and_then(as_integer)
            .and_then(|p| u32::try_from(p).ok());

        let key = IndexKey::new(&name, content_type, &source);
        let copy = match object.get(COPY_FIELD) {
            Some(copy) => Some(CopyDirective::parse(&key, content_type, copy)?),
            None => None,
        };

        Ok(Self {
            key,
            name,
            content_type: content_type.to_string(),
            source,
            page,
            tree,
            copy,
        })
    }
}

// ============================================================================
// MaterializedEntity
// ============================================================================

/// A fully resolved record with no further dependency on other records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaterializedEntity {
    pub key: IndexKey,
    pub name: String,
    pub content_type: String,
    pub source: String,
    pub page: Option<u32>,
    /// Group tags (content type, `srd`, `basic-rules`, `reprinted`)
    pub tags: BTreeSet<String>,
    pub tree: Value,
}

impl MaterializedEntity {
    /// Wrap a resolved tree, deriving provenance and tags from it.
    pub fn new(record: &RawRecord, tree: Value) -> Self {
        let page = tree
            .get("page")
            .and_then(as_integer)
            .and_then(|p| u32::try_from(p).ok())
            .or(record.page);

        let mut tags = BTreeSet::new();
        tags.insert(record.content_type.to_lowercase());
        if is_truthy(tree.get("srd")) {
            tags.insert("srd".to_string());
        }
        if is_truthy(tree.get("basicRules")) {
            tags.insert("basic-rules".to_string());
        }
        if is_truthy(tree.get("reprintedAs")) {
            tags.insert("reprinted".to_string());
        }

        Self {
            key: record.key.clone(),
            name: record.name.clone(),
            content_type: record.content_type.clone(),
            source: record.source.clone(),
            page,
            tags,
            tree,
        }
    }

    /// Read a member of the resolved tree.
    pub fn get(&self, member: &str) -> Option<&Value> {
        self.tree.get(member)
    }
}
