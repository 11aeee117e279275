//! Copy Resolution Engine.
//!
//! The [`CopyResolver`] turns a [`RawRecord`] carrying a `_copy` directive
//! into a [`MaterializedEntity`] by resolving its base first, then layering
//! the record's own content on top.
//!
//! # Merge Order
//!
//! ```text
//! 1. Deep copy of the resolved base tree
//! 2. Drop per-publication members (page, srd, ...) unless preserved
//! 3. Overlay the target's own top-level members (preserved members keep the base value)
//! 4. Apply `_mod` patch ops in declaration order
//! 5. Apply `_mod["*"]` text replacements
//! 6. Render `<$..$>` placeholders
//! ```
//!
//! Because patch ops run after the overlay, `_mod.replace` wins over a plain
//! sibling member of the same name.
//!
//! # Termination
//!
//! Every key being resolved sits on an in-progress stack. Re-entering a key
//! on the stack is a [`ContentError::CopyCycle`], and a chain longer than
//! [`MAX_COPY_DEPTH`] is a [`ContentError::CopyChainTooDeep`]. The stack is
//! popped on every exit path, so a failed resolution never poisons later ones.
//!
//! Chain length counts every record from the target down to its root base,
//! including bases already sitting in the cache, so the limit trips for the
//! same keys whatever order the records were registered in.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexSet;
use serde_json::{Map, Number, Value};
use tracing::{debug, warn};

use super::error::{ContentError, EntityFailure, Result};
use super::registry::SourceRegistry;
use super::substitution::{
    apply_text_replacements, compile, render_placeholders, replace_in, PlaceholderContext,
};
use super::types::{
    CopyDirective, FieldOp, IndexKey, MaterializedEntity, PatchOp, RawRecord, COPY_FIELD,
};
use crate::core::document::DocumentExt;

/// Maximum length of a copy chain.
pub const MAX_COPY_DEPTH: usize = 32;

/// Members describing one publication, never inherited unless preserved.
pub const UNINHERITED_MEMBERS: &[&str] = &[
    "page",
    "srd",
    "basicRules",
    "reprintedAs",
    "otherSources",
    "additionalSources",
];

/// Memoizing resolver over a [`SourceRegistry`].
pub struct CopyResolver<'a> {
    registry: &'a SourceRegistry,

    /// Resolved entities, written once per key.
    cache: HashMap<IndexKey, Arc<MaterializedEntity>>,

    /// Records in each cached entity's chain, itself included.
    chain_lengths: HashMap<IndexKey, usize>,

    /// Keys currently being resolved, outermost first.
    in_progress: IndexSet<IndexKey>,
}

impl<'a> CopyResolver<'a> {
    pub fn new(registry: &'a SourceRegistry) -> Self {
        Self {
            registry,
            cache: HashMap::new(),
            chain_lengths: HashMap::new(),
            in_progress: IndexSet::new(),
        }
    }

    /// Resolve one key, reusing cached results.
    ///
    /// # Errors
    ///
    /// - `UnresolvedCopySource` if `key` or a base in its chain was never registered
    /// - `CopyCycle` if the chain re-enters a key
    /// - `CopyChainTooDeep` if the chain exceeds [`MAX_COPY_DEPTH`]
    /// - `InvalidPatch` if a patch op or text replacement cannot be applied
    pub fn resolve(&mut self, key: &IndexKey) -> Result<Arc<MaterializedEntity>> {
        if let Some(entity) = self.cache.get(key) {
            let depth = self.in_progress.len() + self.chain_length(key);
            if depth > MAX_COPY_DEPTH {
                return Err(ContentError::CopyChainTooDeep {
                    key: key.clone(),
                    depth,
                });
            }
            return Ok(Arc::clone(entity));
        }

        if let Some(start) = self.in_progress.get_index_of(key) {
            let mut cycle_path: Vec<IndexKey> =
                self.in_progress.iter().skip(start).cloned().collect();
            cycle_path.push(key.clone());
            return Err(ContentError::CopyCycle {
                key: key.clone(),
                cycle_path,
            });
        }

        if self.in_progress.len() >= MAX_COPY_DEPTH {
            return Err(ContentError::CopyChainTooDeep {
                key: key.clone(),
                depth: self.in_progress.len() + 1,
            });
        }

        let registry = self.registry;
        let record = registry
            .get(key)
            .ok_or_else(|| ContentError::UnresolvedCopySource {
                key: key.clone(),
                source_key: key.clone(),
            })?;

        self.in_progress.insert(key.clone());
        let result = self.materialize(record);
        self.in_progress.shift_remove(key);

        let (entity, chain_length) = result?;
        let entity = Arc::new(entity);
        debug!(key = %key, chain_length, "Resolved entity");
        self.cache.insert(key.clone(), Arc::clone(&entity));
        self.chain_lengths.insert(key.clone(), chain_length);
        Ok(entity)
    }

    /// Resolve every registered key in registration order.
    ///
    /// Failures are collected per entity; one bad record never stops the batch.
    pub fn resolve_all(&mut self) -> (Vec<Arc<MaterializedEntity>>, Vec<EntityFailure>) {
        let registry = self.registry;
        let mut entities = Vec::with_capacity(registry.len());
        let mut failures = Vec::new();

        for key in registry.keys() {
            match self.resolve(key) {
                Ok(entity) => entities.push(entity),
                Err(error) => {
                    warn!(key = %key, "{}", error);
                    failures.push(EntityFailure::new(key.clone(), error));
                }
            }
        }

        debug!(
            resolved = entities.len(),
            failed = failures.len(),
            "Copy resolution finished"
        );
        (entities, failures)
    }

    /// A cached entity, if `key` has been resolved.
    pub fn cached(&self, key: &IndexKey) -> Option<&Arc<MaterializedEntity>> {
        self.cache.get(key)
    }

    /// Number of resolved entities in the cache.
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    fn chain_length(&self, key: &IndexKey) -> usize {
        self.chain_lengths.get(key).copied().unwrap_or(1)
    }

    fn materialize(&mut self, record: &RawRecord) -> Result<(MaterializedEntity, usize)> {
        let Some(directive) = &record.copy else {
            return Ok((MaterializedEntity::new(record, record.tree.clone()), 1));
        };

        if !self.registry.contains(&directive.source_key) {
            return Err(ContentError::UnresolvedCopySource {
                key: record.key.clone(),
                source_key: directive.source_key.clone(),
            });
        }
        let base = self.resolve(&directive.source_key)?;

        let tree = merge(record, directive, &base.tree)?;
        let chain_length = self.chain_length(&directive.source_key) + 1;
        Ok((MaterializedEntity::new(record, tree), chain_length))
    }
}

/// Merge a target record onto its resolved base tree.
pub fn merge(record: &RawRecord, directive: &CopyDirective, base: &Value) -> Result<Value> {
    let invalid = |path: &str, reason: String| ContentError::InvalidPatch {
        key: record.key.clone(),
        path: path.to_string(),
        reason,
    };

    let mut merged = match base {
        Value::Object(map) => map.clone(),
        _ => return Err(invalid(COPY_FIELD, "base record is not an object".to_string())),
    };

    for member in UNINHERITED_MEMBERS {
        if !directive.preserve.contains(*member) {
            merged.shift_remove(*member);
        }
    }

    if let Some(own) = record.tree.as_object() {
        for (member, value) in own {
            if member == COPY_FIELD
                || (directive.preserve.contains(member) && merged.contains_key(member))
            {
                continue;
            }
            merged.insert(member.clone(), value.clone());
        }
    }

    let mut tree = Value::Object(merged);

    for op in &directive.ops {
        apply_op(&mut tree, op).map_err(|reason| invalid(op.target(), reason))?;
    }

    if !directive.substitutions.is_empty() {
        apply_text_replacements(&mut tree, &directive.substitutions)
            .map_err(|e| invalid("*", e.to_string()))?;
    }

    let context = PlaceholderContext::from_tree(&record.name, &tree);
    render_placeholders(&mut tree, &context);

    Ok(tree)
}

/// Apply one patch op to a tree.
pub fn apply_op(tree: &mut Value, op: &PatchOp) -> std::result::Result<(), String> {
    match op {
        PatchOp::Insert { path, value } => tree
            .pointer_insert(path, value.clone())
            .map_err(|e| e.to_string()),
        PatchOp::Replace { path, value } => tree
            .pointer_replace(path, value.clone())
            .map_err(|e| e.to_string()),
        PatchOp::Remove { path } => {
            if tree.pointer_remove(path).is_none() {
                debug!(path = %path, "Remove target absent");
            }
            Ok(())
        }
        PatchOp::Field { field, op } => {
            let object = tree
                .as_object_mut()
                .ok_or_else(|| "record is not an object".to_string())?;
            apply_field_op(object, field, op)
        }
    }
}

fn array_member<'v>(
    object: &'v mut Map<String, Value>,
    field: &str,
) -> std::result::Result<&'v mut Vec<Value>, String> {
    match object
        .entry(field.to_string())
        .or_insert_with(|| Value::Array(Vec::new()))
    {
        Value::Array(items) => Ok(items),
        _ => Err(format!("'{}' is not an array", field)),
    }
}

/// Whether an array item is addressed by `selector`: equal to it, or a named
/// object whose `name` equals it.
fn matches_item(item: &Value, selector: &Value) -> bool {
    if item == selector {
        return true;
    }
    match (item.get("name"), selector.as_str()) {
        (Some(Value::String(name)), Some(wanted)) => name.eq_ignore_ascii_case(wanted),
        _ => false,
    }
}

fn apply_field_op(
    object: &mut Map<String, Value>,
    field: &str,
    op: &FieldOp,
) -> std::result::Result<(), String> {
    match op {
        FieldOp::AppendArr(items) => {
            array_member(object, field)?.extend(items.iter().cloned());
        }
        FieldOp::AppendIfNotExistsArr(items) => {
            let array = array_member(object, field)?;
            for item in items {
                if !array.contains(item) {
                    array.push(item.clone());
                }
            }
        }
        FieldOp::PrependArr(items) => {
            array_member(object, field)?.splice(0..0, items.iter().cloned());
        }
        FieldOp::InsertArr { index, items } => {
            let array = array_member(object, field)?;
            if *index > array.len() {
                return Err(format!(
                    "insert index {} out of bounds (len {})",
                    index,
                    array.len()
                ));
            }
            array.splice(*index..*index, items.iter().cloned());
        }
        FieldOp::RemoveArr(selectors) => {
            let Some(Value::Array(array)) = object.get_mut(field) else {
                debug!(field, "removeArr target absent");
                return Ok(());
            };
            array.retain(|item| !selectors.iter().any(|s| matches_item(item, s)));
        }
        FieldOp::ReplaceArr { replace, items } => {
            let array = match object.get_mut(field) {
                Some(Value::Array(array)) => array,
                _ => return Err(format!("'{}' is not an array", field)),
            };
            let position = match replace.get("index").and_then(Value::as_u64) {
                Some(index) => usize::try_from(index).ok().filter(|i| *i < array.len()),
                None => array.iter().position(|item| matches_item(item, replace)),
            };
            let position = position.ok_or_else(|| format!("no item matching {}", replace))?;
            array.splice(position..=position, items.iter().cloned());
        }
        FieldOp::ReplaceTxt(replace) => {
            let pattern = compile(replace).map_err(|e| e.to_string())?;
            if let Some(value) = object.get_mut(field) {
                replace_in(value, &pattern, &replace.with);
            }
        }
        FieldOp::ScalarAddProp { prop, scalar } => {
            scale_props(object, field, prop, |n| n + scalar)?;
        }
        FieldOp::ScalarMultProp {
            prop,
            scalar,
            floor,
        } => {
            scale_props(object, field, prop, |n| {
                let product = n * scalar;
                if *floor {
                    product.floor()
                } else {
                    product
                }
            })?;
        }
    }
    Ok(())
}

/// Apply `f` to numeric member `prop` (every member for `*`) of object `field`.
///
/// Signed strings such as `"+3"` are read as numbers and written back signed.
fn scale_props(
    object: &mut Map<String, Value>,
    field: &str,
    prop: &str,
    f: impl Fn(f64) -> f64,
) -> std::result::Result<(), String> {
    let Some(Value::Object(target)) = object.get_mut(field) else {
        return Err(format!("'{}' is not an object", field));
    };

    let scale = |value: &mut Value| -> std::result::Result<(), String> {
        *value = match value {
            Value::Number(n) => number_value(f(n.as_f64().unwrap_or_default())),
            Value::String(s) => {
                let parsed: f64 = s
                    .trim()
                    .trim_start_matches('+')
                    .parse()
                    .map_err(|_| format!("'{}' is not numeric", s))?;
                Value::String(format!("{:+}", f(parsed) as i64))
            }
            other => return Err(format!("{} is not numeric", other)),
        };
        Ok(())
    };

    if prop == "*" {
        for (_, value) in target.iter_mut() {
            scale(value)?;
        }
        return Ok(());
    }
    match target.get_mut(prop) {
        Some(value) => scale(value),
        None => Err(format!("'{}' has no member '{}'", field, prop)),
    }
}

fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry(docs: Vec<(&str, Value)>) -> SourceRegistry {
        let mut registry = SourceRegistry::new();
        for (source, doc) in docs {
            registry.register(source, doc);
        }
        assert!(registry.failures().is_empty(), "{:?}", registry.failures());
        registry
    }

    fn key(name: &str, source: &str) -> IndexKey {
        IndexKey::new(name, "monster", source)
    }

    #[test]
    fn test_plain_record_materializes_as_is() {
        let registry = registry(vec![("MM", json!({"monster": [{"name": "Goblin", "ac": 15}]}))]);
        let mut resolver = CopyResolver::new(&registry);
        let entity = resolver.resolve(&key("Goblin", "MM")).unwrap();
        assert_eq!(entity.tree["ac"], json!(15));
        assert_eq!(resolver.cache_len(), 1);
    }

    #[test]
    fn test_resolution_is_cached() {
        let registry = registry(vec![("MM", json!({"monster": [{"name": "Goblin"}]}))]);
        let mut resolver = CopyResolver::new(&registry);
        let first = resolver.resolve(&key("Goblin", "MM")).unwrap();
        let second = resolver.resolve(&key("Goblin", "MM")).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_overlay_and_uninherited_members() {
        let registry = registry(vec![(
            "MM",
            json!({"monster": [
                {"name": "Goblin", "ac": 15, "hp": 7, "page": 166, "srd": true},
                {"name": "Goblin Boss", "hp": 21, "page": 166,
                 "_copy": {"name": "Goblin", "source": "MM"}}
            ]}),
        )]);
        let mut resolver = CopyResolver::new(&registry);
        let boss = resolver.resolve(&key("Goblin Boss", "MM")).unwrap();

        assert_eq!(boss.tree["name"], json!("Goblin Boss"));
        assert_eq!(boss.tree["ac"], json!(15));
        assert_eq!(boss.tree["hp"], json!(21));
        assert_eq!(boss.tree["page"], json!(166));
        assert!(boss.tree.get("srd").is_none());
        assert!(boss.tree.get(COPY_FIELD).is_none());
        assert!(!boss.tags.contains("srd"));
    }

    #[test]
    fn test_preserve_keeps_base_value() {
        let registry = registry(vec![(
            "MM",
            json!({"monster": [
                {"name": "Goblin", "ac": 15, "srd": true},
                {"name": "Goblin Scout", "ac": 13,
                 "_copy": {"name": "Goblin", "source": "MM", "_preserve": ["srd", "ac"]}}
            ]}),
        )]);
        let mut resolver = CopyResolver::new(&registry);
        let scout = resolver.resolve(&key("Goblin Scout", "MM")).unwrap();
        assert_eq!(scout.tree["srd"], json!(true));
        assert_eq!(scout.tree["ac"], json!(15));
    }

    #[test]
    fn test_mod_replace_wins_over_sibling() {
        let registry = registry(vec![(
            "MM",
            json!({"monster": [
                {"name": "Goblin", "ac": 15},
                {"name": "Tough Goblin", "ac": 16,
                 "_copy": {"name": "Goblin", "source": "MM", "_mod": {"replace": {"ac": 18}}}}
            ]}),
        )]);
        let mut resolver = CopyResolver::new(&registry);
        let tough = resolver.resolve(&key("Tough Goblin", "MM")).unwrap();
        assert_eq!(tough.tree["ac"], json!(18));
    }

    #[test]
    fn test_patch_ops_in_order() {
        let registry = registry(vec![(
            "MM",
            json!({"monster": [
                {"name": "Wolf", "trait": [{"name": "Keen Hearing"}, {"name": "Pack Tactics"}],
                 "action": [{"name": "Bite"}], "speed": {"walk": 40}, "save": {"dex": "+2"}},
                {"name": "Dire Wolf",
                 "_copy": {"name": "Wolf", "source": "MM", "_mod": {
                     "insert": {"/action/0": {"name": "Pounce"}},
                     "remove": ["/speed/walk", "/nothing/here"],
                     "trait": [
                         {"mode": "removeArr", "names": "Keen Hearing"},
                         {"mode": "appendArr", "items": {"name": "Keen Smell"}},
                         {"mode": "replaceArr", "replace": "Pack Tactics",
                          "items": [{"name": "Pack Hunter"}]}
                     ],
                     "save": {"mode": "scalarAddProp", "prop": "dex", "scalar": 2}
                 }}}
            ]}),
        )]);
        let mut resolver = CopyResolver::new(&registry);
        let dire = resolver.resolve(&key("Dire Wolf", "MM")).unwrap();

        assert_eq!(dire.tree["action"], json!([{"name": "Pounce"}, {"name": "Bite"}]));
        assert_eq!(dire.tree["speed"], json!({}));
        assert_eq!(
            dire.tree["trait"],
            json!([{"name": "Pack Hunter"}, {"name": "Keen Smell"}])
        );
        assert_eq!(dire.tree["save"]["dex"], json!("+4"));
    }

    #[test]
    fn test_insert_row_into_copied_table() {
        let registry = registry(vec![(
            "DMG",
            json!({"table": [
                {"name": "Trinkets", "rows": [["1", "a"], ["2", "b"]]},
                {"name": "More Trinkets",
                 "_copy": {"name": "Trinkets", "source": "DMG", "_mod": {
                     "insert": {"/rows/0": ["0", "z"]}
                 }}}
            ]}),
        )]);
        let mut resolver = CopyResolver::new(&registry);
        let table = resolver
            .resolve(&IndexKey::new("More Trinkets", "table", "DMG"))
            .unwrap();
        assert_eq!(table.tree["rows"], json!([["0", "z"], ["1", "a"], ["2", "b"]]));
    }

    #[test]
    fn test_scalar_mult_prop() {
        let mut object = json!({"speed": {"walk": 30, "fly": 45}})
            .as_object()
            .cloned()
            .unwrap();
        apply_field_op(
            &mut object,
            "speed",
            &FieldOp::ScalarMultProp {
                prop: "*".to_string(),
                scalar: 0.5,
                floor: true,
            },
        )
        .unwrap();
        assert_eq!(object["speed"], json!({"walk": 15, "fly": 22}));
    }

    #[test]
    fn test_replace_into_missing_parent_is_invalid_patch() {
        let registry = registry(vec![(
            "MM",
            json!({"monster": [
                {"name": "Goblin"},
                {"name": "Odd Goblin",
                 "_copy": {"name": "Goblin", "source": "MM",
                           "_mod": {"replace": {"/speed/walk": 10}}}}
            ]}),
        )]);
        let mut resolver = CopyResolver::new(&registry);
        match resolver.resolve(&key("Odd Goblin", "MM")) {
            Err(ContentError::InvalidPatch { path, .. }) => assert_eq!(path, "/speed/walk"),
            other => panic!("Expected InvalidPatch, got {:?}", other),
        }
    }

    #[test]
    fn test_unresolved_copy_source() {
        let registry = registry(vec![(
            "DMG",
            json!({"item": [{"name": "Longsword+1",
                             "_copy": {"name": "Longsword", "source": "PHB"}}]}),
        )]);
        let mut resolver = CopyResolver::new(&registry);
        let key = IndexKey::new("Longsword+1", "item", "DMG");
        match resolver.resolve(&key) {
            Err(ContentError::UnresolvedCopySource { key: k, source_key }) => {
                assert_eq!(k, key);
                assert_eq!(source_key.as_str(), "longsword|item|phb");
            }
            other => panic!("Expected UnresolvedCopySource, got {:?}", other),
        }
    }

    #[test]
    fn test_cycle_detected_for_each_member() {
        let registry = registry(vec![(
            "MM",
            json!({"monster": [
                {"name": "A", "_copy": {"name": "B", "source": "MM"}},
                {"name": "B", "_copy": {"name": "A", "source": "MM"}}
            ]}),
        )]);
        let mut resolver = CopyResolver::new(&registry);
        let (entities, failures) = resolver.resolve_all();

        assert!(entities.is_empty());
        assert_eq!(failures.len(), 2);
        for failure in &failures {
            match &failure.error {
                ContentError::CopyCycle { key, cycle_path } => {
                    assert_eq!(Some(key), failure.key.as_ref());
                    assert_eq!(cycle_path.len(), 3);
                    assert_eq!(cycle_path.first(), cycle_path.last());
                }
                other => panic!("Expected CopyCycle, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_chain_depth_limit() {
        let mut monsters = vec![json!({"name": "Level 0"})];
        for i in 1..=MAX_COPY_DEPTH + 1 {
            monsters.push(json!({
                "name": format!("Level {}", i),
                "_copy": {"name": format!("Level {}", i - 1), "source": "MM"}
            }));
        }
        let registry = registry(vec![("MM", json!({ "monster": monsters }))]);
        let mut resolver = CopyResolver::new(&registry);

        let deepest = key(&format!("Level {}", MAX_COPY_DEPTH + 1), "MM");
        match resolver.resolve(&deepest) {
            Err(ContentError::CopyChainTooDeep { depth, .. }) => {
                assert_eq!(depth, MAX_COPY_DEPTH + 1)
            }
            other => panic!("Expected CopyChainTooDeep, got {:?}", other),
        }

        // A chain within the limit still resolves
        let shallow = key(&format!("Level {}", MAX_COPY_DEPTH - 1), "MM");
        assert!(resolver.resolve(&shallow).is_ok());
    }

    #[test]
    fn test_chain_depth_limit_ignores_registration_order() {
        let mut monsters = vec![json!({"name": "Level 0"})];
        for i in 1..=MAX_COPY_DEPTH + 1 {
            monsters.push(json!({
                "name": format!("Level {}", i),
                "_copy": {"name": format!("Level {}", i - 1), "source": "MM"}
            }));
        }
        let mut reversed = monsters.clone();
        reversed.reverse();

        let failing = |monsters: Vec<Value>| {
            let registry = registry(vec![("MM", json!({ "monster": monsters }))]);
            let (entities, failures) = CopyResolver::new(&registry).resolve_all();
            for failure in &failures {
                match failure.error {
                    ContentError::CopyChainTooDeep { depth, .. } => {
                        assert!(depth > MAX_COPY_DEPTH)
                    }
                    ref other => panic!("Expected CopyChainTooDeep, got {:?}", other),
                }
            }
            let mut keys: Vec<String> = failures
                .into_iter()
                .filter_map(|f| f.key.map(|k| k.as_str().to_string()))
                .collect();
            keys.sort();
            (entities.len(), keys)
        };

        let (forward_count, forward) = failing(monsters);
        let (reverse_count, reverse) = failing(reversed);
        assert_eq!(forward, vec!["level 32|monster|mm", "level 33|monster|mm"]);
        assert_eq!(forward, reverse);
        assert_eq!(forward_count, MAX_COPY_DEPTH);
        assert_eq!(reverse_count, forward_count);
    }

    #[test]
    fn test_failure_does_not_poison_in_progress() {
        let registry = registry(vec![(
            "MM",
            json!({"monster": [
                {"name": "Orphan", "_copy": {"name": "Missing", "source": "MM"}},
                {"name": "Goblin"}
            ]}),
        )]);
        let mut resolver = CopyResolver::new(&registry);
        assert!(resolver.resolve(&key("Orphan", "MM")).is_err());
        assert!(resolver.resolve(&key("Goblin", "MM")).is_ok());
        assert!(resolver.resolve(&key("Orphan", "MM")).is_err());
    }

    #[test]
    fn test_placeholders_and_star_replace() {
        let registry = registry(vec![(
            "MM",
            json!({"monster": [
                {"name": "Orc", "str": 16, "cr": "1/2",
                 "action": [{"name": "Greataxe",
                             "entries": ["{@hit <$to_hit__str$>} to hit, {@h}<$damage_avg__1d12+str$> (1d12<$damage_mod__str$>)"]}]},
                {"name": "Orc Brute", "str": 18,
                 "_copy": {"name": "Orc", "source": "MM", "_mod": {
                     "*": {"mode": "replaceTxt", "replace": "Greataxe", "with": "Maul"}
                 }}}
            ]}),
        )]);
        let mut resolver = CopyResolver::new(&registry);

        // Plain records are never substituted
        let orc = resolver.resolve(&key("Orc", "MM")).unwrap();
        assert!(orc.tree["action"][0]["entries"][0]
            .as_str()
            .unwrap()
            .contains("<$to_hit__str$>"));

        let brute = resolver.resolve(&key("Orc Brute", "MM")).unwrap();
        assert_eq!(brute.tree["action"][0]["name"], json!("Maul"));
        assert_eq!(
            brute.tree["action"][0]["entries"][0],
            json!("{@hit +6} to hit, {@h}10 (1d12 + 4)")
        );
    }
}
