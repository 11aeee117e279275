//! Per-type transforms run after markup expansion.
//!
//! Each content type maps to at most one pure function. Types without an
//! entry pass through untouched.

use std::collections::HashMap;

use serde_json::{Map, Value};

use super::substitution::{ability_modifier, challenge_rating, proficiency_bonus, ABILITIES};
use crate::core::document::as_integer;

/// Signature of a type transform.
pub type TypeTransform = fn(&Value) -> Value;

/// Member written by the creature transform.
pub const ABILITY_MODS_FIELD: &str = "_abilityMods";

/// Content type → transform dispatch table.
#[derive(Debug, Clone, Default)]
pub struct TransformTable {
    transforms: HashMap<String, TypeTransform>,
}

impl TransformTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Table with the built-in transforms registered.
    pub fn with_defaults() -> Self {
        let mut table = Self::new();
        table.register("monster", creature_modifiers);
        table
    }

    /// Register (or replace) the transform for a content type.
    pub fn register(&mut self, content_type: &str, transform: TypeTransform) {
        self.transforms.insert(content_type.to_lowercase(), transform);
    }

    pub fn contains(&self, content_type: &str) -> bool {
        self.transforms.contains_key(&content_type.to_lowercase())
    }

    /// Transformed copy of `tree`, or `None` when the type has no transform.
    pub fn apply(&self, content_type: &str, tree: &Value) -> Option<Value> {
        self.transforms
            .get(&content_type.to_lowercase())
            .map(|transform| transform(tree))
    }
}

/// Record ability modifiers, and the proficiency bonus when a `cr` is present.
pub fn creature_modifiers(tree: &Value) -> Value {
    let mut out = tree.clone();
    let Value::Object(members) = &mut out else {
        return out;
    };

    let mods: Map<String, Value> = ABILITIES
        .iter()
        .filter_map(|ability| {
            let score = tree.get(*ability).and_then(as_integer)?;
            Some((ability.to_string(), Value::from(ability_modifier(score))))
        })
        .collect();
    let mut summary = Map::new();
    summary.insert("mods".to_string(), Value::Object(mods));
    if let Some(cr) = challenge_rating(tree) {
        summary.insert("proficiency".to_string(), Value::from(proficiency_bonus(cr)));
    }
    members.insert(ABILITY_MODS_FIELD.to_string(), Value::Object(summary));
    out
}
