//! Property-based tests for Copy Resolution
//!
//! Tests invariants:
//! - For A copies B copies C, resolving A equals merging A's own record
//!   onto the separately resolved B
//! - Two independent resolvers produce identical trees

use proptest::prelude::*;
use serde_json::{json, Map, Value};

use crate::core::compendium::copier::{merge, CopyResolver};
use crate::core::compendium::registry::SourceRegistry;
use crate::core::compendium::types::IndexKey;

// ============================================================================
// Strategies
// ============================================================================

const FIELDS: [&str; 6] = ["ac", "hp", "speed", "str", "dex", "alignment"];

fn arb_fields() -> impl Strategy<Value = Map<String, Value>> {
    prop::collection::btree_map(
        prop::sample::select(FIELDS.to_vec()),
        -20i64..40,
        0..FIELDS.len(),
    )
    .prop_map(|fields| {
        fields
            .into_iter()
            .map(|(k, v)| (k.to_string(), Value::from(v)))
            .collect()
    })
}

/// Record `name` with `own` fields, copying `base` with `replace` ops.
fn record(name: &str, own: &Map<String, Value>, base: Option<(&str, &Map<String, Value>)>) -> Value {
    let mut tree = own.clone();
    tree.insert("name".into(), json!(name));
    tree.insert("source".into(), json!("MM"));
    if let Some((base_name, replace)) = base {
        tree.insert(
            "_copy".into(),
            json!({
                "name": base_name,
                "source": "MM",
                "_mod": { "replace": Value::Object(replace.clone()) }
            }),
        );
    }
    Value::Object(tree)
}

fn chain_registry(
    c: &Map<String, Value>,
    b_own: &Map<String, Value>,
    b_mod: &Map<String, Value>,
    a_own: &Map<String, Value>,
    a_mod: &Map<String, Value>,
) -> SourceRegistry {
    let mut registry = SourceRegistry::new();
    registry.register_typed(
        "MM",
        "monster",
        json!([
            record("A", a_own, Some(("B", a_mod))),
            record("B", b_own, Some(("C", b_mod))),
            record("C", c, None),
        ]),
    );
    registry
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    /// Property: Chain resolution equals overlay onto the resolved base
    #[test]
    fn prop_chain_equivalence(
        c in arb_fields(),
        b_own in arb_fields(),
        b_mod in arb_fields(),
        a_own in arb_fields(),
        a_mod in arb_fields()
    ) {
        let registry = chain_registry(&c, &b_own, &b_mod, &a_own, &a_mod);
        let a = IndexKey::new("A", "monster", "MM");
        let b = IndexKey::new("B", "monster", "MM");

        let direct = CopyResolver::new(&registry).resolve(&a).unwrap();

        let mut stepwise = CopyResolver::new(&registry);
        let resolved_b = stepwise.resolve(&b).unwrap();
        let a_record = registry.get(&a).unwrap();
        let directive = a_record.copy.as_ref().unwrap();
        let manual = merge(a_record, directive, &resolved_b.tree).unwrap();

        prop_assert_eq!(&direct.tree, &manual);
        for (field, value) in &a_mod {
            prop_assert_eq!(direct.tree.get(field), Some(value));
        }
    }

    /// Property: Resolution is deterministic
    #[test]
    fn prop_resolution_deterministic(
        c in arb_fields(),
        b_mod in arb_fields(),
        a_own in arb_fields()
    ) {
        let empty = Map::new();
        let registry = chain_registry(&c, &empty, &b_mod, &a_own, &empty);

        let (first, first_failures) = CopyResolver::new(&registry).resolve_all();
        let (second, second_failures) = CopyResolver::new(&registry).resolve_all();

        prop_assert!(first_failures.is_empty() && second_failures.is_empty());
        prop_assert_eq!(first.len(), 3);
        for (x, y) in first.iter().zip(&second) {
            prop_assert_eq!(&x.tree, &y.tree);
        }
    }
}
