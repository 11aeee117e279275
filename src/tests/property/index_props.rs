//! Property-based tests for the Cross-Reference Index
//!
//! Tests invariants:
//! - filtered ⊆ full for any entity set and any filter
//! - An explicitly included key always survives filtering

use std::sync::Arc;

use proptest::prelude::*;
use serde_json::json;

use crate::core::compendium::index::{CrossReferenceIndex, IndexFilter};
use crate::core::compendium::types::{MaterializedEntity, RawRecord};

// ============================================================================
// Strategies
// ============================================================================

const SOURCES: [&str; 5] = ["PHB", "MM", "DMG", "XGE", "XPHB"];
const TYPES: [&str; 3] = ["spell", "monster", "item"];

fn arb_entity() -> impl Strategy<Value = Arc<MaterializedEntity>> {
    (
        "[A-Z][a-z]{2,8}",
        prop::sample::select(TYPES.to_vec()),
        prop::sample::select(SOURCES.to_vec()),
    )
        .prop_map(|(name, content_type, source)| {
            let tree = json!({ "name": name, "source": source });
            let record = RawRecord::from_tree(source, content_type, tree.clone())
                .expect("generated record is valid");
            Arc::new(MaterializedEntity::new(&record, tree))
        })
}

fn arb_filter() -> impl Strategy<Value = IndexFilter> {
    (
        prop::sample::subsequence(SOURCES.to_vec(), 0..=SOURCES.len()),
        any::<bool>(),
        prop::option::of(prop::sample::select(TYPES.to_vec())),
        prop::option::of("[A-Z][a-z]{2,8}"),
    )
        .prop_map(|(sources, all, group, excluded)| {
            let mut filter = if all {
                IndexFilter::all_sources()
            } else {
                IndexFilter::default()
            };
            filter = filter.with_sources(sources);
            if let Some(group) = group {
                filter = filter.include_group(group);
            }
            if let Some(name) = excluded {
                filter = filter.exclude_key(&format!("{}|spell|PHB", name));
            }
            filter
        })
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    /// Property: The filtered index never contains a key the full index lacks
    #[test]
    fn prop_filtered_is_subset(
        entities in prop::collection::vec(arb_entity(), 0..24),
        filter in arb_filter()
    ) {
        let full = CrossReferenceIndex::build(entities);
        let filtered = full.filter_with(&filter);

        prop_assert!(filtered.len() <= full.len());
        for key in filtered.keys() {
            prop_assert!(full.contains(key), "{} missing from full index", key);
        }
    }

    /// Property: Explicit includes survive any source allow-list
    #[test]
    fn prop_included_key_survives(
        entities in prop::collection::vec(arb_entity(), 1..12),
        pick in any::<prop::sample::Index>()
    ) {
        let chosen = pick.get(&entities).key.clone();
        let filter = IndexFilter::default()
            .with_sources(["none"])
            .include_key(chosen.as_str())
            .exclude_key(chosen.as_str());

        let filtered = CrossReferenceIndex::build(entities).filter_with(&filter);
        prop_assert!(filtered.contains(&chosen));
    }
}
