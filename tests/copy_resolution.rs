//! Integration tests for copy resolution over JSON fixtures.
//!
//! # Test Categories
//!
//! - **Scenario**: the `Longsword+1` copy from the fixture books
//! - **Chain Equivalence**: direct resolution vs. overlay onto a resolved base
//! - **Cycle Detection**: bounded by a timeout so a regression cannot hang the suite
//!
//! # Running Tests
//!
//! ```bash
//! cargo test --test copy_resolution -- --nocapture
//! ```

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use compendium::core::compendium::copier::{merge, CopyResolver};
use compendium::core::compendium::{ContentError, IndexKey, SourceRegistry};
use compendium::ingestion::LoadedDocument;
use serde_json::json;

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn registry_from(files: &[&str]) -> SourceRegistry {
    let mut registry = SourceRegistry::new();
    for file in files {
        let doc = LoadedDocument::load(&fixture(file)).expect("fixture loads");
        registry.register(&doc.source_hint, doc.tree);
    }
    assert!(registry.failures().is_empty(), "{:?}", registry.failures());
    registry
}

// ============================================================================
// Scenario
// ============================================================================

#[test]
fn test_longsword_plus_one_inherits_and_patches() {
    // Derived book registered first: base arrives later
    let registry = registry_from(&["items-dmg.json", "items-phb.json"]);
    let mut resolver = CopyResolver::new(&registry);

    let plus_one = resolver
        .resolve(&IndexKey::new("Longsword+1", "item", "DMG"))
        .expect("resolves");

    assert_eq!(plus_one.tree["damage"], json!("1d8"));
    assert_eq!(plus_one.tree["bonusWeapon"], json!(1));
    assert_eq!(plus_one.tree["name"], json!("Longsword+1"));
    assert_eq!(plus_one.source, "DMG");
    // Per-publication members are not inherited
    assert!(plus_one.tree.get("page").is_none());
    assert!(plus_one.tree.get("srd").is_none());
    assert!(plus_one.tree.get("_copy").is_none());
}

#[test]
fn test_preserve_and_append() {
    let registry = registry_from(&["items-phb.json", "items-dmg.json"]);
    let mut resolver = CopyResolver::new(&registry);

    let flame = resolver
        .resolve(&IndexKey::new("Flame Tongue Longsword", "item", "DMG"))
        .expect("resolves");

    assert_eq!(flame.tree["srd"], json!(true));
    assert_eq!(flame.page, Some(170));
    let entries = flame.tree["entries"].as_array().expect("entries array");
    assert_eq!(entries.len(), 2);
    assert!(entries[1].as_str().unwrap().starts_with("While ablaze"));
}

// ============================================================================
// Chain Equivalence
// ============================================================================

#[test]
fn test_chain_equivalence() {
    let mut registry = SourceRegistry::new();
    registry.register_typed(
        "MM",
        "monster",
        json!([
            { "name": "Hobgoblin Captain", "_copy": {
                "name": "Hobgoblin Sergeant", "source": "MM",
                "_mod": { "replace": { "hp": 39 }, "trait": { "mode": "appendArr", "items": "Leadership" } }
            }},
            { "name": "Hobgoblin Sergeant", "_copy": {
                "name": "Hobgoblin", "source": "MM",
                "_mod": { "replace": { "hp": 22 }, "trait": { "mode": "appendArr", "items": "Tactics" } }
            }},
            { "name": "Hobgoblin", "hp": 11, "ac": 18, "trait": ["Martial Advantage"] }
        ]),
    );

    let captain = IndexKey::new("Hobgoblin Captain", "monster", "MM");
    let sergeant = IndexKey::new("Hobgoblin Sergeant", "monster", "MM");

    let direct = CopyResolver::new(&registry).resolve(&captain).unwrap();

    let resolved_sergeant = CopyResolver::new(&registry).resolve(&sergeant).unwrap();
    let record = registry.get(&captain).unwrap();
    let manual = merge(record, record.copy.as_ref().unwrap(), &resolved_sergeant.tree).unwrap();

    assert_eq!(direct.tree, manual);
    assert_eq!(direct.tree["hp"], json!(39));
    assert_eq!(direct.tree["ac"], json!(18));
    assert_eq!(
        direct.tree["trait"],
        json!(["Martial Advantage", "Tactics", "Leadership"])
    );
}

// ============================================================================
// Cycle Detection
// ============================================================================

#[test]
fn test_copy_cycle_terminates_for_both_members() {
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        let registry = registry_from(&["cycle.json"]);
        let (entities, failures) = CopyResolver::new(&registry).resolve_all();
        let names: Vec<String> = entities.iter().map(|e| e.name.clone()).collect();
        let failed: Vec<(Option<IndexKey>, &'static str)> = failures
            .iter()
            .map(|f| (f.key.clone(), f.error.kind()))
            .collect();
        let cycle_keys: Vec<IndexKey> = failures
            .into_iter()
            .filter_map(|f| match f.error {
                ContentError::CopyCycle { key, .. } => Some(key),
                _ => None,
            })
            .collect();
        let _ = tx.send((names, failed, cycle_keys));
    });

    let (names, failed, cycle_keys) = rx
        .recv_timeout(Duration::from_secs(5))
        .expect("copy resolution did not terminate");

    assert_eq!(names, vec!["Bystander"]);
    assert_eq!(failed.len(), 2);
    assert!(failed.iter().all(|(_, kind)| *kind == "copy_cycle"));
    assert_eq!(
        cycle_keys,
        vec![
            IndexKey::new("Ouroboros A", "monster", "TST"),
            IndexKey::new("Ouroboros B", "monster", "TST"),
        ]
    );
}

#[test]
fn test_missing_base_is_reported_not_fatal() {
    let mut registry = SourceRegistry::new();
    registry.register(
        "DMG",
        json!({ "item": [
            { "name": "Orphan", "_copy": { "name": "Nowhere", "source": "PHB" } },
            { "name": "Standalone" }
        ]}),
    );

    let (entities, failures) = CopyResolver::new(&registry).resolve_all();
    assert_eq!(entities.len(), 1);
    match &failures[0].error {
        ContentError::UnresolvedCopySource { key, source_key } => {
            assert_eq!(key.as_str(), "orphan|item|dmg");
            assert_eq!(source_key.as_str(), "nowhere|item|phb");
        }
        other => panic!("Expected UnresolvedCopySource, got {:?}", other),
    }
}
