//! Property-based tests for the Tag Expander
//!
//! Tests invariants:
//! - expand(expand(t)) == expand(t) once the output has no `{@`
//! - Text without `{@` is returned unchanged
//! - Unclosed spans are reported, never panicked on

use proptest::prelude::*;

use crate::ingestion::markup::{MarkdownEmitter, TagExpander};

// ============================================================================
// Strategies
// ============================================================================

/// Plain text without tag delimiters.
fn arb_plain() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ,.]{0,12}"
}

/// Balanced markup with nested known and unknown tags.
fn arb_markup() -> impl Strategy<Value = String> {
    arb_plain().prop_recursive(4, 32, 3, |inner| {
        (
            prop::sample::select(vec!["b", "i", "dice", "spell", "note", "mystery"]),
            prop::collection::vec(inner, 1..3),
        )
            .prop_map(|(tag, parts)| format!("{{@{} {}}}", tag, parts.join(" ")))
    })
}

fn arb_document() -> impl Strategy<Value = String> {
    prop::collection::vec(arb_markup(), 0..4).prop_map(|parts| parts.join(" "))
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    /// Property: Expansion is idempotent
    #[test]
    fn prop_expansion_idempotent(text in arb_document()) {
        let expander = TagExpander::new();
        let mut emitter = MarkdownEmitter::new();

        let once = expander.expand(&text, &mut emitter).unwrap();
        prop_assume!(!once.contains("{@"));
        let twice = expander.expand(&once, &mut emitter).unwrap();

        prop_assert_eq!(once, twice);
    }

    /// Property: Text without tags passes through
    #[test]
    fn prop_untagged_text_unchanged(text in "[^@]{0,64}") {
        let expander = TagExpander::new();
        let mut emitter = MarkdownEmitter::new();

        let out = expander.expand(&text, &mut emitter).unwrap();
        prop_assert_eq!(out, text);
    }

    /// Property: Dropping the closing brace of a span is an error
    #[test]
    fn prop_unclosed_span_is_error(
        tag in prop::sample::select(vec!["b", "i", "dice", "spell"]),
        body in arb_plain()
    ) {
        let expander = TagExpander::new();
        let mut emitter = MarkdownEmitter::new();
        let text = format!("{{@{} {}", tag, body);

        let result = expander.expand(&text, &mut emitter);
        prop_assert!(result.is_err(), "'{}' should not parse", text);
    }
}
