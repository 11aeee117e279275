//! Property-based tests for placeholder arithmetic
//!
//! Tests invariants:
//! - `2 * mod <= score - 10 < 2 * mod + 2`
//! - Modifier never decreases as the score grows
//! - Proficiency bonus stays in 2..=9 and never decreases with CR

use proptest::prelude::*;

use crate::core::compendium::substitution::{ability_modifier, proficiency_bonus};

proptest! {
    /// Property: Modifier is the floor of half the distance from 10
    #[test]
    fn prop_modifier_is_floor_half(score in -50i64..100) {
        let m = ability_modifier(score);
        prop_assert!(2 * m <= score - 10);
        prop_assert!(score - 10 < 2 * m + 2);
    }

    /// Property: Modifier is monotonic
    #[test]
    fn prop_modifier_monotonic(score in 1i64..40) {
        prop_assert!(ability_modifier(score + 1) >= ability_modifier(score));
    }

    /// Property: Proficiency bonus is bounded and monotonic in CR
    #[test]
    fn prop_proficiency_bounded(cr in 0u32..30) {
        let cr = f64::from(cr);
        let bonus = proficiency_bonus(cr);
        prop_assert!((2..=9).contains(&bonus), "CR {} gave {}", cr, bonus);
        prop_assert!(proficiency_bonus(cr + 1.0) >= bonus);
    }
}

#[test]
fn test_modifier_reference_points() {
    assert_eq!(ability_modifier(10), 0);
    assert_eq!(ability_modifier(11), 0);
    assert_eq!(ability_modifier(20), 5);
    assert_eq!(ability_modifier(1), -5);
}
