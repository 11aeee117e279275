//! Property-based tests for the content resolution engine
//!
//! This module contains property-based tests using the proptest framework.
//! Property tests verify invariants that should hold for all inputs, rather
//! than testing specific cases.
//!
//! ## Running Property Tests
//!
//! Run all property tests:
//! ```sh
//! cargo test property --release
//! ```
//!
//! Run a specific property test module:
//! ```sh
//! cargo test property::markup_props --release
//! ```
//!
//! ## Test Modules
//!
//! - `markup_props`: Tests for the inline tag expander
//!   - Expansion is idempotent once no `{@` remains
//!   - Text without tags passes through unchanged
//!   - An unclosed span is always an error, never a panic
//!
//! - `arithmetic_props`: Tests for the game arithmetic behind placeholders
//!   - Modifier is `floor((score - 10) / 2)` for every score
//!   - Modifier and proficiency bonus are monotonic
//!
//! - `index_props`: Tests for the cross-reference index
//!   - The filtered index is always a subset of the full index
//!   - Explicitly included keys always survive filtering
//!
//! - `copy_props`: Tests for copy resolution
//!   - Resolving a chain directly equals overlaying onto the resolved base
//!   - Resolution is deterministic across resolvers
//!
//! ## Configuration
//!
//! By default, proptest runs 256 cases per property. This can be configured
//! via the `PROPTEST_CASES` environment variable:
//!
//! ```sh
//! PROPTEST_CASES=1000 cargo test property --release
//! ```

mod arithmetic_props;
mod copy_props;
mod index_props;
mod markup_props;
