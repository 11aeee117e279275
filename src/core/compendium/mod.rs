//! Content Resolution Engine
//!
//! Turns raw TTRPG source records into materialized, cross-referenced
//! entities ready for a renderer.
//!
//! # Overview
//!
//! - **Registration**: [`SourceRegistry`] splits input documents into raw records
//! - **Copy Resolution**: [`CopyResolver`] materializes `_copy` inheritance chains
//! - **Reprints**: [`ReprintResolver`] collapses the same entity across books
//! - **Indexing**: [`CrossReferenceIndex`] and [`IndexFilter`] decide what is emitted
//! - **Pipeline**: [`Compendium`] runs all of the above plus markup expansion
//!
//! # Architecture
//!
//! ```text
//!   JSON documents
//!         |
//!         v
//!   +----------------+     +---------------+     +-----------------+
//!   | SourceRegistry | --> | CopyResolver  | --> | ReprintResolver |
//!   |  (raw records) |     | (memoized)    |     | (policy)        |
//!   +----------------+     +---------------+     +-----------------+
//!                                                         |
//!                                                         v
//!   +----------------+     +---------------+     +-----------------+
//!   | TransformTable | <-- | TagExpander   | <-- | CrossReference  |
//!   | (per type)     |     | (links)       |     | Index (filter)  |
//!   +----------------+     +---------------+     +-----------------+
//! ```
//!
//! # Failure Model
//!
//! Partial success is normal. Per-entity problems become
//! [`EntityFailure`]s on the [`PipelineOutput`]; only an unparseable input
//! document is rejected as a whole.
//!
//! # Module Structure
//!
//! - [`error`]: Error types for all resolution operations
//! - [`types`]: Keys, raw records, copy directives, materialized entities
//! - [`registry`]: Raw record storage
//! - [`copier`]: Copy resolution and patch operations
//! - [`substitution`]: `<$..$>` placeholders and text replacements
//! - [`reprint`]: Reprint grouping, policies and the source catalog
//! - [`index`]: Cross-reference index and filters
//! - [`transforms`]: Per-type transform table
//! - [`pipeline`]: Batch orchestration

// ============================================================================
// Module Declarations
// ============================================================================

pub mod copier;
pub mod error;
pub mod index;
pub mod pipeline;
pub mod registry;
pub mod reprint;
pub mod substitution;
pub mod transforms;
pub mod types;

// ============================================================================
// Re-exports
// ============================================================================

pub use copier::{CopyResolver, MAX_COPY_DEPTH};
pub use error::{ContentError, EntityFailure, Result};
pub use index::{CrossReferenceIndex, IndexFilter, IndexSnapshot, KeyDecision};
pub use pipeline::{Compendium, ExpandedEntity, PipelineOutput};
pub use registry::SourceRegistry;
pub use reprint::{
    CatalogTable, ReprintGroup, ReprintPolicy, ReprintResolver, SourceCatalog, SourceInfo,
};
pub use substitution::{ability_modifier, proficiency_bonus, PlaceholderContext};
pub use transforms::{TransformTable, TypeTransform};
pub use types::{
    CopyDirective, FieldOp, IndexKey, MaterializedEntity, PatchOp, RawRecord, TextReplace,
};
