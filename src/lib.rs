//! Compendium - TTRPG content resolution engine
//!
//! Resolves `_copy` inheritance between raw source records, collapses
//! reprints, indexes what survives the configured filters, and expands the
//! inline `{@tag ...}` markup in text fields.
//!
//! ```rust
//! use compendium::{Compendium, CompendiumConfig};
//! use serde_json::json;
//!
//! let mut compendium = Compendium::new(CompendiumConfig::default()).unwrap();
//! compendium.register("MM", json!({ "monster": [{ "name": "Goblin", "str": 8 }] }));
//!
//! let output = compendium.run();
//! assert_eq!(output.entities.len(), 1);
//! assert_eq!(output.index_snapshot().keys[0].as_str(), "goblin|monster|mm");
//! ```

pub mod config;
pub mod core;
pub mod ingestion;

#[cfg(test)]
mod tests;

pub use crate::config::{CompendiumConfig, ConfigError};
pub use crate::core::compendium::{
    Compendium, ContentError, EntityFailure, ExpandedEntity, IndexKey, MaterializedEntity,
    PipelineOutput, ReprintPolicy,
};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
