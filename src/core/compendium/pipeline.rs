//! Batch pipeline: register → resolve copies → select reprints → check
//! markup → index → expand markup → type transforms.
//!
//! Entities whose markup does not parse are dropped before indexing, so
//! neither index lists them and no link can point at them.
//!
//! # Example
//!
//! ```rust
//! use compendium::config::CompendiumConfig;
//! use compendium::core::compendium::Compendium;
//! use serde_json::json;
//!
//! let mut compendium = Compendium::new(CompendiumConfig::default()).unwrap();
//! compendium.register("PHB", json!({ "item": [
//!     { "name": "Longsword", "source": "PHB", "damage": "{@damage 1d8}" }
//! ]}));
//!
//! let output = compendium.run();
//! assert!(output.failures.is_empty());
//! assert_eq!(output.entities[0].expanded["damage"], "1d8");
//! ```

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::copier::CopyResolver;
use super::error::{ContentError, EntityFailure};
use super::index::{CrossReferenceIndex, IndexFilter, IndexSnapshot};
use super::registry::SourceRegistry;
use super::reprint::{CatalogTable, ReprintPolicy, ReprintResolver};
use super::transforms::TransformTable;
use super::types::MaterializedEntity;
use crate::config::{CompendiumConfig, ConfigError};
use crate::core::document::DocumentExt;
use crate::ingestion::markup::{parse, Expansion, MarkdownEmitter, TagExpander};
use crate::ingestion::LoadedDocument;

/// An admitted entity with its text fields expanded.
#[derive(Debug, Clone, Serialize)]
pub struct ExpandedEntity {
    /// The resolved entity, markup untouched
    pub entity: Arc<MaterializedEntity>,
    /// The resolved tree with every string leaf expanded and type transforms applied
    pub expanded: Value,
    /// Footnote annotations, numbered from 1 across all fields
    pub footnotes: Vec<String>,
    /// Tag names that had no renderer
    pub unknown_tags: Vec<String>,
}

/// Everything one run produces. Partial success is the normal outcome.
#[derive(Debug)]
pub struct PipelineOutput {
    /// Admitted entities, in registration order of their reprint group
    pub entities: Vec<ExpandedEntity>,
    /// Entities and documents left out of the result, with the cause
    pub failures: Vec<EntityFailure>,
    /// Non-fatal problems (unknown tags)
    pub warnings: Vec<EntityFailure>,
    /// Every entity surviving reprint selection
    pub index: CrossReferenceIndex,
    /// The subset admitted by the source and key filters
    pub filtered: CrossReferenceIndex,
}

impl PipelineOutput {
    pub fn index_snapshot(&self) -> IndexSnapshot {
        self.index.snapshot()
    }

    pub fn filtered_snapshot(&self) -> IndexSnapshot {
        self.filtered.snapshot()
    }
}

/// Owns the registry and the configured collaborators for one batch.
pub struct Compendium {
    registry: SourceRegistry,
    filter: IndexFilter,
    catalog: CatalogTable,
    policy: ReprintPolicy,
    default_edition: Option<String>,
    transforms: TransformTable,
    expander: TagExpander,
    /// Document-level failures from ingestion
    failures: Vec<EntityFailure>,
}

impl Compendium {
    /// Build a pipeline from configuration.
    ///
    /// # Errors
    ///
    /// `ConfigError::InvalidPattern` if an exclude pattern is not a valid regex.
    pub fn new(config: CompendiumConfig) -> Result<Self, ConfigError> {
        let filter = IndexFilter::from_config(&config)?;
        Ok(Self {
            registry: SourceRegistry::new(),
            filter,
            catalog: config.catalog_table(),
            policy: config.reprint.policy,
            default_edition: config.reprint.default_edition,
            transforms: TransformTable::with_defaults(),
            expander: TagExpander::new(),
            failures: Vec::new(),
        })
    }

    /// Replace the source catalog built from configuration.
    pub fn with_catalog(mut self, catalog: CatalogTable) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_policy(mut self, policy: ReprintPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn transforms_mut(&mut self) -> &mut TransformTable {
        &mut self.transforms
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    // ========================================================================
    // Ingestion
    // ========================================================================

    /// Register a parsed document. Returns the number of records accepted.
    pub fn register(&mut self, source: &str, tree: Value) -> usize {
        self.registry.register(source, tree).len()
    }

    /// Parse and register a JSON document.
    ///
    /// # Errors
    ///
    /// `ContentError::InvalidDocument` if `json` does not parse. Nothing from
    /// the document is registered in that case.
    pub fn register_document(
        &mut self,
        origin: &str,
        source: &str,
        json: &str,
    ) -> Result<usize, ContentError> {
        let tree: Value =
            serde_json::from_str(json).map_err(|source| ContentError::InvalidDocument {
                origin: origin.to_string(),
                source,
            })?;
        Ok(self.register(source, tree))
    }

    /// Register loaded documents in order; load failures are kept for the
    /// run's failure list.
    pub fn ingest(
        &mut self,
        documents: impl IntoIterator<Item = Result<LoadedDocument, ContentError>>,
    ) -> usize {
        let mut registered = 0;
        for document in documents {
            match document {
                Ok(document) => {
                    let count = self.register(&document.source_hint, document.tree);
                    debug!(path = %document.path.display(), records = count, "Registered document");
                    registered += count;
                }
                Err(error) => {
                    warn!("{}", error);
                    self.failures.push(EntityFailure::unkeyed(error));
                }
            }
        }
        registered
    }

    // ========================================================================
    // Run
    // ========================================================================

    /// Resolve, select, index and expand everything registered so far.
    pub fn run(&mut self) -> PipelineOutput {
        let mut failures = std::mem::take(&mut self.failures);
        failures.extend(self.registry.take_failures());

        let (resolved, copy_failures) = CopyResolver::new(&self.registry).resolve_all();
        failures.extend(copy_failures);

        let selected = ReprintResolver::new(&self.catalog)
            .with_default_edition(self.default_edition.clone())
            .resolve(&resolved, self.policy);

        let mut balanced = Vec::with_capacity(selected.len());
        for entity in selected {
            let errors = markup_failures(&entity);
            if errors.is_empty() {
                balanced.push(entity);
            } else {
                warn!(key = %entity.key, fields = errors.len(), "Entity excluded: unbalanced markup");
                failures.extend(errors);
            }
        }

        let index = CrossReferenceIndex::build(balanced.iter().cloned());
        let filtered = index.filter_with(&self.filter);

        let mut warnings = Vec::new();
        let mut entities = Vec::with_capacity(filtered.len());
        for entity in balanced.iter().filter(|e| filtered.contains(&e.key)) {
            match self.expand_entity(entity, &filtered) {
                Ok(expanded) => {
                    warnings.extend(expanded.unknown_tags.iter().map(|tag| {
                        EntityFailure::new(
                            entity.key.clone(),
                            ContentError::UnknownTag { tag: tag.clone() },
                        )
                    }));
                    entities.push(expanded);
                }
                Err(errors) => failures.extend(errors),
            }
        }

        info!(
            registered = self.registry.len(),
            resolved = resolved.len(),
            indexed = index.len(),
            admitted = filtered.len(),
            emitted = entities.len(),
            failed = failures.len(),
            warnings = warnings.len(),
            "Compendium run finished"
        );

        PipelineOutput {
            entities,
            failures,
            warnings,
            index,
            filtered,
        }
    }

    /// Expand every string leaf of one entity.
    fn expand_entity(
        &self,
        entity: &Arc<MaterializedEntity>,
        filtered: &CrossReferenceIndex,
    ) -> Result<ExpandedEntity, Vec<EntityFailure>> {
        let mut emitter = MarkdownEmitter::with_resolver(filtered);
        let mut expansion = Expansion::default();
        let mut errors = Vec::new();

        let mut tree = entity.tree.clone();
        tree.for_each_string_mut(&mut |text| {
            match self.expander.expand_into(text, &mut emitter, &mut expansion) {
                Ok(expanded) => *text = expanded,
                Err(error) => errors.push(EntityFailure::new(
                    entity.key.clone(),
                    ContentError::UnbalancedMarkup {
                        key: entity.key.clone(),
                        error: Box::new(error),
                    },
                )),
            }
        });

        if !errors.is_empty() {
            return Err(errors);
        }

        if let Some(transformed) = self.transforms.apply(&entity.content_type, &tree) {
            tree = transformed;
        }

        Ok(ExpandedEntity {
            entity: Arc::clone(entity),
            expanded: tree,
            footnotes: expansion.footnotes,
            unknown_tags: expansion.unknown_tags,
        })
    }
}

/// One `UnbalancedMarkup` failure per string leaf that does not parse.
/// Every field is checked so all bad spans are reported together.
fn markup_failures(entity: &MaterializedEntity) -> Vec<EntityFailure> {
    let mut errors = Vec::new();
    entity.tree.for_each_string(&mut |text| {
        if !text.contains("{@") {
            return;
        }
        if let Err(error) = parse(text) {
            errors.push(EntityFailure::new(
                entity.key.clone(),
                ContentError::UnbalancedMarkup {
                    key: entity.key.clone(),
                    error: Box::new(error),
                },
            ));
        }
    });
    errors
}
