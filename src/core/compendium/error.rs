//! Error types for the content resolution engine.
//!
//! Every variant except [`ContentError::InvalidDocument`] and
//! [`ContentError::Io`] is recovered at the entity level: the offending
//! record is left out of the final entity set and reported as an
//! [`EntityFailure`], while the rest of the batch proceeds.

use std::path::PathBuf;

use thiserror::Error;

use super::types::IndexKey;
use crate::ingestion::markup::MarkupError;

/// Result type alias for content resolution operations.
pub type Result<T> = std::result::Result<T, ContentError>;

/// Comprehensive error enum for content resolution.
#[derive(Error, Debug)]
pub enum ContentError {
    // =========================================================================
    // Copy Resolution Errors
    // =========================================================================
    /// A copy directive references a record that was never registered.
    #[error("Copy source not found for {key}: {source_key}")]
    UnresolvedCopySource {
        /// The record whose directive could not be satisfied
        key: IndexKey,
        /// The missing base record
        source_key: IndexKey,
    },

    /// Resolution of a key was re-entered while still in progress.
    #[error("Copy cycle detected for {key}: {}", format_path(.cycle_path))]
    CopyCycle {
        /// The key that was re-entered
        key: IndexKey,
        /// The chain of keys forming the cycle, ending with `key`
        cycle_path: Vec<IndexKey>,
    },

    /// Copy chain exceeded the maximum depth.
    #[error("Copy chain too deep for {key}: depth {depth} exceeds limit")]
    CopyChainTooDeep {
        /// The key at which the limit was hit
        key: IndexKey,
        /// The depth reached
        depth: usize,
    },

    /// A patch operation could not be applied.
    #[error("Invalid patch for {key} at '{path}': {reason}")]
    InvalidPatch {
        key: IndexKey,
        path: String,
        reason: String,
    },

    // =========================================================================
    // Markup Errors
    // =========================================================================
    /// The inline tag tokenizer found an unbalanced span in a text field.
    #[error("Unbalanced markup in {key}: {error}")]
    UnbalancedMarkup {
        key: IndexKey,
        #[source]
        error: Box<MarkupError>,
    },

    /// A tag name has no renderer. Never fatal; surfaced as a warning only.
    #[error("Unknown tag: {{@{tag}}}")]
    UnknownTag { tag: String },

    // =========================================================================
    // Registration Errors
    // =========================================================================
    /// The same key was registered twice within one source.
    #[error("Duplicate key {key} in source {source_id}")]
    DuplicateKey { key: IndexKey, source_id: String },

    /// A record is structurally unusable (not an object, no name, bad directive).
    #[error("Invalid record in source {source_id}: {reason}")]
    InvalidRecord { source_id: String, reason: String },

    /// An input document failed to parse as JSON. Fatal to that document only.
    #[error("Invalid JSON document {origin}: {source}")]
    InvalidDocument {
        origin: String,
        #[source]
        source: serde_json::Error,
    },

    /// An input document could not be read.
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn format_path(path: &[IndexKey]) -> String {
    path.iter()
        .map(IndexKey::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

impl ContentError {
    /// Short machine-friendly name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnresolvedCopySource { .. } => "unresolved_copy_source",
            Self::CopyCycle { .. } => "copy_cycle",
            Self::CopyChainTooDeep { .. } => "copy_chain_too_deep",
            Self::InvalidPatch { .. } => "invalid_patch",
            Self::UnbalancedMarkup { .. } => "unbalanced_markup",
            Self::UnknownTag { .. } => "unknown_tag",
            Self::DuplicateKey { .. } => "duplicate_key",
            Self::InvalidRecord { .. } => "invalid_record",
            Self::InvalidDocument { .. } => "invalid_document",
            Self::Io { .. } => "io",
        }
    }
}

/// A per-entity failure recorded during a batch run.
#[derive(Debug)]
pub struct EntityFailure {
    /// Key of the affected record, when one could be computed.
    pub key: Option<IndexKey>,
    /// What went wrong.
    pub error: ContentError,
}

impl EntityFailure {
    pub fn new(key: IndexKey, error: ContentError) -> Self {
        Self {
            key: Some(key),
            error,
        }
    }

    /// A failure that happened before a key could be computed.
    pub fn unkeyed(error: ContentError) -> Self {
        Self { key: None, error }
    }
}

impl std::fmt::Display for EntityFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.key {
            Some(key) => write!(f, "{}: {}", key, self.error),
            None => write!(f, "{}", self.error),
        }
    }
}
