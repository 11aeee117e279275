//! Reads JSON content documents from disk.
//!
//! Parsing runs in parallel; registration stays with the caller so records
//! are registered, and duplicates reported, in a stable order.

use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde_json::Value;
use tracing::debug;
use walkdir::WalkDir;

use crate::core::compendium::error::{ContentError, Result};

/// One parsed input file.
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub path: PathBuf,
    /// Default source for records without one: the upper-cased file stem
    pub source_hint: String,
    pub tree: Value,
}

impl LoadedDocument {
    /// Read and parse one file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| ContentError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let tree = serde_json::from_str(&text).map_err(|source| ContentError::InvalidDocument {
            origin: path.display().to_string(),
            source,
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            source_hint: source_hint(path),
            tree,
        })
    }
}

/// `bestiary-mm.json` → `MM`, `PHB.json` → `PHB`.
fn source_hint(path: &Path) -> String {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    stem.rsplit('-').next().unwrap_or(stem).to_uppercase()
}

/// Every `*.json` file under `dir`, sorted by path.
pub fn discover(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dir).to_path_buf();
            ContentError::Io {
                path,
                source: e
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("filesystem loop")),
            }
        })?;
        let is_json = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        if entry.file_type().is_file() && is_json {
            paths.push(entry.into_path());
        }
    }
    paths.sort();
    debug!(dir = %dir.display(), files = paths.len(), "Discovered content files");
    Ok(paths)
}

/// Load `paths` in parallel. Results keep the order of `paths`.
pub fn load_paths(paths: &[PathBuf]) -> Vec<Result<LoadedDocument>> {
    paths
        .par_iter()
        .map(|path| LoadedDocument::load(path))
        .collect()
}

/// [`discover`] then [`load_paths`].
pub fn load_dir(dir: &Path) -> Result<Vec<Result<LoadedDocument>>> {
    Ok(load_paths(&discover(dir)?))
}
