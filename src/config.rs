use std::path::{Path, PathBuf};

use figment::providers::{Env, Format, Json, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::compendium::reprint::{CatalogTable, ReprintPolicy, SourceInfo};

/// Environment variable prefix; `__` separates nested keys
/// (`COMPENDIUM_REPRINT__POLICY=all`).
pub const ENV_PREFIX: &str = "COMPENDIUM_";

/// Source allow-list entry meaning "every source".
pub const ALL_SOURCES: &str = "*";

/// Configuration loading errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("Invalid exclude pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompendiumConfig {
    /// Allowed sources, case-insensitive. `*` allows every source.
    pub sources: Vec<String>,
    /// Keys (`name|type|source`) always included.
    pub include: Vec<String>,
    /// Keys always excluded unless explicitly included.
    pub exclude: Vec<String>,
    /// Regexes matched against normalized keys.
    pub exclude_pattern: Vec<String>,
    /// Group names included wholesale (content types, `srd`, ...).
    pub include_group: Vec<String>,
    pub reprint: ReprintConfig,
    /// Publication metadata for reprint ordering.
    pub catalog: Vec<SourceInfo>,
}

/// Reprint selection settings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReprintConfig {
    pub policy: ReprintPolicy,
    /// Edition preferred by the `edition` policy.
    pub default_edition: Option<String>,
}

impl Default for CompendiumConfig {
    fn default() -> Self {
        Self {
            sources: vec![ALL_SOURCES.to_string()],
            include: Vec::new(),
            exclude: Vec::new(),
            exclude_pattern: Vec::new(),
            include_group: Vec::new(),
            reprint: ReprintConfig::default(),
            catalog: Vec::new(),
        }
    }
}

impl CompendiumConfig {
    /// Layered provider: defaults, then the file at `path` (TOML, or JSON by
    /// extension), then `COMPENDIUM_` environment variables.
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            let is_json = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("json"));
            figment = if is_json {
                figment.merge(Json::file(path))
            } else {
                figment.merge(Toml::file(path))
            };
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load the layered configuration.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = Self::figment(path).extract().map_err(Box::new)?;
        Ok(config)
    }

    /// Load from `path` (or the default location), falling back to defaults
    /// if the configuration cannot be read.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let path = path.map(Path::to_path_buf).unwrap_or_else(Self::default_path);
        if !path.exists() {
            log::debug!("No config file at {}, using defaults", path.display());
        }
        match Self::load(Some(&path)) {
            Ok(config) => {
                log::info!("Loaded compendium config from {}", path.display());
                config
            }
            Err(e) => {
                log::warn!(
                    "Failed to load config at {}: {e}, using defaults",
                    path.display()
                );
                Self::default()
            }
        }
    }

    /// Parse a TOML document layered over the defaults.
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        let config = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::string(toml))
            .extract()
            .map_err(Box::new)?;
        Ok(config)
    }

    /// `~/.config/compendium/config.toml`, or `config.toml` without a config dir.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("compendium").join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    /// Whether the allow-list contains `*`.
    pub fn all_sources(&self) -> bool {
        self.sources.iter().any(|s| s.trim() == ALL_SOURCES)
    }

    /// Source catalog built from the `catalog` section.
    pub fn catalog_table(&self) -> CatalogTable {
        CatalogTable::new(self.catalog.iter().cloned())
    }
}
