//! TOML-based configuration for specweave.
//!
//! Every section is optional; a missing file section falls back to the
//! built-in defaults, so an empty file is a valid configuration.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::ConfigError;
use crate::identity::record::ID_LEN;
use crate::identity::DEFAULT_MIN_PREFIX_LEN;
use crate::merge::{ArraySchema, ConflictPolicy, MergeOptions};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level application configuration loaded from a TOML file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Default log level when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Merge driver settings.
    #[serde(default)]
    pub merge: MergeConfig,

    /// Reference index settings.
    #[serde(default)]
    pub index: IndexConfig,

    /// Array merge declarations added to (or replacing) the built-in ones.
    #[serde(default)]
    pub arrays: ArraysConfig,
}

fn default_log_level() -> String {
    "warn".into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            merge: MergeConfig::default(),
            index: IndexConfig::default(),
            arrays: ArraysConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Merge
// ---------------------------------------------------------------------------

/// Merge driver configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Provisional value for conflicts: `ours`, `theirs` or `fail-closed`.
    #[serde(default)]
    pub policy: ConflictPolicy,

    /// Prompt for each conflict when a terminal is attached.
    #[serde(default)]
    pub interactive: bool,
}

// ---------------------------------------------------------------------------
// Index
// ---------------------------------------------------------------------------

/// Reference index configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Shortest identifier prefix ever displayed.
    #[serde(default = "default_min_prefix_len")]
    pub min_prefix_len: usize,
}

fn default_min_prefix_len() -> usize {
    DEFAULT_MIN_PREFIX_LEN
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            min_prefix_len: default_min_prefix_len(),
        }
    }
}

// ---------------------------------------------------------------------------
// Arrays
// ---------------------------------------------------------------------------

/// Array merge declarations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArraysConfig {
    /// Start from the built-in record declarations.
    #[serde(default = "default_true")]
    pub builtin: bool,

    /// Field name -> key field for identity-keyed arrays.
    #[serde(default)]
    pub keyed: BTreeMap<String, String>,

    /// Field names merged as sets.
    #[serde(default)]
    pub sets: Vec<String>,
}

fn default_true() -> bool {
    true
}

impl Default for ArraysConfig {
    fn default() -> Self {
        Self {
            builtin: true,
            keyed: BTreeMap::new(),
            sets: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading & validation
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Load an [`AppConfig`] from a TOML file at the given path.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Validate that all values are sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "log_level".into(),
                detail: format!("must be one of {}", LOG_LEVELS.join(", ")),
            });
        }
        if self.index.min_prefix_len == 0 || self.index.min_prefix_len > ID_LEN {
            return Err(ConfigError::InvalidValue {
                field: "index.min_prefix_len".into(),
                detail: format!("must be between 1 and {ID_LEN}"),
            });
        }
        for (field, key_field) in &self.arrays.keyed {
            if field.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "arrays.keyed".into(),
                    detail: "field names must not be empty".into(),
                });
            }
            if key_field.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: format!("arrays.keyed.{field}"),
                    detail: "key field must not be empty".into(),
                });
            }
        }
        for field in &self.arrays.sets {
            if field.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "arrays.sets".into(),
                    detail: "field names must not be empty".into(),
                });
            }
            if self.arrays.keyed.contains_key(field) {
                return Err(ConfigError::InvalidValue {
                    field: format!("arrays.sets.{field}"),
                    detail: "field is also declared as keyed".into(),
                });
            }
        }

        Ok(())
    }

    /// Convenience: load and validate in one call.
    pub fn load_and_validate<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load_from_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Render as TOML, for writing a starter file.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))
    }

    /// The array schema: built-in declarations (unless disabled) overlaid
    /// with the configured ones.
    pub fn array_schema(&self) -> ArraySchema {
        let mut schema = if self.arrays.builtin {
            ArraySchema::records()
        } else {
            ArraySchema::empty()
        };
        for (field, key_field) in &self.arrays.keyed {
            schema = schema.with_keyed(field.as_str(), key_field.as_str());
        }
        for field in &self.arrays.sets {
            schema = schema.with_set(field.as_str());
        }
        schema
    }

    pub fn merge_options(&self) -> MergeOptions {
        MergeOptions::new(self.merge.policy, self.array_schema())
    }
}
