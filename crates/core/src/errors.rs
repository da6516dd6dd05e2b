//! Error types for the specweave core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.
//!
//! Merge conflicts are deliberately absent from this taxonomy: they are data
//! carried by [`crate::merge::MergeResult`], not failures.

use thiserror::Error;

use crate::identity::RecordId;
use crate::merge::Side;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Alias(#[from] AliasError),

    #[error(transparent)]
    Identifier(#[from] IdentifierError),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Conflict(#[from] ConflictError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Reference resolution errors
// ---------------------------------------------------------------------------

/// Failure to turn an `@reference` into exactly one record.
///
/// Every variant carries enough context for a caller to build a
/// disambiguation prompt.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// Neither an alias nor any identifier prefix matched.
    #[error("reference '@{reference}' not found")]
    NotFound { reference: String },

    /// The identifier prefix matched several records.
    #[error("reference '@{reference}' is ambiguous; candidates: {}", join_ids(.candidates))]
    Ambiguous {
        reference: String,
        candidates: Vec<RecordId>,
    },

    /// The alias is claimed by several records.
    #[error("alias '@{alias}' is claimed by multiple records: {}", join_ids(.candidates))]
    DuplicateAlias {
        alias: String,
        candidates: Vec<RecordId>,
    },
}

fn join_ids(ids: &[RecordId]) -> String {
    ids.iter()
        .map(RecordId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

// ---------------------------------------------------------------------------
// Alias errors
// ---------------------------------------------------------------------------

/// Errors from alias uniqueness checks.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AliasError {
    /// The proposed alias already belongs to another record.
    #[error("alias '{alias}' is already used by record {existing}")]
    Taken { alias: String, existing: RecordId },
}

// ---------------------------------------------------------------------------
// Identifier errors
// ---------------------------------------------------------------------------

/// Errors from parsing record identifiers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IdentifierError {
    /// The string is not a 26-character Crockford base32 identifier.
    #[error("invalid record identifier '{value}': {detail}")]
    Invalid { value: String, detail: String },

    /// A record map has no identifier field.
    #[error("record is missing its '{field}' identifier field")]
    MissingField { field: String },
}

// ---------------------------------------------------------------------------
// Document errors
// ---------------------------------------------------------------------------

/// Errors from loading, parsing, serializing, or writing documents.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// One of the three merge inputs could not be read.
    #[error("failed to read {side} document '{path}': {source}")]
    Read {
        side: Side,
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// One of the three merge inputs is not a valid document.
    #[error("failed to parse {side} document '{path}': {detail}")]
    Parse {
        side: Side,
        path: String,
        detail: String,
    },

    /// A standalone document (not one of the merge inputs) could not be
    /// read or parsed.
    #[error("failed to load document '{path}': {detail}")]
    Load { path: String, detail: String },

    /// The merged tree could not be rendered back to YAML.
    #[error("failed to serialize merged document: {0}")]
    Serialize(String),

    /// The merged document could not be written.
    #[error("failed to write merged document '{path}': {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl DocumentError {
    /// Which of the three inputs failed, if the failure concerns an input.
    pub fn side(&self) -> Option<Side> {
        match self {
            Self::Read { side, .. } | Self::Parse { side, .. } => Some(*side),
            Self::Load { .. } | Self::Serialize(_) | Self::Write { .. } => None,
        }
    }
}

/// Errors converting a parsed YAML node into a document value.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValueError {
    #[error("unsupported mapping key at '{path}': only scalar keys are allowed")]
    UnsupportedKey { path: String },

    /// Two keys of one mapping become the same field name, e.g. `1` and `'1'`.
    #[error("duplicate mapping key '{key}' at '{path}'")]
    DuplicateKey { path: String, key: String },

    /// Tagged nodes (`!tag value`) have no representation in a document value.
    #[error("unsupported YAML tag '{tag}' at '{path}'")]
    UnsupportedTag { path: String, tag: String },
}

// ---------------------------------------------------------------------------
// Conflict errors
// ---------------------------------------------------------------------------

/// Errors from applying conflict resolutions.
#[derive(Debug, Error)]
pub enum ConflictError {
    /// The conflict path no longer exists in the merged tree.
    #[error("conflict path '{0}' not found in merged document")]
    PathNotFound(String),

    /// The interactive prompt failed (terminal closed, I/O error).
    #[error("conflict prompt failed: {0}")]
    Prompt(String),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// The configuration could not be rendered as TOML.
    #[error("configuration serialize error: {0}")]
    SerializeError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
