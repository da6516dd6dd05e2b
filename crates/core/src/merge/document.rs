//! Loading the three versions of a document.
//!
//! A merge needs the common ancestor, the local version and the incoming
//! version. All three are parsed independently; the first failure aborts
//! the load and names the version that failed.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::errors::DocumentError;
use crate::value::{Fields, Value};

/// Which of the three versions a value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// Common ancestor.
    Base,
    /// Local branch (git's `%A`).
    Ours,
    /// Incoming branch (git's `%B`).
    Theirs,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Base => write!(f, "base (ancestor)"),
            Self::Ours => write!(f, "ours (local)"),
            Self::Theirs => write!(f, "theirs (incoming)"),
        }
    }
}

/// On-disk locations of the three versions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentPaths {
    pub base: PathBuf,
    pub ours: PathBuf,
    pub theirs: PathBuf,
}

impl DocumentPaths {
    pub fn new(
        base: impl Into<PathBuf>,
        ours: impl Into<PathBuf>,
        theirs: impl Into<PathBuf>,
    ) -> Self {
        Self {
            base: base.into(),
            ours: ours.into(),
            theirs: theirs.into(),
        }
    }
}

/// The three parsed versions of one document.
#[derive(Debug, Clone, PartialEq)]
pub struct ThreeVersions {
    pub base: Value,
    pub ours: Value,
    pub theirs: Value,
}

/// Parse one document. `label` names the source in error messages.
///
/// An empty (or comment-only) document parses as an empty map, which is
/// what git hands the driver when a file was added on both branches.
pub fn parse_document(side: Side, label: &str, text: &str) -> Result<Value, DocumentError> {
    parse_value(text).map_err(|detail| DocumentError::Parse {
        side,
        path: label.to_string(),
        detail,
    })
}

/// Read and parse a document that is not part of a merge, such as a record
/// file handed to the reference index.
pub fn load_document(path: &Path) -> Result<Value, DocumentError> {
    let label = path.display().to_string();
    let text = std::fs::read_to_string(path).map_err(|e| DocumentError::Load {
        path: label.clone(),
        detail: e.to_string(),
    })?;
    parse_value(&text).map_err(|detail| DocumentError::Load {
        path: label,
        detail,
    })
}

fn parse_value(text: &str) -> Result<Value, String> {
    let node: serde_yaml::Value = serde_yaml::from_str(text).map_err(|e| e.to_string())?;
    let value = Value::from_yaml(node).map_err(|e| e.to_string())?;
    Ok(match value {
        Value::Null => Value::Map(Fields::new()),
        other => other,
    })
}

/// Parse three in-memory documents, base first.
pub fn parse_three(base: &str, ours: &str, theirs: &str) -> Result<ThreeVersions, DocumentError> {
    Ok(ThreeVersions {
        base: parse_document(Side::Base, "base", base)?,
        ours: parse_document(Side::Ours, "ours", ours)?,
        theirs: parse_document(Side::Theirs, "theirs", theirs)?,
    })
}

/// Read and parse the three versions from disk.
///
/// Versions are processed base, ours, theirs; the first read or parse
/// failure is returned and the remaining versions are not touched.
pub fn load_three(paths: &DocumentPaths) -> Result<ThreeVersions, DocumentError> {
    Ok(ThreeVersions {
        base: load_one(Side::Base, &paths.base)?,
        ours: load_one(Side::Ours, &paths.ours)?,
        theirs: load_one(Side::Theirs, &paths.theirs)?,
    })
}

fn load_one(side: Side, path: &Path) -> Result<Value, DocumentError> {
    let label = path.display().to_string();
    let text = std::fs::read_to_string(path).map_err(|source| DocumentError::Read {
        side,
        path: label.clone(),
        source,
    })?;
    debug!(%side, path = %label, bytes = text.len(), "loaded document version");
    parse_document(side, &label, &text)
}

/// Render a value tree back to YAML text.
pub fn serialize_document(value: &Value) -> Result<String, DocumentError> {
    serde_yaml::to_string(value).map_err(|e| DocumentError::Serialize(e.to_string()))
}
