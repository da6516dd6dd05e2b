//! git merge-driver orchestration.
//!
//! Loads the three versions, merges them, optionally resolves conflicts
//! through a prompt, and writes the result. The outcome maps onto git's
//! merge-driver exit codes: 0 for a clean merge, 1 when conflicts remain,
//! 2 when an input could not be parsed and nothing was written.

use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use super::annotate::render_annotated;
use super::conflict::{Conflict, ConflictPolicy};
use super::document::{load_three, parse_three, serialize_document, DocumentPaths, Side, ThreeVersions};
use super::merger::{MergeOptions, Merger};
use super::resolver::{ConflictPrompt, ConflictResolver};
use crate::errors::{CoreError, DocumentError};

/// What a driver run did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DriverOutcome {
    /// Merged without conflicts; the plain document was written.
    Clean,
    /// Conflicts remain; an annotated best-effort document was written.
    Conflicted { unresolved: usize },
    /// Conflicts remain under the fail-closed policy; nothing was written.
    Withheld { unresolved: usize },
    /// An input could not be read or parsed; nothing was written.
    Declined { side: Option<Side>, reason: String },
}

impl DriverOutcome {
    /// Exit status for git.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Clean => 0,
            Self::Conflicted { .. } | Self::Withheld { .. } => 1,
            Self::Declined { .. } => 2,
        }
    }
}

/// Full result of one driver invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct DriverReport {
    pub outcome: DriverOutcome,
    /// Text to write, when the outcome allows writing.
    pub document: Option<String>,
    /// Conflicts still unresolved.
    pub conflicts: Vec<Conflict>,
}

impl DriverReport {
    fn declined(err: &DocumentError) -> Self {
        Self {
            outcome: DriverOutcome::Declined {
                side: err.side(),
                reason: err.to_string(),
            },
            document: None,
            conflicts: Vec::new(),
        }
    }
}

/// Runs one merge per invocation with fixed options.
#[derive(Debug, Clone)]
pub struct MergeDriver {
    options: MergeOptions,
}

impl MergeDriver {
    pub fn new(options: MergeOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &MergeOptions {
        &self.options
    }

    /// Merge the files named by `paths` and write the result to `output`.
    ///
    /// Input failures are reported as [`DriverOutcome::Declined`], not as
    /// errors. Errors are reserved for failures after a merge succeeded
    /// (prompt, serialization, write).
    pub fn run(
        &self,
        paths: &DocumentPaths,
        output: &Path,
        prompt: Option<&mut dyn ConflictPrompt>,
    ) -> Result<DriverReport, CoreError> {
        let versions = match load_three(paths) {
            Ok(versions) => versions,
            Err(err) if err.side().is_some() => {
                warn!(error = %err, "declining merge");
                return Ok(DriverReport::declined(&err));
            }
            Err(err) => return Err(err.into()),
        };

        let report = self.merge_versions(&versions, prompt)?;
        if let Some(document) = &report.document {
            std::fs::write(output, document).map_err(|source| DocumentError::Write {
                path: output.display().to_string(),
                source,
            })?;
            info!(output = %output.display(), outcome = ?report.outcome, "merged document written");
        }
        Ok(report)
    }

    /// Merge three in-memory documents without touching the filesystem.
    pub fn merge_sources(
        &self,
        base: &str,
        ours: &str,
        theirs: &str,
        prompt: Option<&mut dyn ConflictPrompt>,
    ) -> Result<DriverReport, CoreError> {
        match parse_three(base, ours, theirs) {
            Ok(versions) => self.merge_versions(&versions, prompt),
            Err(err) => {
                warn!(error = %err, "declining merge");
                Ok(DriverReport::declined(&err))
            }
        }
    }

    /// Merge already-parsed versions.
    pub fn merge_versions(
        &self,
        versions: &ThreeVersions,
        prompt: Option<&mut dyn ConflictPrompt>,
    ) -> Result<DriverReport, CoreError> {
        let mut result =
            Merger::three_way_merge(&self.options, &versions.base, &versions.ours, &versions.theirs);

        if let Some(prompt) = prompt {
            if result.has_conflicts() {
                ConflictResolver::resolve_interactive(&mut result, prompt)?;
            }
        }

        let unresolved = result.conflicts.len();
        let (outcome, document) = if unresolved == 0 {
            (DriverOutcome::Clean, Some(serialize_document(&result.merged)?))
        } else if self.options.policy == ConflictPolicy::FailClosed {
            warn!(unresolved, "conflicts remain under fail-closed policy; not writing");
            (DriverOutcome::Withheld { unresolved }, None)
        } else {
            warn!(unresolved, "writing annotated document with unresolved conflicts");
            (
                DriverOutcome::Conflicted { unresolved },
                Some(render_annotated(&result.merged, &result.conflicts)?),
            )
        };

        Ok(DriverReport {
            outcome,
            document,
            conflicts: result.conflicts,
        })
    }
}
