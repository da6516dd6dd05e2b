//! Record-index subcommands: resolve, validate, prefix.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use serde::Serialize;

use specweave_core::identity::{load_records, MatchKind, ResolveFailureKind, ValidationError};
use specweave_core::{Record, RecordKind, ReferenceIndex};

use crate::style;

/// Record files to index.
#[derive(Args, Debug, Clone, Default)]
pub struct RecordFiles {
    /// Task record file (repeatable).
    #[arg(long = "tasks", value_name = "FILE")]
    pub tasks: Vec<PathBuf>,

    /// Spec-item record file (repeatable).
    #[arg(long = "items", value_name = "FILE")]
    pub items: Vec<PathBuf>,

    /// Metadata record file (repeatable).
    #[arg(long = "meta", value_name = "FILE")]
    pub meta: Vec<PathBuf>,
}

impl RecordFiles {
    fn is_empty(&self) -> bool {
        self.tasks.is_empty() && self.items.is_empty() && self.meta.is_empty()
    }

    /// Load every file, in task, item, meta order.
    pub fn load(&self) -> Result<Vec<Record>> {
        if self.is_empty() {
            anyhow::bail!("no record files given; pass --tasks, --items or --meta");
        }

        let groups = [
            (RecordKind::Task, &self.tasks),
            (RecordKind::Item, &self.items),
            (RecordKind::Meta, &self.meta),
        ];
        let mut records = Vec::new();
        for (kind, paths) in groups {
            for path in paths {
                let loaded = load_records(kind, path)
                    .with_context(|| format!("failed to load {} records from {}", kind, path.display()))?;
                tracing::debug!(kind = %kind, path = %path.display(), count = loaded.len(), "loaded records");
                records.extend(loaded);
            }
        }
        Ok(records)
    }
}

// ---------------------------------------------------------------------------
// resolve
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct CandidateJson {
    id: String,
    prefix: String,
    aliases: Vec<String>,
}

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum ResolveJson {
    Resolved {
        reference: String,
        id: String,
        prefix: String,
        matched_by: MatchKind,
    },
    Failed {
        reference: String,
        kind: ResolveFailureKind,
        message: String,
        candidates: Vec<CandidateJson>,
    },
}

/// Resolve one reference. Fails (non-zero exit) when it does not resolve.
pub fn cmd_resolve(reference: &str, files: &RecordFiles, min_len: usize, json: bool) -> Result<()> {
    let records = files.load()?;
    let index = ReferenceIndex::from_records(records);

    let candidate = |id: &specweave_core::RecordId| CandidateJson {
        id: id.to_string(),
        prefix: index.shortest_unique_prefix(id.as_str(), min_len),
        aliases: index.get(id).map(|r| r.aliases.clone()).unwrap_or_default(),
    };

    match index.resolve(reference) {
        Ok(resolution) => {
            let prefix = index.shortest_unique_prefix(resolution.id.as_str(), min_len);
            if json {
                let out = ResolveJson::Resolved {
                    reference: reference.to_string(),
                    id: resolution.id.to_string(),
                    prefix,
                    matched_by: resolution.matched_by,
                };
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                println!(
                    "{} {}",
                    style::short_id(resolution.id.as_str(), prefix.len()),
                    style::dim(&format!("(matched by {})", resolution.matched_by))
                );
            }
            Ok(())
        }
        Err(err) => {
            let candidates: Vec<CandidateJson> = err.candidates().iter().map(candidate).collect();
            if json {
                let out = ResolveJson::Failed {
                    reference: reference.to_string(),
                    kind: err.kind(),
                    message: err.to_string(),
                    candidates,
                };
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                eprintln!("{}", style::error(&err.to_string()));
                if !candidates.is_empty() {
                    eprintln!();
                    eprintln!("Candidates:");
                    for c in &candidates {
                        eprintln!(
                            "  {}  {}",
                            style::short_id(&c.id, c.prefix.len()),
                            style::dim(&c.aliases.join(", "))
                        );
                    }
                }
            }
            Err(err).context(format!("could not resolve '{reference}'"))
        }
    }
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct DuplicateAliasJson {
    alias: String,
    records: Vec<String>,
}

#[derive(Serialize)]
struct ValidateJson<'a> {
    records: usize,
    errors: &'a [ValidationError],
    duplicate_aliases: Vec<DuplicateAliasJson>,
}

/// Check every reference field of every loaded record.
pub fn cmd_validate(files: &RecordFiles, min_len: usize, json: bool) -> Result<()> {
    let records = files.load()?;
    let index = ReferenceIndex::build(&records);
    let errors = index.validate_references(&records);
    let duplicates = index.duplicate_aliases();

    if json {
        let out = ValidateJson {
            records: index.len(),
            errors: &errors,
            duplicate_aliases: duplicates
                .iter()
                .map(|(alias, ids)| DuplicateAliasJson {
                    alias: alias.to_string(),
                    records: ids.iter().map(ToString::to_string).collect(),
                })
                .collect(),
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        print_validation(&index, &errors, &duplicates, min_len);
    }

    if !errors.is_empty() {
        anyhow::bail!("{} unresolved reference(s)", errors.len());
    }
    Ok(())
}

fn print_validation(
    index: &ReferenceIndex,
    errors: &[ValidationError],
    duplicates: &[(&str, &[specweave_core::RecordId])],
    min_len: usize,
) {
    println!();
    println!("{}", style::header(&format!("Indexed {} record(s)", index.len())));
    println!();

    if errors.is_empty() {
        println!("{}", style::success("All references resolve"));
    } else {
        println!("{}", style::error(&format!("{} unresolved reference(s)", errors.len())));
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec!["Record", "Field", "Reference", "Problem"]);
        for e in errors {
            table.add_row(vec![
                Cell::new(index.shortest_unique_prefix(e.record.as_str(), min_len)),
                Cell::new(&e.field),
                Cell::new(&e.reference),
                Cell::new(e.kind),
            ]);
        }
        println!("{table}");
    }

    if !duplicates.is_empty() {
        println!();
        println!(
            "{}",
            style::warn(&format!("{} alias(es) claimed by several records", duplicates.len()))
        );
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec!["Alias", "Records"]);
        for (alias, ids) in duplicates {
            let ids: Vec<String> = ids
                .iter()
                .map(|id| index.shortest_unique_prefix(id.as_str(), min_len))
                .collect();
            table.add_row(vec![Cell::new(alias), Cell::new(ids.join(", "))]);
        }
        println!("{table}");
    }
    println!();
}

// ---------------------------------------------------------------------------
// prefix
// ---------------------------------------------------------------------------

/// Print the shortest unique display prefix for each identifier.
pub fn cmd_prefix(ids: &[String], files: &RecordFiles, min_len: usize) -> Result<()> {
    let records = files.load()?;
    let index = ReferenceIndex::from_records(records);
    for id in ids {
        println!("{}", index.shortest_unique_prefix(id, min_len));
    }
    Ok(())
}
