//! Reference-bearing fields and reference validation.
//!
//! The set of fields that may hold `@` references is fixed per record kind.
//! Adding a new reference-bearing field means extending the tables below.

use serde::Serialize;
use tracing::{debug, info};

use super::index::ReferenceIndex;
use super::record::{Record, RecordId, RecordKind};
use crate::errors::ResolveError;
use crate::value::{Fields, Value};

/// Where a reference lives inside a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceField {
    /// A top-level field holding a reference or a list of references.
    Direct(&'static str),
    /// A field of each sub-object in a top-level list (e.g. `notes[].author`).
    Nested {
        list: &'static str,
        field: &'static str,
    },
}

impl ReferenceField {
    /// Dotted display name, e.g. `depends_on` or `notes.author`.
    pub fn name(&self) -> String {
        match self {
            Self::Direct(field) => (*field).to_string(),
            Self::Nested { list, field } => format!("{list}.{field}"),
        }
    }
}

const TASK_FIELDS: &[ReferenceField] = &[
    ReferenceField::Direct("spec_ref"),
    ReferenceField::Direct("meta_ref"),
    ReferenceField::Direct("depends_on"),
    ReferenceField::Direct("context"),
    ReferenceField::Nested {
        list: "notes",
        field: "author",
    },
    ReferenceField::Nested {
        list: "notes",
        field: "supersedes",
    },
    ReferenceField::Nested {
        list: "todos",
        field: "added_by",
    },
];

const ITEM_FIELDS: &[ReferenceField] = &[
    ReferenceField::Direct("depends_on"),
    ReferenceField::Direct("implements"),
    ReferenceField::Direct("relates_to"),
    ReferenceField::Direct("tests"),
    ReferenceField::Direct("supersedes"),
];

const META_FIELDS: &[ReferenceField] = &[
    ReferenceField::Direct("depends_on"),
    ReferenceField::Direct("relates_to"),
];

/// Reference-bearing fields of a record kind.
pub fn reference_fields(kind: RecordKind) -> &'static [ReferenceField] {
    match kind {
        RecordKind::Task => TASK_FIELDS,
        RecordKind::Item => ITEM_FIELDS,
        RecordKind::Meta => META_FIELDS,
    }
}

/// Failure category of an unresolved reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveFailureKind {
    NotFound,
    Ambiguous,
    DuplicateAlias,
}

impl std::fmt::Display for ResolveFailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::Ambiguous => write!(f, "ambiguous"),
            Self::DuplicateAlias => write!(f, "duplicate_alias"),
        }
    }
}

impl ResolveError {
    pub fn kind(&self) -> ResolveFailureKind {
        match self {
            Self::NotFound { .. } => ResolveFailureKind::NotFound,
            Self::Ambiguous { .. } => ResolveFailureKind::Ambiguous,
            Self::DuplicateAlias { .. } => ResolveFailureKind::DuplicateAlias,
        }
    }

    /// Candidate identifiers for disambiguation; empty for `NotFound`.
    pub fn candidates(&self) -> &[RecordId] {
        match self {
            Self::NotFound { .. } => &[],
            Self::Ambiguous { candidates, .. } | Self::DuplicateAlias { candidates, .. } => {
                candidates
            }
        }
    }
}

/// One unresolved reference found during validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub record: RecordId,
    pub field: String,
    pub reference: String,
    pub kind: ResolveFailureKind,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: field '{}' reference '{}' ({})",
            self.record, self.field, self.reference, self.kind
        )
    }
}

impl ReferenceIndex {
    /// Resolve every reference in the known reference fields of `records`.
    ///
    /// Returns one error per reference that fails to resolve, in record
    /// order and then field-table order.
    pub fn validate_references(&self, records: &[Record]) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let mut checked = 0usize;

        for record in records {
            for field in reference_fields(record.kind) {
                for reference in field_references(&record.fields, field) {
                    checked += 1;
                    if let Err(err) = self.resolve(reference) {
                        debug!(record = %record.id, field = %field.name(), reference, error = %err, "unresolved reference");
                        errors.push(ValidationError {
                            record: record.id.clone(),
                            field: field.name(),
                            reference: reference.to_string(),
                            kind: err.kind(),
                        });
                    }
                }
            }
        }

        info!(
            records = records.len(),
            references = checked,
            errors = errors.len(),
            "reference validation complete"
        );
        errors
    }
}

/// All `@` references stored under one reference field.
fn field_references<'a>(fields: &'a Fields, field: &ReferenceField) -> Vec<&'a str> {
    let mut out = Vec::new();
    match field {
        ReferenceField::Direct(name) => {
            if let Some(value) = fields.get(name) {
                collect_references(value, &mut out);
            }
        }
        ReferenceField::Nested { list, field } => {
            if let Some(Value::Sequence(items)) = fields.get(list) {
                for item in items {
                    if let Some(value) = item.as_map().and_then(|m| m.get(field)) {
                        collect_references(value, &mut out);
                    }
                }
            }
        }
    }
    out
}

fn collect_references<'a>(value: &'a Value, out: &mut Vec<&'a str>) {
    match value {
        Value::String(s) if s.starts_with('@') => out.push(s),
        Value::Sequence(items) => {
            for item in items {
                if let Value::String(s) = item {
                    if s.starts_with('@') {
                        out.push(s);
                    }
                }
            }
        }
        _ => {}
    }
}
