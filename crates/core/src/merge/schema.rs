//! Declared array kinds.
//!
//! How a sequence merges is decided by the name of the field holding it,
//! never by inspecting the elements. Undeclared sequences merge atomically.

use std::collections::{BTreeMap, BTreeSet};

use crate::identity::record::ID_FIELD;

/// Merge policy for one sequence field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArrayKind {
    /// Sub-records identified by `key_field`; merged element by element.
    Keyed { key_field: String },
    /// Interchangeable scalars; merged as a set.
    Set,
    /// Whole-value merge: one side's sequence or a conflict.
    Atomic,
}

/// Field-name to [`ArrayKind`] declarations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArraySchema {
    keyed: BTreeMap<String, String>,
    sets: BTreeSet<String>,
    root: Option<String>,
}

impl ArraySchema {
    /// No declarations: every sequence merges atomically.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of declared array fields.
    pub fn len(&self) -> usize {
        self.keyed.len() + self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Declarations for the task / spec-item corpus.
    pub fn records() -> Self {
        let mut schema = Self::empty().with_root_key(ID_FIELD);
        for field in [
            "tasks",
            "items",
            "notes",
            "requirements",
            "features",
            "acceptance_criteria",
            "children",
            "observations",
        ] {
            schema = schema.with_keyed(field, ID_FIELD);
        }
        schema = schema.with_keyed("todos", "id");
        for field in [
            "tags",
            "slugs",
            "depends_on",
            "blocked_by",
            "implements",
            "relates_to",
            "tests",
            "supersedes_refs",
            "vcs_refs",
        ] {
            schema = schema.with_set(field);
        }
        schema
    }

    /// Declare `field` as keyed by `key_field`. Replaces a set declaration.
    pub fn with_keyed(mut self, field: impl Into<String>, key_field: impl Into<String>) -> Self {
        let field = field.into();
        self.sets.remove(&field);
        self.keyed.insert(field, key_field.into());
        self
    }

    /// Declare `field` as a set. Replaces a keyed declaration.
    pub fn with_set(mut self, field: impl Into<String>) -> Self {
        let field = field.into();
        self.keyed.remove(&field);
        self.sets.insert(field);
        self
    }

    /// Key field used when the document root itself is a sequence.
    pub fn with_root_key(mut self, key_field: impl Into<String>) -> Self {
        self.root = Some(key_field.into());
        self
    }

    /// Array kind for a sequence stored under `field` (`None` = document root).
    pub fn kind_for(&self, field: Option<&str>) -> ArrayKind {
        let Some(field) = field else {
            return match &self.root {
                Some(key_field) => ArrayKind::Keyed {
                    key_field: key_field.clone(),
                },
                None => ArrayKind::Atomic,
            };
        };
        if let Some(key_field) = self.keyed.get(field) {
            return ArrayKind::Keyed {
                key_field: key_field.clone(),
            };
        }
        if self.sets.contains(field) {
            return ArrayKind::Set;
        }
        ArrayKind::Atomic
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_defaults() {
        let schema = ArraySchema::records();
        assert_eq!(
            schema.kind_for(Some("notes")),
            ArrayKind::Keyed {
                key_field: "_ulid".into()
            }
        );
        assert_eq!(
            schema.kind_for(Some("todos")),
            ArrayKind::Keyed {
                key_field: "id".into()
            }
        );
        assert_eq!(schema.kind_for(Some("tags")), ArrayKind::Set);
        assert_eq!(schema.kind_for(Some("steps")), ArrayKind::Atomic);
    }

    #[test]
    fn test_redeclaring_switches_kind() {
        let schema = ArraySchema::records().with_keyed("tags", "name");
        assert_eq!(
            schema.kind_for(Some("tags")),
            ArrayKind::Keyed {
                key_field: "name".into()
            }
        );
        let schema = schema.with_set("notes");
        assert_eq!(schema.kind_for(Some("notes")), ArrayKind::Set);
    }

    #[test]
    fn test_root_kind() {
        assert_eq!(ArraySchema::empty().kind_for(None), ArrayKind::Atomic);
        assert!(matches!(
            ArraySchema::records().kind_for(None),
            ArrayKind::Keyed { .. }
        ));
    }
}
