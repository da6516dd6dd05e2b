//! Three-way semantic merge engine.
//!
//! Merges a base, "ours" (local) and "theirs" (incoming) version of a
//! document tree field by field. Maps are merged key by key using the
//! seven presence cases below; sequences are handed to the array strategy
//! declared for their field. The merge never fails: every point where both
//! sides diverged is recorded as a [`Conflict`] and the output holds the
//! provisional value chosen by the [`ConflictPolicy`].
//!
//! | base | ours | theirs | result                       |
//! |------|------|--------|------------------------------|
//! |  -   |  x   |   -    | ours                         |
//! |  -   |  -   |   x    | theirs                       |
//! |  -   |  x   |   x    | combine(ours, theirs)        |
//! |  x   |  -   |   x    | theirs                       |
//! |  x   |  x   |   -    | ours                         |
//! |  x   |  -   |   -    | omitted                      |
//! |  x   |  x   |   x    | changed side, else combine   |

use tracing::{debug, info};

use super::array::{self, Disappearance};
use super::conflict::{render_value, Conflict, ConflictKind, ConflictPolicy};
use super::document::Side;
use super::path::FieldPath;
use super::schema::{ArrayKind, ArraySchema};
use crate::value::{Fields, Value};

/// Knobs for one merge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOptions {
    pub policy: ConflictPolicy,
    pub schema: ArraySchema,
}

impl MergeOptions {
    pub fn new(policy: ConflictPolicy, schema: ArraySchema) -> Self {
        Self { policy, schema }
    }

    /// Default policy with the built-in record array declarations.
    pub fn for_records() -> Self {
        Self::new(ConflictPolicy::default(), ArraySchema::records())
    }
}

/// Outcome of a three-way merge.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeResult {
    /// Complete merged tree, holding provisional values at conflict paths.
    pub merged: Value,
    /// Conflicts in the order they were found.
    pub conflicts: Vec<Conflict>,
}

impl MergeResult {
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }
}

/// Stateless three-way merge entry points.
pub struct Merger;

impl Merger {
    /// Merge three whole documents.
    pub fn three_way_merge(
        options: &MergeOptions,
        base: &Value,
        ours: &Value,
        theirs: &Value,
    ) -> MergeResult {
        let mut state = MergeState::new(options);
        let root = FieldPath::root();

        // The root map is merged in place so top-level conflicts keep their
        // own kind instead of being reported as nested.
        let merged = match (ours, theirs) {
            (Value::Map(o), Value::Map(t)) if ours != theirs => {
                Value::Map(state.merge_fields(base.as_map(), Some(o), Some(t), &root))
            }
            _ => state
                .merge_entry(Some(base), Some(ours), Some(theirs), &root)
                .unwrap_or_default(),
        };

        info!(
            policy = %options.policy,
            conflicts = state.conflicts.len(),
            "three-way merge complete"
        );
        MergeResult {
            merged,
            conflicts: state.conflicts,
        }
    }

    /// Merge three optional field maps rooted at `path`. Absent maps are
    /// treated as empty.
    pub fn merge_objects(
        options: &MergeOptions,
        base: Option<&Fields>,
        ours: Option<&Fields>,
        theirs: Option<&Fields>,
        path: &FieldPath,
    ) -> (Fields, Vec<Conflict>) {
        let mut state = MergeState::new(options);
        let merged = state.merge_fields(base, ours, theirs, path);
        (merged, state.conflicts)
    }

    /// Whether the three versions merge without any conflict.
    pub fn can_auto_merge(options: &MergeOptions, base: &Value, ours: &Value, theirs: &Value) -> bool {
        !Self::three_way_merge(options, base, ours, theirs).has_conflicts()
    }
}

// ---------------------------------------------------------------------------
// Merge state
// ---------------------------------------------------------------------------

/// Accumulates conflicts while walking one merge.
pub(crate) struct MergeState<'a> {
    options: &'a MergeOptions,
    conflicts: Vec<Conflict>,
}

impl<'a> MergeState<'a> {
    fn new(options: &'a MergeOptions) -> Self {
        Self {
            options,
            conflicts: Vec::new(),
        }
    }

    /// Merge every key of three optional maps.
    ///
    /// Output key order: ours' keys, then keys only theirs has, then keys
    /// only base has (which can only survive through a one-sided deletion).
    fn merge_fields(
        &mut self,
        base: Option<&Fields>,
        ours: Option<&Fields>,
        theirs: Option<&Fields>,
        path: &FieldPath,
    ) -> Fields {
        let mut keys: Vec<&str> = Vec::new();
        for fields in [ours, theirs, base].into_iter().flatten() {
            for key in fields.keys() {
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }

        let mut merged = Fields::new();
        for key in keys {
            let value = self.merge_entry(
                base.and_then(|f| f.get(key)),
                ours.and_then(|f| f.get(key)),
                theirs.and_then(|f| f.get(key)),
                &path.field(key),
            );
            if let Some(value) = value {
                merged.insert(key, value);
            }
        }
        merged
    }

    /// The seven presence cases. `None` means the entry is omitted.
    pub(crate) fn merge_entry(
        &mut self,
        base: Option<&Value>,
        ours: Option<&Value>,
        theirs: Option<&Value>,
        path: &FieldPath,
    ) -> Option<Value> {
        match (base, ours, theirs) {
            (None, Some(o), None) => Some(o.clone()),
            (None, None, Some(t)) => Some(t.clone()),
            (None, Some(o), Some(t)) => Some(self.combine(None, o, t, path)),
            // A one-sided deletion yields to the surviving value.
            (Some(_), None, Some(t)) => Some(t.clone()),
            (Some(_), Some(o), None) => Some(o.clone()),
            (Some(_), None, None) | (None, None, None) => None,
            (Some(b), Some(o), Some(t)) => {
                if o == b {
                    Some(t.clone())
                } else if t == b {
                    Some(o.clone())
                } else {
                    Some(self.combine(Some(b), o, t, path))
                }
            }
        }
    }

    /// Combine two present values when both sides added or changed them.
    fn combine(&mut self, base: Option<&Value>, ours: &Value, theirs: &Value, path: &FieldPath) -> Value {
        if ours == theirs {
            return ours.clone();
        }

        match (ours, theirs) {
            (Value::Map(o), Value::Map(t)) => {
                let first = self.conflicts.len();
                let merged = self.merge_fields(base.and_then(Value::as_map), Some(o), Some(t), path);
                for conflict in &mut self.conflicts[first..] {
                    conflict.kind = conflict.kind.clone().nest();
                }
                Value::Map(merged)
            }
            (Value::Sequence(o), Value::Sequence(t)) => {
                let b = base.and_then(Value::as_sequence).unwrap_or_default();
                match self.options.schema.kind_for(path.last_field()) {
                    ArrayKind::Keyed { key_field } => {
                        match array::merge_keyed(self, &key_field, b, o, t, path) {
                            Some(items) => Value::Sequence(items),
                            None => {
                                debug!(%path, key_field = %key_field, "keyed array lacks usable keys; merging atomically");
                                self.scalar_conflict(base, ours, theirs, path)
                            }
                        }
                    }
                    ArrayKind::Set => Value::Sequence(array::merge_set(b, o, t)),
                    ArrayKind::Atomic => self.scalar_conflict(base, ours, theirs, path),
                }
            }
            _ => self.scalar_conflict(base, ours, theirs, path),
        }
    }

    /// Record a scalar-field conflict and return the policy's provisional value.
    fn scalar_conflict(
        &mut self,
        base: Option<&Value>,
        ours: &Value,
        theirs: &Value,
        path: &FieldPath,
    ) -> Value {
        let applied = self.options.policy.provisional_side();
        let description = match base {
            Some(_) => format!("ours and theirs both changed '{path}'"),
            None => format!("ours and theirs both added '{path}' with different values"),
        };
        debug!(
            %path,
            ours = %render_value(Some(ours)),
            theirs = %render_value(Some(theirs)),
            applied = %applied,
            "scalar field conflict"
        );
        self.conflicts.push(Conflict {
            kind: ConflictKind::ScalarField,
            path: path.clone(),
            base_value: base.cloned(),
            ours_value: Some(ours.clone()),
            theirs_value: Some(theirs.clone()),
            description,
            applied,
        });
        match applied {
            Side::Theirs => theirs.clone(),
            Side::Base | Side::Ours => ours.clone(),
        }
    }

    /// A keyed element was removed by `deleted_by` while the other side
    /// kept it. Returns the element to keep, if any.
    pub(crate) fn element_disappeared(
        &mut self,
        base: &Value,
        survivor: &Value,
        deleted_by: Side,
        path: &FieldPath,
    ) -> Option<Value> {
        match array::classify_disappearance(base, survivor) {
            Disappearance::Removed => {
                debug!(%path, deleted_by = %deleted_by, "keyed element removed");
                None
            }
            Disappearance::ModifiedElsewhere => {
                let (ours_value, theirs_value, kept) = match deleted_by {
                    Side::Ours => (None, Some(survivor.clone()), Side::Theirs),
                    Side::Base | Side::Theirs => (Some(survivor.clone()), None, Side::Ours),
                };
                let (deleter, modifier) = match kept {
                    Side::Theirs => ("ours", "theirs"),
                    Side::Base | Side::Ours => ("theirs", "ours"),
                };
                debug!(%path, kept = %kept, "delete/modify conflict");
                self.conflicts.push(Conflict {
                    kind: ConflictKind::DeleteModify,
                    path: path.clone(),
                    base_value: Some(base.clone()),
                    ours_value,
                    theirs_value,
                    description: format!("{deleter} deleted '{path}' while {modifier} modified it"),
                    applied: kept,
                });
                Some(survivor.clone())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::document::parse_three;

    fn merge(base: &str, ours: &str, theirs: &str) -> MergeResult {
        let three = parse_three(base, ours, theirs).unwrap();
        Merger::three_way_merge(&MergeOptions::for_records(), &three.base, &three.ours, &three.theirs)
    }

    fn field<'v>(value: &'v Value, key: &str) -> Option<&'v Value> {
        value.as_map().and_then(|m| m.get(key))
    }

    #[test]
    fn test_identical_versions_merge_to_themselves() {
        let doc = "title: A\ntags: [x, y]\nnotes:\n  - _ulid: N1\n    content: c\n";
        let result = merge(doc, doc, doc);
        assert!(!result.has_conflicts());
        assert_eq!(result.merged, parse_three(doc, doc, doc).unwrap().base);
    }

    #[test]
    fn test_one_side_changed() {
        let result = merge("title: A\n", "title: A\n", "title: B\n");
        assert!(!result.has_conflicts());
        assert_eq!(field(&result.merged, "title"), Some(&Value::from("B")));
    }

    #[test]
    fn test_disjoint_edits_are_combined() {
        let result = merge(
            "title: A\nstatus: open\n",
            "title: B\nstatus: open\n",
            "title: A\nstatus: closed\n",
        );
        assert!(!result.has_conflicts());
        assert_eq!(field(&result.merged, "title"), Some(&Value::from("B")));
        assert_eq!(field(&result.merged, "status"), Some(&Value::from("closed")));
    }

    #[test]
    fn test_true_conflict_defaults_to_ours() {
        let result = merge("title: A\n", "title: B\n", "title: C\n");
        assert_eq!(result.conflicts.len(), 1);
        let conflict = &result.conflicts[0];
        assert_eq!(conflict.kind, ConflictKind::ScalarField);
        assert_eq!(conflict.path.to_string(), "title");
        assert_eq!(conflict.ours_value, Some(Value::from("B")));
        assert_eq!(conflict.theirs_value, Some(Value::from("C")));
        assert_eq!(conflict.applied, Side::Ours);
        assert_eq!(field(&result.merged, "title"), Some(&Value::from("B")));
    }

    #[test]
    fn test_theirs_policy_keeps_theirs() {
        let three = parse_three("title: A\n", "title: B\n", "title: C\n").unwrap();
        let options = MergeOptions::new(ConflictPolicy::Theirs, ArraySchema::records());
        let result = Merger::three_way_merge(&options, &three.base, &three.ours, &three.theirs);
        assert_eq!(result.conflicts[0].applied, Side::Theirs);
        assert_eq!(field(&result.merged, "title"), Some(&Value::from("C")));
    }

    #[test]
    fn test_field_deletion_precedence() {
        let result = merge("x: 1\ny: 2\n", "y: 2\n", "x: 1\ny: 2\n");
        assert_eq!(field(&result.merged, "x"), Some(&Value::from(1)));

        let result = merge("x: 1\ny: 2\n", "y: 2\n", "y: 2\n");
        assert_eq!(field(&result.merged, "x"), None);
        assert!(!result.has_conflicts());
    }

    #[test]
    fn test_symmetric_addition() {
        let result = merge("a: 1\n", "a: 1\nb: 2\n", "a: 1\nb: 2\n");
        assert!(!result.has_conflicts());
        assert_eq!(field(&result.merged, "b"), Some(&Value::from(2)));

        let result = merge("a: 1\n", "a: 1\nb: 2\n", "a: 1\nb: 3\n");
        assert_eq!(result.conflicts.len(), 1);
        assert!(result.conflicts[0].description.contains("added"));
        assert_eq!(result.conflicts[0].base_value, None);
    }

    #[test]
    fn test_nested_map_conflicts_are_wrapped() {
        let result = merge(
            "meta:\n  owner: a\n  size: 1\n",
            "meta:\n  owner: b\n  size: 2\n",
            "meta:\n  owner: c\n  size: 1\n",
        );
        assert_eq!(result.conflicts.len(), 1);
        let conflict = &result.conflicts[0];
        assert_eq!(conflict.path.to_string(), "meta.owner");
        assert_eq!(conflict.kind.to_string(), "nested(scalar_field)");
        let meta = field(&result.merged, "meta").unwrap();
        assert_eq!(field(meta, "size"), Some(&Value::from(2)));
    }

    #[test]
    fn test_undeclared_sequence_is_atomic() {
        let result = merge("steps: [a]\n", "steps: [a, b]\n", "steps: [a, c]\n");
        assert_eq!(result.conflicts.len(), 1);
        assert_eq!(result.conflicts[0].path.to_string(), "steps");
    }

    #[test]
    fn test_set_field_merges_without_conflict() {
        let result = merge("tags: [a, b]\n", "tags: [a, b, c]\n", "tags: [b, d]\n");
        assert!(!result.has_conflicts());
        assert_eq!(
            field(&result.merged, "tags"),
            Some(&Value::Sequence(vec!["a".into(), "b".into(), "c".into(), "d".into()]))
        );
    }

    #[test]
    fn test_type_change_is_scalar_conflict() {
        let result = merge("x: 1\n", "x: {a: 1}\n", "x: [1]\n");
        assert_eq!(result.conflicts.len(), 1);
        assert_eq!(result.conflicts[0].kind, ConflictKind::ScalarField);
    }

    #[test]
    fn test_merge_objects_absent_maps() {
        let mut ours = Fields::new();
        ours.insert("a", 1.into());
        let (merged, conflicts) = Merger::merge_objects(
            &MergeOptions::default(),
            None,
            Some(&ours),
            None,
            &FieldPath::root(),
        );
        assert!(conflicts.is_empty());
        assert_eq!(merged.get("a"), Some(&Value::from(1)));
    }

    #[test]
    fn test_can_auto_merge() {
        let three = parse_three("a: 1\n", "a: 2\n", "a: 3\n").unwrap();
        let options = MergeOptions::for_records();
        assert!(!Merger::can_auto_merge(&options, &three.base, &three.ours, &three.theirs));
        assert!(Merger::can_auto_merge(&options, &three.base, &three.ours, &three.base));
    }
}
