//! Array merge strategies.
//!
//! Identity-keyed arrays are merged as maps keyed by their declared key
//! field and flattened back in a stable order. Set arrays are merged by
//! presence only and never conflict.

use std::collections::HashMap;

use super::document::Side;
use super::merger::MergeState;
use super::path::FieldPath;
use crate::value::Value;

/// Why a keyed element is missing from one side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disappearance {
    /// The other side left the element as it was in base: a plain removal.
    Removed,
    /// The other side changed the element: a delete/modify conflict.
    ModifiedElsewhere,
}

/// Classify the removal of a keyed element given its base content and the
/// content on the side that still has it.
pub fn classify_disappearance(base: &Value, survivor: &Value) -> Disappearance {
    if base == survivor {
        Disappearance::Removed
    } else {
        Disappearance::ModifiedElsewhere
    }
}

/// Elements of one version indexed by key, in document order.
struct KeyedItems<'v> {
    order: Vec<String>,
    by_key: HashMap<String, &'v Value>,
}

impl<'v> KeyedItems<'v> {
    /// `None` when an element is not a map, has no scalar key, or repeats a
    /// key already seen.
    fn index(items: &'v [Value], key_field: &str) -> Option<Self> {
        let mut order = Vec::with_capacity(items.len());
        let mut by_key = HashMap::with_capacity(items.len());
        for item in items {
            let key = item.as_map()?.get(key_field)?.scalar_key()?;
            if by_key.insert(key.clone(), item).is_some() {
                return None;
            }
            order.push(key);
        }
        Some(Self { order, by_key })
    }

    fn get(&self, key: &str) -> Option<&'v Value> {
        self.by_key.get(key).copied()
    }

    fn contains(&self, key: &str) -> bool {
        self.by_key.contains_key(key)
    }
}

/// Merge an identity-keyed array element by element.
///
/// Base elements keep their base order; new elements follow, ours'
/// additions before theirs'. Returns `None` when any version cannot be
/// indexed by `key_field`, in which case the caller merges atomically.
pub(crate) fn merge_keyed(
    state: &mut MergeState<'_>,
    key_field: &str,
    base: &[Value],
    ours: &[Value],
    theirs: &[Value],
    path: &FieldPath,
) -> Option<Vec<Value>> {
    let base = KeyedItems::index(base, key_field)?;
    let ours = KeyedItems::index(ours, key_field)?;
    let theirs = KeyedItems::index(theirs, key_field)?;

    let mut keys: Vec<&str> = base.order.iter().map(String::as_str).collect();
    keys.extend(
        ours.order
            .iter()
            .filter(|k| !base.contains(k))
            .map(String::as_str),
    );
    keys.extend(
        theirs
            .order
            .iter()
            .filter(|k| !base.contains(k) && !ours.contains(k))
            .map(String::as_str),
    );

    let mut merged = Vec::with_capacity(keys.len());
    for key in keys {
        let element_path = path.element(key_field, key);
        let element = match (base.get(key), ours.get(key), theirs.get(key)) {
            (Some(b), None, Some(t)) => state.element_disappeared(b, t, Side::Ours, &element_path),
            (Some(b), Some(o), None) => state.element_disappeared(b, o, Side::Theirs, &element_path),
            (b, o, t) => state.merge_entry(b, o, t, &element_path),
        };
        merged.extend(element);
    }
    Some(merged)
}

/// Merge a set array.
///
/// Base values survive unless both sides dropped them. Values new relative
/// to base are appended, ours' before theirs', without duplicates.
pub fn merge_set(base: &[Value], ours: &[Value], theirs: &[Value]) -> Vec<Value> {
    let mut merged: Vec<Value> = Vec::new();
    for value in base {
        if ours.contains(value) || theirs.contains(value) {
            push_unique(&mut merged, value);
        }
    }
    for value in ours.iter().chain(theirs) {
        if !base.contains(value) {
            push_unique(&mut merged, value);
        }
    }
    merged
}

fn push_unique(merged: &mut Vec<Value>, value: &Value) {
    if !merged.contains(value) {
        merged.push(value.clone());
    }
}
