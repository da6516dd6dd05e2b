//! Locations inside a document tree.

use serde::{Serialize, Serializer};

use crate::value::Value;

/// One step of a [`FieldPath`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// A map key.
    Field(String),
    /// The element of an identity-keyed sequence whose `key_field` equals `key`.
    Element { key_field: String, key: String },
}

/// Path from the document root to a field, e.g. `notes[01HQ...].content`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FieldPath(Vec<Segment>);

impl FieldPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    /// Child path for a map key.
    pub fn field(&self, key: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(Segment::Field(key.to_string()));
        Self(segments)
    }

    /// Child path for a keyed sequence element.
    pub fn element(&self, key_field: &str, key: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(Segment::Element {
            key_field: key_field.to_string(),
            key: key.to_string(),
        });
        Self(segments)
    }

    /// Name of the innermost map key, which decides a sequence's array kind.
    pub fn last_field(&self) -> Option<&str> {
        match self.0.last() {
            Some(Segment::Field(name)) => Some(name),
            _ => None,
        }
    }

    pub fn parent(&self) -> Option<(Self, &Segment)> {
        let (last, rest) = self.0.split_last()?;
        Some((Self(rest.to_vec()), last))
    }
}

impl std::fmt::Display for FieldPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            return write!(f, "<root>");
        }
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                Segment::Field(name) if i == 0 => write!(f, "{name}")?,
                Segment::Field(name) => write!(f, ".{name}")?,
                Segment::Element { key, .. } => write!(f, "[{key}]")?,
            }
        }
        Ok(())
    }
}

impl Serialize for FieldPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ---------------------------------------------------------------------------
// Navigation
// ---------------------------------------------------------------------------

fn element_matches(item: &Value, key_field: &str, key: &str) -> bool {
    item.as_map()
        .and_then(|m| m.get(key_field))
        .and_then(Value::scalar_key)
        .is_some_and(|k| k == key)
}

impl Value {
    /// Borrow the node at `path`.
    pub fn at_path(&self, path: &FieldPath) -> Option<&Value> {
        let mut node = self;
        for segment in path.segments() {
            node = match segment {
                Segment::Field(name) => node.as_map()?.get(name)?,
                Segment::Element { key_field, key } => node
                    .as_sequence()?
                    .iter()
                    .find(|item| element_matches(item, key_field, key))?,
            };
        }
        Some(node)
    }

    /// Mutably borrow the node at `path`.
    pub fn at_path_mut(&mut self, path: &FieldPath) -> Option<&mut Value> {
        let mut node = self;
        for segment in path.segments() {
            node = match segment {
                Segment::Field(name) => node.as_map_mut()?.get_mut(name)?,
                Segment::Element { key_field, key } => node
                    .as_sequence_mut()?
                    .iter_mut()
                    .find(|item| element_matches(item, key_field, key))?,
            };
        }
        Some(node)
    }

    /// Set the node at `path`, creating the final map key or appending the
    /// final keyed element when it does not exist yet. The parent must exist.
    ///
    /// Returns `false` when the parent is missing or has the wrong shape.
    pub fn set_path(&mut self, path: &FieldPath, value: Value) -> bool {
        let Some((parent_path, last)) = path.parent() else {
            *self = value;
            return true;
        };
        let Some(parent) = self.at_path_mut(&parent_path) else {
            return false;
        };
        match last {
            Segment::Field(name) => match parent.as_map_mut() {
                Some(fields) => {
                    fields.insert(name.clone(), value);
                    true
                }
                None => false,
            },
            Segment::Element { key_field, key } => match parent.as_sequence_mut() {
                Some(items) => {
                    match items
                        .iter_mut()
                        .find(|item| element_matches(item, key_field, key))
                    {
                        Some(slot) => *slot = value,
                        None => items.push(value),
                    }
                    true
                }
                None => false,
            },
        }
    }

    /// Remove the node at `path`, returning it.
    pub fn remove_path(&mut self, path: &FieldPath) -> Option<Value> {
        let (parent_path, last) = path.parent()?;
        let parent = self.at_path_mut(&parent_path)?;
        match last {
            Segment::Field(name) => parent.as_map_mut()?.remove(name),
            Segment::Element { key_field, key } => {
                let items = parent.as_sequence_mut()?;
                let pos = items
                    .iter()
                    .position(|item| element_matches(item, key_field, key))?;
                Some(items.remove(pos))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::document::{parse_document, Side};

    fn doc() -> Value {
        parse_document(
            Side::Base,
            "t",
            r#"
title: Fix bug
notes:
  - _ulid: N1
    content: first
  - _ulid: N2
    content: second
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_display() {
        let path = FieldPath::root()
            .field("notes")
            .element("_ulid", "N2")
            .field("content");
        assert_eq!(path.to_string(), "notes[N2].content");
        assert_eq!(FieldPath::root().to_string(), "<root>");
    }

    #[test]
    fn test_at_path_keyed_element() {
        let value = doc();
        let path = FieldPath::root()
            .field("notes")
            .element("_ulid", "N2")
            .field("content");
        assert_eq!(value.at_path(&path), Some(&Value::from("second")));
    }

    #[test]
    fn test_set_and_remove_path() {
        let mut value = doc();
        let title = FieldPath::root().field("title");
        assert!(value.set_path(&title, "Fix auth bug".into()));
        assert_eq!(value.at_path(&title), Some(&Value::from("Fix auth bug")));

        let n1 = FieldPath::root().field("notes").element("_ulid", "N1");
        assert!(value.remove_path(&n1).is_some());
        assert!(value.at_path(&n1).is_none());
        assert_eq!(value.at_path(&FieldPath::root().field("notes")).and_then(Value::as_sequence).map(<[Value]>::len), Some(1));
    }

    #[test]
    fn test_set_path_missing_parent() {
        let mut value = doc();
        let path = FieldPath::root().field("missing").field("x");
        assert!(!value.set_path(&path, Value::Null));
    }
}
