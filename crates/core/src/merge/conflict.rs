//! Conflict records produced by the merge engine.
//!
//! A conflict is not an error: the merge always produces a complete tree,
//! and each conflict records where both sides diverged, what each side
//! wanted, and which side's value was provisionally kept.

use serde::{Deserialize, Serialize, Serializer};

use super::document::Side;
use super::path::FieldPath;
use crate::value::Value;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Categorisation of a conflict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictKind {
    /// Both sides set the same field to different values.
    ScalarField,
    /// One side deleted a keyed element, the other modified it.
    DeleteModify,
    /// Raised inside a recursive map merge and folded into the parent.
    Nested(Box<ConflictKind>),
}

impl ConflictKind {
    /// The kind with every `Nested` wrapper removed.
    pub fn innermost(&self) -> &ConflictKind {
        match self {
            Self::Nested(inner) => inner.innermost(),
            other => other,
        }
    }

    pub fn is_delete_modify(&self) -> bool {
        matches!(self.innermost(), Self::DeleteModify)
    }

    pub(crate) fn nest(self) -> Self {
        Self::Nested(Box::new(self))
    }
}

impl std::fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ScalarField => write!(f, "scalar_field"),
            Self::DeleteModify => write!(f, "delete_modify"),
            Self::Nested(inner) => write!(f, "nested({inner})"),
        }
    }
}

impl Serialize for ConflictKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Named rule for the provisional value of a scalar-field conflict.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictPolicy {
    /// Keep the local branch's value.
    #[default]
    Ours,
    /// Keep the incoming branch's value.
    Theirs,
    /// Keep the local value in memory, but refuse to write a conflicted
    /// document.
    FailClosed,
}

impl ConflictPolicy {
    /// Which side's value a scalar-field conflict keeps.
    pub fn provisional_side(self) -> Side {
        match self {
            Self::Theirs => Side::Theirs,
            Self::Ours | Self::FailClosed => Side::Ours,
        }
    }
}

impl std::fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ours => write!(f, "ours"),
            Self::Theirs => write!(f, "theirs"),
            Self::FailClosed => write!(f, "fail-closed"),
        }
    }
}

impl std::str::FromStr for ConflictPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ours" => Ok(Self::Ours),
            "theirs" => Ok(Self::Theirs),
            "fail-closed" | "fail_closed" => Ok(Self::FailClosed),
            other => Err(format!("unknown conflict policy: '{other}'")),
        }
    }
}

/// A point where ours and theirs diverged beyond automatic merging.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Conflict {
    pub kind: ConflictKind,
    pub path: FieldPath,
    /// Value in the common ancestor; `None` when the field was absent.
    pub base_value: Option<Value>,
    /// Value on the local branch; `None` when deleted.
    pub ours_value: Option<Value>,
    /// Value on the incoming branch; `None` when deleted.
    pub theirs_value: Option<Value>,
    pub description: String,
    /// Side whose value the merged tree currently holds.
    pub applied: Side,
}

/// What a resolver may decide for one conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    Ours,
    Theirs,
    Skip,
}

/// One presentable option for a conflict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceOption {
    pub label: String,
    pub choice: Choice,
}

impl Conflict {
    pub fn value_for(&self, side: Side) -> Option<&Value> {
        match side {
            Side::Base => self.base_value.as_ref(),
            Side::Ours => self.ours_value.as_ref(),
            Side::Theirs => self.theirs_value.as_ref(),
        }
    }

    /// Options to present to a human, in display order.
    ///
    /// Delete/modify conflicts are offered as "delete" versus "keep
    /// modified" rather than as generic ours/theirs.
    pub fn options(&self) -> Vec<ChoiceOption> {
        let mut options = if self.kind.is_delete_modify() {
            let (delete, keep) = if self.ours_value.is_none() {
                (Choice::Ours, Choice::Theirs)
            } else {
                (Choice::Theirs, Choice::Ours)
            };
            let modified = if self.ours_value.is_none() {
                self.theirs_value.as_ref()
            } else {
                self.ours_value.as_ref()
            };
            vec![
                ChoiceOption {
                    label: "delete".into(),
                    choice: delete,
                },
                ChoiceOption {
                    label: format!("keep modified: {}", render_value(modified)),
                    choice: keep,
                },
            ]
        } else {
            vec![
                ChoiceOption {
                    label: format!("ours: {}", render_value(self.ours_value.as_ref())),
                    choice: Choice::Ours,
                },
                ChoiceOption {
                    label: format!("theirs: {}", render_value(self.theirs_value.as_ref())),
                    choice: Choice::Theirs,
                },
            ]
        };
        options.push(ChoiceOption {
            label: "skip (leave unresolved)".into(),
            choice: Choice::Skip,
        });
        options
    }
}

/// One-line rendering of an optional value; `None` renders as `<deleted>`.
pub fn render_value(value: Option<&Value>) -> String {
    match value {
        None => "<deleted>".to_string(),
        Some(v) => serde_json::to_string(v).unwrap_or_else(|_| format!("{v:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar() -> Conflict {
        Conflict {
            kind: ConflictKind::ScalarField,
            path: FieldPath::root().field("title"),
            base_value: Some("A".into()),
            ours_value: Some("B".into()),
            theirs_value: Some("C".into()),
            description: "both sides changed 'title'".into(),
            applied: Side::Ours,
        }
    }

    #[test]
    fn test_kind_display_and_innermost() {
        let kind = ConflictKind::DeleteModify.nest().nest();
        assert_eq!(kind.to_string(), "nested(nested(delete_modify))");
        assert_eq!(kind.innermost(), &ConflictKind::DeleteModify);
        assert!(kind.is_delete_modify());
    }

    #[test]
    fn test_scalar_options() {
        let options = scalar().options();
        assert_eq!(options.len(), 3);
        assert_eq!(options[0].label, "ours: \"B\"");
        assert_eq!(options[1].choice, Choice::Theirs);
        assert_eq!(options[2].choice, Choice::Skip);
    }

    #[test]
    fn test_delete_modify_options() {
        let conflict = Conflict {
            kind: ConflictKind::DeleteModify,
            ours_value: None,
            theirs_value: Some("kept".into()),
            ..scalar()
        };
        let options = conflict.options();
        assert_eq!(options[0].label, "delete");
        assert_eq!(options[0].choice, Choice::Ours);
        assert!(options[1].label.starts_with("keep modified"));
        assert_eq!(options[1].choice, Choice::Theirs);
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!("theirs".parse::<ConflictPolicy>(), Ok(ConflictPolicy::Theirs));
        assert_eq!(
            "fail-closed".parse::<ConflictPolicy>(),
            Ok(ConflictPolicy::FailClosed)
        );
        assert!("mine".parse::<ConflictPolicy>().is_err());
        assert_eq!(ConflictPolicy::FailClosed.provisional_side(), Side::Ours);
    }

    #[test]
    fn test_render_value() {
        assert_eq!(render_value(None), "<deleted>");
        assert_eq!(render_value(Some(&Value::from(3))), "3");
    }
}
