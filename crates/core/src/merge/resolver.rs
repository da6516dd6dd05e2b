//! Conflict resolution.
//!
//! The [`ConflictResolver`] applies a [`Choice`] to a merged tree. In
//! interactive mode the choice comes from a [`ConflictPrompt`]; the merge
//! code itself never touches a terminal.

use tracing::{debug, info};

use super::conflict::{Choice, ChoiceOption, Conflict};
use super::document::Side;
use super::merger::MergeResult;
use crate::errors::ConflictError;
use crate::value::Value;

/// Source of decisions for interactive resolution.
pub trait ConflictPrompt {
    /// Pick one of `options` for `conflict`.
    fn choose(&mut self, conflict: &Conflict, options: &[ChoiceOption]) -> Result<Choice, ConflictError>;
}

/// Stateless conflict resolution operations.
pub struct ConflictResolver;

impl ConflictResolver {
    /// Rewrite `merged` at the conflict path with the chosen side's value.
    ///
    /// Choosing a side whose value is absent removes the node. Returns
    /// `false` for [`Choice::Skip`], leaving the tree untouched.
    pub fn apply_choice(
        merged: &mut Value,
        conflict: &mut Conflict,
        choice: Choice,
    ) -> Result<bool, ConflictError> {
        let side = match choice {
            Choice::Ours => Side::Ours,
            Choice::Theirs => Side::Theirs,
            Choice::Skip => {
                debug!(path = %conflict.path, "conflict skipped");
                return Ok(false);
            }
        };

        match conflict.value_for(side).cloned() {
            Some(value) => {
                if !merged.set_path(&conflict.path, value) {
                    return Err(ConflictError::PathNotFound(conflict.path.to_string()));
                }
            }
            None => {
                // Already absent is fine.
                let _ = merged.remove_path(&conflict.path);
            }
        }

        conflict.applied = side;
        info!(path = %conflict.path, side = %side, "conflict resolved");
        Ok(true)
    }

    /// Ask `prompt` about every conflict in `result`, apply the answers, and
    /// drop resolved conflicts. Skipped conflicts stay in the result.
    ///
    /// Returns the number of conflicts resolved.
    pub fn resolve_interactive(
        result: &mut MergeResult,
        prompt: &mut dyn ConflictPrompt,
    ) -> Result<usize, ConflictError> {
        let mut resolved = 0;
        let mut i = 0;
        while i < result.conflicts.len() {
            let options = result.conflicts[i].options();
            let choice = prompt.choose(&result.conflicts[i], &options)?;
            if Self::apply_choice(&mut result.merged, &mut result.conflicts[i], choice)? {
                result.conflicts.remove(i);
                resolved += 1;
            } else {
                i += 1;
            }
        }

        info!(
            resolved,
            unresolved = result.conflicts.len(),
            "interactive resolution finished"
        );
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::conflict::ConflictKind;
    use crate::merge::document::parse_three;
    use crate::merge::merger::{MergeOptions, Merger};
    use crate::merge::path::FieldPath;

    /// Answers from a fixed script, recording what it was shown.
    struct ScriptedPrompt {
        answers: Vec<Choice>,
        seen: Vec<(String, Vec<String>)>,
    }

    impl ScriptedPrompt {
        fn new(answers: &[Choice]) -> Self {
            Self {
                answers: answers.iter().rev().copied().collect(),
                seen: Vec::new(),
            }
        }
    }

    impl ConflictPrompt for ScriptedPrompt {
        fn choose(&mut self, conflict: &Conflict, options: &[ChoiceOption]) -> Result<Choice, ConflictError> {
            self.seen.push((
                conflict.path.to_string(),
                options.iter().map(|o| o.label.clone()).collect(),
            ));
            self.answers
                .pop()
                .ok_or_else(|| ConflictError::Prompt("script exhausted".into()))
        }
    }

    fn merge(base: &str, ours: &str, theirs: &str) -> MergeResult {
        let three = parse_three(base, ours, theirs).unwrap();
        Merger::three_way_merge(&MergeOptions::for_records(), &three.base, &three.ours, &three.theirs)
    }

    fn title(result: &MergeResult) -> Option<&Value> {
        result.merged.at_path(&FieldPath::root().field("title"))
    }

    #[test]
    fn test_interactive_take_theirs() {
        let mut result = merge("title: A\n", "title: B\n", "title: C\n");
        let mut prompt = ScriptedPrompt::new(&[Choice::Theirs]);
        let resolved = ConflictResolver::resolve_interactive(&mut result, &mut prompt).unwrap();
        assert_eq!(resolved, 1);
        assert!(!result.has_conflicts());
        assert_eq!(title(&result), Some(&Value::from("C")));
        assert_eq!(prompt.seen[0].0, "title");
    }

    #[test]
    fn test_interactive_skip_keeps_conflict() {
        let mut result = merge("title: A\n", "title: B\n", "title: C\n");
        let mut prompt = ScriptedPrompt::new(&[Choice::Skip]);
        let resolved = ConflictResolver::resolve_interactive(&mut result, &mut prompt).unwrap();
        assert_eq!(resolved, 0);
        assert_eq!(result.conflicts.len(), 1);
        assert_eq!(title(&result), Some(&Value::from("B")));
    }

    #[test]
    fn test_delete_modify_choose_delete() {
        let mut result = merge(
            "todos:\n  - id: T1\n    status: pending\n  - id: T2\n",
            "todos:\n  - id: T1\n    status: done\n  - id: T2\n",
            "todos:\n  - id: T2\n",
        );
        assert_eq!(result.conflicts[0].kind, ConflictKind::DeleteModify);
        let mut prompt = ScriptedPrompt::new(&[Choice::Theirs]);
        ConflictResolver::resolve_interactive(&mut result, &mut prompt).unwrap();

        assert_eq!(prompt.seen[0].1[0], "delete");
        let todos = result.merged.at_path(&FieldPath::root().field("todos")).unwrap();
        assert_eq!(todos.as_sequence().unwrap().len(), 1);
    }

    #[test]
    fn test_prompt_failure_propagates() {
        let mut result = merge("title: A\n", "title: B\n", "title: C\n");
        let mut prompt = ScriptedPrompt::new(&[]);
        let err = ConflictResolver::resolve_interactive(&mut result, &mut prompt).unwrap_err();
        assert!(matches!(err, ConflictError::Prompt(_)));
        assert_eq!(result.conflicts.len(), 1);
    }

    #[test]
    fn test_apply_choice_missing_parent() {
        let mut merged = Value::Map(Default::default());
        let mut conflict = merge("a:\n  b: 1\n", "a:\n  b: 2\n", "a:\n  b: 3\n").conflicts.remove(0);
        let err = ConflictResolver::apply_choice(&mut merged, &mut conflict, Choice::Theirs).unwrap_err();
        assert!(matches!(err, ConflictError::PathNotFound(p) if p == "a.b"));
    }
}
