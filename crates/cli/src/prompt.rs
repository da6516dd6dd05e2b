//! Terminal conflict prompt.

use console::Style;
use dialoguer::Select;

use specweave_core::errors::ConflictError;
use specweave_core::merge::conflict::render_value;
use specweave_core::merge::{Choice, ChoiceOption, Conflict, ConflictPrompt};

use crate::style;

/// Asks about each conflict on the terminal, one `Select` per conflict.
#[derive(Debug, Default)]
pub struct TerminalPrompt {
    shown: usize,
}

impl TerminalPrompt {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConflictPrompt for TerminalPrompt {
    fn choose(&mut self, conflict: &Conflict, options: &[ChoiceOption]) -> Result<Choice, ConflictError> {
        self.shown += 1;
        let accent = Style::new().cyan().bold();

        eprintln!();
        eprintln!(
            "{}",
            accent.apply_to(format!("Conflict {}: {}", self.shown, conflict.path))
        );
        eprintln!("  {}", conflict.description);
        eprintln!("  {}", style::dim(&format!("kind: {}", conflict.kind)));
        eprintln!("  base  : {}", render_value(conflict.base_value.as_ref()));
        eprintln!("  ours  : {}", render_value(conflict.ours_value.as_ref()));
        eprintln!("  theirs: {}", render_value(conflict.theirs_value.as_ref()));
        eprintln!();

        let labels: Vec<&str> = options.iter().map(|o| o.label.as_str()).collect();
        let picked = Select::new()
            .with_prompt("Resolve with")
            .items(&labels)
            .default(0)
            .interact()
            .map_err(|e| ConflictError::Prompt(e.to_string()))?;

        options
            .get(picked)
            .map(|o| o.choice)
            .ok_or_else(|| ConflictError::Prompt(format!("no option at index {picked}")))
    }
}
