//! Shared styling utilities for terminal output.

use console::Style;

use specweave_core::merge::DriverOutcome;

fn marked(style: Style, mark: &str, msg: &str) -> String {
    format!("{} {}", style.apply_to(mark), msg)
}

/// Green checkmark line.
pub fn success(msg: &str) -> String {
    marked(Style::new().green(), "✓", msg)
}

/// Red cross line.
pub fn error(msg: &str) -> String {
    marked(Style::new().red(), "✗", msg)
}

/// Yellow warning line.
pub fn warn(msg: &str) -> String {
    marked(Style::new().yellow(), "⚠", msg)
}

pub fn header(msg: &str) -> String {
    Style::new().bold().apply_to(msg).to_string()
}

pub fn dim(msg: &str) -> String {
    Style::new().dim().apply_to(msg).to_string()
}

/// An identifier with its shortest unique prefix highlighted.
pub fn short_id(full: &str, prefix_len: usize) -> String {
    let split = prefix_len.min(full.len());
    let (head, tail) = full.split_at(split);
    format!(
        "{}{}",
        Style::new().cyan().bold().apply_to(head),
        Style::new().dim().apply_to(tail)
    )
}

/// One-line summary of a merge-driver run, for stderr.
pub fn outcome(outcome: &DriverOutcome, output: &str) -> String {
    match outcome {
        DriverOutcome::Clean => success(&format!("merged cleanly into {output}")),
        DriverOutcome::Conflicted { unresolved } => warn(&format!(
            "{unresolved} conflict(s) left in {output}; search for '# CONFLICT'"
        )),
        DriverOutcome::Withheld { unresolved } => error(&format!(
            "{unresolved} conflict(s) under fail-closed policy; {output} left untouched"
        )),
        DriverOutcome::Declined { reason, .. } => error(&format!("merge declined: {reason}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(text: &str) -> String {
        console::strip_ansi_codes(text).into_owned()
    }

    #[test]
    fn test_short_id_splits_at_prefix() {
        assert_eq!(plain(&short_id("01HQ3K5V", 4)), "01HQ3K5V");
        assert_eq!(plain(&short_id("01HQ", 10)), "01HQ");
    }

    #[test]
    fn test_outcome_lines() {
        assert_eq!(
            plain(&outcome(&DriverOutcome::Conflicted { unresolved: 2 }, "a.yaml")),
            "⚠ 2 conflict(s) left in a.yaml; search for '# CONFLICT'"
        );
        assert!(plain(&outcome(&DriverOutcome::Clean, "a.yaml")).starts_with("✓ "));
        assert!(plain(&outcome(&DriverOutcome::Withheld { unresolved: 1 }, "a.yaml"))
            .contains("left untouched"));
    }
}
