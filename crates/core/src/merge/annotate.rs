//! Conflict annotations for non-interactive merges.
//!
//! Each unresolved conflict becomes a YAML comment block placed directly
//! above the line of the field it concerns, so the merged file stays valid
//! YAML and a human can find every conflict by searching for `CONFLICT`.
//! A conflict whose field cannot be located is annotated at the top of the
//! file.

use std::collections::BTreeMap;

use super::conflict::{render_value, Conflict};
use super::document::serialize_document;
use super::path::{FieldPath, Segment};
use crate::errors::DocumentError;
use crate::value::Value;

/// Marker that starts every conflict comment block.
pub const CONFLICT_MARKER: &str = "# CONFLICT";

/// Serialize `merged` and annotate it with `conflicts`.
pub fn render_annotated(merged: &Value, conflicts: &[Conflict]) -> Result<String, DocumentError> {
    let text = serialize_document(merged)?;
    Ok(annotate(&text, conflicts))
}

/// Insert a comment block for each conflict into serialized YAML `text`.
pub fn annotate(text: &str, conflicts: &[Conflict]) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let mut blocks: BTreeMap<usize, Vec<String>> = BTreeMap::new();

    for conflict in conflicts {
        let (at, indent) = match locate(&lines, &conflict.path) {
            Some(at) => (at, indent_of(lines[at])),
            None => (0, 0),
        };
        blocks
            .entry(at)
            .or_default()
            .extend(comment_block(conflict, indent));
    }

    let mut out = String::with_capacity(text.len() + blocks.len() * 160);
    for (i, line) in lines.iter().enumerate() {
        if let Some(block) = blocks.remove(&i) {
            for comment in block {
                out.push_str(&comment);
                out.push('\n');
            }
        }
        out.push_str(line);
        out.push('\n');
    }
    // Empty documents have no line to attach to.
    for comment in blocks.into_values().flatten() {
        out.push_str(&comment);
        out.push('\n');
    }
    out
}

fn comment_block(conflict: &Conflict, indent: usize) -> Vec<String> {
    let pad = " ".repeat(indent);
    vec![
        format!(
            "{pad}{CONFLICT_MARKER} ({}) at {}: {}",
            conflict.kind, conflict.path, conflict.description
        ),
        format!("{pad}#   ours: {}", render_value(conflict.ours_value.as_ref())),
        format!("{pad}#   theirs: {}", render_value(conflict.theirs_value.as_ref())),
        format!("{pad}#   resolution: kept {}", conflict.applied),
    ]
}

// ---------------------------------------------------------------------------
// Locating a path in serialized YAML
// ---------------------------------------------------------------------------

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start_matches(' ').len()
}

fn is_blank(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty() || trimmed.starts_with('#')
}

fn is_item_start(line: &str, column: usize) -> bool {
    indent_of(line) == column && line[column..].starts_with('-')
}

/// Column where the key of a `key: value` line starts, after any `- `
/// sequence markers.
fn key_column(line: &str) -> usize {
    let bytes = line.as_bytes();
    let mut col = indent_of(line);
    while bytes.get(col) == Some(&b'-') && bytes.get(col + 1) == Some(&b' ') {
        col += 2;
        while bytes.get(col) == Some(&b' ') {
            col += 1;
        }
    }
    col
}

/// Text after the colon when `line` holds key `name` at column `col`.
fn key_value<'l>(line: &'l str, col: usize, name: &str) -> Option<&'l str> {
    if key_column(line) != col {
        return None;
    }
    let rest = line.get(col..)?;
    [
        format!("{name}:"),
        format!("'{name}':"),
        format!("\"{name}\":"),
    ]
    .iter()
    .find_map(|prefix| {
        let after = rest.strip_prefix(prefix.as_str())?;
        (after.is_empty() || after.starts_with(' ')).then(|| after.trim())
    })
}

fn unquote(text: &str) -> &str {
    for quote in ['\'', '"'] {
        if let Some(inner) = text
            .strip_prefix(quote)
            .and_then(|t| t.strip_suffix(quote))
        {
            return inner;
        }
    }
    text
}

fn first_content(lines: &[&str], lo: usize, hi: usize) -> Option<usize> {
    (lo..hi).find(|&i| !is_blank(lines[i]))
}

/// Line index of the node `path` points at.
fn locate(lines: &[&str], path: &FieldPath) -> Option<usize> {
    let (mut lo, mut hi) = (0, lines.len());
    let mut target = None;

    for segment in path.segments() {
        let start = first_content(lines, lo, hi)?;
        match segment {
            Segment::Field(name) => {
                let col = key_column(lines[start]);
                let at = (start..hi).find(|&i| key_value(lines[i], col, name).is_some())?;
                let end = (at + 1..hi)
                    .find(|&i| {
                        let line = lines[i];
                        !is_blank(line)
                            && (indent_of(line) < col
                                || (indent_of(line) == col && !line[col..].starts_with('-')))
                    })
                    .unwrap_or(hi);
                target = Some(at);
                (lo, hi) = (at + 1, end);
            }
            Segment::Element { key_field, key } => {
                let dash = indent_of(lines[start]);
                if !is_item_start(lines[start], dash) {
                    return None;
                }
                let starts: Vec<usize> = (start..hi)
                    .filter(|&i| !is_blank(lines[i]) && is_item_start(lines[i], dash))
                    .collect();
                let (item_lo, item_hi) = starts.iter().enumerate().find_map(|(n, &item_lo)| {
                    let item_hi = starts.get(n + 1).copied().unwrap_or(hi);
                    let col = key_column(lines[item_lo]);
                    (item_lo..item_hi)
                        .filter_map(|i| key_value(lines[i], col, key_field))
                        .any(|v| unquote(v) == key.as_str())
                        .then_some((item_lo, item_hi))
                })?;
                target = Some(item_lo);
                (lo, hi) = (item_lo, item_hi);
            }
        }
    }
    target
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::document::{parse_document, parse_three, Side};
    use crate::merge::merger::{MergeOptions, Merger};

    fn merged(base: &str, ours: &str, theirs: &str) -> (String, Value) {
        let three = parse_three(base, ours, theirs).unwrap();
        let result =
            Merger::three_way_merge(&MergeOptions::for_records(), &three.base, &three.ours, &three.theirs);
        (
            render_annotated(&result.merged, &result.conflicts).unwrap(),
            result.merged,
        )
    }

    fn line_after_marker(text: &str) -> &str {
        let lines: Vec<&str> = text.lines().collect();
        let at = lines
            .iter()
            .position(|l| l.trim_start().starts_with(CONFLICT_MARKER))
            .unwrap();
        lines[at + 1..]
            .iter()
            .copied()
            .find(|l| !l.trim_start().starts_with('#'))
            .unwrap()
    }

    #[test]
    fn test_annotation_above_top_level_field() {
        let (text, _) = merged(
            "status: open\ntitle: A\n",
            "status: open\ntitle: B\n",
            "status: open\ntitle: C\n",
        );
        assert!(text.contains("# CONFLICT (scalar_field) at title"));
        assert!(text.contains("#   ours: \"B\""));
        assert!(text.contains("#   theirs: \"C\""));
        assert!(text.contains("#   resolution: kept ours"));
        assert_eq!(line_after_marker(&text), "title: B");
    }

    #[test]
    fn test_annotation_inside_keyed_element() {
        let base = "notes:\n- _ulid: N1\n  content: a\n- _ulid: N2\n  content: x\n";
        let ours = "notes:\n- _ulid: N1\n  content: a\n- _ulid: N2\n  content: y\n";
        let theirs = "notes:\n- _ulid: N1\n  content: a\n- _ulid: N2\n  content: z\n";
        let (text, _) = merged(base, ours, theirs);
        assert!(text.contains("at notes[N2].content"));
        assert_eq!(line_after_marker(&text).trim(), "content: y");
    }

    #[test]
    fn test_annotated_output_parses_to_merged_tree() {
        let (text, tree) = merged(
            "meta:\n  owner: a\ntitle: A\n",
            "meta:\n  owner: b\ntitle: B\n",
            "meta:\n  owner: c\ntitle: C\n",
        );
        assert_eq!(text.matches(CONFLICT_MARKER).count(), 2);
        assert_eq!(parse_document(Side::Ours, "out", &text).unwrap(), tree);
    }

    #[test]
    fn test_unlocatable_conflict_goes_to_top() {
        let (_, tree) = merged("title: A\n", "title: B\n", "title: C\n");
        let text = serialize_document(&tree).unwrap();
        let three = parse_three("x:\n  y: 1\n", "x:\n  y: 2\n", "x:\n  y: 3\n").unwrap();
        let conflicts =
            Merger::three_way_merge(&MergeOptions::default(), &three.base, &three.ours, &three.theirs)
                .conflicts;
        let out = annotate(&text, &conflicts);
        assert!(out.starts_with(CONFLICT_MARKER));
    }

    #[test]
    fn test_locate_quoted_key_value() {
        let lines = vec!["todos:", "- id: '42'", "  status: done"];
        let path = FieldPath::root()
            .field("todos")
            .element("id", "42")
            .field("status");
        assert_eq!(locate(&lines, &path), Some(2));
    }
}
