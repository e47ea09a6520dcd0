//! Diff generation for previewing refactoring changes.

use similar::{ChangeTag, TextDiff};
use std::fmt::Write;
use std::path::Path;

/// Generates a unified diff between two strings.
pub fn unified_diff(original: &str, modified: &str, path: &Path) -> String {
    let diff = TextDiff::from_lines(original, modified);
    let mut output = String::new();
    let _ = write_diff(&mut output, &diff, path, None);
    output
}

/// Colorized diff output for terminal display.
pub fn colorized_diff(original: &str, modified: &str, path: &Path) -> String {
    let diff = TextDiff::from_lines(original, modified);
    let mut output = String::new();
    let _ = write_diff(&mut output, &diff, path, Some(Palette::ANSI));
    output
}

struct Palette {
    delete: &'static str,
    insert: &'static str,
    header: &'static str,
    reset: &'static str,
}

impl Palette {
    const ANSI: Palette = Palette {
        delete: "\x1b[31m",
        insert: "\x1b[32m",
        header: "\x1b[36m",
        reset: "\x1b[0m",
    };
}

fn write_diff(
    out: &mut String,
    diff: &TextDiff<'_, '_, '_, str>,
    path: &Path,
    palette: Option<Palette>,
) -> std::fmt::Result {
    let (header, reset) = palette
        .as_ref()
        .map(|p| (p.header, p.reset))
        .unwrap_or(("", ""));
    writeln!(out, "{header}--- a/{}{reset}", path.display())?;
    writeln!(out, "{header}+++ b/{}{reset}", path.display())?;

    for group in diff.grouped_ops(3) {
        let (Some(first), Some(last)) = (group.first(), group.last()) else {
            continue;
        };
        let old = first.old_range().start..last.old_range().end;
        let new = first.new_range().start..last.new_range().end;
        writeln!(
            out,
            "{header}@@ -{},{} +{},{} @@{reset}",
            old.start + 1,
            old.len(),
            new.start + 1,
            new.len()
        )?;

        for op in &group {
            for change in diff.iter_changes(op) {
                let (sign, color) = match (change.tag(), palette.as_ref()) {
                    (ChangeTag::Delete, p) => ("-", p.map(|p| p.delete).unwrap_or("")),
                    (ChangeTag::Insert, p) => ("+", p.map(|p| p.insert).unwrap_or("")),
                    (ChangeTag::Equal, _) => (" ", ""),
                };
                let end = if color.is_empty() { "" } else { reset };
                write!(out, "{color}{sign}{}{end}", change.value())?;
                if change.missing_newline() {
                    writeln!(out)?;
                }
            }
        }
    }
    Ok(())
}

/// Represents a summary of changes.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DiffSummary {
    pub files_changed: usize,
    pub insertions: usize,
    pub deletions: usize,
}

impl DiffSummary {
    /// Creates a summary from original and modified content.
    pub fn from_diff(original: &str, modified: &str) -> Self {
        let diff = TextDiff::from_lines(original, modified);
        let mut summary = Self::default();
        for change in diff.iter_all_changes() {
            match change.tag() {
                ChangeTag::Insert => summary.insertions += 1,
                ChangeTag::Delete => summary.deletions += 1,
                ChangeTag::Equal => {}
            }
        }
        summary.files_changed = usize::from(summary.insertions > 0 || summary.deletions > 0);
        summary
    }

    /// Combines two summaries.
    pub fn merge(&mut self, other: &DiffSummary) {
        self.files_changed += other.files_changed;
        self.insertions += other.insertions;
        self.deletions += other.deletions;
    }
}

impl std::fmt::Display for DiffSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} file(s) changed, {} insertions(+), {} deletions(-)",
            self.files_changed, self.insertions, self.deletions
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unified_diff_has_hunk_header() {
        let diff = unified_diff("a\nb\n", "a\nc\n", Path::new("x.js"));
        assert!(diff.contains("--- a/x.js"));
        assert!(diff.contains("@@ -1,2 +1,2 @@"));
        assert!(diff.contains("-b\n"));
        assert!(diff.contains("+c\n"));
    }

    #[test]
    fn test_summary() {
        let mut summary = DiffSummary::from_diff("a\nb\n", "a\nc\nd\n");
        assert_eq!(summary.insertions, 2);
        assert_eq!(summary.deletions, 1);
        summary.merge(&DiffSummary::from_diff("x", "x"));
        assert_eq!(summary.files_changed, 1);
        assert_eq!(summary.to_string(), "1 file(s) changed, 2 insertions(+), 1 deletions(-)");
    }
}
