//! Accumulated outcome of refactoring precondition checks.

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::ast::CompilationUnit;
use crate::transform::TextRange;
use crate::transform::text::offset_to_line_col;

/// Severity of a status entry, ordered from harmless to blocking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
        };
        f.write_str(label)
    }
}

/// Where a status entry points to, for highlighting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusLocation {
    pub path: PathBuf,
    pub range: TextRange,
    /// Zero-based line of `range.start`.
    pub line: u32,
    /// Zero-based column of `range.start`, in characters.
    pub column: u32,
}

impl StatusLocation {
    pub fn new(path: &Path, source: &str, range: TextRange) -> Self {
        let (line, column) = offset_to_line_col(source, range.start);
        Self {
            path: path.to_path_buf(),
            range,
            line,
            column,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusEntry {
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<StatusLocation>,
}

impl fmt::Display for StatusEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(loc) => write!(
                f,
                "{}: {} ({}:{}:{})",
                self.severity,
                self.message,
                loc.path.display(),
                loc.line + 1,
                loc.column + 1
            ),
            None => write!(f, "{}: {}", self.severity, self.message),
        }
    }
}

/// All entries collected by the checks of one refactoring.
///
/// Checks never fail through `Err`: they add entries, and the caller decides
/// from [`RefactoringStatus::severity`] whether to go on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RefactoringStatus {
    entries: Vec<StatusEntry>,
}

impl RefactoringStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        let mut status = Self::new();
        status.add(Severity::Fatal, message);
        status
    }

    pub fn error(message: impl Into<String>) -> Self {
        let mut status = Self::new();
        status.add(Severity::Error, message);
        status
    }

    pub fn warning(message: impl Into<String>) -> Self {
        let mut status = Self::new();
        status.add(Severity::Warning, message);
        status
    }

    pub fn add(&mut self, severity: Severity, message: impl Into<String>) {
        self.entries.push(StatusEntry {
            severity,
            message: message.into(),
            location: None,
        });
    }

    /// Adds an entry pointing at `range` of `unit`.
    pub fn add_at(&mut self, severity: Severity, message: impl Into<String>, unit: &CompilationUnit, range: TextRange) {
        self.entries.push(StatusEntry {
            severity,
            message: message.into(),
            location: Some(StatusLocation::new(&unit.path, &unit.source, range)),
        });
    }

    pub fn add_located(&mut self, severity: Severity, message: impl Into<String>, location: StatusLocation) {
        self.entries.push(StatusEntry {
            severity,
            message: message.into(),
            location: Some(location),
        });
    }

    pub fn add_info(&mut self, message: impl Into<String>) {
        self.add(Severity::Info, message);
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.add(Severity::Warning, message);
    }

    pub fn add_error(&mut self, message: impl Into<String>) {
        self.add(Severity::Error, message);
    }

    pub fn add_fatal(&mut self, message: impl Into<String>) {
        self.add(Severity::Fatal, message);
    }

    pub fn merge(&mut self, other: RefactoringStatus) {
        self.entries.extend(other.entries);
    }

    pub fn entries(&self) -> &[StatusEntry] {
        &self.entries
    }

    /// The highest severity present, `None` when the status is empty.
    pub fn severity(&self) -> Option<Severity> {
        self.entries.iter().map(|e| e.severity).max()
    }

    pub fn has_fatal(&self) -> bool {
        self.severity() == Some(Severity::Fatal)
    }

    /// Whether any entry is an error or worse.
    pub fn has_error(&self) -> bool {
        self.severity() >= Some(Severity::Error)
    }

    /// No entry above [`Severity::Info`].
    pub fn is_ok(&self) -> bool {
        self.severity() <= Some(Severity::Info)
    }

    /// Messages of all entries at `severity`.
    pub fn messages(&self, severity: Severity) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.severity == severity)
            .map(|e| e.message.as_str())
            .collect()
    }

    /// The first message at the highest severity.
    pub fn first_message(&self) -> Option<&str> {
        let severity = self.severity()?;
        self.entries
            .iter()
            .find(|e| e.severity == severity)
            .map(|e| e.message.as_str())
    }
}

impl fmt::Display for RefactoringStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{entry}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_is_the_maximum() {
        let mut status = RefactoringStatus::new();
        assert!(status.is_ok());
        assert_eq!(status.severity(), None);
        status.add_info("fine");
        status.add_warning("careful");
        assert!(!status.is_ok() && !status.has_error());
        status.add_error("broken");
        assert!(status.has_error());
        assert!(!status.has_fatal());
        assert_eq!(status.first_message(), Some("broken"));
    }

    #[test]
    fn test_entry_location_is_line_and_column() {
        let unit = CompilationUnit::parse("t.js", "let a = 1;\nlet b = 2;\n").unwrap();
        let mut status = RefactoringStatus::new();
        status.add_at(Severity::Error, "bad", &unit, TextRange::new(15, 16));
        let loc = status.entries()[0].location.as_ref().unwrap();
        assert_eq!((loc.line, loc.column), (1, 4));
        assert_eq!(status.to_string(), "error: bad (t.js:2:5)");
    }

    #[test]
    fn test_merge_keeps_all_entries() {
        let mut status = RefactoringStatus::warning("w");
        status.merge(RefactoringStatus::fatal("f"));
        assert_eq!(status.entries().len(), 2);
        assert!(status.has_fatal());
        assert_eq!(status.messages(Severity::Warning), vec!["w"]);
    }
}
