//! Text-level output of a refactoring: edits, indentation helpers and file changes.

pub mod edit;
pub mod text;

pub use edit::{EditError, TextEdit, TextEditSet, TextRange};

use crate::diff::unified_diff;
use crate::error::Result;
use std::path::{Path, PathBuf};

/// A code transformation that can be applied to source text.
pub trait Transform {
    /// Applies the transformation to the given source code.
    fn apply(&self, source: &str, path: &Path) -> Result<String>;

    /// Returns a description of the transformation.
    fn describe(&self) -> String;
}

impl Transform for TextEditSet {
    fn apply(&self, source: &str, _path: &Path) -> Result<String> {
        Ok(TextEditSet::apply(self, source)?)
    }

    fn describe(&self) -> String {
        format!("Apply {} text edit(s)", self.len())
    }
}

/// Represents a change to be applied to a file.
#[derive(Debug, Clone)]
pub struct FileChange {
    pub path: PathBuf,
    pub original: String,
    pub transformed: String,
    pub edits: TextEditSet,
}

impl FileChange {
    /// Computes the transformed text by applying `edits` to `original`.
    pub fn new(path: impl Into<PathBuf>, original: impl Into<String>, edits: TextEditSet) -> Result<Self> {
        let path = path.into();
        let original = original.into();
        let transformed = Transform::apply(&edits, &original, &path)?;
        Ok(Self {
            path,
            original,
            transformed,
            edits,
        })
    }

    /// Returns true if the content was modified.
    pub fn is_modified(&self) -> bool {
        self.original != self.transformed
    }

    /// Returns a unified diff of this change.
    pub fn diff(&self) -> String {
        unified_diff(&self.original, &self.transformed, &self.path)
    }

    /// Writes the transformed content to disk.
    pub fn write(&self) -> Result<()> {
        if self.is_modified() {
            std::fs::write(&self.path, &self.transformed)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_change_applies_edits() {
        let edits = TextEditSet::from_edits(vec![TextEdit::replace(TextRange::new(4, 5), "y")]).unwrap();
        let change = FileChange::new("a.js", "let x = 1;", edits).unwrap();
        assert!(change.is_modified());
        assert_eq!(change.transformed, "let y = 1;");
        assert!(change.diff().contains("+let y = 1;"));
    }

    #[test]
    fn test_empty_change_is_unmodified() {
        let change = FileChange::new("a.js", "x;", TextEditSet::new()).unwrap();
        assert!(!change.is_modified());
    }
}
