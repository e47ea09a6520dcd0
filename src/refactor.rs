//! Workspaces of parsed units and the refactorings that run over them.

pub mod operations;

use globset::{Glob, GlobSet, GlobSetBuilder};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::ast::CompilationUnit;
use crate::config::RefactorConfig;
use crate::error::{RefactorError, Result};
use crate::scope::ReferenceIndex;

/// The set of compilation units a refactoring may read and change.
///
/// The unit a refactoring starts from must be part of the workspace; reference
/// searches look at every unit.
#[derive(Debug, Clone, Default)]
pub struct Workspace {
    root: PathBuf,
    units: Vec<CompilationUnit>,
}

impl Workspace {
    /// An empty in-memory workspace.
    pub fn new() -> Self {
        Self::default()
    }

    /// A workspace holding one unit parsed from `source`.
    pub fn single(path: impl Into<PathBuf>, source: impl Into<String>) -> Result<Self> {
        let mut workspace = Self::new();
        workspace.add_source(path, source)?;
        Ok(workspace)
    }

    /// Loads every file under `root` with a configured extension, skipping the
    /// configured exclude patterns. Files that cannot be read or parsed are
    /// skipped with a warning.
    pub fn load(root: impl AsRef<Path>, config: &RefactorConfig) -> Result<Self> {
        let root = root.as_ref();
        let excludes = build_globset(&config.exclude_patterns)?;
        let mut workspace = Self {
            root: root.to_path_buf(),
            units: Vec::new(),
        };

        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unreadable directory entry");
                    continue;
                }
            };
            let path = entry.path();
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = path.strip_prefix(root).unwrap_or(path);
            if excludes.is_match(relative) || excludes.is_match(path) {
                continue;
            }
            let matches_extension = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|ext| config.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)));
            if !matches_extension {
                continue;
            }

            let source = match fs::read_to_string(path) {
                Ok(source) => source,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unit");
                    continue;
                }
            };
            match CompilationUnit::parse(path, source) {
                Ok(unit) => workspace.units.push(unit),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping unit"),
            }
        }

        tracing::debug!(root = %root.display(), units = workspace.units.len(), "loaded workspace");
        Ok(workspace)
    }

    /// Parses `source` and adds it, replacing any unit with the same path.
    pub fn add_source(&mut self, path: impl Into<PathBuf>, source: impl Into<String>) -> Result<&CompilationUnit> {
        let unit = CompilationUnit::parse(path, source)?;
        self.units.retain(|u| u.path != unit.path);
        self.units.push(unit);
        let index = self.units.len() - 1;
        Ok(&self.units[index])
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn units(&self) -> &[CompilationUnit] {
        &self.units
    }

    /// Finds a unit by path, trying `path` relative to the root as well.
    pub fn unit(&self, path: &Path) -> Option<&CompilationUnit> {
        let joined = self.root.join(path);
        self.units
            .iter()
            .find(|u| u.path == path || u.path == joined)
    }

    /// Like [`Workspace::unit`], failing with [`RefactorError::UnitNotFound`].
    pub fn require(&self, path: &Path) -> Result<&CompilationUnit> {
        self.unit(path)
            .ok_or_else(|| RefactorError::UnitNotFound(path.to_path_buf()))
    }

    /// Reference search over all units.
    pub fn search(&self) -> ReferenceIndex<'_> {
        ReferenceIndex::new(&self.units)
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_respects_extensions_and_excludes() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.js"), "function a() {}\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "not code").unwrap();
        fs::create_dir_all(dir.path().join("node_modules/pkg")).unwrap();
        fs::write(dir.path().join("node_modules/pkg/index.js"), "module.exports = 1;\n").unwrap();

        let workspace = Workspace::load(dir.path(), &RefactorConfig::default()).unwrap();
        assert_eq!(workspace.units().len(), 1);
        assert!(workspace.unit(Path::new("a.js")).is_some());
    }

    #[test]
    fn test_add_source_replaces_same_path() {
        let mut workspace = Workspace::single("a.js", "let x = 1;").unwrap();
        workspace.add_source("a.js", "let y = 2;").unwrap();
        assert_eq!(workspace.units().len(), 1);
        assert_eq!(workspace.require(Path::new("a.js")).unwrap().source, "let y = 2;");
        assert!(workspace.require(Path::new("b.js")).is_err());
    }
}
