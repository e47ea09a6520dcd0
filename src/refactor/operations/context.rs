//! Inputs and outputs of a refactoring run.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::ast::{CompilationUnit, NodeId};
use crate::config::RefactorConfig;
use crate::diff::{DiffSummary, colorized_diff, unified_diff};
use crate::error::Result;
use crate::refactor::Workspace;
use crate::rewrite::AstRewrite;
use crate::scope::{CancellationToken, ReferenceIndex, Selection, TokenMonitor};
use crate::transform::{FileChange, TextEdit};

/// Everything a refactoring reads: the workspace, the unit and selection it
/// starts from, settings and the cancellation flag.
#[derive(Debug, Clone)]
pub struct RefactoringContext {
    pub workspace: Workspace,
    /// Path of the unit the refactoring starts from.
    pub target: PathBuf,
    pub selection: Selection,
    pub config: RefactorConfig,
    pub token: CancellationToken,
}

impl RefactoringContext {
    pub fn new(workspace: Workspace, target: impl Into<PathBuf>) -> Self {
        Self {
            workspace,
            target: target.into(),
            selection: Selection::new(0, 0),
            config: RefactorConfig::default(),
            token: CancellationToken::new(),
        }
    }

    /// A context over a one-unit workspace.
    pub fn for_source(path: impl Into<PathBuf>, source: impl Into<String>) -> Result<Self> {
        let path = path.into();
        let workspace = Workspace::single(path.clone(), source)?;
        Ok(Self::new(workspace, path))
    }

    pub fn with_selection(mut self, offset: usize, length: usize) -> Self {
        self.selection = Selection::new(offset, length);
        self
    }

    /// Selects the first occurrence of `text` in the target unit.
    pub fn select(self, text: &str) -> Self {
        self.select_nth(text, 0)
    }

    /// Selects the `n`th (zero-based) occurrence of `text` in the target unit.
    pub fn select_nth(mut self, text: &str, n: usize) -> Self {
        let offset = self
            .unit()
            .ok()
            .and_then(|unit| unit.source.match_indices(text).nth(n).map(|(i, _)| i));
        if let Some(offset) = offset {
            self.selection = Selection::new(offset, text.len());
        }
        self
    }

    pub fn with_config(mut self, config: RefactorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    /// The unit the refactoring starts from.
    pub fn unit(&self) -> Result<&CompilationUnit> {
        self.workspace.require(&self.target)
    }

    pub fn selected_text(&self) -> &str {
        let Ok(unit) = self.unit() else {
            return "";
        };
        let range = self.selection.range();
        unit.source.get(range.start..range.end).unwrap_or("")
    }

    pub fn search(&self) -> ReferenceIndex<'_> {
        self.workspace.search()
    }

    /// A progress monitor observing this context's cancellation token.
    pub fn monitor(&self) -> TokenMonitor {
        TokenMonitor::new(self.token.clone())
    }
}

/// Pending edits of one refactoring, one [`AstRewrite`] per unit touched.
#[derive(Debug, Default)]
pub struct ChangeBuilder {
    rewrites: BTreeMap<PathBuf, AstRewrite>,
}

impl ChangeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// The rewrite of `unit`, created on first use.
    pub fn rewrite(&mut self, unit: &CompilationUnit) -> &mut AstRewrite {
        self.rewrites.entry(unit.path.clone()).or_default()
    }

    /// Converts every rewrite into text edits.
    pub fn build(self, name: &str, ctx: &RefactoringContext) -> Result<Change> {
        let mut files = Vec::new();
        for (path, rewrite) in self.rewrites {
            if rewrite.is_empty() {
                continue;
            }
            let unit = ctx.workspace.require(&path)?;
            let edits = rewrite.to_text_edits(&unit.ast, &unit.source, &ctx.config)?;
            files.push(FileChange::new(path, unit.source.clone(), edits)?);
        }
        Ok(Change {
            name: name.to_string(),
            files,
        })
    }
}

/// The text changes a refactoring produces.
#[derive(Debug, Clone)]
pub struct Change {
    pub name: String,
    pub files: Vec<FileChange>,
}

impl Change {
    pub fn file(&self, path: &Path) -> Option<&FileChange> {
        self.files.iter().find(|f| f.path == path)
    }

    /// New text of `path`, when the change touches it.
    pub fn new_source(&self, path: &Path) -> Option<&str> {
        self.file(path).map(|f| f.transformed.as_str())
    }

    pub fn files_modified(&self) -> usize {
        self.files.iter().filter(|f| f.is_modified()).count()
    }

    pub fn diff(&self) -> String {
        self.files
            .iter()
            .filter(|f| f.is_modified())
            .map(|f| unified_diff(&f.original, &f.transformed, &f.path))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn colorized_diff(&self) -> String {
        self.files
            .iter()
            .filter(|f| f.is_modified())
            .map(|f| colorized_diff(&f.original, &f.transformed, &f.path))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn summary(&self) -> DiffSummary {
        let mut summary = DiffSummary::default();
        for file in &self.files {
            summary.merge(&DiffSummary::from_diff(&file.original, &file.transformed));
        }
        summary
    }

    /// Serializable form of the edits, keyed by unit.
    pub fn edits(&self) -> Vec<UnitEdits> {
        self.files
            .iter()
            .map(UnitEdits::from)
            .collect()
    }

    /// Writes every modified file to disk.
    pub fn write(&self) -> Result<()> {
        for file in &self.files {
            file.write()?;
        }
        Ok(())
    }
}

/// The text edits of one unit.
#[derive(Debug, Clone, Serialize)]
pub struct UnitEdits {
    pub path: PathBuf,
    pub edits: Vec<TextEdit>,
}

impl From<&FileChange> for UnitEdits {
    fn from(change: &FileChange) -> Self {
        UnitEdits {
            path: change.path.clone(),
            edits: change.edits.edits().to_vec(),
        }
    }
}

/// The node a selection denotes in the target unit: the selected node when the
/// selection matches one exactly, otherwise the smallest node covering it.
pub fn selected_node(unit: &CompilationUnit, selection: Selection) -> NodeId {
    let trimmed = selection.trimmed(&unit.source);
    unit.ast.covering_node(trimmed.range())
}
