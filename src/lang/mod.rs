//! Language front end: tree-sitter grammars and syntax diagnostics.

mod typescript;

pub use typescript::{Tsx, TypeScript};

use crate::error::{RefactorError, Result};
use crate::transform::TextRange;
use std::path::Path;
use streaming_iterator::StreamingIterator;
use tree_sitter::{Language as TsLanguage, Node, Parser, Query, QueryCursor, Tree};

/// A programming language supported by the refactoring engine.
pub trait Language: Send + Sync {
    /// Returns the name of the language.
    fn name(&self) -> &'static str;

    /// Returns the file extensions associated with this language.
    fn extensions(&self) -> &[&'static str];

    /// Returns the tree-sitter language grammar.
    fn grammar(&self) -> TsLanguage;

    /// Parses source code into a tree-sitter AST.
    fn parse(&self, source: &str) -> Result<Tree> {
        let mut parser = Parser::new();
        parser
            .set_language(&self.grammar())
            .map_err(|e| RefactorError::Parse {
                path: Path::new("<source>").to_path_buf(),
                message: format!("Failed to set language: {e}"),
            })?;

        parser.parse(source, None).ok_or_else(|| RefactorError::Parse {
            path: Path::new("<source>").to_path_buf(),
            message: "Failed to parse source".to_string(),
        })
    }

    /// Creates a tree-sitter query for this language.
    fn query(&self, pattern: &str) -> Result<Query> {
        Ok(Query::new(&self.grammar(), pattern)?)
    }

    /// Checks if this language handles the given file extension.
    fn matches_extension(&self, ext: &str) -> bool {
        self.extensions().iter().any(|e| e.eq_ignore_ascii_case(ext))
    }
}

/// Registry of supported languages.
#[derive(Default)]
pub struct LanguageRegistry {
    languages: Vec<Box<dyn Language>>,
}

impl LanguageRegistry {
    /// Creates a new registry with all built-in languages.
    pub fn new() -> Self {
        let mut registry = Self::default();
        registry.register(Box::new(TypeScript));
        registry.register(Box::new(Tsx));
        registry
    }

    /// Registers a new language.
    pub fn register(&mut self, lang: Box<dyn Language>) {
        self.languages.push(lang);
    }

    /// Finds a language by file extension.
    pub fn by_extension(&self, ext: &str) -> Option<&dyn Language> {
        self.languages
            .iter()
            .find(|l| l.matches_extension(ext))
            .map(|l| l.as_ref())
    }

    /// Returns all registered languages.
    pub fn all(&self) -> &[Box<dyn Language>] {
        &self.languages
    }

    /// Detects the language for a given file path.
    pub fn detect(&self, path: &Path) -> Option<&dyn Language> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| self.by_extension(ext))
    }
}

/// A syntax problem reported by the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxDiagnostic {
    pub range: TextRange,
    pub message: String,
}

/// Collects every ERROR and MISSING node of a parse.
pub fn syntax_diagnostics(lang: &dyn Language, source: &str) -> Result<Vec<SyntaxDiagnostic>> {
    let tree = lang.parse(source)?;
    let root = tree.root_node();
    let mut diagnostics = Vec::new();
    if !root.has_error() {
        return Ok(diagnostics);
    }

    let query = lang.query("(ERROR) @error")?;
    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(&query, root, source.as_bytes());
    while let Some(m) = matches.next() {
        for capture in m.captures {
            let node = capture.node;
            let snippet: String = node
                .utf8_text(source.as_bytes())
                .unwrap_or_default()
                .chars()
                .take(24)
                .collect();
            diagnostics.push(SyntaxDiagnostic {
                range: TextRange::new(node.start_byte(), node.end_byte()),
                message: format!("Syntax error near '{}'", snippet.trim()),
            });
        }
    }

    collect_missing(root, &mut diagnostics);
    diagnostics.sort_by_key(|d| (d.range.start, d.range.end));
    Ok(diagnostics)
}

fn collect_missing(node: Node<'_>, out: &mut Vec<SyntaxDiagnostic>) {
    if node.is_missing() {
        out.push(SyntaxDiagnostic {
            range: TextRange::new(node.start_byte(), node.end_byte()),
            message: format!("Missing '{}'", node.kind()),
        });
        return;
    }
    if !node.has_error() {
        return;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_missing(child, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_by_extension() {
        let registry = LanguageRegistry::new();
        assert_eq!(registry.detect(Path::new("a.js")).unwrap().name(), "typescript");
        assert_eq!(registry.detect(Path::new("a.tsx")).unwrap().name(), "tsx");
        assert!(registry.detect(Path::new("a.rs")).is_none());
    }

    #[test]
    fn test_syntax_diagnostics_clean_source() {
        let diags = syntax_diagnostics(&TypeScript, "function f() { return 1; }").unwrap();
        assert!(diags.is_empty());
    }

    #[test]
    fn test_syntax_diagnostics_reports_errors() {
        let diags = syntax_diagnostics(&TypeScript, "function f() { return 1 +; }").unwrap();
        assert!(!diags.is_empty());
    }
}
