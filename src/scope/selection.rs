//! Selections over the original buffer and the nodes they cover.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ast::{Ast, NodeId, NodeKind, Slot};
use crate::transform::TextRange;

/// A contiguous interval `[offset, offset + length)` of the original source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Selection {
    pub offset: usize,
    pub length: usize,
}

/// Where a node lies relative to a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodePosition {
    /// Ends at or before the selection start.
    Before,
    /// Fully inside the selection.
    Selected,
    /// Starts at or after the selection end.
    After,
    /// Contains the whole selection and more.
    Covering,
    /// Straddles one of the selection boundaries.
    Intersects,
}

impl NodePosition {
    /// Before or after: the node is untouched by the selection.
    pub fn is_outside(self) -> bool {
        matches!(self, NodePosition::Before | NodePosition::After)
    }
}

impl Selection {
    pub fn new(offset: usize, length: usize) -> Self {
        Self { offset, length }
    }

    pub fn from_range(range: TextRange) -> Self {
        Self::new(range.start, range.len())
    }

    pub fn end(&self) -> usize {
        self.offset + self.length
    }

    pub fn range(&self) -> TextRange {
        TextRange::at(self.offset, self.length)
    }

    /// Shrinks the selection past leading and trailing whitespace of `source`.
    pub fn trimmed(&self, source: &str) -> Self {
        let end = self.end().min(source.len());
        let start = self.offset.min(end);
        let Some(text) = source.get(start..end) else {
            return *self;
        };
        let leading = text.len() - text.trim_start().len();
        let trimmed = text.trim();
        Self::new(start + leading, trimmed.len())
    }

    /// Whether `range` is a (possibly improper) subset of the selection.
    pub fn covers(&self, range: TextRange) -> bool {
        self.offset <= range.start && range.end <= self.end()
    }

    /// Classifies a range against the selection. Pure in its two inputs.
    pub fn classify(&self, range: TextRange) -> NodePosition {
        if self.covers(range) {
            NodePosition::Selected
        } else if range.end <= self.offset {
            NodePosition::Before
        } else if range.start >= self.end() {
            NodePosition::After
        } else if range.start <= self.offset && self.end() <= range.end {
            NodePosition::Covering
        } else {
            NodePosition::Intersects
        }
    }

    pub fn classify_node(&self, ast: &Ast, node: NodeId) -> NodePosition {
        self.classify(ast.range(node))
    }
}

/// Why a selection cannot be treated as a region.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("selection does not cover any code")]
    NothingSelected,

    #[error("selection only partially covers a statement or expression")]
    PartialNode,

    #[error("selection mixes an expression with surrounding statements")]
    MixedStatementsAndExpression,

    #[error("selection covers more than one expression")]
    MultipleExpressions,

    #[error("selected statements are not part of one statement list")]
    NotAStatementList,

    #[error("selected expression cannot be extracted")]
    NotAnExpression,
}

/// A well-formed selected region: one expression or a run of sibling statements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectedRegion {
    Expression(NodeId),
    Statements(Vec<NodeId>),
}

impl SelectedRegion {
    pub fn nodes(&self) -> &[NodeId] {
        match self {
            SelectedRegion::Expression(node) => std::slice::from_ref(node),
            SelectedRegion::Statements(nodes) => nodes,
        }
    }

    pub fn first(&self) -> NodeId {
        self.nodes()[0]
    }

    pub fn last(&self) -> NodeId {
        self.nodes()[self.nodes().len() - 1]
    }

    pub fn range(&self, ast: &Ast) -> TextRange {
        TextRange::new(ast.range(self.first()).start, ast.range(self.last()).end)
    }

    pub fn is_expression(&self) -> bool {
        matches!(self, SelectedRegion::Expression(_))
    }
}

/// Finds the maximal selected sibling nodes and the node covering them.
#[derive(Debug, Clone)]
pub struct SelectionAnalyzer {
    selection: Selection,
    covering: NodeId,
    selected: Vec<NodeId>,
    partial: bool,
}

impl SelectionAnalyzer {
    pub fn new(ast: &Ast, source: &str, selection: Selection) -> Self {
        let selection = selection.trimmed(source);
        let covering = ast.covering_node(selection.range());

        if ast.range(covering) == selection.range() && covering != ast.root() {
            return Self {
                selection,
                covering: ast.parent(covering).unwrap_or(covering),
                selected: vec![covering],
                partial: false,
            };
        }

        let mut selected = Vec::new();
        let mut partial = false;
        for child in ast.children(covering) {
            match selection.classify_node(ast, *child) {
                NodePosition::Selected => selected.push(*child),
                NodePosition::Intersects | NodePosition::Covering => partial = true,
                NodePosition::Before | NodePosition::After => {}
            }
        }
        Self {
            selection,
            covering,
            selected,
            partial,
        }
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    /// The innermost node containing every selected node.
    pub fn covering_node(&self) -> NodeId {
        self.covering
    }

    pub fn selected_nodes(&self) -> &[NodeId] {
        &self.selected
    }

    pub fn has_selected_nodes(&self) -> bool {
        !self.selected.is_empty()
    }

    /// Validates that the selection is one expression or a run of statements.
    pub fn region(&self, ast: &Ast) -> Result<SelectedRegion, SelectionError> {
        if self.partial {
            return Err(SelectionError::PartialNode);
        }
        if self.selected.is_empty() {
            return Err(SelectionError::NothingSelected);
        }
        let statements = self
            .selected
            .iter()
            .filter(|n| ast.kind(**n).is_statement())
            .count();
        if statements == self.selected.len() {
            if self.selected.len() > 1 && self.selected.iter().any(|n| ast.slot(*n) != Slot::Statements) {
                return Err(SelectionError::NotAStatementList);
            }
            return Ok(SelectedRegion::Statements(self.selected.clone()));
        }
        if statements > 0 {
            return Err(SelectionError::MixedStatementsAndExpression);
        }
        if self.selected.len() > 1 {
            return Err(SelectionError::MultipleExpressions);
        }
        let node = self.selected[0];
        if !is_extractable_expression(ast, node) {
            return Err(SelectionError::NotAnExpression);
        }
        Ok(SelectedRegion::Expression(node))
    }
}

/// An expression that can be lifted out of its position as a value.
pub fn is_extractable_expression(ast: &Ast, node: NodeId) -> bool {
    if !ast.kind(node).is_expression() {
        return false;
    }
    let Some(parent) = ast.parent(node) else {
        return false;
    };
    match (ast.kind(parent), ast.slot(node)) {
        (_, Slot::Name | Slot::Property | Slot::Label | Slot::Params | Slot::Heritage) => false,
        (NodeKind::Assign, Slot::Left) => false,
        (NodeKind::Update, _) => false,
        (NodeKind::ForIn, Slot::Left) => false,
        (NodeKind::Call | NodeKind::New, Slot::Callee) => ast.kind(node) != NodeKind::Super,
        _ => ast.kind(node) != NodeKind::Super && ast.kind(node) != NodeKind::Spread,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::CompilationUnit;

    fn select(unit: &CompilationUnit, text: &str) -> Selection {
        let start = unit.source.find(text).unwrap();
        Selection::new(start, text.len())
    }

    #[test]
    fn test_classify_is_pure() {
        let selection = Selection::new(10, 5);
        let range = TextRange::new(11, 14);
        assert_eq!(selection.classify(range), NodePosition::Selected);
        assert_eq!(selection.classify(range), selection.classify(range));
        assert_eq!(selection.classify(TextRange::new(0, 10)), NodePosition::Before);
        assert_eq!(selection.classify(TextRange::new(15, 20)), NodePosition::After);
        assert_eq!(selection.classify(TextRange::new(5, 20)), NodePosition::Covering);
        assert_eq!(selection.classify(TextRange::new(12, 20)), NodePosition::Intersects);
    }

    #[test]
    fn test_trimmed_selection() {
        let selection = Selection::new(0, 8).trimmed("  abc   ");
        assert_eq!(selection, Selection::new(2, 3));
    }

    #[test]
    fn test_expression_region() {
        let unit = CompilationUnit::parse("t.js", "function f(){ var a=1,b=2; return a+b; }").unwrap();
        let analyzer = SelectionAnalyzer::new(&unit.ast, &unit.source, select(&unit, "a+b"));
        let region = analyzer.region(&unit.ast).unwrap();
        assert!(region.is_expression());
        assert_eq!(unit.text(region.first()), "a+b");
    }

    #[test]
    fn test_statement_run_region() {
        let src = "function f() {\n  let a = 1;\n  let b = 2;\n  g(a, b);\n}";
        let unit = CompilationUnit::parse("t.js", src).unwrap();
        let analyzer = SelectionAnalyzer::new(&unit.ast, &unit.source, select(&unit, "let a = 1;\n  let b = 2;"));
        let region = analyzer.region(&unit.ast).unwrap();
        assert_eq!(region.nodes().len(), 2);
        assert!(!region.is_expression());
    }

    #[test]
    fn test_partial_statement_is_rejected() {
        let unit = CompilationUnit::parse("t.js", "function f() { let a = 1; let b = 2; }").unwrap();
        let analyzer = SelectionAnalyzer::new(&unit.ast, &unit.source, select(&unit, "1; let b"));
        assert_eq!(analyzer.region(&unit.ast), Err(SelectionError::PartialNode));
    }

    #[test]
    fn test_assignment_target_is_not_extractable() {
        let unit = CompilationUnit::parse("t.js", "x = 1;").unwrap();
        let x = unit.find(NodeKind::Name, "x").unwrap();
        assert!(!is_extractable_expression(&unit.ast, x));
    }
}
