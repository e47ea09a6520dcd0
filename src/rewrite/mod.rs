//! Deferred, non-destructive edits over a parsed tree.
//!
//! An [`AstRewrite`] records intents keyed by original nodes: replace, remove,
//! list insertions and moves. Replacement content is a *synthetic node*: a
//! sequence of literal text and references to original nodes (copied or moved).
//! Nothing touches the [`Ast`]; [`AstRewrite::to_text_edits`] linearizes the
//! recorded intents into one [`TextEditSet`] over the original buffer.
//!
//! ```rust
//! use refactor_js::ast::{CompilationUnit, NodeKind};
//! use refactor_js::config::RefactorConfig;
//! use refactor_js::rewrite::AstRewrite;
//!
//! let unit = CompilationUnit::parse("a.js", "let v = a + b;")?;
//! let sum = unit.find(NodeKind::Binary, "a + b").unwrap();
//! let mut rewrite = AstRewrite::new();
//! let call = rewrite.create_string_placeholder("sum(a, b)", NodeKind::Call);
//! rewrite.replace(&unit.ast, sum, call, None)?;
//! let text = rewrite.rewrite_source(&unit.ast, &unit.source, &RefactorConfig::default())?;
//! assert_eq!(text, "let v = sum(a, b);");
//! # Ok::<(), refactor_js::error::RefactorError>(())
//! ```

mod convert;
mod list;

pub use list::{ListEntry, ListRewrite};

use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

use crate::ast::{Ast, NodeId, NodeKind, Slot};
use crate::config::RefactorConfig;
use crate::transform::{EditError, TextEditSet};

/// Id of a node created by the rewrite, not present in the original tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SyntheticId(u32);

/// A piece of a synthetic node's content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    /// Literal text.
    Text(String),
    /// The text of an original node as rewritten: its replacement, or its
    /// source with the edits recorded inside it. Inside the node's own
    /// replacement the source text is used.
    Copy(NodeId),
    /// The source of an original node with the edits recorded inside it; the
    /// node disappears from its original place unless it is replaced there.
    Move(NodeId),
    /// Another synthetic node.
    Node(SyntheticId),
}

impl From<&str> for Part {
    fn from(text: &str) -> Self {
        Part::Text(text.to_string())
    }
}

impl From<String> for Part {
    fn from(text: String) -> Self {
        Part::Text(text)
    }
}

impl From<SyntheticId> for Part {
    fn from(id: SyntheticId) -> Self {
        Part::Node(id)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct SyntheticNode {
    pub kind: NodeKind,
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Action {
    Replace(SyntheticId),
    Remove,
}

#[derive(Debug, Clone)]
pub(crate) struct Event {
    pub action: Action,
    pub group: Option<String>,
}

/// Conflicts detected while recording or converting edits.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RewriteError {
    #[error("node {0:?} is already the source of a move")]
    AlreadyMoved(NodeId),

    #[error("node is not part of the {slot:?} list of {parent:?}")]
    NotInList { parent: NodeId, slot: Slot },

    #[error("list index {index} is out of range for a list of {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("moved node {0:?} was never placed in the new tree")]
    UnplacedNode(NodeId),

    #[error("edit on node {0:?} is hidden by an edit of an enclosing node")]
    HiddenEdit(NodeId),

    #[error("cannot remove the root node")]
    RemoveRoot,

    #[error("conflicting text edits: {0}")]
    Conflict(#[from] EditError),
}

/// The edit overlay of one orchestration.
#[derive(Debug, Clone, Default)]
pub struct AstRewrite {
    pub(crate) events: HashMap<NodeId, Event>,
    pub(crate) synthetics: Vec<SyntheticNode>,
    pub(crate) lists: BTreeMap<(NodeId, Slot), ListRewrite>,
    pub(crate) moved: HashMap<NodeId, SyntheticId>,
}

impl AstRewrite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
            && self.moved.is_empty()
            && self.lists.values().all(|l| !l.is_modified())
    }

    /// A synthetic node whose text is `text`.
    pub fn create_string_placeholder(&mut self, text: impl Into<String>, kind: NodeKind) -> SyntheticId {
        self.compose(vec![Part::Text(text.into())], kind)
    }

    /// A synthetic node rendering the (possibly edited) text of `node`.
    pub fn create_copy_target(&mut self, ast: &Ast, node: NodeId) -> SyntheticId {
        self.compose(vec![Part::Copy(node)], ast.kind(node))
    }

    /// A synthetic node rendering `node`, which is removed from its original
    /// place unless it is replaced there.
    pub fn create_move_target(&mut self, ast: &Ast, node: NodeId) -> Result<SyntheticId, RewriteError> {
        if self.moved.contains_key(&node) {
            return Err(RewriteError::AlreadyMoved(node));
        }
        let target = self.compose(vec![Part::Move(node)], ast.kind(node));
        self.moved.insert(node, target);
        if !self.events.contains_key(&node) {
            self.detach(ast, node, None);
        }
        Ok(target)
    }

    /// A synthetic node made of `parts`.
    pub fn compose(&mut self, parts: Vec<Part>, kind: NodeKind) -> SyntheticId {
        let id = SyntheticId(self.synthetics.len() as u32);
        self.synthetics.push(SyntheticNode { kind, parts });
        id
    }

    /// The kind hint of a synthetic node.
    pub fn synthetic_kind(&self, id: SyntheticId) -> NodeKind {
        self.synthetics[id.0 as usize].kind
    }

    /// Records that `node` is replaced by `replacement`. A second replace of the
    /// same node overwrites the first.
    pub fn replace(
        &mut self,
        ast: &Ast,
        node: NodeId,
        replacement: SyntheticId,
        group: Option<&str>,
    ) -> Result<(), RewriteError> {
        if let Some(previous) = self.events.get(&node) {
            tracing::debug!(?node, previous = ?previous.action, "overwriting earlier edit");
        }
        if let Some(list) = self.list_of_mut(ast, node) {
            list.restore(node);
        }
        self.events.insert(
            node,
            Event {
                action: Action::Replace(replacement),
                group: group.map(str::to_string),
            },
        );
        Ok(())
    }

    /// Records that `node` is removed. Removing a moved node is the move's own
    /// removal and changes nothing.
    pub fn remove(&mut self, ast: &Ast, node: NodeId, group: Option<&str>) -> Result<(), RewriteError> {
        if node == ast.root() {
            return Err(RewriteError::RemoveRoot);
        }
        if self.moved.contains_key(&node) && !self.events.contains_key(&node) {
            return Ok(());
        }
        if let Some(previous) = self.events.remove(&node) {
            tracing::debug!(?node, previous = ?previous.action, "overwriting earlier edit");
        }
        self.detach(ast, node, group);
        Ok(())
    }

    fn detach(&mut self, ast: &Ast, node: NodeId, group: Option<&str>) {
        if ast.slot(node).is_comma_list() || ast.slot(node).is_line_list() {
            if let Some(list) = self.list_of_mut(ast, node) {
                // The node is a child of its own list by construction.
                let _ = list.remove(ListEntry::Original(node), group);
            }
        } else {
            self.events.insert(
                node,
                Event {
                    action: Action::Remove,
                    group: group.map(str::to_string),
                },
            );
        }
    }

    fn list_of_mut(&mut self, ast: &Ast, node: NodeId) -> Option<&mut ListRewrite> {
        let parent = ast.parent(node)?;
        let slot = ast.slot(node);
        if !(slot.is_comma_list() || slot.is_line_list()) {
            return None;
        }
        Some(self.list(ast, parent, slot))
    }

    /// The edit-aware view of the `slot` list of `parent`.
    pub fn list(&mut self, ast: &Ast, parent: NodeId, slot: Slot) -> &mut ListRewrite {
        self.lists
            .entry((parent, slot))
            .or_insert_with(|| ListRewrite::new(parent, slot, ast.children_in(parent, slot)))
    }

    /// The rewritten entries of a list without creating a list rewrite.
    pub fn list_view(&self, ast: &Ast, parent: NodeId, slot: Slot) -> Vec<ListEntry> {
        match self.lists.get(&(parent, slot)) {
            Some(list) => list.rewritten(),
            None => ast
                .children_in(parent, slot)
                .map(ListEntry::Original)
                .collect(),
        }
    }

    /// Inserts `node` before the original list entry `anchor`.
    pub fn insert_before(
        &mut self,
        ast: &Ast,
        anchor: NodeId,
        node: SyntheticId,
        group: Option<&str>,
    ) -> Result<(), RewriteError> {
        let parent = ast.parent(anchor).ok_or(RewriteError::RemoveRoot)?;
        self.list(ast, parent, ast.slot(anchor))
            .insert_before(ListEntry::Original(anchor), node, group)
    }

    /// Inserts `node` after the original list entry `anchor`.
    pub fn insert_after(
        &mut self,
        ast: &Ast,
        anchor: NodeId,
        node: SyntheticId,
        group: Option<&str>,
    ) -> Result<(), RewriteError> {
        let parent = ast.parent(anchor).ok_or(RewriteError::RemoveRoot)?;
        self.list(ast, parent, ast.slot(anchor))
            .insert_after(ListEntry::Original(anchor), node, group)
    }

    pub fn is_replaced(&self, node: NodeId) -> bool {
        matches!(
            self.events.get(&node),
            Some(Event {
                action: Action::Replace(_),
                ..
            })
        )
    }

    /// Whether the node disappears from its original place.
    pub fn is_removed(&self, ast: &Ast, node: NodeId) -> bool {
        if matches!(
            self.events.get(&node),
            Some(Event {
                action: Action::Remove,
                ..
            })
        ) {
            return true;
        }
        ast.parent(node)
            .and_then(|parent| self.lists.get(&(parent, ast.slot(node))))
            .is_some_and(|list| list.is_removed(node))
    }

    /// Linearizes the overlay into text edits over `source`.
    pub fn to_text_edits(
        &self,
        ast: &Ast,
        source: &str,
        config: &RefactorConfig,
    ) -> Result<TextEditSet, RewriteError> {
        convert::Converter::new(self, ast, source, config).run()
    }

    /// Text of `node` as the rewritten tree shows it at its own place: its
    /// replacement, or its source with the edits recorded inside it. Edits
    /// outside the node are ignored.
    pub fn render_node(
        &self,
        ast: &Ast,
        source: &str,
        config: &RefactorConfig,
        node: NodeId,
    ) -> Result<String, RewriteError> {
        convert::Converter::new(self, ast, source, config).render_in_place(node)
    }

    /// Applies the overlay to `source` and returns the new text.
    pub fn rewrite_source(
        &self,
        ast: &Ast,
        source: &str,
        config: &RefactorConfig,
    ) -> Result<String, RewriteError> {
        Ok(self.to_text_edits(ast, source, config)?.apply(source)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::CompilationUnit;
    use pretty_assertions::assert_eq;

    fn run(unit: &CompilationUnit, rewrite: &AstRewrite) -> String {
        rewrite
            .rewrite_source(&unit.ast, &unit.source, &RefactorConfig::default())
            .unwrap()
    }

    #[test]
    fn test_replace_overwrites_previous_replace() {
        let unit = CompilationUnit::parse("t.js", "f(a);").unwrap();
        let a = unit.find(NodeKind::Name, "a").unwrap();
        let mut rewrite = AstRewrite::new();
        let one = rewrite.create_string_placeholder("1", NodeKind::Literal);
        let two = rewrite.create_string_placeholder("2", NodeKind::Literal);
        rewrite.replace(&unit.ast, a, one, None).unwrap();
        rewrite.replace(&unit.ast, a, two, None).unwrap();
        assert_eq!(run(&unit, &rewrite), "f(2);");
    }

    #[test]
    fn test_move_then_remove_is_one_operation() {
        let unit = CompilationUnit::parse("t.js", "a();\nb();\n").unwrap();
        let a = unit.find(NodeKind::ExprStmt, "a();").unwrap();
        let b = unit.find(NodeKind::ExprStmt, "b();").unwrap();
        let mut rewrite = AstRewrite::new();
        let moved = rewrite.create_move_target(&unit.ast, a).unwrap();
        rewrite.remove(&unit.ast, a, None).unwrap();
        rewrite.insert_after(&unit.ast, b, moved, None).unwrap();
        assert_eq!(run(&unit, &rewrite), "b();\na();\n");
    }

    #[test]
    fn test_double_move_is_rejected() {
        let unit = CompilationUnit::parse("t.js", "a();").unwrap();
        let a = unit.find(NodeKind::ExprStmt, "a();").unwrap();
        let mut rewrite = AstRewrite::new();
        rewrite.create_move_target(&unit.ast, a).unwrap();
        assert_eq!(
            rewrite.create_move_target(&unit.ast, a),
            Err(RewriteError::AlreadyMoved(a))
        );
    }

    #[test]
    fn test_replace_with_copy_keeps_inner_edits() {
        let unit = CompilationUnit::parse("t.js", "let v = g(a);").unwrap();
        let call = unit.find(NodeKind::Call, "g(a)").unwrap();
        let a = unit.find(NodeKind::Name, "a").unwrap();
        let mut rewrite = AstRewrite::new();
        let b = rewrite.create_string_placeholder("b", NodeKind::Name);
        rewrite.replace(&unit.ast, a, b, None).unwrap();
        let copy = rewrite.create_copy_target(&unit.ast, call);
        let wrapped = rewrite.compose(vec!["h(".into(), copy.into(), ")".into()], NodeKind::Call);
        rewrite.replace(&unit.ast, call, wrapped, None).unwrap();
        assert_eq!(run(&unit, &rewrite), "let v = h(g(b));");
    }

    #[test]
    fn test_unplaced_move_is_an_error() {
        let unit = CompilationUnit::parse("t.js", "a();\nb();\n").unwrap();
        let a = unit.find(NodeKind::ExprStmt, "a();").unwrap();
        let mut rewrite = AstRewrite::new();
        rewrite.create_move_target(&unit.ast, a).unwrap();
        let result = rewrite.to_text_edits(&unit.ast, &unit.source, &RefactorConfig::default());
        assert_eq!(result, Err(RewriteError::UnplacedNode(a)));
    }

    #[test]
    fn test_list_view_reflects_pending_edits() {
        let unit = CompilationUnit::parse("t.js", "a();\nb();\n").unwrap();
        let a = unit.find(NodeKind::ExprStmt, "a();").unwrap();
        let mut rewrite = AstRewrite::new();
        rewrite.remove(&unit.ast, a, None).unwrap();
        assert_eq!(rewrite.list_view(&unit.ast, unit.ast.root(), Slot::Statements).len(), 1);
        assert!(rewrite.is_removed(&unit.ast, a));
    }
}
