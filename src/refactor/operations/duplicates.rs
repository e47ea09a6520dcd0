//! Structural search for code equivalent to a selected region.

use std::collections::{HashMap, HashSet};

use crate::ast::{Ast, NodeId, NodeKind, Slot};
use crate::scope::binding::this_class;
use crate::scope::{BindingId, BindingKind};
use crate::transform::TextRange;

use super::support::is_assignment_target;

/// A region that computes the same thing as the selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Duplicate {
    /// One expression, or a run of sibling statements.
    pub nodes: Vec<NodeId>,
    /// How bindings of the selection correspond to bindings of the duplicate.
    pub bindings: HashMap<BindingId, BindingId>,
}

impl Duplicate {
    pub fn range(&self, ast: &Ast) -> TextRange {
        let first = self.nodes[0];
        let last = self.nodes[self.nodes.len() - 1];
        TextRange::new(ast.range(first).start, ast.range(last).end)
    }

    /// The duplicate's counterpart of a selection binding.
    pub fn binding_for(&self, original: BindingId) -> BindingId {
        self.bindings.get(&original).copied().unwrap_or(original)
    }

    pub fn contains(&self, ast: &Ast, node: NodeId) -> bool {
        self.nodes.iter().any(|n| ast.is_ancestor_or_self(*n, node))
    }
}

/// Finds regions structurally equal to a selection.
///
/// Two regions match when their trees have the same kinds, tokens and slots,
/// and their names resolve consistently: a parameter binding of the selection
/// may stand for any variable of the candidate (one-to-one), a binding declared
/// inside the selection for one declared inside the candidate, and every other
/// binding only for itself.
#[derive(Debug, Clone)]
pub struct DuplicateFinder<'a> {
    ast: &'a Ast,
    source: &'a str,
    selection: Vec<NodeId>,
    params: HashSet<BindingId>,
    locals: HashSet<BindingId>,
    this_context: Option<Option<(NodeId, bool)>>,
}

#[derive(Default)]
struct Mapping {
    forward: HashMap<BindingId, BindingId>,
    reverse: HashMap<BindingId, BindingId>,
}

impl Mapping {
    fn bind(&mut self, from: BindingId, to: BindingId) -> bool {
        match (self.forward.get(&from), self.reverse.get(&to)) {
            (None, None) => {
                self.forward.insert(from, to);
                self.reverse.insert(to, from);
                true
            }
            (Some(f), Some(r)) => *f == to && *r == from,
            _ => false,
        }
    }
}

impl<'a> DuplicateFinder<'a> {
    /// A finder where the bindings in `params` may be substituted.
    pub fn new(ast: &'a Ast, source: &'a str, selection: &[NodeId], params: &[BindingId]) -> Self {
        let inside = |node: NodeId| selection.iter().any(|s| ast.is_ancestor_or_self(*s, node));
        let locals = ast
            .bindings()
            .iter()
            .filter(|(_, b)| b.declaration.is_some_and(|d| inside(d)))
            .map(|(id, _)| id)
            .collect();
        let uses_this = selection.iter().any(|s| {
            ast.descendants(*s)
                .into_iter()
                .any(|n| matches!(ast.kind(n), NodeKind::This | NodeKind::Super))
        });
        Self {
            ast,
            source,
            selection: selection.to_vec(),
            params: params.iter().copied().collect(),
            locals,
            this_context: uses_this.then(|| this_class(ast, selection[0])),
        }
    }

    /// A finder that only accepts identical bindings outside the selection.
    pub fn strict(ast: &'a Ast, source: &'a str, selection: &[NodeId]) -> Self {
        Self::new(ast, source, selection, &[])
    }

    /// Bindings declared inside the selection.
    pub fn locals(&self) -> &HashSet<BindingId> {
        &self.locals
    }

    /// All duplicates under `root`, in source order, never overlapping the
    /// selection or each other.
    pub fn find(&self, root: NodeId) -> Vec<Duplicate> {
        let ast = self.ast;
        let mut found: Vec<Duplicate> = Vec::new();
        let is_statements = self.selection.iter().all(|n| ast.kind(*n).is_statement())
            && ast.slot(self.selection[0]) == Slot::Statements;

        for node in ast.descendants(root) {
            if found.iter().any(|d| d.contains(ast, node)) || self.is_selected(node) {
                continue;
            }
            if is_statements {
                let list: Vec<NodeId> = ast.children_in(node, Slot::Statements).collect();
                let width = self.selection.len();
                let mut i = 0;
                while i + width <= list.len() {
                    let window = &list[i..i + width];
                    if window.iter().any(|n| self.overlaps(*n)) {
                        i += 1;
                        continue;
                    }
                    match self.match_region(window) {
                        Some(duplicate) => {
                            found.push(duplicate);
                            i += width;
                        }
                        None => i += 1,
                    }
                }
            } else if !self.overlaps(node)
                && ast.kind(node) == ast.kind(self.selection[0])
                && !is_assignment_target(ast, node)
                && let Some(duplicate) = self.match_region(&[node])
            {
                found.push(duplicate);
            }
        }
        found.sort_by_key(|d| ast.range(d.nodes[0]).start);
        tracing::debug!(count = found.len(), "duplicate regions found");
        found
    }

    fn is_selected(&self, node: NodeId) -> bool {
        self.selection.iter().any(|s| self.ast.is_ancestor_or_self(*s, node))
    }

    fn overlaps(&self, node: NodeId) -> bool {
        self.selection.iter().any(|s| {
            self.ast.is_ancestor_or_self(*s, node) || self.ast.is_ancestor_or_self(node, *s)
        })
    }

    fn match_region(&self, candidate: &[NodeId]) -> Option<Duplicate> {
        if let Some(context) = self.this_context
            && this_class(self.ast, candidate[0]) != context
        {
            return None;
        }
        let mut mapping = Mapping::default();
        let all = self
            .selection
            .iter()
            .zip(candidate)
            .all(|(a, b)| self.match_tree(*a, *b, candidate, &mut mapping));
        all.then(|| Duplicate {
            nodes: candidate.to_vec(),
            bindings: mapping.forward,
        })
    }

    fn match_tree(&self, a: NodeId, b: NodeId, candidate: &[NodeId], mapping: &mut Mapping) -> bool {
        let ast = self.ast;
        let (na, nb) = (ast.node(a), ast.node(b));
        // Resolved names are compared through their bindings.
        let resolved = na.binding.is_some() && nb.binding.is_some();
        if na.kind != nb.kind
            || (!resolved && na.token != nb.token)
            || na.is_static != nb.is_static
            || na.is_prefix != nb.is_prefix
            || na.children.len() != nb.children.len()
        {
            return false;
        }
        if na.kind == NodeKind::Other
            && (na.syntax_kind != nb.syntax_kind
                || (na.children.is_empty() && ast.text(a, self.source) != ast.text(b, self.source)))
        {
            return false;
        }
        match (na.binding, nb.binding) {
            (None, None) => {}
            (Some(x), Some(y)) => {
                if !self.match_binding(x, y, candidate, mapping) {
                    return false;
                }
            }
            _ => return false,
        }
        na.children.iter().zip(&nb.children).all(|(ca, cb)| {
            ast.slot(*ca) == ast.slot(*cb) && self.match_tree(*ca, *cb, candidate, mapping)
        })
    }

    fn match_binding(&self, x: BindingId, y: BindingId, candidate: &[NodeId], mapping: &mut Mapping) -> bool {
        let ast = self.ast;
        let declared_inside = |binding: BindingId| {
            ast.binding(binding)
                .declaration
                .is_some_and(|d| candidate.iter().any(|c| ast.is_ancestor_or_self(*c, d)))
        };
        if self.params.contains(&x) {
            let kind = ast.binding(y).kind;
            if matches!(kind, BindingKind::Global | BindingKind::Method | BindingKind::Field) || declared_inside(y) {
                return false;
            }
            mapping.bind(x, y)
        } else if self.locals.contains(&x) {
            declared_inside(y) && mapping.bind(x, y)
        } else {
            x == y && mapping.bind(x, y)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::CompilationUnit;

    fn param(unit: &CompilationUnit, name: &str) -> BindingId {
        let node = unit.find(NodeKind::Name, name).unwrap();
        unit.ast.binding_of(node).unwrap()
    }

    #[test]
    fn test_expression_duplicate_with_parameter_substitution() {
        let src = "function f(a, b) { return a * 2 + 1; }\nfunction g(c) { return c * 2 + 1; }\n";
        let unit = CompilationUnit::parse("t.js", src).unwrap();
        let expr = unit.find(NodeKind::Binary, "a * 2 + 1").unwrap();
        let a = param(&unit, "a");
        let finder = DuplicateFinder::new(&unit.ast, &unit.source, &[expr], &[a]);
        let found = finder.find(unit.ast.root());
        assert_eq!(found.len(), 1);
        assert_eq!(unit.ast.text(found[0].nodes[0], src), "c * 2 + 1");
        let c = param(&unit, "c");
        assert_eq!(found[0].binding_for(a), c);
    }

    #[test]
    fn test_strict_finder_requires_identical_bindings() {
        let src = "function f(a) { g(a + 1); h(a + 1); }\nfunction k(a) { g(a + 1); }\n";
        let unit = CompilationUnit::parse("t.js", src).unwrap();
        let expr = unit.find(NodeKind::Binary, "a + 1").unwrap();
        let finder = DuplicateFinder::strict(&unit.ast, &unit.source, &[expr]);
        let found = finder.find(unit.ast.root());
        assert_eq!(found.len(), 1);
        assert!(found[0].range(&unit.ast).start < src.find("function k").unwrap());
    }

    #[test]
    fn test_statement_window_duplicates() {
        let src = "function f(x) {\n    log(x);\n    x++;\n    log(x);\n    x++;\n    done();\n}\n";
        let unit = CompilationUnit::parse("t.js", src).unwrap();
        let first = unit.find(NodeKind::ExprStmt, "log(x);").unwrap();
        let second = unit.find(NodeKind::ExprStmt, "x++;").unwrap();
        let x = param(&unit, "x");
        let finder = DuplicateFinder::new(&unit.ast, &unit.source, &[first, second], &[x]);
        let found = finder.find(unit.ast.root());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].nodes.len(), 2);
        assert_eq!(found[0].range(&unit.ast).start, src.rfind("log(x);").unwrap());
    }

    #[test]
    fn test_renamed_locals_map_consistently() {
        let src = "function f(a) {\n    let t = a + 1;\n    log(t);\n}\nfunction g(b) {\n    let u = b + 1;\n    log(u);\n}\n";
        let unit = CompilationUnit::parse("t.js", src).unwrap();
        let decl = unit.find(NodeKind::VarDecl, "let t = a + 1;").unwrap();
        let call = unit.find(NodeKind::ExprStmt, "log(t);").unwrap();
        let a = param(&unit, "a");
        let finder = DuplicateFinder::new(&unit.ast, &unit.source, &[decl, call], &[a]);
        let found = finder.find(unit.ast.root());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].binding_for(a), param(&unit, "b"));
        let t = param(&unit, "t");
        assert_eq!(unit.ast.binding(found[0].binding_for(t)).name, "u");
    }

    #[test]
    fn test_renamed_global_does_not_match() {
        let src = "function f(a) { return a * k; }\nfunction g(b) { return b * m; }\n";
        let unit = CompilationUnit::parse("t.js", src).unwrap();
        let expr = unit.find(NodeKind::Binary, "a * k").unwrap();
        let finder = DuplicateFinder::new(&unit.ast, &unit.source, &[expr], &[param(&unit, "a")]);
        assert!(finder.find(unit.ast.root()).is_empty());
    }

    #[test]
    fn test_different_literals_do_not_match() {
        let unit = CompilationUnit::parse("t.js", "f(`a` + 1);\nf(`b` + 1);\n").unwrap();
        let expr = unit.find(NodeKind::Binary, "`a` + 1").unwrap();
        let finder = DuplicateFinder::strict(&unit.ast, &unit.source, &[expr]);
        assert!(finder.find(unit.ast.root()).is_empty());
    }
}
