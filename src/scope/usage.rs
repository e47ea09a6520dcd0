//! How bindings are accessed within a subtree.

use serde::{Deserialize, Serialize};

use crate::ast::{Ast, NodeId, NodeKind, Slot};

use super::binding::BindingId;

/// The way a single name occurrence touches its binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessKind {
    /// The value is read.
    Read,
    /// The value is overwritten without being read first.
    Write,
    /// Compound assignment or increment: read, then written.
    ReadWrite,
    /// A declaration that does not assign a value.
    Declare,
}

impl AccessKind {
    pub fn is_read(self) -> bool {
        matches!(self, AccessKind::Read | AccessKind::ReadWrite)
    }

    pub fn is_write(self) -> bool {
        matches!(self, AccessKind::Write | AccessKind::ReadWrite)
    }
}

/// Classifies one name (or property name) occurrence.
pub fn access_kind(ast: &Ast, name: NodeId) -> AccessKind {
    let mut current = name;
    if ast.kind(name) == NodeKind::PropertyName
        && ast.slot(name) == Slot::Property
        && let Some(member) = ast.parent(name)
    {
        current = member;
    }

    // Climb out of destructuring patterns; defaults inside them are reads.
    while let Some(parent) = ast.parent(current) {
        let node = ast.node(parent);
        if node.kind != NodeKind::Other || !node.syntax_kind.ends_with("_pattern") {
            break;
        }
        if ast.slot(current) == Slot::Right {
            return AccessKind::Read;
        }
        current = parent;
    }

    let Some(parent) = ast.parent(current) else {
        return AccessKind::Read;
    };
    match (ast.kind(parent), ast.slot(current)) {
        (NodeKind::Assign, Slot::Left) => {
            if ast.token(parent) == Some("=") {
                AccessKind::Write
            } else {
                AccessKind::ReadWrite
            }
        }
        (NodeKind::Update, _) => AccessKind::ReadWrite,
        (NodeKind::Declarator, Slot::Name) => {
            if ast.child(parent, Slot::Value).is_some() {
                AccessKind::Write
            } else {
                AccessKind::Declare
            }
        }
        (NodeKind::ForIn, Slot::Left) => AccessKind::Write,
        (_, Slot::Params) | (NodeKind::Param, Slot::Name) | (NodeKind::Catch, Slot::Param) => {
            AccessKind::Declare
        }
        (
            NodeKind::FunctionDecl
            | NodeKind::ClassDecl
            | NodeKind::FunctionExpr
            | NodeKind::ClassExpr
            | NodeKind::MethodDecl,
            Slot::Name,
        ) => AccessKind::Declare,
        (NodeKind::FieldDecl, Slot::Name) => {
            if ast.child(parent, Slot::Value).is_some() {
                AccessKind::Write
            } else {
                AccessKind::Declare
            }
        }
        _ => AccessKind::Read,
    }
}

/// One occurrence of a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Usage {
    pub node: NodeId,
    pub access: AccessKind,
}

/// Finds the occurrences of bindings inside a unit.
#[derive(Debug, Clone, Copy)]
pub struct UsageAnalyzer<'a> {
    ast: &'a Ast,
}

impl<'a> UsageAnalyzer<'a> {
    pub fn new(ast: &'a Ast) -> Self {
        Self { ast }
    }

    /// Every occurrence of `binding` inside `within`, declaration included.
    pub fn usages(&self, binding: BindingId, within: NodeId) -> Vec<Usage> {
        self.ast
            .descendants(within)
            .into_iter()
            .filter(|n| self.ast.binding_of(*n) == Some(binding))
            .map(|node| Usage {
                node,
                access: access_kind(self.ast, node),
            })
            .collect()
    }

    /// Occurrences of `binding` inside `within`, excluding its declaration.
    pub fn references(&self, binding: BindingId, within: NodeId) -> Vec<Usage> {
        let declaration = self.ast.binding(binding).declaration;
        self.usages(binding, within)
            .into_iter()
            .filter(|u| Some(u.node) != declaration)
            .collect()
    }

    pub fn read_count(&self, binding: BindingId, within: NodeId) -> usize {
        self.references(binding, within)
            .iter()
            .filter(|u| u.access.is_read())
            .count()
    }

    /// Whether `binding` is assigned anywhere in `within` other than its
    /// declaration.
    pub fn is_reassigned(&self, binding: BindingId, within: NodeId) -> bool {
        self.references(binding, within)
            .iter()
            .any(|u| u.access.is_write())
    }

    /// Bindings referenced inside `within`, in first-occurrence order.
    pub fn referenced_bindings(&self, within: NodeId) -> Vec<BindingId> {
        let mut seen = Vec::new();
        for node in self.ast.descendants(within) {
            if let Some(binding) = self.ast.binding_of(node)
                && !seen.contains(&binding)
            {
                seen.push(binding);
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::CompilationUnit;

    fn names(unit: &CompilationUnit, text: &str) -> Vec<NodeId> {
        unit.ast
            .descendants(unit.ast.root())
            .into_iter()
            .filter(|n| unit.ast.kind(*n) == NodeKind::Name && unit.text(*n) == text)
            .collect()
    }

    #[test]
    fn test_access_kinds() {
        let unit = CompilationUnit::parse("t.js", "let x = 1; x = 2; x += 3; x++; f(x); let y;").unwrap();
        let kinds: Vec<_> = names(&unit, "x")
            .into_iter()
            .map(|n| access_kind(&unit.ast, n))
            .collect();
        assert_eq!(
            kinds,
            vec![
                AccessKind::Write,
                AccessKind::Write,
                AccessKind::ReadWrite,
                AccessKind::ReadWrite,
                AccessKind::Read
            ]
        );
        assert_eq!(access_kind(&unit.ast, names(&unit, "y")[0]), AccessKind::Declare);
    }

    #[test]
    fn test_destructuring_assignment_writes() {
        let unit = CompilationUnit::parse("t.js", "let a, b; [a, b = a] = g();").unwrap();
        let a = names(&unit, "a");
        assert_eq!(access_kind(&unit.ast, a[1]), AccessKind::Write);
        assert_eq!(access_kind(&unit.ast, a[2]), AccessKind::Read);
    }

    #[test]
    fn test_this_property_write() {
        let unit = CompilationUnit::parse("t.js", "class A { m() { this.v = 1; return this.v; } }").unwrap();
        let props: Vec<_> = unit
            .ast
            .descendants(unit.ast.root())
            .into_iter()
            .filter(|n| unit.ast.kind(*n) == NodeKind::PropertyName && unit.text(*n) == "v")
            .collect();
        assert_eq!(access_kind(&unit.ast, props[0]), AccessKind::Write);
        assert_eq!(access_kind(&unit.ast, props[1]), AccessKind::Read);
    }

    #[test]
    fn test_usage_counts() {
        let unit = CompilationUnit::parse("t.js", "function f(p) { let q = p + p; return q; }").unwrap();
        let p = names(&unit, "p")[0];
        let binding = unit.ast.binding_of(p).unwrap();
        let usage = UsageAnalyzer::new(&unit.ast);
        assert_eq!(usage.references(binding, unit.ast.root()).len(), 2);
        assert_eq!(usage.read_count(binding, unit.ast.root()), 2);
        assert!(!usage.is_reassigned(binding, unit.ast.root()));
    }
}
