//! Arena AST with resolved bindings.
//!
//! Nodes live in a flat arena indexed by [`NodeId`]. A node's parent is a lookup into
//! the same arena, never an owning pointer, and the arena is never mutated once the
//! binder has run: every edit goes through the deferred overlay in
//! [`crate::rewrite`].
//!
//! Children are stored in source order together with the [`Slot`] they occupy in
//! their parent. A list slot (statements, arguments, members, ...) is simply a slot
//! that appears more than once.

mod lower;
pub mod precedence;

pub use lower::lower;

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::lang::{LanguageRegistry, TypeScript};
use crate::scope::binding::{self, Binding, BindingId, BindingKind, BindingTable};
use crate::transform::TextRange;

/// Stable index of a node in the [`Ast`] arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// The closed set of node kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Program,

    // Declarations
    FunctionDecl,
    ClassDecl,
    MethodDecl,
    FieldDecl,
    VarDecl,
    Declarator,
    Param,

    // Statements
    Block,
    ExprStmt,
    Return,
    If,
    While,
    DoWhile,
    For,
    ForIn,
    Break,
    Continue,
    Throw,
    Try,
    Catch,
    Finally,
    Switch,
    SwitchCase,
    Labeled,
    Empty,

    // Expressions
    Name,
    PropertyName,
    Label,
    Literal,
    This,
    Super,
    Binary,
    Unary,
    Update,
    Assign,
    Call,
    New,
    Member,
    Subscript,
    Paren,
    Conditional,
    Arrow,
    FunctionExpr,
    ClassExpr,
    Object,
    Property,
    Array,
    Template,
    Sequence,
    Spread,
    Await,

    /// Syntax the lowering does not model. Its children are still lowered.
    Other,
}

impl NodeKind {
    pub fn is_statement(self) -> bool {
        use NodeKind::*;
        matches!(
            self,
            FunctionDecl
                | ClassDecl
                | VarDecl
                | Block
                | ExprStmt
                | Return
                | If
                | While
                | DoWhile
                | For
                | ForIn
                | Break
                | Continue
                | Throw
                | Try
                | Switch
                | Labeled
                | Empty
        )
    }

    pub fn is_expression(self) -> bool {
        use NodeKind::*;
        matches!(
            self,
            Name | Literal
                | This
                | Super
                | Binary
                | Unary
                | Update
                | Assign
                | Call
                | New
                | Member
                | Subscript
                | Paren
                | Conditional
                | Arrow
                | FunctionExpr
                | ClassExpr
                | Object
                | Array
                | Template
                | Sequence
                | Spread
                | Await
        )
    }

    /// Nodes that own a parameter list and a body executed on invocation.
    pub fn is_function_like(self) -> bool {
        matches!(
            self,
            NodeKind::FunctionDecl | NodeKind::FunctionExpr | NodeKind::Arrow | NodeKind::MethodDecl
        )
    }

    pub fn is_class_like(self) -> bool {
        matches!(self, NodeKind::ClassDecl | NodeKind::ClassExpr)
    }

    pub fn is_loop(self) -> bool {
        matches!(
            self,
            NodeKind::While | NodeKind::DoWhile | NodeKind::For | NodeKind::ForIn
        )
    }

    /// Nodes that introduce a lexical scope.
    pub fn is_scope(self) -> bool {
        use NodeKind::*;
        matches!(
            self,
            Program
                | FunctionDecl
                | FunctionExpr
                | Arrow
                | MethodDecl
                | Block
                | For
                | ForIn
                | Catch
                | Switch
                | ClassDecl
                | ClassExpr
        )
    }
}

/// The named position a child occupies in its parent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Slot {
    Root,
    Name,
    Params,
    Body,
    Statements,
    Members,
    Declarators,
    Expression,
    Left,
    Right,
    Operand,
    Condition,
    Then,
    Else,
    Init,
    Update,
    Callee,
    Arguments,
    Object,
    Property,
    Index,
    Value,
    Handler,
    Finalizer,
    Cases,
    Label,
    Elements,
    Heritage,
    Param,
    Children,
}

impl Slot {
    /// List slots whose entries are separated by commas.
    pub fn is_comma_list(self) -> bool {
        matches!(
            self,
            Slot::Params | Slot::Arguments | Slot::Declarators | Slot::Elements
        )
    }

    /// List slots whose entries are separated by line breaks.
    pub fn is_line_list(self) -> bool {
        matches!(self, Slot::Statements | Slot::Members | Slot::Cases)
    }
}

/// A node in the arena.
#[derive(Clone, Debug)]
pub struct Node {
    pub kind: NodeKind,
    pub range: TextRange,
    pub parent: Option<NodeId>,
    pub slot: Slot,
    pub children: Vec<NodeId>,
    /// Identifier text, operator, literal text or declaration keyword.
    pub token: Option<String>,
    pub is_static: bool,
    /// For update expressions: the operator precedes its operand.
    pub is_prefix: bool,
    pub binding: Option<BindingId>,
    /// The grammar node kind this node was lowered from.
    pub syntax_kind: &'static str,
}

/// Arena of nodes plus the binding table produced by the binder.
#[derive(Clone, Debug)]
pub struct Ast {
    nodes: Vec<Node>,
    root: NodeId,
    pub(crate) bindings: BindingTable,
}

impl Ast {
    pub(crate) fn new(nodes: Vec<Node>, root: NodeId) -> Self {
        Self {
            nodes,
            root,
            bindings: BindingTable::default(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.node(id).kind
    }

    pub fn range(&self, id: NodeId) -> TextRange {
        self.node(id).range
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn slot(&self, id: NodeId) -> Slot {
        self.node(id).slot
    }

    pub fn token(&self, id: NodeId) -> Option<&str> {
        self.node(id).token.as_deref()
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    /// Children occupying `slot`, in source order.
    pub fn children_in(&self, id: NodeId, slot: Slot) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(move |c| self.slot(*c) == slot)
    }

    /// The first child occupying `slot`.
    pub fn child(&self, id: NodeId, slot: Slot) -> Option<NodeId> {
        self.children_in(id, slot).next()
    }

    /// Iterates over the strict ancestors of `id`, innermost first.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            ast: self,
            next: self.parent(id),
        }
    }

    /// `id` followed by its ancestors.
    pub fn ancestors_inclusive(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::once(id).chain(self.ancestors(id))
    }

    /// Returns true if `ancestor` is `node` or one of its ancestors.
    pub fn is_ancestor_or_self(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.ancestors_inclusive(node).any(|a| a == ancestor)
    }

    /// Preorder list of `id` and all its descendants.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev());
        }
        out
    }

    /// The nearest ancestor (excluding `id`) of the given kind.
    pub fn enclosing(&self, id: NodeId, pred: impl Fn(NodeKind) -> bool) -> Option<NodeId> {
        self.ancestors(id).find(|a| pred(self.kind(*a)))
    }

    /// The innermost function-like node enclosing `id`.
    pub fn enclosing_function(&self, id: NodeId) -> Option<NodeId> {
        self.enclosing(id, NodeKind::is_function_like)
    }

    /// The innermost statement containing `id` (or `id` itself when it is one).
    pub fn enclosing_statement(&self, id: NodeId) -> Option<NodeId> {
        self.ancestors_inclusive(id)
            .find(|a| self.kind(*a).is_statement())
    }

    /// The innermost statement containing `id` that sits directly in a statement
    /// list, i.e. a position where new statements can be inserted before it.
    pub fn enclosing_list_statement(&self, id: NodeId) -> Option<NodeId> {
        self.ancestors_inclusive(id)
            .find(|a| self.slot(*a) == Slot::Statements)
    }

    /// The smallest node whose range covers `range`.
    pub fn covering_node(&self, range: TextRange) -> NodeId {
        let mut current = self.root;
        'descend: loop {
            for child in self.children(current) {
                if self.range(*child).covers(range) {
                    current = *child;
                    continue 'descend;
                }
            }
            return current;
        }
    }

    /// Returns the source text of a node.
    pub fn text<'s>(&self, id: NodeId, source: &'s str) -> &'s str {
        let range = self.range(id);
        &source[range.start..range.end]
    }

    pub fn binding_of(&self, id: NodeId) -> Option<BindingId> {
        self.node(id).binding
    }

    pub fn binding(&self, id: BindingId) -> &Binding {
        self.bindings.get(id)
    }

    pub fn bindings(&self) -> &BindingTable {
        &self.bindings
    }

    /// The name a declaration node introduces, if any.
    pub fn declared_name(&self, decl: NodeId) -> Option<&str> {
        match self.kind(decl) {
            NodeKind::Name | NodeKind::PropertyName => self.token(decl),
            _ => self.child(decl, Slot::Name).and_then(|n| self.token(n)),
        }
    }

    /// Returns true if `a` and `b` are the same resolved local variable.
    pub fn same_variable(&self, a: NodeId, b: NodeId) -> bool {
        matches!((self.binding_of(a), self.binding_of(b)), (Some(x), Some(y)) if x == y)
    }

    /// Top-most body statements of a function-like node.
    pub fn body_statements(&self, function: NodeId) -> Vec<NodeId> {
        match self.child(function, Slot::Body) {
            Some(body) if self.kind(body) == NodeKind::Block => {
                self.children_in(body, Slot::Statements).collect()
            }
            _ => Vec::new(),
        }
    }

    /// Whether a binding is a local of the given function (parameter or local
    /// variable declared anywhere inside it, nested functions excluded).
    pub fn is_local_of(&self, binding: BindingId, function: NodeId) -> bool {
        let b = self.binding(binding);
        if !matches!(
            b.kind,
            BindingKind::Local | BindingKind::Parameter | BindingKind::CatchParam | BindingKind::Function | BindingKind::Class
        ) {
            return false;
        }
        b.declaration.is_some_and(|decl| {
            self.ancestors(decl)
                .find(|a| self.kind(*a).is_function_like())
                .is_some_and(|f| f == function)
        })
    }
}

/// Iterator over a node's ancestors.
pub struct Ancestors<'a> {
    ast: &'a Ast,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.ast.parent(current);
        Some(current)
    }
}

/// A parsed and bound source file.
#[derive(Clone, Debug)]
pub struct CompilationUnit {
    pub path: PathBuf,
    pub source: String,
    pub ast: Ast,
}

impl CompilationUnit {
    /// Parses `source`, lowers it into the arena and resolves bindings.
    pub fn parse(path: impl Into<PathBuf>, source: impl Into<String>) -> Result<Self> {
        let path = path.into();
        let source = source.into();
        let registry = LanguageRegistry::new();
        let tree = match registry.detect(&path) {
            Some(lang) => lang.parse(&source)?,
            None => crate::lang::Language::parse(&TypeScript, &source)?,
        };
        let mut ast = lower(&tree, &source);
        binding::bind(&mut ast);
        Ok(Self { path, source, ast })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Source text of a node.
    pub fn text(&self, id: NodeId) -> &str {
        self.ast.text(id, &self.source)
    }

    /// Finds the first node of `kind` whose text equals `text`.
    pub fn find(&self, kind: NodeKind, text: &str) -> Option<NodeId> {
        self.ast
            .descendants(self.ast.root())
            .into_iter()
            .find(|id| self.ast.kind(*id) == kind && self.text(*id) == text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(src: &str) -> CompilationUnit {
        CompilationUnit::parse("test.js", src).unwrap()
    }

    #[test]
    fn test_children_are_nested_and_ordered() {
        let unit = unit("function f(a, b) { let x = a + b; return x; }");
        let ast = &unit.ast;
        for id in ast.descendants(ast.root()) {
            let mut last_end = ast.range(id).start;
            for child in ast.children(id) {
                let r = ast.range(*child);
                assert!(ast.range(id).covers(r));
                assert!(r.start >= last_end);
                last_end = r.end;
                assert_eq!(ast.parent(*child), Some(id));
            }
        }
    }

    #[test]
    fn test_lowering_slots() {
        let unit = unit("function f(a, b) { return a + b; }");
        let ast = &unit.ast;
        let func = unit.find(NodeKind::FunctionDecl, unit.source.as_str()).unwrap();
        assert_eq!(ast.children_in(func, Slot::Params).count(), 2);
        let ret = ast.body_statements(func)[0];
        assert_eq!(ast.kind(ret), NodeKind::Return);
        let expr = ast.child(ret, Slot::Expression).unwrap();
        assert_eq!(ast.kind(expr), NodeKind::Binary);
        assert_eq!(ast.token(expr), Some("+"));
    }

    #[test]
    fn test_covering_node() {
        let unit = unit("function f() { return 1 + 2; }");
        let start = unit.source.find("1 + 2").unwrap();
        let node = unit.ast.covering_node(TextRange::at(start, 5));
        assert_eq!(unit.ast.kind(node), NodeKind::Binary);
    }

    #[test]
    fn test_condition_parentheses_are_unwrapped() {
        let unit = unit("if (a) { b(); }");
        let stmt = unit.find(NodeKind::If, unit.source.as_str()).unwrap();
        let cond = unit.ast.child(stmt, Slot::Condition).unwrap();
        assert_eq!(unit.ast.kind(cond), NodeKind::Name);
    }

    #[test]
    fn test_static_method_flag() {
        let unit = unit("class A { static m() { return 1; } n() {} }");
        let methods: Vec<_> = unit
            .ast
            .descendants(unit.ast.root())
            .into_iter()
            .filter(|id| unit.ast.kind(*id) == NodeKind::MethodDecl)
            .collect();
        assert_eq!(methods.len(), 2);
        assert!(unit.ast.node(methods[0]).is_static);
        assert!(!unit.ast.node(methods[1]).is_static);
    }
}
