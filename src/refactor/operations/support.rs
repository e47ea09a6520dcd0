//! Tree queries shared by the operations.

use crate::ast::precedence::{parenthesize_for, precedence};
use crate::ast::{Ast, CompilationUnit, NodeId, NodeKind, Slot};
use crate::config::RefactorConfig;
use crate::error::{RefactorError, Result};
use crate::rewrite::AstRewrite;
use crate::scope::selection::SelectionError;
use crate::scope::{BindingId, BindingKind, ProgressMonitor, ResolutionConfidence, SearchEngine, SymbolKey};

use super::context::RefactoringContext;
use super::status::RefactoringStatus;

/// The statement directly under the program that contains `node`.
pub(crate) fn top_level_statement(ast: &Ast, node: NodeId) -> NodeId {
    ast.ancestors_inclusive(node)
        .find(|a| ast.parent(*a) == Some(ast.root()))
        .unwrap_or(node)
}

/// The class member containing `node`.
pub(crate) fn class_member(ast: &Ast, node: NodeId) -> Option<NodeId> {
    ast.ancestors_inclusive(node).find(|a| {
        ast.slot(*a) == Slot::Members && ast.parent(*a).is_some_and(|p| ast.kind(p).is_class_like())
    })
}

/// The constructor of a class.
pub(crate) fn constructor_of(ast: &Ast, class: NodeId) -> Option<NodeId> {
    ast.children_in(class, Slot::Members).find(|m| {
        ast.kind(*m) == NodeKind::MethodDecl && ast.declared_name(*m) == Some("constructor")
    })
}

/// Whether `node` is written by an assignment, update or loop header.
pub(crate) fn is_assignment_target(ast: &Ast, node: NodeId) -> bool {
    let Some(parent) = ast.parent(node) else {
        return false;
    };
    match (ast.kind(parent), ast.slot(node)) {
        (NodeKind::Assign, Slot::Left) | (NodeKind::ForIn, Slot::Left) => true,
        (NodeKind::Update, _) => true,
        (NodeKind::Unary, _) => ast.token(parent) == Some("delete"),
        _ => false,
    }
}

/// Expressions whose evaluation has no side effect.
pub(crate) fn is_pure(ast: &Ast, node: NodeId) -> bool {
    match ast.kind(node) {
        NodeKind::Literal | NodeKind::Name | NodeKind::This | NodeKind::PropertyName => true,
        NodeKind::Arrow | NodeKind::FunctionExpr => true,
        NodeKind::Unary if ast.token(node) == Some("delete") => false,
        NodeKind::Template => ast
            .children(node)
            .iter()
            .all(|c| ast.kind(*c) == NodeKind::Other || is_pure(ast, *c)),
        NodeKind::Binary
        | NodeKind::Unary
        | NodeKind::Paren
        | NodeKind::Conditional
        | NodeKind::Member
        | NodeKind::Subscript
        | NodeKind::Array
        | NodeKind::Object
        | NodeKind::Property
        | NodeKind::Sequence
        | NodeKind::Spread => ast.children(node).iter().all(|c| is_pure(ast, *c)),
        _ => false,
    }
}

/// Literals, including signed numbers and templates without substitutions.
pub(crate) fn is_literal(ast: &Ast, node: NodeId) -> bool {
    match ast.kind(node) {
        NodeKind::Literal => true,
        NodeKind::Template => ast.children(node).iter().all(|c| ast.kind(*c) == NodeKind::Other),
        NodeKind::Unary => {
            matches!(ast.token(node), Some("-" | "+"))
                && ast
                    .child(node, Slot::Operand)
                    .is_some_and(|o| ast.kind(o) == NodeKind::Literal)
        }
        _ => false,
    }
}

/// Descendants of `root` that run in the same function invocation, skipping
/// the bodies of nested functions and classes.
pub(crate) fn same_frame_descendants(ast: &Ast, root: NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut stack: Vec<NodeId> = ast.children(root).iter().rev().copied().collect();
    while let Some(node) = stack.pop() {
        out.push(node);
        let kind = ast.kind(node);
        if kind.is_function_like() || kind.is_class_like() {
            continue;
        }
        stack.extend(ast.children(node).iter().rev());
    }
    out
}

/// `this` nodes of `root` that refer to the same object as a `this` at `root`:
/// arrows are transparent, other functions and classes are not.
pub(crate) fn this_references(ast: &Ast, root: NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut stack: Vec<NodeId> = ast.children(root).iter().rev().copied().collect();
    while let Some(node) = stack.pop() {
        let kind = ast.kind(node);
        if kind == NodeKind::This {
            out.push(node);
        }
        if (kind.is_function_like() && kind != NodeKind::Arrow) || kind.is_class_like() {
            continue;
        }
        stack.extend(ast.children(node).iter().rev());
    }
    out
}

/// The binding a call's callee resolves to: a function name or a member.
pub(crate) fn callee_binding(ast: &Ast, call: NodeId) -> Option<BindingId> {
    let callee = ast.child(call, Slot::Callee)?;
    match ast.kind(callee) {
        NodeKind::Name => ast.binding_of(callee),
        NodeKind::Member => ast.child(callee, Slot::Property).and_then(|p| ast.binding_of(p)),
        _ => None,
    }
}

pub(crate) fn arguments(ast: &Ast, call: NodeId) -> Vec<NodeId> {
    ast.children_in(call, Slot::Arguments).collect()
}

/// The name node of a plain parameter: no default, no pattern, no rest.
pub(crate) fn simple_param_name(ast: &Ast, param: NodeId) -> Option<NodeId> {
    match ast.kind(param) {
        NodeKind::Name => Some(param),
        NodeKind::Param if ast.child(param, Slot::Value).is_none() => {
            ast.child(param, Slot::Name).filter(|n| ast.kind(*n) == NodeKind::Name)
        }
        _ => None,
    }
}

/// A parameter's declaration text and the argument that forwards it:
/// `a = 1` is forwarded as `a`, `...rest` as `...rest`. Patterns have no
/// single name and yield `None`.
pub(crate) fn forwarded_parameter(ast: &Ast, source: &str, param: NodeId) -> Option<(String, String)> {
    let text = ast.text(param, source).to_string();
    if let Some(name) = simple_param_name(ast, param) {
        return Some((text, ast.text(name, source).to_string()));
    }
    let pattern = ast.child(param, Slot::Name)?;
    if ast.kind(pattern) == NodeKind::Name {
        return Some((text, ast.text(pattern, source).to_string()));
    }
    // `...rest` lowers to an untyped wrapper around the name.
    let rest = ast.children(pattern).iter().copied().find(|n| ast.kind(*n) == NodeKind::Name)?;
    (ast.kind(pattern) == NodeKind::Other && ast.text(pattern, source).starts_with("..."))
        .then(|| (text, format!("...{}", ast.text(rest, source))))
}

/// The call expression whose callee is `name` (directly or as a member's
/// property).
pub(crate) fn enclosing_call(ast: &Ast, name: NodeId) -> Option<NodeId> {
    let mut callee = name;
    if ast.slot(name) == Slot::Property {
        callee = ast.parent(name)?;
    }
    let parent = ast.parent(callee)?;
    (matches!(ast.kind(parent), NodeKind::Call | NodeKind::New) && ast.slot(callee) == Slot::Callee)
        .then_some(parent)
}

/// `text` parenthesized for taking the place of `target`, given that it is the
/// rendering of `inner` from `inner_ast`.
pub(crate) fn parenthesize(
    text: &str,
    inner_ast: &Ast,
    inner: NodeId,
    target_ast: &Ast,
    target: NodeId,
    config: &RefactorConfig,
) -> String {
    let level = precedence(inner_ast, inner, &config.precedence);
    parenthesize_for(text, level, inner_ast.kind(inner), target_ast, target, &config.precedence)
}

/// Text of `node` in `unit` with the edits recorded inside it by `rewrite`.
pub(crate) fn render(unit: &CompilationUnit, rewrite: &AstRewrite, node: NodeId, config: &RefactorConfig) -> Result<String> {
    Ok(rewrite.render_node(&unit.ast, &unit.source, config, node)?)
}

/// Whether the name bound to `binding` in `from` means the same at `site`.
pub(crate) fn visible_at(from: &CompilationUnit, binding: BindingId, site_unit: &CompilationUnit, site: NodeId) -> bool {
    let ast = &from.ast;
    let b = ast.binding(binding);
    if from.path != site_unit.path {
        // Another unit only sees globals and top-level declarations.
        return match b.kind {
            BindingKind::Global => true,
            BindingKind::Function | BindingKind::Class => b.scope == ast.root(),
            _ => false,
        };
    }
    let shadowed = ast.bindings().iter().any(|(id, other)| {
        id != binding
            && other.name == b.name
            && !matches!(other.kind, BindingKind::Method | BindingKind::Field)
            && ast.is_ancestor_or_self(other.scope, site)
            && (b.kind == BindingKind::Global || ast.is_ancestor_or_self(b.scope, other.scope))
    });
    !shadowed && (b.kind == BindingKind::Global || ast.is_ancestor_or_self(b.scope, site))
}

/// A resolved reference found by the search collaborator.
pub(crate) struct Reference<'w> {
    pub unit: &'w CompilationUnit,
    pub node: NodeId,
    pub confidence: ResolutionConfidence,
}

/// Searches the workspace for `key` and re-resolves every hit in its unit.
pub(crate) fn find_references<'w>(
    ctx: &'w RefactoringContext,
    key: &SymbolKey,
    monitor: &mut dyn ProgressMonitor,
) -> Result<Vec<Reference<'w>>> {
    let matches = ctx.search().find_references(key, monitor)?;
    let mut out = Vec::new();
    for m in matches {
        let Some(unit) = ctx.workspace.unit(&m.unit) else {
            continue;
        };
        match m.resolve(unit) {
            Some(node) => out.push(Reference {
                unit,
                node,
                confidence: m.confidence,
            }),
            None => tracing::warn!(unit = %m.unit.display(), offset = m.offset, "search match does not resolve to a name"),
        }
    }
    Ok(out)
}

/// Warns about a low-confidence reference that is updated anyway.
pub(crate) fn warn_low_confidence(status: &mut RefactoringStatus, reference: &Reference<'_>, what: &str) {
    if reference.confidence == ResolutionConfidence::Low {
        status.add_at(
            super::Severity::Warning,
            format!("{what}: the receiver's type is unknown, the reference is updated by name"),
            reference.unit,
            reference.unit.ast.range(reference.node),
        );
    }
}

pub(crate) fn selection_status(error: SelectionError) -> RefactoringStatus {
    RefactoringStatus::fatal(error.to_string())
}

/// Error for an operation whose phases were run out of order.
pub(crate) fn not_checked() -> RefactorError {
    RefactorError::Refused("the selection has not been checked".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_purity() {
        let unit = CompilationUnit::parse("t.js", "x = a + b.c; f(a); -1; `t`;").unwrap();
        let ast = &unit.ast;
        assert!(is_pure(ast, unit.find(NodeKind::Binary, "a + b.c").unwrap()));
        assert!(!is_pure(ast, unit.find(NodeKind::Call, "f(a)").unwrap()));
        assert!(!is_pure(ast, unit.find(NodeKind::Assign, "x = a + b.c").unwrap()));
        assert!(is_literal(ast, unit.find(NodeKind::Unary, "-1").unwrap()));
        assert!(is_literal(ast, unit.find(NodeKind::Template, "`t`").unwrap()));
    }

    #[test]
    fn test_assignment_targets() {
        let unit = CompilationUnit::parse("t.js", "a = 1; b++; c += d;").unwrap();
        let ast = &unit.ast;
        assert!(is_assignment_target(ast, unit.find(NodeKind::Name, "a").unwrap()));
        assert!(is_assignment_target(ast, unit.find(NodeKind::Name, "b").unwrap()));
        assert!(is_assignment_target(ast, unit.find(NodeKind::Name, "c").unwrap()));
        assert!(!is_assignment_target(ast, unit.find(NodeKind::Name, "d").unwrap()));
    }

    #[test]
    fn test_this_references_stop_at_functions() {
        let unit = CompilationUnit::parse(
            "t.js",
            "class A { m() { this.a; const f = () => this.b; function g() { return this; } } }",
        )
        .unwrap();
        let method = unit.find(NodeKind::MethodDecl, "m() { this.a; const f = () => this.b; function g() { return this; } }").unwrap();
        assert_eq!(this_references(&unit.ast, method).len(), 2);
    }

    #[test]
    fn test_constructor_and_member_lookup() {
        let unit = CompilationUnit::parse("t.js", "class A { constructor() { this.x = 1; } m() { return 2; } }").unwrap();
        let class = unit.find(NodeKind::ClassDecl, unit.source.as_str()).unwrap();
        let ctor = constructor_of(&unit.ast, class).unwrap();
        assert_eq!(unit.ast.declared_name(ctor), Some("constructor"));
        let two = unit.find(NodeKind::Literal, "2").unwrap();
        let member = class_member(&unit.ast, two).unwrap();
        assert_eq!(unit.ast.declared_name(member), Some("m"));
    }
}
