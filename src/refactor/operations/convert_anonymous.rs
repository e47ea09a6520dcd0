//! Convert Anonymous to Nested: lift a class expression into a named class
//! declaration at module level.

use crate::ast::{Ast, NodeId, NodeKind, Slot};
use crate::error::Result;
use crate::rewrite::{AstRewrite, Part};
use crate::scope::{BindingId, CodeScope, ProgressMonitor, UsageAnalyzer};
use crate::transform::text::{dedent, indentation_at};

use super::support::{arguments, class_member, constructor_of, not_checked, render, top_level_statement};
use super::{Change, ChangeBuilder, RefactoringContext, RefactoringOperation, RefactoringStatus, check_identifier, selected_node};

#[derive(Debug, Clone)]
struct Target {
    class: NodeId,
    /// The class expression, or the parentheses wrapping it.
    site: NodeId,
    /// Locals of enclosing functions the class body reads, in declaration order.
    captured: Vec<BindingId>,
}

/// Turn a class expression into a class declaration placed before the
/// top-level statement that contains it.
///
/// Locals the class captures become constructor parameters stored on the
/// instance; the expression is replaced by the new class name, a `new` of it,
/// or a bound constructor when captured values must be supplied.
#[derive(Debug, Clone)]
pub struct ConvertAnonymousToNested {
    pub name: String,
    target: Option<Target>,
}

impl ConvertAnonymousToNested {
    /// Create a new ConvertAnonymousToNested operation.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: None,
        }
    }
}

/// Whether the class member around `node` runs before the constructor body
/// or without an instance.
fn runs_without_fields(ast: &Ast, member: NodeId) -> bool {
    ast.node(member).is_static || ast.kind(member) != NodeKind::MethodDecl
}

/// Whether `this` at `node` means something other than the instance of the
/// class whose member is `member`.
fn rebinds_this(ast: &Ast, node: NodeId, member: NodeId) -> bool {
    ast.ancestors(node).take_while(|a| *a != member).any(|a| {
        let kind = ast.kind(a);
        (kind.is_function_like() && kind != NodeKind::Arrow) || kind.is_class_like()
    })
}

impl RefactoringOperation for ConvertAnonymousToNested {
    fn name(&self) -> &'static str {
        "Convert Anonymous to Nested"
    }

    fn check_selection(&mut self, ctx: &RefactoringContext) -> Result<RefactoringStatus> {
        let unit = ctx.unit()?;
        let ast = &unit.ast;
        let status = check_identifier(&self.name, "class");
        if status.has_fatal() {
            return Ok(status);
        }
        let node = selected_node(unit, ctx.selection);
        let Some(class) = ast
            .ancestors_inclusive(node)
            .find(|a| ast.kind(*a) == NodeKind::ClassExpr)
        else {
            return Ok(RefactoringStatus::fatal("select a class expression"));
        };
        if CodeScope::at(ast, class).is_in_use(&self.name) {
            return Ok(RefactoringStatus::fatal(format!("'{}' is already in use", self.name)));
        }

        let mut site = class;
        while let Some(parent) = ast.parent(site).filter(|p| ast.kind(*p) == NodeKind::Paren) {
            site = parent;
        }

        let usage = UsageAnalyzer::new(ast);
        let mut captured: Vec<BindingId> = usage
            .referenced_bindings(class)
            .into_iter()
            .filter(|b| {
                let b = ast.binding(*b);
                b.scope != ast.root()
                    && !b.kind.is_member()
                    && b.declaration.is_some_and(|d| !ast.is_ancestor_or_self(class, d))
            })
            .collect();
        captured.sort_by_key(|b| ast.binding(*b).declaration.map(|d| ast.range(d).start));
        captured.dedup();

        for binding in &captured {
            let b = ast.binding(*binding);
            if ast.bindings().members_of(class).iter().any(|m| ast.binding(*m).name == b.name) {
                return Ok(RefactoringStatus::fatal(format!(
                    "the class already has a member named '{}'",
                    b.name
                )));
            }
            for reference in usage.references(*binding, class) {
                if reference.access.is_write() {
                    return Ok(RefactoringStatus::fatal(format!(
                        "the class assigns the captured variable '{}'",
                        b.name
                    )));
                }
                let Some(member) = class_member(ast, reference.node) else {
                    return Ok(RefactoringStatus::fatal(format!(
                        "'{}' is used outside the class body",
                        b.name
                    )));
                };
                if runs_without_fields(ast, member) || rebinds_this(ast, reference.node, member) {
                    return Ok(RefactoringStatus::fatal(format!(
                        "'{}' is used where the captured value is not stored yet",
                        b.name
                    )));
                }
            }
        }

        if let Some(constructor) = constructor_of(ast, class) {
            let ctor_locals: Vec<&str> = ast
                .bindings()
                .iter()
                .filter(|(_, b)| b.declaration.is_some_and(|d| ast.is_ancestor_or_self(constructor, d)))
                .map(|(_, b)| b.name.as_str())
                .collect();
            if let Some(clash) = captured.iter().find(|b| ctor_locals.contains(&ast.binding(**b).name.as_str())) {
                return Ok(RefactoringStatus::fatal(format!(
                    "the constructor already declares '{}'",
                    ast.binding(*clash).name
                )));
            }
        }

        self.target = Some(Target { class, site, captured });
        Ok(status)
    }

    fn check_semantics(&mut self, ctx: &RefactoringContext, _monitor: &mut dyn ProgressMonitor) -> Result<RefactoringStatus> {
        let target = self.target.as_ref().ok_or_else(not_checked)?;
        let unit = ctx.unit()?;
        let ast = &unit.ast;
        let mut status = RefactoringStatus::new();
        let usage = UsageAnalyzer::new(ast);
        for binding in &target.captured {
            let b = ast.binding(*binding);
            if usage.is_reassigned(*binding, b.scope) {
                status.add_warning(format!(
                    "'{}' is reassigned; the class keeps the value it had when the instance was created",
                    b.name
                ));
            }
        }
        let Some(constructor) = constructor_of(ast, target.class) else {
            return Ok(status);
        };
        let has_heritage = ast.child(target.class, Slot::Heritage).is_some();
        if has_heritage && !target.captured.is_empty() && super_call(ast, constructor).is_none() {
            return Ok(RefactoringStatus::fatal(
                "the constructor has no top-level 'super(...)' call to store captured values after",
            ));
        }
        Ok(status)
    }

    fn compute_edits(&mut self, ctx: &RefactoringContext, _monitor: &mut dyn ProgressMonitor) -> Result<Change> {
        let target = self.target.as_ref().ok_or_else(not_checked)?;
        let unit = ctx.unit()?;
        let ast = &unit.ast;
        let indent = &ctx.config.indent;
        let usage = UsageAnalyzer::new(ast);
        let names: Vec<&str> = target.captured.iter().map(|b| ast.binding(*b).name.as_str()).collect();

        let mut scratch = AstRewrite::new();
        for binding in &target.captured {
            let name = &ast.binding(*binding).name;
            for reference in usage.references(*binding, target.class) {
                let shorthand = ast.parent(reference.node).is_some_and(|p| ast.kind(p) == NodeKind::Object);
                let text = if shorthand {
                    format!("{name}: this.{name}")
                } else {
                    format!("this.{name}")
                };
                let id = scratch.create_string_placeholder(text, NodeKind::Member);
                scratch.replace(ast, reference.node, id, None)?;
            }
        }
        let own_name = ast.child(target.class, Slot::Name);
        if let Some(binding) = own_name.and_then(|n| ast.binding_of(n)) {
            for reference in usage.references(binding, target.class) {
                let id = scratch.create_string_placeholder(self.name.clone(), NodeKind::Name);
                scratch.replace(ast, reference.node, id, None)?;
            }
        }

        if !names.is_empty() {
            let stores: Vec<String> = names.iter().map(|n| format!("this.{n} = {n};")).collect();
            let has_heritage = ast.child(target.class, Slot::Heritage).is_some();
            match constructor_of(ast, target.class) {
                Some(constructor) => {
                    for (i, name) in names.iter().enumerate() {
                        let param = scratch.create_string_placeholder(name.to_string(), NodeKind::Param);
                        scratch.list(ast, constructor, Slot::Params).insert_at(i, param, None)?;
                    }
                    let stores = scratch.create_string_placeholder(stores.join("\n"), NodeKind::ExprStmt);
                    match super_call(ast, constructor) {
                        Some(call) => scratch.insert_after(ast, call, stores, None)?,
                        None => {
                            if let Some(body) = ast.child(constructor, Slot::Body) {
                                scratch.list(ast, body, Slot::Statements).insert_first(stores, None);
                            }
                        }
                    }
                }
                None => {
                    let mut params = names.join(", ");
                    let mut body = String::new();
                    if has_heritage {
                        params.push_str(", ...args");
                        body.push_str(&format!("{indent}super(...args);\n"));
                    }
                    for store in &stores {
                        body.push_str(&format!("{indent}{store}\n"));
                    }
                    let constructor =
                        scratch.create_string_placeholder(format!("constructor({params}) {{\n{body}}}"), NodeKind::MethodDecl);
                    scratch.list(ast, target.class, Slot::Members).insert_first(constructor, None);
                }
            }
        }

        let rendered = render(unit, &scratch, target.class, &ctx.config)?;
        let rendered = dedent(&rendered, indentation_at(&unit.source, ast.range(target.class).start));
        let head = match own_name {
            Some(old) => ast.range(old).end - ast.range(target.class).start,
            None => "class".len(),
        };
        let declaration = format!("class {}{}", self.name, rendered.get(head..).unwrap_or_default());

        let mut builder = ChangeBuilder::new();
        let rewrite = builder.rewrite(unit);
        let declaration = rewrite.create_string_placeholder(declaration, NodeKind::ClassDecl);
        rewrite.insert_before(ast, top_level_statement(ast, target.class), declaration, None)?;

        let captured = names.join(", ");
        match ast.parent(target.site).filter(|p| ast.kind(*p) == NodeKind::New && ast.slot(target.site) == Slot::Callee) {
            Some(new) => {
                let mut parts: Vec<Part> = vec![format!("new {}({captured}", self.name).into()];
                for (i, arg) in arguments(ast, new).into_iter().enumerate() {
                    if i > 0 || !names.is_empty() {
                        parts.push(", ".into());
                    }
                    parts.push(Part::Copy(arg));
                }
                parts.push(")".into());
                let replacement = rewrite.compose(parts, NodeKind::New);
                rewrite.replace(ast, new, replacement, None)?;
            }
            None => {
                let text = if names.is_empty() {
                    self.name.clone()
                } else {
                    format!("{}.bind(null, {captured})", self.name)
                };
                let replacement = rewrite.create_string_placeholder(text, NodeKind::Call);
                rewrite.replace(ast, target.site, replacement, None)?;
            }
        }
        tracing::debug!(class = %self.name, captured = names.len(), "lifted class expression");
        builder.build(self.name(), ctx)
    }
}

/// The `super(...)` statement directly in a constructor's body.
fn super_call(ast: &Ast, constructor: NodeId) -> Option<NodeId> {
    let body = ast.child(constructor, Slot::Body)?;
    ast.children_in(body, Slot::Statements).find(|s| {
        ast.kind(*s) == NodeKind::ExprStmt
            && ast
                .child(*s, Slot::Expression)
                .filter(|e| ast.kind(*e) == NodeKind::Call)
                .and_then(|c| ast.child(c, Slot::Callee))
                .is_some_and(|c| ast.kind(c) == NodeKind::Super)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refactor::operations::{RefactoringResult, RefactoringRunner, Severity};
    use pretty_assertions::assert_eq;
    use std::path::Path;

    fn run(src: &str, selected: &str, name: &str) -> RefactoringResult {
        let ctx = RefactoringContext::for_source("t.js", src).unwrap().select(selected);
        RefactoringRunner::new()
            .run(&mut ConvertAnonymousToNested::new(name), &ctx)
            .unwrap()
    }

    fn new_source(result: RefactoringResult) -> String {
        let change = result.into_change().unwrap();
        change.new_source(Path::new("t.js")).unwrap().to_string()
    }

    #[test]
    fn test_class_without_captures() {
        let src = "const Greeter = class {\n    greet() {\n        return 1;\n    }\n};\n";
        assert_eq!(
            new_source(run(src, "class", "Impl")),
            "class Impl {\n    greet() {\n        return 1;\n    }\n}\n\nconst Greeter = Impl;\n"
        );
    }

    #[test]
    fn test_captured_parameter_becomes_constructor_argument() {
        let src = "function make(prefix) {\n    return class {\n        label(x) {\n            return prefix + x;\n        }\n    };\n}\n";
        assert_eq!(
            new_source(run(src, "class", "Labeler")),
            "class Labeler {\n    constructor(prefix) {\n        this.prefix = prefix;\n    }\n\n    label(x) {\n        return this.prefix + x;\n    }\n}\n\nfunction make(prefix) {\n    return Labeler.bind(null, prefix);\n}\n"
        );
    }

    #[test]
    fn test_existing_constructor_receives_captures_first() {
        let src = "function f(k) {\n    return class {\n        constructor(v) {\n            this.v = v;\n        }\n        sum() {\n            return k + this.v;\n        }\n    };\n}\n";
        let out = new_source(run(src, "class", "Pair"));
        assert!(out.contains("constructor(k, v) {\n        this.k = k;\n        this.v = v;\n    }"));
        assert!(out.contains("return this.k + this.v;"));
    }

    #[test]
    fn test_instantiation_passes_captures() {
        let src = "function run(base) {\n    const w = new class extends Base {\n        get() {\n            return base;\n        }\n    }(1);\n    return w;\n}\n";
        let out = new_source(run(src, "class extends", "Worker"));
        assert!(out.starts_with("class Worker extends Base {\n    constructor(base, ...args) {\n        super(...args);\n        this.base = base;\n    }"));
        assert!(out.contains("const w = new Worker(base, 1);"));
    }

    #[test]
    fn test_reassigned_capture_warns() {
        let src = "function f() {\n    let n = 0;\n    const C = class {\n        get() {\n            return n;\n        }\n    };\n    n = 1;\n    return C;\n}\n";
        assert_eq!(run(src, "class", "Snapshot").status.severity(), Some(Severity::Warning));
    }

    #[test]
    fn test_written_capture_is_fatal() {
        let src = "function f() {\n    let n = 0;\n    return class {\n        inc() {\n            n += 1;\n        }\n    };\n}\n";
        assert!(run(src, "class", "Counter").status.has_fatal());
    }

    #[test]
    fn test_capture_in_static_member_is_fatal() {
        let src = "function f(k) {\n    return class {\n        static get() {\n            return k;\n        }\n    };\n}\n";
        assert!(run(src, "class", "Holder").status.has_fatal());
    }
}
