//! Introduce Indirection: add a delegate for a function or method and send
//! existing calls through it.

use std::path::PathBuf;

use crate::ast::{Ast, CompilationUnit, NodeId, NodeKind, Slot};
use crate::error::Result;
use crate::rewrite::Part;
use crate::scope::{BindingId, BindingKind, CodeScope, ProgressMonitor, SymbolKey, UsageAnalyzer};

use super::support::{
    arguments, callee_binding, enclosing_call, find_references, forwarded_parameter, not_checked, warn_low_confidence,
};
use super::{Change, ChangeBuilder, RefactoringContext, RefactoringOperation, RefactoringStatus, Severity, check_identifier, selected_node};

#[derive(Debug, Clone, PartialEq)]
enum Callee {
    Function,
    Method { class: String, is_static: bool },
}

#[derive(Debug, Clone)]
struct Target {
    declaration: NodeId,
    binding: BindingId,
    callee: Callee,
    params: Vec<String>,
    args: Vec<String>,
    /// Name of the extra receiver parameter of an instance-method delegate.
    receiver: String,
}

#[derive(Debug, Clone)]
enum Redirect {
    /// Rename the callee name or member property.
    Rename(NodeId),
    /// Rewrite `obj.m(args)` to `Class.delegate(obj, args)`.
    Receiver(NodeId),
}

/// Add a delegate that forwards to a function or method.
///
/// Functions get a sibling function; methods get a static method in the same
/// class that takes the receiver as its first parameter.
#[derive(Debug, Clone)]
pub struct IntroduceIndirection {
    pub name: String,
    pub update_references: bool,
    target: Option<Target>,
    redirects: Vec<(PathBuf, Redirect)>,
}

impl IntroduceIndirection {
    /// Create a new IntroduceIndirection operation.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            update_references: true,
            target: None,
            redirects: Vec::new(),
        }
    }

    pub fn update_references(mut self, update: bool) -> Self {
        self.update_references = update;
        self
    }
}

fn selected_binding(ast: &Ast, node: NodeId) -> Option<BindingId> {
    let binding = match ast.kind(node) {
        NodeKind::Name | NodeKind::PropertyName => ast.binding_of(node),
        NodeKind::Call => callee_binding(ast, node),
        NodeKind::FunctionDecl | NodeKind::MethodDecl => ast.child(node, Slot::Name).and_then(|n| ast.binding_of(n)),
        _ => None,
    }?;
    matches!(ast.binding(binding).kind, BindingKind::Function | BindingKind::Method).then_some(binding)
}

impl RefactoringOperation for IntroduceIndirection {
    fn name(&self) -> &'static str {
        "Introduce Indirection"
    }

    fn check_selection(&mut self, ctx: &RefactoringContext) -> Result<RefactoringStatus> {
        let unit = ctx.unit()?;
        let ast = &unit.ast;
        let status = check_identifier(&self.name, "function");
        if status.has_fatal() {
            return Ok(status);
        }
        let Some(binding) = selected_binding(ast, selected_node(unit, ctx.selection)) else {
            return Ok(RefactoringStatus::fatal("select a function or method, or a call of one"));
        };
        let b = ast.binding(binding);
        let Some(declaration) = b
            .declaration
            .and_then(|n| ast.parent(n))
            .filter(|d| matches!(ast.kind(*d), NodeKind::FunctionDecl | NodeKind::MethodDecl))
        else {
            return Ok(RefactoringStatus::fatal("only declared functions and methods can be redirected"));
        };

        let callee = if b.kind == BindingKind::Method {
            if b.name == "constructor" {
                return Ok(RefactoringStatus::fatal("constructors cannot be redirected"));
            }
            let header = ast.text(declaration, &unit.source);
            if header.starts_with("get ") || header.starts_with("set ") || header.starts_with("static get ") || header.starts_with("static set ") {
                return Ok(RefactoringStatus::fatal("accessors cannot be redirected"));
            }
            let Some(class) = b.owner else {
                return Ok(RefactoringStatus::fatal("the method does not belong to a class"));
            };
            let Some(class_name) = ast.declared_name(class) else {
                return Ok(RefactoringStatus::fatal("the method belongs to an anonymous class"));
            };
            if ast.bindings().members_of(class).iter().any(|m| ast.binding(*m).name == self.name) {
                return Ok(RefactoringStatus::fatal(format!("'{class_name}' already has a member named '{}'", self.name)));
            }
            Callee::Method {
                class: class_name.to_string(),
                is_static: b.is_static,
            }
        } else {
            if CodeScope::at(ast, declaration).is_in_use(&self.name) {
                return Ok(RefactoringStatus::fatal(format!("'{}' is already in use", self.name)));
            }
            Callee::Function
        };

        let mut params = Vec::new();
        let mut args = Vec::new();
        for param in ast.children_in(declaration, Slot::Params) {
            let Some((text, arg)) = forwarded_parameter(ast, &unit.source, param) else {
                return Ok(RefactoringStatus::fatal("the declaration has destructured parameters"));
            };
            params.push(text);
            args.push(arg);
        }
        let mut receiver = "target".to_string();
        let mut suffix = 1;
        while args.iter().any(|a| a.trim_start_matches("...") == receiver) {
            receiver = format!("target{suffix}");
            suffix += 1;
        }

        self.target = Some(Target {
            declaration,
            binding,
            callee,
            params,
            args,
            receiver,
        });
        Ok(status)
    }

    fn check_semantics(&mut self, ctx: &RefactoringContext, monitor: &mut dyn ProgressMonitor) -> Result<RefactoringStatus> {
        let target = self.target.clone().ok_or_else(not_checked)?;
        let mut status = RefactoringStatus::new();
        self.redirects.clear();
        if !self.update_references {
            return Ok(status);
        }
        let unit = ctx.unit()?;
        let ast = &unit.ast;

        let references: Vec<(&CompilationUnit, NodeId)> = match SymbolKey::of(ast, target.binding) {
            Some(key) => find_references(ctx, &key, monitor)?
                .into_iter()
                .map(|r| {
                    warn_low_confidence(&mut status, &r, &format!("call of {key}"));
                    (r.unit, r.node)
                })
                .collect(),
            None => UsageAnalyzer::new(ast)
                .references(target.binding, ast.root())
                .into_iter()
                .map(|u| (unit, u.node))
                .collect(),
        };

        for (site_unit, node) in references {
            let sast = &site_unit.ast;
            let Some(call) = enclosing_call(sast, node).filter(|c| sast.kind(*c) == NodeKind::Call) else {
                status.add_at(
                    Severity::Info,
                    "this reference is not a call and keeps pointing at the original",
                    site_unit,
                    sast.range(node),
                );
                continue;
            };
            let redirect = match &target.callee {
                Callee::Function | Callee::Method { is_static: true, .. } => Redirect::Rename(node),
                Callee::Method { is_static: false, .. } => {
                    let receiver = sast.parent(node).and_then(|m| sast.child(m, Slot::Object));
                    if receiver.is_some_and(|r| sast.kind(r) == NodeKind::Super) {
                        status.add_at(
                            Severity::Warning,
                            "'super' calls cannot go through the delegate and are left unchanged",
                            site_unit,
                            sast.range(call),
                        );
                        continue;
                    }
                    Redirect::Receiver(call)
                }
            };
            self.redirects.push((site_unit.path.clone(), redirect));
        }
        tracing::debug!(calls = self.redirects.len(), "calls to redirect");
        Ok(status)
    }

    fn compute_edits(&mut self, ctx: &RefactoringContext, _monitor: &mut dyn ProgressMonitor) -> Result<Change> {
        let target = self.target.as_ref().ok_or_else(not_checked)?;
        let unit = ctx.unit()?;
        let ast = &unit.ast;
        let indent = &ctx.config.indent;
        let original = &ast.binding(target.binding).name;
        let args = target.args.join(", ");
        let mut builder = ChangeBuilder::new();

        let (text, kind) = match &target.callee {
            Callee::Function => (
                format!(
                    "function {}({}) {{\n{indent}return {original}({args});\n}}",
                    self.name,
                    target.params.join(", ")
                ),
                NodeKind::FunctionDecl,
            ),
            Callee::Method { class, is_static: true } => (
                format!(
                    "static {}({}) {{\n{indent}return {class}.{original}({args});\n}}",
                    self.name,
                    target.params.join(", ")
                ),
                NodeKind::MethodDecl,
            ),
            Callee::Method { is_static: false, .. } => {
                let params: Vec<&str> = std::iter::once(target.receiver.as_str())
                    .chain(target.params.iter().map(String::as_str))
                    .collect();
                (
                    format!(
                        "static {}({}) {{\n{indent}return {}.{original}({args});\n}}",
                        self.name,
                        params.join(", "),
                        target.receiver
                    ),
                    NodeKind::MethodDecl,
                )
            }
        };
        // `export function f` gets its delegate after the whole export.
        let anchor = match ast.parent(target.declaration) {
            Some(parent) if ast.kind(parent) == NodeKind::Other => parent,
            _ => target.declaration,
        };
        {
            let rewrite = builder.rewrite(unit);
            let delegate = rewrite.create_string_placeholder(text, kind);
            rewrite.insert_after(ast, anchor, delegate, None)?;
        }

        for (path, redirect) in &self.redirects {
            let site_unit = ctx.workspace.require(path)?;
            let sast = &site_unit.ast;
            let rewrite = builder.rewrite(site_unit);
            match redirect {
                Redirect::Rename(node) => {
                    let name = rewrite.create_string_placeholder(self.name.clone(), sast.kind(*node));
                    rewrite.replace(sast, *node, name, None)?;
                }
                Redirect::Receiver(call) => {
                    let Callee::Method { class, .. } = &target.callee else {
                        continue;
                    };
                    let object = sast
                        .child(*call, Slot::Callee)
                        .and_then(|m| sast.child(m, Slot::Object));
                    let mut parts = vec![Part::Text(format!("{class}.{}(", self.name))];
                    match object {
                        Some(object) => parts.push(Part::Copy(object)),
                        None => parts.push("this".into()),
                    }
                    for arg in arguments(sast, *call) {
                        parts.push(", ".into());
                        parts.push(Part::Copy(arg));
                    }
                    parts.push(")".into());
                    let replacement = rewrite.compose(parts, NodeKind::Call);
                    rewrite.replace(sast, *call, replacement, None)?;
                }
            }
        }
        builder.build(self.name(), ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refactor::operations::{RefactoringResult, RefactoringRunner};
    use pretty_assertions::assert_eq;
    use std::path::Path;

    fn run(src: &str, selected: &str, op: &mut IntroduceIndirection) -> RefactoringResult {
        let ctx = RefactoringContext::for_source("t.js", src).unwrap().select(selected);
        RefactoringRunner::new().run(op, &ctx).unwrap()
    }

    fn new_source(result: RefactoringResult) -> String {
        let change = result.into_change().unwrap();
        change.new_source(Path::new("t.js")).unwrap().to_string()
    }

    const GREETER: &str = "class Greeter {\n    greet(name) {\n        return name;\n    }\n}\nconst g = new Greeter();\nlog(g.greet(\"a\"));\n";

    #[test]
    fn test_function_delegate() {
        let src = "function area(r) {\n    return r * r;\n}\nlog(area(2));\n";
        let result = run(src, "area", &mut IntroduceIndirection::new("computeArea"));
        assert_eq!(
            new_source(result),
            "function area(r) {\n    return r * r;\n}\n\nfunction computeArea(r) {\n    return area(r);\n}\nlog(computeArea(2));\n"
        );
    }

    #[test]
    fn test_instance_method_delegate_takes_receiver() {
        let result = run(GREETER, "greet", &mut IntroduceIndirection::new("greetVia"));
        assert_eq!(result.status.severity(), Some(Severity::Warning));
        assert_eq!(
            new_source(result),
            "class Greeter {\n    greet(name) {\n        return name;\n    }\n\n    static greetVia(target, name) {\n        return target.greet(name);\n    }\n}\nconst g = new Greeter();\nlog(Greeter.greetVia(g, \"a\"));\n"
        );
    }

    #[test]
    fn test_static_method_calls_are_renamed() {
        let src = "class M {\n    static twice(x) {\n        return x * 2;\n    }\n}\nM.twice(3);\n";
        let out = new_source(run(src, "twice", &mut IntroduceIndirection::new("double")));
        assert!(out.contains("    static double(x) {\n        return M.twice(x);\n    }\n"));
        assert!(out.ends_with("M.double(3);\n"));
    }

    #[test]
    fn test_calls_kept_without_update() {
        let src = "function area(r) {\n    return r * r;\n}\nlog(area(2));\n";
        let out = new_source(run(src, "area", &mut IntroduceIndirection::new("viaArea").update_references(false)));
        assert!(out.contains("function viaArea(r) {"));
        assert!(out.ends_with("log(area(2));\n"));
    }

    #[test]
    fn test_member_name_clash_is_fatal() {
        let result = run(GREETER, "greet", &mut IntroduceIndirection::new("greet"));
        assert!(result.status.has_fatal());
    }

    #[test]
    fn test_constructor_is_fatal() {
        let src = "class P {\n    constructor(x) {\n        this.x = x;\n    }\n}\n";
        assert!(run(src, "constructor", &mut IntroduceIndirection::new("make")).status.has_fatal());
    }
}
