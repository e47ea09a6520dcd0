//! Introduce Factory: route `new C(...)` through a static factory method.

use std::path::PathBuf;

use crate::ast::{Ast, CompilationUnit, NodeId, NodeKind, Slot};
use crate::error::Result;
use crate::rewrite::Part;
use crate::scope::{BindingId, BindingKind, ProgressMonitor, SymbolKey, UsageAnalyzer};

use super::support::{arguments, constructor_of, find_references, forwarded_parameter, not_checked, warn_low_confidence};
use super::{Change, ChangeBuilder, RefactoringContext, RefactoringOperation, RefactoringStatus, Severity, check_identifier, selected_node};

#[derive(Debug, Clone)]
struct Target {
    class: NodeId,
    binding: BindingId,
    class_name: String,
    factory: String,
    /// Parameter declarations and the matching arguments of the inner `new`.
    params: Vec<String>,
    args: Vec<String>,
}

/// Add `static createC(...)` to a class and make every `new C(...)` call it.
#[derive(Debug, Clone, Default)]
pub struct IntroduceFactory {
    /// Factory name; `create` followed by the class name when unset.
    pub name: Option<String>,
    target: Option<Target>,
    sites: Vec<(PathBuf, NodeId)>,
}

impl IntroduceFactory {
    /// Create a new IntroduceFactory operation.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// The class binding the selection refers to: its name, a `new` of it, or
/// its constructor.
fn selected_class(ast: &Ast, node: NodeId) -> Option<BindingId> {
    let name = match ast.kind(node) {
        NodeKind::Name => node,
        NodeKind::New => ast.child(node, Slot::Callee)?,
        NodeKind::ClassDecl => ast.child(node, Slot::Name)?,
        NodeKind::MethodDecl | NodeKind::PropertyName => {
            let member = ast.ancestors_inclusive(node).find(|a| ast.kind(*a) == NodeKind::MethodDecl)?;
            if ast.declared_name(member) != Some("constructor") {
                return None;
            }
            ast.child(ast.parent(member)?, Slot::Name)?
        }
        _ => return None,
    };
    ast.binding_of(name).filter(|b| ast.binding(*b).kind == BindingKind::Class)
}

impl RefactoringOperation for IntroduceFactory {
    fn name(&self) -> &'static str {
        "Introduce Factory"
    }

    fn check_selection(&mut self, ctx: &RefactoringContext) -> Result<RefactoringStatus> {
        let unit = ctx.unit()?;
        let ast = &unit.ast;
        let node = selected_node(unit, ctx.selection);
        let Some(binding) = selected_class(ast, node) else {
            return Ok(RefactoringStatus::fatal("select a class, its constructor or a 'new' of it"));
        };
        let Some(class) = ast
            .binding(binding)
            .declaration
            .and_then(|n| ast.parent(n))
            .filter(|c| ast.kind(*c) == NodeKind::ClassDecl)
        else {
            return Ok(RefactoringStatus::fatal("only class declarations can get a factory"));
        };
        let class_name = ast.binding(binding).name.clone();
        let factory = self.name.clone().unwrap_or_else(|| format!("create{class_name}"));
        let status = check_identifier(&factory, "method");
        if status.has_fatal() {
            return Ok(status);
        }
        if ast
            .bindings()
            .members_of(class)
            .iter()
            .any(|m| ast.binding(*m).name == factory)
        {
            return Ok(RefactoringStatus::fatal(format!("'{class_name}' already has a member named '{factory}'")));
        }

        let mut params = Vec::new();
        let mut args = Vec::new();
        if let Some(constructor) = constructor_of(ast, class) {
            for param in ast.children_in(constructor, Slot::Params) {
                let Some((text, arg)) = forwarded_parameter(ast, &unit.source, param) else {
                    return Ok(RefactoringStatus::fatal("the constructor has destructured parameters"));
                };
                params.push(text);
                args.push(arg);
            }
        }
        self.target = Some(Target {
            class,
            binding,
            class_name,
            factory,
            params,
            args,
        });
        Ok(status)
    }

    fn check_semantics(&mut self, ctx: &RefactoringContext, monitor: &mut dyn ProgressMonitor) -> Result<RefactoringStatus> {
        let target = self.target.clone().ok_or_else(not_checked)?;
        let unit = ctx.unit()?;
        let ast = &unit.ast;
        let mut status = RefactoringStatus::new();

        let references: Vec<(&CompilationUnit, NodeId)> = match SymbolKey::of(ast, target.binding) {
            Some(key) => find_references(ctx, &key, monitor)?
                .into_iter()
                .map(|r| {
                    warn_low_confidence(&mut status, &r, &format!("reference to {key}"));
                    (r.unit, r.node)
                })
                .collect(),
            None => UsageAnalyzer::new(ast)
                .references(target.binding, ast.root())
                .into_iter()
                .map(|u| (unit, u.node))
                .collect(),
        };

        self.sites.clear();
        for (site_unit, node) in references {
            let sast = &site_unit.ast;
            match sast.parent(node) {
                Some(new) if sast.kind(new) == NodeKind::New && sast.slot(node) == Slot::Callee => {
                    self.sites.push((site_unit.path.clone(), new));
                }
                Some(parent) if sast.kind(parent) == NodeKind::ClassDecl || sast.kind(parent) == NodeKind::ClassExpr => {
                    if sast.slot(node) == Slot::Heritage {
                        status.add_at(
                            Severity::Info,
                            "subclasses still call the constructor directly",
                            site_unit,
                            sast.range(parent),
                        );
                    }
                }
                _ => {}
            }
        }
        tracing::debug!(sites = self.sites.len(), "constructor calls to redirect");
        Ok(status)
    }

    fn compute_edits(&mut self, ctx: &RefactoringContext, _monitor: &mut dyn ProgressMonitor) -> Result<Change> {
        let target = self.target.as_ref().ok_or_else(not_checked)?;
        let unit = ctx.unit()?;
        let ast = &unit.ast;
        let indent = &ctx.config.indent;
        let mut builder = ChangeBuilder::new();

        {
            let rewrite = builder.rewrite(unit);
            let text = format!(
                "static {}({}) {{\n{indent}return new {}({});\n}}",
                target.factory,
                target.params.join(", "),
                target.class_name,
                target.args.join(", ")
            );
            let factory = rewrite.create_string_placeholder(text, NodeKind::MethodDecl);
            match constructor_of(ast, target.class) {
                Some(constructor) => rewrite.insert_after(ast, constructor, factory, None)?,
                None => rewrite
                    .list(ast, target.class, Slot::Members)
                    .insert_first(factory, None),
            }
        }

        for (path, new) in &self.sites {
            let site_unit = ctx.workspace.require(path)?;
            let sast = &site_unit.ast;
            let callee = sast
                .child(*new, Slot::Callee)
                .map_or(target.class_name.as_str(), |c| sast.text(c, &site_unit.source));
            let mut parts = vec![Part::Text(format!("{callee}.{}(", target.factory))];
            for (i, arg) in arguments(sast, *new).into_iter().enumerate() {
                if i > 0 {
                    parts.push(", ".into());
                }
                parts.push(Part::Copy(arg));
            }
            parts.push(")".into());
            let rewrite = builder.rewrite(site_unit);
            let call = rewrite.compose(parts, NodeKind::Call);
            rewrite.replace(sast, *new, call, None)?;
        }
        builder.build(self.name(), ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refactor::Workspace;
    use crate::refactor::operations::{RefactoringResult, RefactoringRunner};
    use pretty_assertions::assert_eq;
    use std::path::Path;

    fn run(ctx: &RefactoringContext, op: &mut IntroduceFactory) -> RefactoringResult {
        RefactoringRunner::new().run(op, ctx).unwrap()
    }

    fn single(src: &str, selected: &str) -> RefactoringResult {
        let ctx = RefactoringContext::for_source("t.js", src).unwrap().select(selected);
        run(&ctx, &mut IntroduceFactory::new())
    }

    fn new_source(result: RefactoringResult) -> String {
        let change = result.into_change().unwrap();
        change.new_source(Path::new("t.js")).unwrap().to_string()
    }

    const POINT: &str = "class Point {\n    constructor(x, y) {\n        this.x = x;\n        this.y = y;\n    }\n}\n";

    #[test]
    fn test_factory_follows_constructor() {
        let src = format!("{POINT}const p = new Point(1, 2);\n");
        assert_eq!(
            new_source(single(&src, "Point")),
            "class Point {\n    constructor(x, y) {\n        this.x = x;\n        this.y = y;\n    }\n\n    static createPoint(x, y) {\n        return new Point(x, y);\n    }\n}\nconst p = Point.createPoint(1, 2);\n"
        );
    }

    #[test]
    fn test_nested_constructions_are_all_redirected() {
        let src = "class Box {\n    constructor(v) {\n        this.v = v;\n    }\n}\nconst b = new Box(new Box(1));\n";
        assert!(new_source(single(src, "new Box(new Box(1))")).contains("const b = Box.createBox(Box.createBox(1));"));
    }

    #[test]
    fn test_class_without_constructor() {
        let out = new_source(single("class Empty {}\nnew Empty();\n", "Empty"));
        assert!(out.contains("static createEmpty() {"));
        assert!(out.ends_with("Empty.createEmpty();\n"));
    }

    #[test]
    fn test_existing_member_is_fatal() {
        let src = "class A {\n    static createA() {\n        return null;\n    }\n}\n";
        assert!(single(src, "A").status.has_fatal());
    }

    #[test]
    fn test_constructions_in_other_units_are_redirected() {
        let mut ws = Workspace::new();
        ws.add_source("point.js", POINT).unwrap();
        ws.add_source("main.js", "const origin = new Point(0, 0);\n").unwrap();
        let ctx = RefactoringContext::new(ws, "point.js").select("constructor");
        let change = run(&ctx, &mut IntroduceFactory::new().with_name("at")).into_change().unwrap();
        assert_eq!(change.new_source(Path::new("main.js")).unwrap(), "const origin = Point.at(0, 0);\n");
    }
}
