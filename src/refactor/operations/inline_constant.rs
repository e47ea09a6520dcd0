//! Inline Constant: replace the references of a constant with its value.

use std::path::PathBuf;

use crate::ast::{Ast, CompilationUnit, NodeId, NodeKind, Slot};
use crate::error::Result;
use crate::refactor::Workspace;
use crate::scope::{BindingId, BindingKind, ProgressMonitor, ResolutionConfidence, SymbolKey, UsageAnalyzer};

use super::support::{
    find_references, is_assignment_target, not_checked, parenthesize, visible_at, warn_low_confidence,
};
use super::{Change, ChangeBuilder, RefactoringContext, RefactoringOperation, RefactoringStatus, Severity, selected_node};

/// The constant being inlined, located in the unit that declares it.
#[derive(Debug, Clone)]
struct Constant {
    unit: PathBuf,
    binding: BindingId,
    value: NodeId,
    /// Declarator, or the field declaration.
    declaration: NodeId,
    key: Option<SymbolKey>,
}

/// One place the value goes.
#[derive(Debug, Clone)]
struct Site {
    unit: PathBuf,
    /// The node replaced: the name, or the `Class.NAME` member around it.
    target: NodeId,
}

/// Inline a constant local or a static field.
#[derive(Debug, Clone)]
pub struct InlineConstant {
    /// Delete the declaration once every reference is inlined.
    pub remove_declaration: bool,
    /// Inline every reference rather than the selected one.
    pub inline_all: bool,
    constant: Option<Constant>,
    selected: Option<NodeId>,
    sites: Vec<Site>,
    remove: bool,
}

impl Default for InlineConstant {
    fn default() -> Self {
        Self::new()
    }
}

impl InlineConstant {
    /// Create a new InlineConstant operation.
    pub fn new() -> Self {
        Self {
            remove_declaration: true,
            inline_all: true,
            constant: None,
            selected: None,
            sites: Vec::new(),
            remove: false,
        }
    }

    pub fn remove_declaration(mut self, remove: bool) -> Self {
        self.remove_declaration = remove;
        self
    }

    pub fn inline_all(mut self, all: bool) -> Self {
        self.inline_all = all;
        self
    }
}

/// Finds a static field `class.name` declared somewhere in the workspace.
fn find_static_field<'w>(workspace: &'w Workspace, class: &str, name: &str) -> Option<(&'w CompilationUnit, BindingId)> {
    workspace.units().iter().find_map(|unit| {
        let ast = &unit.ast;
        ast.bindings()
            .iter()
            .find(|(_, b)| {
                b.kind == BindingKind::Field
                    && b.is_static
                    && b.name == name
                    && b.owner.and_then(|o| ast.declared_name(o)) == Some(class)
            })
            .map(|(id, _)| (unit, id))
    })
}

/// The node a reference to the constant is replaced as a whole.
fn replaced_node(ast: &Ast, name: NodeId) -> NodeId {
    match ast.parent(name) {
        Some(member) if ast.slot(name) == Slot::Property && ast.kind(member) == NodeKind::Member => member,
        _ => name,
    }
}

impl RefactoringOperation for InlineConstant {
    fn name(&self) -> &'static str {
        "Inline Constant"
    }

    fn check_selection(&mut self, ctx: &RefactoringContext) -> Result<RefactoringStatus> {
        let unit = ctx.unit()?;
        let ast = &unit.ast;
        let node = selected_node(unit, ctx.selection);
        if !matches!(ast.kind(node), NodeKind::Name | NodeKind::PropertyName) {
            return Ok(RefactoringStatus::fatal("select a constant or one of its references"));
        }

        let (decl_unit, binding) = match ast.binding_of(node) {
            Some(b) if ast.binding(b).kind != BindingKind::Global => (unit, b),
            _ => {
                let receiver = ast
                    .parent(node)
                    .filter(|_| ast.slot(node) == Slot::Property)
                    .and_then(|m| ast.child(m, Slot::Object))
                    .filter(|o| ast.kind(*o) == NodeKind::Name)
                    .and_then(|o| ast.token(o));
                let field = receiver.and_then(|class| {
                    find_static_field(&ctx.workspace, class, ast.token(node).unwrap_or_default())
                });
                match field {
                    Some(found) => found,
                    None => return Ok(RefactoringStatus::fatal("the selected name is not a constant")),
                }
            }
        };

        let dast = &decl_unit.ast;
        let b = dast.binding(binding);
        let Some(name_node) = b.declaration else {
            return Ok(RefactoringStatus::fatal("the selected name is not a constant"));
        };
        let Some(declaration) = dast.parent(name_node).filter(|_| dast.slot(name_node) == Slot::Name) else {
            return Ok(RefactoringStatus::fatal("destructured names cannot be inlined"));
        };
        let valid = match b.kind {
            BindingKind::Local => dast.kind(declaration) == NodeKind::Declarator,
            BindingKind::Field => b.is_static && dast.kind(declaration) == NodeKind::FieldDecl,
            _ => false,
        };
        if !valid {
            return Ok(RefactoringStatus::fatal(format!(
                "'{}' is neither a local constant nor a static field",
                b.name
            )));
        }
        let Some(value) = dast.child(declaration, Slot::Value) else {
            return Ok(RefactoringStatus::fatal(format!("'{}' has no initializer", b.name)));
        };

        let is_declaration = decl_unit.path == unit.path && node == name_node;
        if !self.inline_all && is_declaration {
            return Ok(RefactoringStatus::fatal("select a reference to inline a single occurrence"));
        }
        self.selected = (!is_declaration).then_some(node);
        self.constant = Some(Constant {
            unit: decl_unit.path.clone(),
            binding,
            value,
            declaration,
            key: SymbolKey::of(dast, binding).filter(|_| b.kind == BindingKind::Field),
        });
        Ok(RefactoringStatus::new())
    }

    fn check_semantics(&mut self, ctx: &RefactoringContext, monitor: &mut dyn ProgressMonitor) -> Result<RefactoringStatus> {
        let constant = self.constant.clone().ok_or_else(not_checked)?;
        let decl_unit = ctx.workspace.require(&constant.unit)?;
        let dast = &decl_unit.ast;
        let mut status = RefactoringStatus::new();

        // (unit, name node, confidence) of every reference.
        let mut references: Vec<(&CompilationUnit, NodeId, ResolutionConfidence)> = match &constant.key {
            Some(key) => find_references(ctx, key, monitor)?
                .into_iter()
                .map(|r| {
                    warn_low_confidence(&mut status, &r, &format!("reference to {key}"));
                    (r.unit, r.node, r.confidence)
                })
                .collect(),
            None => UsageAnalyzer::new(dast)
                .references(constant.binding, dast.root())
                .into_iter()
                .map(|u| (decl_unit, u.node, ResolutionConfidence::Certain))
                .collect(),
        };

        for (unit, node, _) in &references {
            if is_assignment_target(&unit.ast, replaced_node(&unit.ast, *node)) {
                status.add_at(
                    Severity::Fatal,
                    "the constant is assigned here",
                    unit,
                    unit.ast.range(*node),
                );
            }
        }
        if status.has_fatal() {
            return Ok(status);
        }

        let total = references.len();
        if !self.inline_all {
            let target = ctx.unit()?;
            references.retain(|(unit, node, _)| unit.path == target.path && Some(*node) == self.selected);
        }
        self.remove = self.remove_declaration && references.len() == total;

        let used: Vec<(NodeId, BindingId)> = std::iter::once(constant.value)
            .chain(dast.descendants(constant.value))
            .filter_map(|n| dast.binding_of(n).map(|b| (n, b)))
            .filter(|(_, b)| !matches!(dast.binding(*b).kind, BindingKind::Method | BindingKind::Field))
            .collect();
        let uses_this = std::iter::once(constant.value)
            .chain(dast.descendants(constant.value))
            .any(|n| dast.kind(n) == NodeKind::This);

        self.sites.clear();
        for (unit, node, _) in references {
            let target = replaced_node(&unit.ast, node);
            let hidden = used
                .iter()
                .find(|(_, b)| !visible_at(decl_unit, *b, unit, target))
                .map(|(n, _)| dast.text(*n, &decl_unit.source));
            if let Some(name) = hidden {
                status.add_at(
                    Severity::Error,
                    format!("'{name}' used by the value is not visible here"),
                    unit,
                    unit.ast.range(target),
                );
            }
            if uses_this && target != node {
                status.add_at(
                    Severity::Error,
                    "the value refers to 'this', which means something else here",
                    unit,
                    unit.ast.range(target),
                );
            }
            self.sites.push(Site {
                unit: unit.path.clone(),
                target,
            });
        }
        tracing::debug!(sites = self.sites.len(), remove = self.remove, "inline constant references");
        Ok(status)
    }

    fn compute_edits(&mut self, ctx: &RefactoringContext, _monitor: &mut dyn ProgressMonitor) -> Result<Change> {
        let constant = self.constant.as_ref().ok_or_else(not_checked)?;
        let decl_unit = ctx.workspace.require(&constant.unit)?;
        let dast = &decl_unit.ast;
        let value_text = dast.text(constant.value, &decl_unit.source);
        let mut builder = ChangeBuilder::new();

        for site in &self.sites {
            let unit = ctx.workspace.require(&site.unit)?;
            let text = parenthesize(value_text, dast, constant.value, &unit.ast, site.target, &ctx.config);
            let rewrite = builder.rewrite(unit);
            let id = rewrite.create_string_placeholder(text, dast.kind(constant.value));
            rewrite.replace(&unit.ast, site.target, id, None)?;
        }

        if self.remove {
            let rewrite = builder.rewrite(decl_unit);
            let declaration = constant.declaration;
            let removed = match dast.parent(declaration) {
                Some(list) if dast.kind(declaration) == NodeKind::Declarator
                    && dast.children_in(list, Slot::Declarators).count() == 1 =>
                {
                    list
                }
                _ => declaration,
            };
            rewrite.remove(dast, removed, None)?;
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

    fn run(ctx: &RefactoringContext, op: &mut InlineConstant) -> RefactoringResult {
        RefactoringRunner::new().run(op, ctx).unwrap()
    }

    fn single(src: &str, selected: &str, op: &mut InlineConstant) -> String {
        let ctx = RefactoringContext::for_source("t.js", src).unwrap().select(selected);
        let change = run(&ctx, op).into_change().unwrap();
        change.new_source(Path::new("t.js")).unwrap().to_string()
    }

    #[test]
    fn test_inline_local_constant_and_remove_it() {
        let src = "function f(price) {\n    const rate = 0.2;\n    return price * rate;\n}\n";
        assert_eq!(
            single(src, "rate", &mut InlineConstant::new()),
            "function f(price) {\n    return price * 0.2;\n}\n"
        );
    }

    #[test]
    fn test_value_is_parenthesized_where_needed() {
        let src = "const d = a + b;\nlog(d * 2);\n";
        assert_eq!(single(src, "d", &mut InlineConstant::new()), "log((a + b) * 2);\n");
    }

    #[test]
    fn test_single_reference_keeps_declaration() {
        let src = "const n = 3;\nlog(n);\nlog(n);\n";
        let offset = src.find("log(n)").unwrap() + 4;
        let ctx = RefactoringContext::for_source("t.js", src).unwrap().with_selection(offset, 1);
        let change = run(&ctx, &mut InlineConstant::new().inline_all(false)).into_change().unwrap();
        assert_eq!(change.new_source(Path::new("t.js")).unwrap(), "const n = 3;\nlog(3);\nlog(n);\n");
    }

    #[test]
    fn test_assigned_variable_is_fatal() {
        let ctx = RefactoringContext::for_source("t.js", "let n = 1;\nn = 2;\nlog(n);\n").unwrap().select("n");
        assert!(run(&ctx, &mut InlineConstant::new()).status.has_fatal());
    }

    fn workspace(files: &[(&str, &str)]) -> Workspace {
        let mut workspace = Workspace::new();
        for (path, source) in files {
            workspace.add_source(*path, *source).unwrap();
        }
        workspace
    }

    #[test]
    fn test_static_field_is_inlined_across_units() {
        let ws = workspace(&[
            ("lib.js", "class Config {\n    static LIMIT = 10;\n    check(x) {\n        return x < Config.LIMIT;\n    }\n}\n"),
            ("main.js", "if (n > Config.LIMIT) {\n    stop();\n}\n"),
        ]);
        let ctx = RefactoringContext::new(ws, "lib.js").select("LIMIT");
        let change = run(&ctx, &mut InlineConstant::new()).into_change().unwrap();
        assert_eq!(
            change.new_source(Path::new("lib.js")).unwrap(),
            "class Config {\n    check(x) {\n        return x < 10;\n    }\n}\n"
        );
        assert_eq!(change.new_source(Path::new("main.js")).unwrap(), "if (n > 10) {\n    stop();\n}\n");
    }

    #[test]
    fn test_value_not_visible_in_other_unit_is_an_error() {
        let ws = workspace(&[
            ("lib.js", "const BASE = 5;\nclass A {\n    static B = BASE * 2;\n}\n"),
            ("main.js", "log(A.B);\n"),
        ]);
        let ctx = RefactoringContext::new(ws, "lib.js").select_nth("B", 1);
        let result = run(&ctx, &mut InlineConstant::new());
        assert!(result.status.has_error());
        assert_eq!(
            result.change.unwrap().new_source(Path::new("main.js")).unwrap(),
            "log(BASE * 2);\n"
        );
    }
}
