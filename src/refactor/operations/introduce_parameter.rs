//! Introduce Parameter: replace an expression with a new parameter and pass
//! the expression from every caller.

use std::path::PathBuf;

use crate::ast::{CompilationUnit, NodeId, NodeKind, Slot};
use crate::error::Result;
use crate::scope::selection::SelectedRegion;
use crate::scope::{BindingId, CodeScope, ProgressMonitor, SelectionAnalyzer, SymbolKey, UsageAnalyzer};

use super::support::{
    arguments, enclosing_call, find_references, is_assignment_target, not_checked, same_frame_descendants,
    selection_status, this_references, visible_at, warn_low_confidence,
};
use super::{Change, ChangeBuilder, RefactoringContext, RefactoringOperation, RefactoringStatus, Severity, check_identifier};

#[derive(Debug, Clone)]
struct Target {
    function: NodeId,
    binding: BindingId,
    expression: NodeId,
}

/// Turn the selected expression into a new last parameter of the enclosing
/// function or method.
#[derive(Debug, Clone)]
pub struct IntroduceParameter {
    pub name: String,
    target: Option<Target>,
    /// Calls to update, with the unit they are in.
    calls: Vec<(PathBuf, NodeId)>,
}

impl IntroduceParameter {
    /// Create a new IntroduceParameter operation.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: None,
            calls: Vec::new(),
        }
    }
}

impl RefactoringOperation for IntroduceParameter {
    fn name(&self) -> &'static str {
        "Introduce Parameter"
    }

    fn check_selection(&mut self, ctx: &RefactoringContext) -> Result<RefactoringStatus> {
        let unit = ctx.unit()?;
        let ast = &unit.ast;
        let status = check_identifier(&self.name, "parameter");
        if status.has_fatal() {
            return Ok(status);
        }
        let expr = match SelectionAnalyzer::new(ast, &unit.source, ctx.selection).region(ast) {
            Ok(SelectedRegion::Expression(expr)) => expr,
            Ok(SelectedRegion::Statements(_)) => return Ok(RefactoringStatus::fatal("select an expression")),
            Err(e) => return Ok(selection_status(e)),
        };
        if is_assignment_target(ast, expr) {
            return Ok(RefactoringStatus::fatal("cannot replace an assignment target with a parameter"));
        }
        let Some(function) = ast
            .enclosing_function(expr)
            .filter(|f| matches!(ast.kind(*f), NodeKind::FunctionDecl | NodeKind::MethodDecl))
        else {
            return Ok(RefactoringStatus::fatal(
                "the expression is not directly inside a function declaration or method",
            ));
        };
        let Some(binding) = ast.child(function, Slot::Name).and_then(|n| ast.binding_of(n)) else {
            return Ok(RefactoringStatus::fatal("the enclosing function has no name"));
        };
        if ast.binding(binding).name == "constructor" {
            return Ok(RefactoringStatus::fatal("constructors are not supported"));
        }
        if ast
            .children_in(function, Slot::Params)
            .last()
            .is_some_and(|p| ast.text(p, &unit.source).starts_with("..."))
        {
            return Ok(RefactoringStatus::fatal("the function has a rest parameter"));
        }

        let nodes: Vec<NodeId> = std::iter::once(expr).chain(ast.descendants(expr)).collect();
        for node in &nodes {
            let local = ast
                .binding_of(*node)
                .and_then(|b| ast.binding(b).declaration)
                .is_some_and(|d| ast.is_ancestor_or_self(function, d));
            if local {
                return Ok(RefactoringStatus::fatal(format!(
                    "the expression uses '{}', which is local to the function",
                    ast.text(*node, &unit.source)
                )));
            }
        }
        let frame: Vec<NodeId> = std::iter::once(expr).chain(same_frame_descendants(ast, expr)).collect();
        if ast.kind(expr) == NodeKind::This
            || !this_references(ast, expr).is_empty()
            || frame.iter().any(|n| {
                ast.kind(*n) == NodeKind::Super
                    || (ast.kind(*n) == NodeKind::Name && ast.token(*n) == Some("arguments"))
            })
        {
            return Ok(RefactoringStatus::fatal("the expression depends on the function's receiver or arguments"));
        }
        if CodeScope::at(ast, expr).is_in_use(&self.name) {
            return Ok(RefactoringStatus::fatal(format!("'{}' is already used in the function", self.name)));
        }

        self.target = Some(Target {
            function,
            binding,
            expression: expr,
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

        let free_names: Vec<BindingId> = std::iter::once(target.expression)
            .chain(ast.descendants(target.expression))
            .filter_map(|n| ast.binding_of(n))
            .collect();
        self.calls.clear();
        for (site_unit, node) in references {
            let sast = &site_unit.ast;
            let Some(call) = enclosing_call(sast, node).filter(|c| sast.kind(*c) == NodeKind::Call) else {
                status.add_at(
                    Severity::Warning,
                    "this reference is not a call; calls made through it will not pass the new argument",
                    site_unit,
                    sast.range(node),
                );
                continue;
            };
            if arguments(sast, call).iter().any(|a| sast.kind(*a) == NodeKind::Spread) {
                status.add_at(
                    Severity::Warning,
                    "the call spreads its arguments; the new argument may not line up",
                    site_unit,
                    sast.range(call),
                );
            }
            let recursive = site_unit.path == unit.path && ast.is_ancestor_or_self(target.function, call);
            if !recursive && let Some(hidden) = free_names.iter().find(|b| !visible_at(unit, **b, site_unit, call)) {
                status.add_at(
                    Severity::Error,
                    format!("'{}' is not visible at this call", ast.binding(*hidden).name),
                    site_unit,
                    sast.range(call),
                );
            }
            self.calls.push((site_unit.path.clone(), call));
        }
        tracing::debug!(calls = self.calls.len(), "introduce parameter call sites");
        Ok(status)
    }

    fn compute_edits(&mut self, ctx: &RefactoringContext, _monitor: &mut dyn ProgressMonitor) -> Result<Change> {
        let target = self.target.as_ref().ok_or_else(not_checked)?;
        let unit = ctx.unit()?;
        let ast = &unit.ast;
        let mut builder = ChangeBuilder::new();

        let value = match ast.kind(target.expression) {
            NodeKind::Sequence => format!("({})", ast.text(target.expression, &unit.source)),
            _ => ast.text(target.expression, &unit.source).to_string(),
        };
        let param_count = ast.children_in(target.function, Slot::Params).count();

        {
            let rewrite = builder.rewrite(unit);
            let param = rewrite.create_string_placeholder(self.name.clone(), NodeKind::Param);
            rewrite.list(ast, target.function, Slot::Params).insert_last(param, None);
            let name = rewrite.create_string_placeholder(self.name.clone(), NodeKind::Name);
            rewrite.replace(ast, target.expression, name, None)?;
        }

        for (path, call) in &self.calls {
            let site_unit = ctx.workspace.require(path)?;
            let sast = &site_unit.ast;
            let recursive = site_unit.path == unit.path && ast.is_ancestor_or_self(target.function, *call);
            let passed = if recursive { self.name.clone() } else { value.clone() };
            let missing = param_count.saturating_sub(arguments(sast, *call).len());
            let rewrite = builder.rewrite(site_unit);
            let mut new_arguments = vec!["undefined".to_string(); missing];
            new_arguments.push(passed);
            for argument in new_arguments {
                let id = rewrite.create_string_placeholder(argument, NodeKind::Other);
                rewrite.list(sast, *call, Slot::Arguments).insert_last(id, None);
            }
        }
        builder.build(self.name(), ctx)
    }
}
