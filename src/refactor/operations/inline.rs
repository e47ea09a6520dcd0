//! Inline Method: replace calls of a function or method with its body.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Serialize;

use crate::ast::{Ast, CompilationUnit, NodeId, NodeKind, Slot};
use crate::config::RefactorConfig;
use crate::error::Result;
use crate::refactor::Workspace;
use crate::rewrite::AstRewrite;
use crate::scope::{BindingId, BindingKind, CodeScope, ProgressMonitor, SymbolKey, UsageAnalyzer};
use crate::transform::text::{dedent, indentation_at};

use super::support::{
    arguments, enclosing_call, find_references, is_assignment_target, is_literal, is_pure, not_checked, parenthesize, render,
    same_frame_descendants, simple_param_name, this_references, visible_at, warn_low_confidence,
};
use super::{Change, ChangeBuilder, RefactoringContext, RefactoringOperation, RefactoringStatus, Severity, selected_node};

/// How the value of a call is used where it is inlined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CallContext {
    /// `f(x);`
    ExpressionStatement,
    /// `return f(x);`
    Return,
    /// `a = f(x);`
    AssignmentRhs,
    /// `let a = f(x);`, first declarator.
    Initializer,
    /// Anywhere else inside an expression.
    SubExpression,
}

impl CallContext {
    pub fn of(ast: &Ast, call: NodeId) -> Self {
        let Some(parent) = ast.parent(call) else {
            return CallContext::SubExpression;
        };
        match ast.kind(parent) {
            NodeKind::ExprStmt => CallContext::ExpressionStatement,
            NodeKind::Return => CallContext::Return,
            NodeKind::Assign
                if ast.slot(call) == Slot::Right
                    && ast.parent(parent).is_some_and(|s| ast.kind(s) == NodeKind::ExprStmt) =>
            {
                CallContext::AssignmentRhs
            }
            NodeKind::Declarator if ast.slot(call) == Slot::Value => {
                let first = ast
                    .parent(parent)
                    .and_then(|list| ast.children_in(list, Slot::Declarators).next());
                if first == Some(parent) {
                    CallContext::Initializer
                } else {
                    CallContext::SubExpression
                }
            }
            _ => CallContext::SubExpression,
        }
    }

    /// The statement new statements go before.
    fn statement(self, ast: &Ast, call: NodeId) -> Option<NodeId> {
        let parent = ast.parent(call)?;
        match self {
            CallContext::ExpressionStatement | CallContext::Return => Some(parent),
            CallContext::AssignmentRhs | CallContext::Initializer => ast.parent(parent),
            CallContext::SubExpression => hoisting_statement(ast, call),
        }
    }
}

/// The statement that evaluates `call` inside an expression, when code placed
/// before it runs exactly once and nothing the statement evaluates earlier
/// has a side effect.
fn hoisting_statement(ast: &Ast, call: NodeId) -> Option<NodeId> {
    let mut child = call;
    for parent in ast.ancestors(call) {
        let kind = ast.kind(parent);
        let statement = matches!(kind, NodeKind::ExprStmt | NodeKind::Return | NodeKind::Throw | NodeKind::VarDecl);
        if !statement
            && (!(kind.is_expression() || matches!(kind, NodeKind::Declarator | NodeKind::Property))
                || kind.is_function_like()
                || kind.is_class_like())
        {
            return None;
        }
        let conditional = match kind {
            NodeKind::Conditional => ast.slot(child) != Slot::Condition,
            NodeKind::Binary => {
                ast.slot(child) == Slot::Right && matches!(ast.token(parent), Some("&&" | "||" | "??"))
            }
            _ => false,
        };
        if conditional {
            return None;
        }
        let start = ast.range(child).start;
        let earlier_effect = ast
            .children(parent)
            .iter()
            .any(|s| ast.range(*s).start < start && !is_pure(ast, *s));
        if earlier_effect {
            return None;
        }
        if statement {
            return Some(parent);
        }
        child = parent;
    }
    None
}

/// True when one argument assigns a variable that another argument reads.
fn arguments_interfere(ast: &Ast, args: &[NodeId]) -> bool {
    let written = |arg: NodeId| -> Vec<BindingId> {
        ast.descendants(arg)
            .into_iter()
            .filter(|n| ast.kind(*n) == NodeKind::Name && is_assignment_target(ast, *n))
            .filter_map(|n| ast.binding_of(n))
            .collect()
    };
    args.iter().enumerate().any(|(i, arg)| {
        let writes = written(*arg);
        !writes.is_empty()
            && args.iter().enumerate().any(|(j, other)| {
                j != i
                    && ast
                        .descendants(*other)
                        .into_iter()
                        .any(|n| ast.binding_of(n).is_some_and(|b| writes.contains(&b)))
            })
    })
}

/// What happens to one argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArgumentUse {
    /// Its text replaces the parameter's references.
    Substitute,
    /// It is stored in a local first.
    Temp,
    /// Unused, but evaluated for its side effects.
    Evaluate,
    Drop,
}

#[derive(Debug, Clone)]
struct Callee {
    unit: PathBuf,
    binding: BindingId,
    declaration: NodeId,
    body: NodeId,
    /// Parameter name nodes.
    params: Vec<NodeId>,
    /// Final `return` of the body.
    tail: Option<NodeId>,
    is_method: bool,
}

#[derive(Debug, Clone)]
struct CallSite {
    unit: PathBuf,
    call: NodeId,
    context: CallContext,
}

/// Inline a function or method at one or all of its call sites.
#[derive(Debug, Clone)]
pub struct InlineMethod {
    /// Inline every call rather than the selected one.
    pub inline_all: bool,
    /// Delete the declaration when no reference is left.
    pub delete_declaration: bool,
    callee: Option<Callee>,
    selected_call: Option<NodeId>,
    sites: Vec<CallSite>,
    delete: bool,
}

impl Default for InlineMethod {
    fn default() -> Self {
        Self::new()
    }
}

/// Text that takes the place of one call.
struct Inlined {
    statements: Vec<String>,
    /// Parenthesized for the call's position.
    value: Option<String>,
    /// As written, for statement positions.
    raw_value: Option<String>,
    value_is_pure: bool,
}

impl InlineMethod {
    /// Create a new InlineMethod operation.
    pub fn new() -> Self {
        Self {
            inline_all: true,
            delete_declaration: true,
            callee: None,
            selected_call: None,
            sites: Vec::new(),
            delete: false,
        }
    }

    pub fn inline_all(mut self, all: bool) -> Self {
        self.inline_all = all;
        self
    }

    pub fn delete_declaration(mut self, delete: bool) -> Self {
        self.delete_declaration = delete;
        self
    }
}

/// Finds the declaration of a function or method whose references did not
/// resolve in the selected unit.
fn find_declaration<'w>(workspace: &'w Workspace, name: &str, method: bool) -> Option<(&'w CompilationUnit, BindingId)> {
    let mut found = workspace.units().iter().flat_map(|unit| {
        let ast = &unit.ast;
        ast.bindings()
            .iter()
            .filter(move |(_, b)| {
                b.name == name
                    && if method {
                        b.kind == BindingKind::Method
                    } else {
                        b.kind == BindingKind::Function && b.scope == ast.root()
                    }
            })
            .map(move |(id, _)| (unit, id))
    });
    let first = found.next()?;
    // Only a unique method name identifies a declaration.
    (!method || found.next().is_none()).then_some(first)
}

fn argument_uses(dast: &Ast, callee: &Callee, sast: &Ast, call: NodeId) -> Vec<ArgumentUse> {
    let usage = UsageAnalyzer::new(dast);
    let args = arguments(sast, call);
    let mut uses = Vec::new();
    for (i, param) in callee.params.iter().enumerate() {
        let Some(arg) = args.get(i).copied() else {
            uses.push(ArgumentUse::Substitute);
            continue;
        };
        let Some(binding) = dast.binding_of(*param) else {
            uses.push(ArgumentUse::Temp);
            continue;
        };
        let count = usage.references(binding, callee.body).len();
        let pure = is_pure(sast, arg);
        // A later argument with a side effect must not run before this one is read.
        let later_effect = args.iter().skip(i + 1).any(|a| !is_pure(sast, *a));
        let use_ = if usage.is_reassigned(binding, callee.body) {
            ArgumentUse::Temp
        } else if count == 0 {
            if pure { ArgumentUse::Drop } else { ArgumentUse::Evaluate }
        } else if is_literal(sast, arg) {
            ArgumentUse::Substitute
        } else if later_effect {
            ArgumentUse::Temp
        } else if matches!(sast.kind(arg), NodeKind::Name | NodeKind::This) {
            ArgumentUse::Substitute
        } else if count == 1 && pure {
            ArgumentUse::Substitute
        } else {
            ArgumentUse::Temp
        };
        uses.push(use_);
    }
    for arg in args.iter().skip(callee.params.len()) {
        uses.push(if is_pure(sast, *arg) { ArgumentUse::Drop } else { ArgumentUse::Evaluate });
    }
    uses
}

/// The object a method is called on.
fn receiver(ast: &Ast, call: NodeId) -> Option<NodeId> {
    let callee = ast.child(call, Slot::Callee)?;
    (ast.kind(callee) == NodeKind::Member)
        .then(|| ast.child(callee, Slot::Object))
        .flatten()
}

impl InlineMethod {
    fn check_site(
        &self,
        callee: &Callee,
        decl_unit: &CompilationUnit,
        site_unit: &CompilationUnit,
        call: NodeId,
        status: &mut RefactoringStatus,
    ) -> Option<CallContext> {
        let dast = &decl_unit.ast;
        let sast = &site_unit.ast;
        let range = sast.range(call);
        let context = CallContext::of(sast, call);

        if arguments(sast, call).iter().any(|a| sast.kind(*a) == NodeKind::Spread) {
            status.add_at(Severity::Fatal, "calls with spread arguments cannot be inlined", site_unit, range);
            return None;
        }
        if arguments_interfere(sast, &arguments(sast, call)) {
            status.add_at(
                Severity::Warning,
                "an argument assigns a variable another argument reads; the call is left unchanged",
                site_unit,
                range,
            );
            return None;
        }
        if callee.is_method {
            let pure_receiver = receiver(sast, call).is_some_and(|r| {
                matches!(sast.kind(r), NodeKind::This | NodeKind::Super | NodeKind::Name) || is_pure(sast, r)
            });
            if !pure_receiver {
                status.add_at(
                    Severity::Fatal,
                    "the receiver of this call is too complex to inline",
                    site_unit,
                    range,
                );
                return None;
            }
        }

        let body_statements = dast.body_statements(callee.declaration).len() - usize::from(callee.tail.is_some());
        let uses = argument_uses(dast, callee, sast, call);
        let needs_statements = body_statements > 0
            || uses.iter().any(|u| matches!(u, ArgumentUse::Temp | ArgumentUse::Evaluate));
        if needs_statements {
            match context.statement(sast, call) {
                None => {
                    status.add_at(
                        Severity::Fatal,
                        "the body has statements that cannot run ahead of this expression",
                        site_unit,
                        range,
                    );
                    return None;
                }
                Some(statement) if sast.slot(statement) != Slot::Statements => {
                    status.add_at(
                        Severity::Fatal,
                        "the call is not inside a block; add braces first",
                        site_unit,
                        range,
                    );
                    return None;
                }
                Some(_) => {}
            }
        }

        let inside = |n: NodeId| dast.is_ancestor_or_self(callee.declaration, n);
        for node in dast.descendants(callee.body) {
            let Some(binding) = dast.binding_of(node) else {
                continue;
            };
            let b = dast.binding(binding);
            if matches!(b.kind, BindingKind::Method | BindingKind::Field)
                || b.declaration.is_some_and(inside)
            {
                continue;
            }
            if !visible_at(decl_unit, binding, site_unit, call) {
                status.add_at(
                    Severity::Error,
                    format!("'{}' used by the body is not visible at this call", b.name),
                    site_unit,
                    range,
                );
                break;
            }
        }
        Some(context)
    }

    fn inline_text(
        &self,
        callee: &Callee,
        decl_unit: &CompilationUnit,
        site_unit: &CompilationUnit,
        call: NodeId,
        config: &RefactorConfig,
    ) -> Result<Inlined> {
        let dast = &decl_unit.ast;
        let sast = &site_unit.ast;
        let usage = UsageAnalyzer::new(dast);
        let mut scratch = AstRewrite::new();
        let mut scope = CodeScope::at(sast, call);
        let args = arguments(sast, call);
        for arg in &args {
            for node in std::iter::once(*arg).chain(sast.descendants(*arg)) {
                if sast.kind(node) == NodeKind::Name
                    && let Some(name) = sast.token(node)
                {
                    scope.reserve(name);
                }
            }
        }

        let mut statements = Vec::new();
        // Body nodes replaced by an argument, for parenthesizing the value.
        let mut substituted: HashMap<NodeId, NodeId> = HashMap::new();
        let uses = argument_uses(dast, callee, sast, call);
        for (i, use_) in uses.iter().enumerate() {
            let arg = args.get(i).copied();
            let arg_text = arg.map_or("undefined", |a| sast.text(a, &site_unit.source));
            let param = callee.params.get(i).and_then(|p| dast.binding_of(*p));
            match (use_, param) {
                (ArgumentUse::Substitute, Some(param)) => {
                    for reference in usage.references(param, callee.body) {
                        let text = match arg {
                            Some(arg) => {
                                substituted.insert(reference.node, arg);
                                parenthesize(arg_text, sast, arg, dast, reference.node, config)
                            }
                            None => arg_text.to_string(),
                        };
                        let id = scratch.create_string_placeholder(text, NodeKind::Name);
                        scratch.replace(dast, reference.node, id, None)?;
                    }
                }
                (ArgumentUse::Temp, Some(param)) => {
                    let original = &dast.binding(param).name;
                    let name = scope.create_name(original, true);
                    let keyword = if usage.is_reassigned(param, callee.body) { "let" } else { "const" };
                    statements.push(format!("{keyword} {name} = {arg_text};"));
                    if &name != original {
                        for reference in usage.usages(param, callee.body) {
                            let id = scratch.create_string_placeholder(name.clone(), NodeKind::Name);
                            scratch.replace(dast, reference.node, id, None)?;
                        }
                    }
                }
                (ArgumentUse::Evaluate, _) => statements.push(format!("{arg_text};")),
                _ => {}
            }
        }

        // Locals of the body that clash with names at the call.
        for (binding, b) in dast.bindings().iter() {
            let declared_inside = b
                .declaration
                .is_some_and(|d| dast.is_ancestor_or_self(callee.body, d));
            if !declared_inside || matches!(b.kind, BindingKind::Method | BindingKind::Field) {
                continue;
            }
            let name = scope.create_name(&b.name, true);
            if name != b.name {
                tracing::debug!(from = %b.name, to = %name, "renaming inlined local");
                for reference in usage.usages(binding, callee.body) {
                    let id = scratch.create_string_placeholder(name.clone(), NodeKind::Name);
                    scratch.replace(dast, reference.node, id, None)?;
                }
            }
        }

        if callee.is_method {
            let receiver_text = match receiver(sast, call) {
                Some(r) if sast.kind(r) == NodeKind::Super => "this",
                Some(r) => sast.text(r, &site_unit.source),
                None => "this",
            };
            for this in this_references(dast, callee.body) {
                let id = scratch.create_string_placeholder(receiver_text.to_string(), NodeKind::Name);
                scratch.replace(dast, this, id, None)?;
            }
        }

        for statement in dast.body_statements(callee.declaration) {
            if Some(statement) == callee.tail {
                continue;
            }
            let text = render(decl_unit, &scratch, statement, config)?;
            let indent = indentation_at(&decl_unit.source, dast.range(statement).start);
            statements.push(dedent(&text, indent));
        }

        let returned = callee.tail.and_then(|r| dast.child(r, Slot::Expression));
        let (value, raw_value, value_is_pure) = match returned {
            Some(expr) => {
                let raw = render(decl_unit, &scratch, expr, config)?;
                let raw = dedent(&raw, indentation_at(&decl_unit.source, dast.range(expr).start));
                let value = match substituted.get(&expr) {
                    Some(arg) => parenthesize(&raw, sast, *arg, sast, call, config),
                    None => parenthesize(&raw, dast, expr, sast, call, config),
                };
                (Some(value), Some(raw), is_pure(dast, expr))
            }
            None => (None, None, true),
        };
        Ok(Inlined {
            statements,
            value,
            raw_value,
            value_is_pure,
        })
    }
}

impl RefactoringOperation for InlineMethod {
    fn name(&self) -> &'static str {
        "Inline Method"
    }

    fn check_selection(&mut self, ctx: &RefactoringContext) -> Result<RefactoringStatus> {
        let unit = ctx.unit()?;
        let ast = &unit.ast;
        let node = selected_node(unit, ctx.selection);
        let name = match ast.kind(node) {
            NodeKind::Name | NodeKind::PropertyName => Some(node),
            NodeKind::Call => ast.child(node, Slot::Callee).and_then(|c| match ast.kind(c) {
                NodeKind::Name => Some(c),
                NodeKind::Member => ast.child(c, Slot::Property),
                _ => None,
            }),
            _ => None,
        };
        let Some(name) = name else {
            return Ok(RefactoringStatus::fatal("select a function or a call to it"));
        };

        let resolved = ast
            .binding_of(name)
            .filter(|b| matches!(ast.binding(*b).kind, BindingKind::Function | BindingKind::Method))
            .map(|b| (unit, b));
        let resolved = resolved.or_else(|| {
            let is_method = ast.kind(name) == NodeKind::PropertyName;
            find_declaration(&ctx.workspace, ast.token(name)?, is_method)
        });
        let Some((decl_unit, binding)) = resolved else {
            return Ok(RefactoringStatus::fatal("cannot find the declaration of the selected function"));
        };

        let dast = &decl_unit.ast;
        let b = dast.binding(binding);
        let Some(declaration) = b
            .declaration
            .and_then(|n| dast.parent(n))
            .filter(|d| matches!(dast.kind(*d), NodeKind::FunctionDecl | NodeKind::MethodDecl))
        else {
            return Ok(RefactoringStatus::fatal(format!("'{}' is not a function declaration", b.name)));
        };
        if b.name == "constructor" {
            return Ok(RefactoringStatus::fatal("constructors cannot be inlined"));
        }
        let Some(body) = dast.child(declaration, Slot::Body).filter(|b| dast.kind(*b) == NodeKind::Block) else {
            return Ok(RefactoringStatus::fatal(format!("'{}' has no body", b.name)));
        };

        let mut params = Vec::new();
        for param in dast.children_in(declaration, Slot::Params) {
            match simple_param_name(dast, param) {
                Some(name) => params.push(name),
                None => {
                    return Ok(RefactoringStatus::fatal(
                        "functions with default, rest or destructured parameters cannot be inlined",
                    ));
                }
            }
        }

        let header = &decl_unit.source[dast.range(declaration).start..dast.range(body).start];
        if header.contains('*') || header.split(|c: char| !c.is_alphanumeric()).any(|w| w == "async") {
            return Ok(RefactoringStatus::fatal("async functions and generators cannot be inlined"));
        }
        let frame = same_frame_descendants(dast, body);
        if frame.iter().any(|n| dast.kind(*n) == NodeKind::Name && dast.token(*n) == Some("arguments")) {
            return Ok(RefactoringStatus::fatal("the body refers to 'arguments'"));
        }
        if frame.iter().any(|n| dast.kind(*n) == NodeKind::Super) {
            return Ok(RefactoringStatus::fatal("the body uses 'super'"));
        }
        if dast.descendants(body).into_iter().any(|n| dast.binding_of(n) == Some(binding)) {
            return Ok(RefactoringStatus::fatal(format!("'{}' is recursive", b.name)));
        }
        let is_method = dast.kind(declaration) == NodeKind::MethodDecl;
        if !is_method && !this_references(dast, body).is_empty() {
            return Ok(RefactoringStatus::fatal("the function uses 'this'"));
        }

        let tail = dast
            .body_statements(declaration)
            .last()
            .copied()
            .filter(|s| dast.kind(*s) == NodeKind::Return);
        let returns_in_middle = frame
            .iter()
            .any(|n| dast.kind(*n) == NodeKind::Return && Some(*n) != tail);
        if returns_in_middle {
            return Ok(RefactoringStatus::fatal("the body returns before its last statement"));
        }

        let is_declaration = decl_unit.path == unit.path && b.declaration == Some(name);
        if is_declaration {
            if !self.inline_all {
                return Ok(RefactoringStatus::fatal("select a call to inline a single occurrence"));
            }
            self.selected_call = None;
        } else {
            let Some(call) = enclosing_call(ast, name).filter(|c| ast.kind(*c) == NodeKind::Call) else {
                return Ok(RefactoringStatus::fatal("the selected reference is not a call"));
            };
            self.selected_call = Some(call);
        }

        self.callee = Some(Callee {
            unit: decl_unit.path.clone(),
            binding,
            declaration,
            body,
            params,
            tail,
            is_method,
        });
        Ok(RefactoringStatus::new())
    }

    fn check_semantics(&mut self, ctx: &RefactoringContext, monitor: &mut dyn ProgressMonitor) -> Result<RefactoringStatus> {
        let callee = self.callee.clone().ok_or_else(not_checked)?;
        let decl_unit = ctx.workspace.require(&callee.unit)?;
        let dast = &decl_unit.ast;
        let target = ctx.unit()?;
        let mut status = RefactoringStatus::new();

        let references: Vec<(&CompilationUnit, NodeId)> = match SymbolKey::of(dast, callee.binding) {
            Some(key) => find_references(ctx, &key, monitor)?
                .into_iter()
                .map(|r| {
                    warn_low_confidence(&mut status, &r, &format!("call of {key}"));
                    (r.unit, r.node)
                })
                .collect(),
            None => UsageAnalyzer::new(dast)
                .references(callee.binding, dast.root())
                .into_iter()
                .map(|u| (decl_unit, u.node))
                .collect(),
        };

        let mut kept = 0;
        self.sites.clear();
        for (unit, node) in references {
            let ast = &unit.ast;
            let Some(call) = enclosing_call(ast, node).filter(|c| ast.kind(*c) == NodeKind::Call) else {
                status.add_at(
                    Severity::Warning,
                    "this reference is not a call and is left unchanged",
                    unit,
                    ast.range(node),
                );
                kept += 1;
                continue;
            };
            if !self.inline_all && (unit.path != target.path || Some(call) != self.selected_call) {
                kept += 1;
                continue;
            }
            match self.check_site(&callee, decl_unit, unit, call, &mut status) {
                Some(context) => self.sites.push(CallSite {
                    unit: unit.path.clone(),
                    call,
                    context,
                }),
                None => kept += 1,
            }
        }

        // A call nested in the arguments of another is left alone.
        let all = self.sites.clone();
        self.sites.retain(|site| {
            let Ok(unit) = ctx.workspace.require(&site.unit) else {
                return false;
            };
            let nested = all.iter().any(|other| {
                other.unit == site.unit
                    && other.call != site.call
                    && unit.ast.is_ancestor_or_self(other.call, site.call)
            });
            if nested {
                status.add_at(
                    Severity::Info,
                    "a call nested in another inlined call is left unchanged",
                    unit,
                    unit.ast.range(site.call),
                );
                kept += 1;
            }
            !nested
        });

        if self.sites.is_empty() && !status.has_fatal() {
            status.add_fatal("no call can be inlined");
        }
        self.delete = self.delete_declaration && kept == 0;
        tracing::debug!(sites = self.sites.len(), delete = self.delete, "inline method call sites");
        Ok(status)
    }

    fn compute_edits(&mut self, ctx: &RefactoringContext, _monitor: &mut dyn ProgressMonitor) -> Result<Change> {
        let callee = self.callee.as_ref().ok_or_else(not_checked)?;
        let decl_unit = ctx.workspace.require(&callee.unit)?;
        let mut builder = ChangeBuilder::new();

        for site in &self.sites {
            let unit = ctx.workspace.require(&site.unit)?;
            let ast = &unit.ast;
            let inlined = self.inline_text(callee, decl_unit, unit, site.call, &ctx.config)?;
            let delimiter = &ctx.config.line_delimiter;
            let rewrite = builder.rewrite(unit);
            let Some(statement) = site.context.statement(ast, site.call) else {
                let value = inlined.value.unwrap_or_else(|| "undefined".to_string());
                let id = rewrite.create_string_placeholder(value, NodeKind::Paren);
                rewrite.replace(ast, site.call, id, None)?;
                continue;
            };

            match site.context {
                CallContext::ExpressionStatement | CallContext::Return => {
                    let mut lines = inlined.statements;
                    match (site.context, inlined.raw_value) {
                        (CallContext::Return, Some(raw)) => lines.push(format!("return {raw};")),
                        (CallContext::Return, None) => lines.push("return;".to_string()),
                        (_, Some(raw)) if !inlined.value_is_pure => {
                            if raw.starts_with('{') || raw.starts_with("function") {
                                lines.push(format!("({raw});"));
                            } else {
                                lines.push(format!("{raw};"));
                            }
                        }
                        _ => {}
                    }
                    if lines.is_empty() {
                        rewrite.remove(ast, statement, None)?;
                    } else {
                        let id = rewrite.create_string_placeholder(lines.join(delimiter), NodeKind::ExprStmt);
                        rewrite.replace(ast, statement, id, None)?;
                    }
                }
                _ => {
                    for line in inlined.statements {
                        let id = rewrite.create_string_placeholder(line, NodeKind::ExprStmt);
                        rewrite.insert_before(ast, statement, id, None)?;
                    }
                    let value = inlined.value.unwrap_or_else(|| "undefined".to_string());
                    let id = rewrite.create_string_placeholder(value, NodeKind::Paren);
                    rewrite.replace(ast, site.call, id, None)?;
                }
            }
        }

        if self.delete {
            let rewrite = builder.rewrite(decl_unit);
            rewrite.remove(&decl_unit.ast, callee.declaration, None)?;
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

    fn run(src: &str, selected: &str, nth: usize, op: &mut InlineMethod) -> RefactoringResult {
        let ctx = RefactoringContext::for_source("t.js", src).unwrap().select_nth(selected, nth);
        RefactoringRunner::new().run(op, &ctx).unwrap()
    }

    fn new_source(result: RefactoringResult) -> String {
        let change = result.into_change().unwrap();
        change.new_source(Path::new("t.js")).unwrap().to_string()
    }

    #[test]
    fn test_call_context() {
        let unit = CompilationUnit::parse("t.js", "function t() { f(); return g(); }\na = h();\nlet b = k(), c = m();\nn(p());\n").unwrap();
        let ast = &unit.ast;
        let context = |text: &str| CallContext::of(ast, unit.find(NodeKind::Call, text).unwrap());
        assert_eq!(context("f()"), CallContext::ExpressionStatement);
        assert_eq!(context("g()"), CallContext::Return);
        assert_eq!(context("h()"), CallContext::AssignmentRhs);
        assert_eq!(context("k()"), CallContext::Initializer);
        assert_eq!(context("m()"), CallContext::SubExpression);
        assert_eq!(context("p()"), CallContext::SubExpression);
    }

    #[test]
    fn test_pure_result_of_statement_call_is_dropped() {
        let src = "function g(x, y) {\n    return x + y;\n}\nfunction f() {\n    g(1, 2);\n}\n";
        assert_eq!(new_source(run(src, "g", 1, &mut InlineMethod::new())), "function f() {\n}\n");
    }

    #[test]
    fn test_expression_call_substitutes_arguments() {
        let src = "function square(n) {\n    return n * n;\n}\nfunction area(side) {\n    return square(side) + 1;\n}\n";
        assert_eq!(
            new_source(run(src, "square(side)", 0, &mut InlineMethod::new())),
            "function area(side) {\n    return side * side + 1;\n}\n"
        );
    }

    #[test]
    fn test_impure_argument_goes_into_a_temp() {
        let src = "function show(msg) {\n    const line = `> ${msg}`;\n    print(line);\n}\nfunction run() {\n    show(read());\n}\n";
        assert_eq!(
            new_source(run(src, "show(read())", 0, &mut InlineMethod::new())),
            "function run() {\n    const msg = read();\n    const line = `> ${msg}`;\n    print(line);\n}\n"
        );
    }

    #[test]
    fn test_method_body_uses_receiver() {
        let src = "class Counter {\n    inc() {\n        this.count += 1;\n    }\n    twice() {\n        this.inc();\n        this.inc();\n    }\n}\n";
        assert_eq!(
            new_source(run(src, "inc", 1, &mut InlineMethod::new())),
            "class Counter {\n    twice() {\n        this.count += 1;\n        this.count += 1;\n    }\n}\n"
        );
    }

    #[test]
    fn test_recursive_function_is_fatal() {
        let src = "function f(n) {\n    return f(n - 1);\n}\nf(3);\n";
        assert!(run(src, "f(3)", 0, &mut InlineMethod::new()).status.has_fatal());
    }

    #[test]
    fn test_early_return_is_fatal() {
        let src = "function f(a) {\n    if (a) {\n        return 1;\n    }\n    return 2;\n}\nlog(f(1));\n";
        assert!(run(src, "f(1)", 0, &mut InlineMethod::new()).status.has_fatal());
    }

    #[test]
    fn test_single_call_keeps_declaration() {
        let src = "function one() {\n    return 1;\n}\nlog(one());\nlog(one());\n";
        assert_eq!(
            new_source(run(src, "one()", 1, &mut InlineMethod::new().inline_all(false))),
            "function one() {\n    return 1;\n}\nlog(1);\nlog(one());\n"
        );
    }

    #[test]
    fn test_returned_parameter_is_replaced_by_argument() {
        let src = "function id(x) {\n    return x;\n}\nlog(id(5));\n";
        assert_eq!(new_source(run(src, "id(5)", 0, &mut InlineMethod::new())), "log(5);\n");
    }

    #[test]
    fn test_arguments_before_a_side_effect_go_into_temps() {
        let src = "function f(x, y) {\n    return x + y;\n}\nfunction g(a) {\n    return f(a, next());\n}\n";
        assert_eq!(
            new_source(run(src, "f(a, next())", 0, &mut InlineMethod::new())),
            "function g(a) {\n    const x = a;\n    const y = next();\n    return x + y;\n}\n"
        );
    }

    #[test]
    fn test_argument_assigning_another_arguments_variable_is_left_alone() {
        let src = "function f(x, y) {\n    return x + y;\n}\nfunction g(a) {\n    const r = f(a, a = 5);\n    return r;\n}\n";
        let result = run(src, "f(a, a = 5)", 0, &mut InlineMethod::new());
        assert!(result.status.has_fatal());
        assert!(
            result
                .status
                .messages(Severity::Warning)
                .iter()
                .any(|m| m.contains("another argument reads"))
        );
    }

    #[test]
    fn test_statements_go_before_the_enclosing_statement() {
        let src = "function sq(n) {\n    return n * n;\n}\nfunction f(a) {\n    log(sq(a + 1));\n}\n";
        assert_eq!(
            new_source(run(src, "sq(a + 1)", 0, &mut InlineMethod::new())),
            "function f(a) {\n    const n = a + 1;\n    log(n * n);\n}\n"
        );
    }

    #[test]
    fn test_statements_cannot_precede_a_short_circuit_operand() {
        let src = "function sq(n) {\n    return n * n;\n}\nfunction f(a, ok) {\n    return ok && sq(a + 1);\n}\n";
        assert!(run(src, "sq(a + 1)", 0, &mut InlineMethod::new()).status.has_fatal());
    }

    #[test]
    fn test_clashing_local_is_renamed() {
        let src = "function twice(v) {\n    const r = v * 2;\n    return r;\n}\nfunction main(r) {\n    const out = twice(r);\n    return out;\n}\n";
        let out = new_source(run(src, "twice(r)", 0, &mut InlineMethod::new()));
        assert_eq!(
            out,
            "function main(r) {\n    const r1 = r * 2;\n    const out = r1;\n    return out;\n}\n"
        );
    }
}
