//! Extract Method: turn an expression or a run of statements into a new
//! function or method and call it from the original place.

use crate::ast::precedence::parenthesize_for;
use crate::ast::{Ast, NodeId, NodeKind, Slot};
use crate::config::RefactorConfig;
use crate::error::Result;
use crate::flow::{AccessMode, FlowAnalyzer, ReturnKind, branch_escapes};
use crate::rewrite::{AstRewrite, Part};
use crate::scope::binding::this_class;
use crate::scope::selection::SelectedRegion;
use crate::scope::{BindingId, CodeScope, ProgressMonitor, SelectionAnalyzer, UsageAnalyzer};

use super::duplicates::{Duplicate, DuplicateFinder};
use super::support::{
    class_member, is_assignment_target, not_checked, same_frame_descendants, selection_status,
    this_references, top_level_statement,
};
use super::{Change, ChangeBuilder, RefactoringContext, RefactoringOperation, RefactoringStatus, Severity, check_identifier};

/// Where the new declaration goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Destination {
    /// A method of `class`, inserted after the member holding the selection.
    Method {
        class: NodeId,
        member: NodeId,
        is_static: bool,
    },
    /// A function declared after this statement.
    After(NodeId),
    /// A function appended to the unit.
    ModuleEnd,
}

#[derive(Debug, Clone)]
struct Plan {
    region: SelectedRegion,
    destination: Destination,
    return_kind: ReturnKind,
    is_async: bool,
    params: Vec<BindingId>,
    /// Variable whose new value the call hands back.
    returned: Option<BindingId>,
    /// Declaration keyword when `returned` is declared inside the selection.
    returned_keyword: Option<String>,
    /// Variables declared in the selection that are only assigned after it.
    declared_before: Vec<BindingId>,
    duplicates: Vec<Duplicate>,
}

/// Extract the selection into a new function or method.
#[derive(Debug, Clone)]
pub struct ExtractMethod {
    /// Name of the new function.
    pub name: String,
    /// Also replace other occurrences of the same code with calls.
    pub replace_duplicates: bool,
    plan: Option<Plan>,
}

impl ExtractMethod {
    /// Create a new ExtractMethod operation.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            replace_duplicates: false,
            plan: None,
        }
    }

    /// Replace duplicates of the selection as well.
    pub fn replace_duplicates(mut self, replace: bool) -> Self {
        self.replace_duplicates = replace;
        self
    }

    fn call_text(&self, ast: &Ast, plan: &Plan, args: &[String]) -> String {
        let call = match plan.destination {
            Destination::Method {
                class,
                is_static: true,
                ..
            } => {
                let receiver = ast.declared_name(class).unwrap_or("this");
                format!("{receiver}.{}({})", self.name, args.join(", "))
            }
            Destination::Method { .. } => format!("this.{}({})", self.name, args.join(", ")),
            _ => format!("{}({})", self.name, args.join(", ")),
        };
        if plan.is_async {
            format!("await {call}")
        } else {
            call
        }
    }

    /// The call, parenthesized for the place of `target`.
    fn call_expression(&self, ast: &Ast, plan: &Plan, args: &[String], target: NodeId, config: &RefactorConfig) -> String {
        let table = &config.precedence;
        let (level, kind) = if plan.is_async {
            (table.unary, NodeKind::Await)
        } else {
            (table.call, NodeKind::Call)
        };
        parenthesize_for(&self.call_text(ast, plan, args), level, kind, ast, target, table)
    }

    /// Statements that replace a statement region.
    fn call_statements(&self, ast: &Ast, plan: &Plan, args: &[String], returned: Option<&str>, declared_before: &[String], last: NodeId) -> Vec<String> {
        let call = self.call_text(ast, plan, args);
        let mut out: Vec<String> = declared_before.iter().map(|name| format!("let {name};")).collect();
        match (returned, &plan.returned_keyword) {
            (Some(name), Some(keyword)) => out.push(format!("{keyword} {name} = {call};")),
            (Some(name), None) => out.push(format!("{name} = {call};")),
            (None, _) => match plan.return_kind {
                ReturnKind::ValueReturn => out.push(format!("return {call};")),
                ReturnKind::VoidReturn => {
                    out.push(format!("{call};"));
                    if !ends_function_body(ast, last) {
                        out.push("return;".to_string());
                    }
                }
                _ => out.push(format!("{call};")),
            },
        }
        out
    }

    fn declaration(&self, ast: &Ast, plan: &Plan, rewrite: &mut AstRewrite, config: &RefactorConfig) -> Result<(Vec<Part>, NodeKind)> {
        let indent = &config.indent;
        let params: Vec<&str> = plan.params.iter().map(|p| ast.binding(*p).name.as_str()).collect();
        let asyncness = if plan.is_async { "async " } else { "" };
        let (header, kind) = match plan.destination {
            Destination::Method { is_static, .. } => {
                let staticness = if is_static { "static " } else { "" };
                (
                    format!("{staticness}{asyncness}{}({}) {{", self.name, params.join(", ")),
                    NodeKind::MethodDecl,
                )
            }
            _ => (
                format!("{asyncness}function {}({}) {{", self.name, params.join(", ")),
                NodeKind::FunctionDecl,
            ),
        };

        let mut parts = vec![Part::Text(header)];
        match &plan.region {
            SelectedRegion::Expression(expr) => {
                let moved = rewrite.create_move_target(ast, *expr)?;
                parts.push(Part::Text(format!("\n{indent}return ")));
                parts.push(Part::Node(moved));
                parts.push(";".into());
            }
            SelectedRegion::Statements(nodes) => {
                for node in nodes {
                    let moved = rewrite.create_move_target(ast, *node)?;
                    parts.push(Part::Text(format!("\n{indent}")));
                    parts.push(Part::Node(moved));
                }
                if let Some(returned) = plan.returned {
                    parts.push(Part::Text(format!("\n{indent}return {};", ast.binding(returned).name)));
                }
            }
        }
        parts.push("\n}".into());
        Ok((parts, kind))
    }

    fn replace_duplicate(&self, ast: &Ast, plan: &Plan, duplicate: &Duplicate, rewrite: &mut AstRewrite, config: &RefactorConfig) -> Result<()> {
        let name = |b: BindingId| ast.binding(duplicate.binding_for(b)).name.clone();
        let args: Vec<String> = plan.params.iter().map(|p| name(*p)).collect();
        let first = duplicate.nodes[0];
        let last = duplicate.nodes[duplicate.nodes.len() - 1];
        if plan.region.is_expression() {
            let text = self.call_expression(ast, plan, &args, first, config);
            let id = rewrite.create_string_placeholder(text, NodeKind::Call);
            rewrite.replace(ast, first, id, None)?;
            return Ok(());
        }
        let returned = plan.returned.map(name);
        let declared_before: Vec<String> = plan.declared_before.iter().map(|b| name(*b)).collect();
        let statements = self.call_statements(ast, plan, &args, returned.as_deref(), &declared_before, last);
        let id = rewrite.create_string_placeholder(statements.join(&config.line_delimiter), NodeKind::ExprStmt);
        rewrite.replace(ast, first, id, None)?;
        for node in &duplicate.nodes[1..] {
            rewrite.remove(ast, *node, None)?;
        }
        Ok(())
    }
}

/// The statements an `after` analysis walks for code around `node`.
fn frame_body(ast: &Ast, node: NodeId) -> Vec<NodeId> {
    match ast.enclosing_function(node) {
        Some(function) => ast.children_in(function, Slot::Body).collect(),
        None => ast.children_in(ast.root(), Slot::Statements).collect(),
    }
}

fn ends_function_body(ast: &Ast, statement: NodeId) -> bool {
    let Some(block) = ast.parent(statement) else {
        return false;
    };
    ast.kind(block) == NodeKind::Block
        && ast.parent(block).is_some_and(|f| ast.kind(f).is_function_like())
        && ast.children_in(block, Slot::Statements).last() == Some(statement)
}

fn destination(ast: &Ast, nodes: &[NodeId]) -> Option<Destination> {
    let first = nodes[0];
    if let Some((class, is_static)) = this_class(ast, first) {
        let member = class_member(ast, first)?;
        return Some(Destination::Method {
            class,
            member,
            is_static,
        });
    }
    match ast.enclosing_function(first) {
        Some(function) => ast.enclosing_list_statement(function).map(Destination::After),
        None => {
            let top = top_level_statement(ast, first);
            if nodes.contains(&top) {
                Some(Destination::ModuleEnd)
            } else {
                Some(Destination::After(top))
            }
        }
    }
}

/// Declaration keyword of the variable declared by `name`.
fn declaration_keyword(ast: &Ast, name: NodeId) -> String {
    ast.parent(name)
        .filter(|d| ast.kind(*d) == NodeKind::Declarator)
        .and_then(|d| ast.parent(d))
        .and_then(|v| ast.token(v))
        .unwrap_or("let")
        .to_string()
}

impl RefactoringOperation for ExtractMethod {
    fn name(&self) -> &'static str {
        "Extract Method"
    }

    fn check_selection(&mut self, ctx: &RefactoringContext) -> Result<RefactoringStatus> {
        let unit = ctx.unit()?;
        let ast = &unit.ast;
        let status = check_identifier(&self.name, "method");
        if status.has_fatal() {
            return Ok(status);
        }

        let region = match SelectionAnalyzer::new(ast, &unit.source, ctx.selection).region(ast) {
            Ok(region) => region,
            Err(e) => return Ok(selection_status(e)),
        };
        let nodes = region.nodes().to_vec();
        if let SelectedRegion::Expression(expr) = &region
            && is_assignment_target(ast, *expr)
        {
            return Ok(RefactoringStatus::fatal("cannot extract the target of an assignment"));
        }
        if !branch_escapes(ast, &nodes).is_empty() {
            return Ok(RefactoringStatus::fatal(
                "the selection contains a break or continue that leaves it",
            ));
        }

        let frame: Vec<NodeId> = nodes
            .iter()
            .flat_map(|n| std::iter::once(*n).chain(same_frame_descendants(ast, *n)))
            .collect();
        if frame
            .iter()
            .any(|n| ast.kind(*n) == NodeKind::Name && ast.token(*n) == Some("arguments"))
        {
            return Ok(RefactoringStatus::fatal("the selection refers to 'arguments'"));
        }
        if frame.iter().any(|n| ast.node(*n).syntax_kind == "yield_expression") {
            return Ok(RefactoringStatus::fatal("the selection contains 'yield'"));
        }

        let Some(destination) = destination(ast, &nodes) else {
            return Ok(RefactoringStatus::fatal("there is no place to declare the extracted code"));
        };
        let uses_this = nodes
            .iter()
            .any(|n| ast.kind(*n) == NodeKind::This || !this_references(ast, *n).is_empty())
            || frame.iter().any(|n| ast.kind(*n) == NodeKind::Super);
        if uses_this && !matches!(destination, Destination::Method { .. }) {
            return Ok(RefactoringStatus::fatal(
                "the selection uses 'this' outside of a class method",
            ));
        }

        let flow = FlowAnalyzer::in_out(ast).perform(&nodes);
        let mut return_kind = flow.return_kind();
        if return_kind == ReturnKind::PartialReturn {
            // Falling off the end of the body is the same as `return;`.
            let returns_value = frame
                .iter()
                .any(|n| ast.kind(*n) == NodeKind::Return && ast.child(*n, Slot::Expression).is_some());
            let at_tail = !region.is_expression() && ends_function_body(ast, region.last());
            if returns_value || !at_tail {
                return Ok(RefactoringStatus::fatal(
                    "the selection returns on some paths but not on others",
                ));
            }
            return_kind = ReturnKind::VoidReturn;
        }

        match destination {
            Destination::Method { class, .. } => {
                if ast
                    .bindings()
                    .members_of(class)
                    .iter()
                    .any(|m| ast.binding(*m).name == self.name)
                {
                    return Ok(RefactoringStatus::fatal(format!(
                        "the class already has a member named '{}'",
                        self.name
                    )));
                }
            }
            _ => {
                if CodeScope::at(ast, nodes[0]).is_in_use(&self.name) {
                    return Ok(RefactoringStatus::fatal(format!(
                        "'{}' is already used in this scope",
                        self.name
                    )));
                }
            }
        }

        let is_async = frame.iter().any(|n| ast.kind(*n) == NodeKind::Await);
        tracing::debug!(?destination, nodes = nodes.len(), is_async, "extract method selection");
        self.plan = Some(Plan {
            region,
            destination,
            return_kind,
            is_async,
            params: Vec::new(),
            returned: None,
            returned_keyword: None,
            declared_before: Vec::new(),
            duplicates: Vec::new(),
        });
        Ok(status)
    }

    fn check_semantics(&mut self, ctx: &RefactoringContext, _monitor: &mut dyn ProgressMonitor) -> Result<RefactoringStatus> {
        let unit = ctx.unit()?;
        let ast = &unit.ast;
        let replace_duplicates = self.replace_duplicates;
        let name = self.name.clone();
        let plan = self.plan.as_mut().ok_or_else(not_checked)?;
        let mut status = RefactoringStatus::new();

        let nodes = plan.region.nodes().to_vec();
        let inside = |n: NodeId| nodes.iter().any(|s| ast.is_ancestor_or_self(*s, n));
        let scope = match plan.destination {
            Destination::Method { member, .. } => Some(member),
            Destination::After(statement) => Some(statement),
            Destination::ModuleEnd => None,
        };
        let in_scope = |b: BindingId| {
            ast.binding(b).declaration.is_some_and(|d| {
                !inside(d) && scope.is_some_and(|s| ast.is_ancestor_or_self(s, d))
            })
        };

        let flow = FlowAnalyzer::in_out(ast).perform(&nodes);
        let range = plan.region.range(ast);
        let after = FlowAnalyzer::after(ast, range).perform(&frame_body(ast, nodes[0]));
        let read_after = |b: BindingId| after.get(b).intersects(AccessMode::ANY_READ | AccessMode::UNKNOWN);
        let exits = plan.return_kind.exits();

        let mut params = Vec::new();
        let mut written = Vec::new();
        let mut candidates = Vec::new();
        for (binding, mode) in flow.iter() {
            if !in_scope(binding) {
                continue;
            }
            if mode.intersects(AccessMode::ANY_READ | AccessMode::UNKNOWN) {
                params.push(binding);
            }
            if mode.intersects(AccessMode::ANY_WRITE) {
                written.push(binding);
                if !exits && read_after(binding) {
                    candidates.push(binding);
                    // Not assigned on every path: the old value must go in.
                    if !mode.contains(AccessMode::WRITE) && !params.contains(&binding) {
                        params.push(binding);
                    }
                }
            }
        }

        let mut declared_before = Vec::new();
        for (binding, b) in ast.bindings().iter() {
            let Some(decl) = b.declaration else {
                continue;
            };
            if !inside(decl) || exits {
                continue;
            }
            let mode = after.get(binding);
            if mode.is_unused() {
                continue;
            }
            if !b.kind.is_variable() {
                status.add_at(
                    Severity::Fatal,
                    format!("'{}' is declared in the selection and used after it", b.name),
                    unit,
                    ast.range(decl),
                );
            } else if read_after(binding) {
                candidates.push(binding);
            } else {
                declared_before.push(binding);
            }
        }
        if status.has_fatal() {
            return Ok(status);
        }

        if plan.region.is_expression() && !candidates.is_empty() {
            return Ok(RefactoringStatus::fatal(format!(
                "the expression assigns '{}', which is read afterwards",
                ast.binding(candidates[0]).name
            )));
        }
        if candidates.len() > 1 {
            let names: Vec<&str> = candidates.iter().map(|c| ast.binding(*c).name.as_str()).collect();
            return Ok(RefactoringStatus::fatal(format!(
                "ambiguous return value: the selection assigns {} which are all used afterwards",
                names.join(", ")
            )));
        }

        params.sort_by_key(|p| ast.binding(*p).declaration.map(|d| ast.range(d).start));
        plan.returned = candidates.first().copied();
        plan.returned_keyword = plan
            .returned
            .and_then(|r| ast.binding(r).declaration)
            .filter(|d| inside(*d))
            .map(|d| declaration_keyword(ast, d));
        plan.params = params;
        plan.declared_before = declared_before;

        if replace_duplicates {
            let finder = DuplicateFinder::new(ast, &unit.source, &nodes, &plan.params);
            let root = match plan.destination {
                Destination::Method { class, .. } => class,
                Destination::After(statement) => ast.parent(statement).unwrap_or(ast.root()),
                Destination::ModuleEnd => ast.root(),
            };
            let usage = UsageAnalyzer::new(ast);
            for duplicate in finder.find(root) {
                if let Some(reason) = duplicate_conflict(ast, plan, &finder, &duplicate, &written, &usage, &name) {
                    status.add_at(Severity::Info, reason, unit, duplicate.range(ast));
                    continue;
                }
                if let Some(function) = ast.enclosing_function(duplicate.nodes[0])
                    && ast.body_statements(function) == duplicate.nodes
                {
                    status.add_at(
                        Severity::Warning,
                        "the duplicate is the whole body of its function",
                        unit,
                        duplicate.range(ast),
                    );
                }
                plan.duplicates.push(duplicate);
            }
        }
        tracing::debug!(
            params = plan.params.len(),
            returned = plan.returned.is_some(),
            duplicates = plan.duplicates.len(),
            "extract method analysis"
        );
        Ok(status)
    }

    fn compute_edits(&mut self, ctx: &RefactoringContext, _monitor: &mut dyn ProgressMonitor) -> Result<Change> {
        let unit = ctx.unit()?;
        let ast = &unit.ast;
        let plan = self.plan.as_ref().ok_or_else(not_checked)?;
        let mut builder = ChangeBuilder::new();
        let rewrite = builder.rewrite(unit);
        let args: Vec<String> = plan.params.iter().map(|p| ast.binding(*p).name.clone()).collect();

        match &plan.region {
            SelectedRegion::Expression(expr) => {
                let text = self.call_expression(ast, plan, &args, *expr, &ctx.config);
                let call = rewrite.create_string_placeholder(text, NodeKind::Call);
                rewrite.replace(ast, *expr, call, None)?;
            }
            SelectedRegion::Statements(nodes) => {
                let returned = plan.returned.map(|r| ast.binding(r).name.clone());
                let declared_before: Vec<String> = plan
                    .declared_before
                    .iter()
                    .map(|b| ast.binding(*b).name.clone())
                    .collect();
                let last = nodes[nodes.len() - 1];
                for statement in self.call_statements(ast, plan, &args, returned.as_deref(), &declared_before, last) {
                    let id = rewrite.create_string_placeholder(statement, NodeKind::ExprStmt);
                    rewrite.insert_before(ast, nodes[0], id, None)?;
                }
            }
        }

        let (parts, kind) = self.declaration(ast, plan, rewrite, &ctx.config)?;
        let declaration = rewrite.compose(parts, kind);
        match plan.destination {
            Destination::Method { member, .. } => rewrite.insert_after(ast, member, declaration, None)?,
            Destination::After(statement) => rewrite.insert_after(ast, statement, declaration, None)?,
            Destination::ModuleEnd => rewrite
                .list(ast, ast.root(), Slot::Statements)
                .insert_last(declaration, None),
        }

        for duplicate in &plan.duplicates {
            self.replace_duplicate(ast, plan, duplicate, rewrite, &ctx.config)?;
        }
        builder.build(self.name(), ctx)
    }
}

/// Why a duplicate cannot be replaced by a call, if it cannot.
fn duplicate_conflict(
    ast: &Ast,
    plan: &Plan,
    finder: &DuplicateFinder<'_>,
    duplicate: &Duplicate,
    written: &[BindingId],
    usage: &UsageAnalyzer<'_>,
    name: &str,
) -> Option<String> {
    let returned = plan.returned.map(|r| duplicate.binding_for(r));
    let leaks = finder
        .locals()
        .iter()
        .map(|l| duplicate.binding_for(*l))
        .filter(|l| Some(*l) != returned)
        .any(|l| {
            usage
                .references(l, ast.root())
                .iter()
                .any(|u| !duplicate.contains(ast, u.node))
        });
    if leaks {
        return Some("duplicate declares variables used after it".to_string());
    }
    let after = FlowAnalyzer::after(ast, duplicate.range(ast)).perform(&frame_body(ast, duplicate.nodes[0]));
    let lost = written
        .iter()
        .map(|w| duplicate.binding_for(*w))
        .filter(|w| Some(*w) != returned)
        .any(|w| after.get(w).intersects(AccessMode::ANY_READ | AccessMode::UNKNOWN));
    if lost {
        return Some("duplicate assigns variables read after it".to_string());
    }
    if !matches!(plan.destination, Destination::Method { .. })
        && CodeScope::at(ast, duplicate.nodes[0]).is_in_use(name)
    {
        return Some(format!("'{name}' means something else at the duplicate"));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refactor::operations::{RefactoringResult, RefactoringRunner};
    use pretty_assertions::assert_eq;
    use std::path::Path;

    fn run(src: &str, selected: &str, op: &mut ExtractMethod) -> RefactoringResult {
        let ctx = RefactoringContext::for_source("t.js", src).unwrap().select(selected);
        RefactoringRunner::new().run(op, &ctx).unwrap()
    }

    fn new_source(src: &str, selected: &str, op: &mut ExtractMethod) -> String {
        let change = run(src, selected, op).into_change().unwrap();
        change.new_source(Path::new("t.js")).unwrap().to_string()
    }

    #[test]
    fn test_extract_expression_into_function() {
        let src = "function f() {\n    var a = 1, b = 2;\n    return a + b;\n}\n";
        assert_eq!(
            new_source(src, "a + b", &mut ExtractMethod::new("sum")),
            "function f() {\n    var a = 1, b = 2;\n    return sum(a, b);\n}\n\nfunction sum(a, b) {\n    return a + b;\n}\n"
        );
    }

    #[test]
    fn test_extract_statements_returning_a_local() {
        let src = "function f(items) {\n    let total = 0;\n    for (const x of items) {\n        total += x;\n    }\n    log(total);\n}\n";
        let selected = "let total = 0;\n    for (const x of items) {\n        total += x;\n    }";
        assert_eq!(
            new_source(src, selected, &mut ExtractMethod::new("sumUp")),
            "function f(items) {\n    let total = sumUp(items);\n    log(total);\n}\n\nfunction sumUp(items) {\n    let total = 0;\n    for (const x of items) {\n        total += x;\n    }\n    return total;\n}\n"
        );
    }

    #[test]
    fn test_extract_into_method_updates_outer_variable() {
        let src = "class Cart {\n    total() {\n        let sum = 0;\n        sum += this.tax;\n        return sum;\n    }\n}\n";
        assert_eq!(
            new_source(src, "sum += this.tax;", &mut ExtractMethod::new("addTax")),
            "class Cart {\n    total() {\n        let sum = 0;\n        sum = this.addTax(sum);\n        return sum;\n    }\n\n    addTax(sum) {\n        sum += this.tax;\n        return sum;\n    }\n}\n"
        );
    }

    #[test]
    fn test_ambiguous_return_value_is_fatal() {
        let src = "function f() {\n    let a = 0, b = 0;\n    a = 1;\n    b = 2;\n    log(a, b);\n}\n";
        let result = run(src, "a = 1;\n    b = 2;", &mut ExtractMethod::new("g"));
        assert!(result.status.has_fatal());
        assert!(result.status.first_message().unwrap().contains("ambiguous"));
    }

    #[test]
    fn test_partial_return_is_fatal() {
        let src = "function f(x) {\n    if (x) {\n        return 1;\n    }\n    log(x);\n}\n";
        let result = run(src, "if (x) {\n        return 1;\n    }", &mut ExtractMethod::new("g"));
        assert!(result.status.has_fatal());
    }

    #[test]
    fn test_partial_void_return_at_the_end_of_the_body() {
        let src = "function f(x) {\n    g();\n    if (x) {\n        return;\n    }\n}\n";
        assert_eq!(
            new_source(src, "if (x) {\n        return;\n    }", &mut ExtractMethod::new("h")),
            "function f(x) {\n    g();\n    h(x);\n}\n\nfunction h(x) {\n    if (x) {\n        return;\n    }\n}\n"
        );
    }

    #[test]
    fn test_partial_void_return_before_the_end_is_fatal() {
        let src = "function f(x) {\n    if (x) {\n        return;\n    }\n    log(x);\n}\n";
        let result = run(src, "if (x) {\n        return;\n    }", &mut ExtractMethod::new("g"));
        assert!(result.status.has_fatal());
    }

    #[test]
    fn test_escaping_break_is_fatal() {
        let src = "for (;;) {\n    if (a) {\n        break;\n    }\n}\n";
        let result = run(src, "if (a) {\n        break;\n    }", &mut ExtractMethod::new("g"));
        assert!(result.status.has_fatal());
    }

    #[test]
    fn test_name_clash_is_fatal() {
        let src = "function g() {}\nfunction f(a) {\n    return a + 1;\n}\n";
        let result = run(src, "a + 1", &mut ExtractMethod::new("g"));
        assert!(result.status.has_fatal());
    }

    #[test]
    fn test_duplicates_are_replaced() {
        let src = "function f(a) {\n    log(a * 2);\n}\n\nfunction g(b) {\n    log(b * 2);\n}\n";
        let out = new_source(src, "a * 2", &mut ExtractMethod::new("double").replace_duplicates(true));
        assert!(out.contains("log(double(a));"));
        assert!(out.contains("log(double(b));"));
        assert!(out.contains("function double(a) {\n    return a * 2;\n}"));
    }

    #[test]
    fn test_await_makes_the_function_async() {
        let src = "async function f(url) {\n    const r = await get(url);\n    return r;\n}\n";
        let out = new_source(src, "await get(url)", &mut ExtractMethod::new("load"));
        assert!(out.contains("const r = await load(url);"));
        assert!(out.contains("async function load(url) {\n    return await get(url);\n}"));
    }
}
