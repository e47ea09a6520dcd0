//! Extract Variable: name an expression with a local constant.

use crate::ast::{Ast, NodeId, NodeKind, Slot};
use crate::error::Result;
use crate::rewrite::Part;
use crate::scope::selection::SelectedRegion;
use crate::scope::{CodeScope, ProgressMonitor, SelectionAnalyzer, UsageAnalyzer};

use super::duplicates::DuplicateFinder;
use super::support::{is_assignment_target, is_pure, not_checked, selection_status};
use super::{Change, ChangeBuilder, RefactoringContext, RefactoringOperation, RefactoringStatus, check_identifier};

/// Extract the selected expression into `const name = ...;` before the
/// statement that contains it.
#[derive(Debug, Clone)]
pub struct ExtractVariable {
    pub name: String,
    /// Also replace later occurrences of the same expression.
    pub replace_all: bool,
    expression: Option<NodeId>,
    anchor: Option<NodeId>,
    duplicates: Vec<NodeId>,
}

impl ExtractVariable {
    /// Create a new ExtractVariable operation.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            replace_all: false,
            expression: None,
            anchor: None,
            duplicates: Vec::new(),
        }
    }

    pub fn replace_all(mut self, replace_all: bool) -> Self {
        self.replace_all = replace_all;
        self
    }
}

/// Checks the path between `expr` and the statement it will be declared
/// before; a loop re-evaluating the expression is fatal, conditional
/// evaluation is a warning.
fn check_evaluation(ast: &Ast, expr: NodeId, anchor: NodeId, status: &mut RefactoringStatus) {
    let mut node = expr;
    while node != anchor {
        let Some(parent) = ast.parent(node) else {
            break;
        };
        let kind = ast.kind(parent);
        let slot = ast.slot(node);
        if kind.is_loop() && matches!(slot, Slot::Condition | Slot::Update | Slot::Body) {
            status.add_fatal("the expression is evaluated on every iteration of a loop");
            return;
        }
        let conditional = match kind {
            NodeKind::Conditional | NodeKind::If => matches!(slot, Slot::Then | Slot::Else),
            NodeKind::Binary => {
                slot == Slot::Right && matches!(ast.token(parent), Some("&&" | "||" | "??"))
            }
            NodeKind::Assign => {
                slot == Slot::Right && matches!(ast.token(parent), Some("&&=" | "||=" | "??="))
            }
            _ => false,
        };
        if conditional {
            status.add_warning(
                "the expression is only evaluated under a condition; the variable is always evaluated",
            );
        }
        node = parent;
    }
}

impl RefactoringOperation for ExtractVariable {
    fn name(&self) -> &'static str {
        "Extract Variable"
    }

    fn check_selection(&mut self, ctx: &RefactoringContext) -> Result<RefactoringStatus> {
        let unit = ctx.unit()?;
        let ast = &unit.ast;
        let mut status = check_identifier(&self.name, "variable");
        if status.has_fatal() {
            return Ok(status);
        }
        let expr = match SelectionAnalyzer::new(ast, &unit.source, ctx.selection).region(ast) {
            Ok(SelectedRegion::Expression(expr)) => expr,
            Ok(SelectedRegion::Statements(_)) => return Ok(RefactoringStatus::fatal("select an expression to extract")),
            Err(e) => return Ok(selection_status(e)),
        };
        if is_assignment_target(ast, expr) || ast.slot(expr) == Slot::Name {
            return Ok(RefactoringStatus::fatal("cannot extract a name that is being declared or assigned"));
        }
        let Some(anchor) = ast.enclosing_list_statement(expr) else {
            return Ok(RefactoringStatus::fatal("the expression is not inside a statement"));
        };
        if ast.enclosing_function(expr) != ast.enclosing_function(anchor) {
            return Ok(RefactoringStatus::fatal(
                "the expression is the body of an arrow function; add a block body first",
            ));
        }
        check_evaluation(ast, expr, anchor, &mut status);
        if status.has_fatal() {
            return Ok(status);
        }

        // `const a = 1, b = a + 1;` cannot move `a + 1` above `a`.
        for node in std::iter::once(expr).chain(ast.descendants(expr)) {
            let Some(decl) = ast.binding_of(node).and_then(|b| ast.binding(b).declaration) else {
                continue;
            };
            if ast.is_ancestor_or_self(anchor, decl) && !ast.is_ancestor_or_self(expr, decl) {
                return Ok(RefactoringStatus::fatal(format!(
                    "the expression uses '{}', which is declared in the same statement",
                    ast.text(node, &unit.source)
                )));
            }
        }

        if CodeScope::at(ast, expr).is_in_use(&self.name) {
            return Ok(RefactoringStatus::fatal(format!("'{}' is already used in this scope", self.name)));
        }
        self.expression = Some(expr);
        self.anchor = Some(anchor);
        Ok(status)
    }

    fn check_semantics(&mut self, ctx: &RefactoringContext, _monitor: &mut dyn ProgressMonitor) -> Result<RefactoringStatus> {
        let mut status = RefactoringStatus::new();
        if !self.replace_all {
            return Ok(status);
        }
        let unit = ctx.unit()?;
        let ast = &unit.ast;
        let (expr, anchor) = self.expression.zip(self.anchor).ok_or_else(not_checked)?;
        if !is_pure(ast, expr) {
            status.add_info("other occurrences are not replaced because the expression has side effects");
            return Ok(status);
        }
        let container = ast.parent(anchor).unwrap_or(ast.root());
        let usage = UsageAnalyzer::new(ast);
        if usage
            .referenced_bindings(expr)
            .into_iter()
            .any(|b| usage.is_reassigned(b, container))
        {
            status.add_info("other occurrences are not replaced because a variable they use is reassigned");
            return Ok(status);
        }
        let frame = ast.enclosing_function(expr);
        let start = ast.range(expr).start;
        self.duplicates = DuplicateFinder::strict(ast, &unit.source, &[expr])
            .find(container)
            .into_iter()
            .map(|d| d.nodes[0])
            .filter(|n| ast.range(*n).start > start && ast.enclosing_function(*n) == frame)
            .collect();
        tracing::debug!(count = self.duplicates.len(), "extract variable occurrences");
        Ok(status)
    }

    fn compute_edits(&mut self, ctx: &RefactoringContext, _monitor: &mut dyn ProgressMonitor) -> Result<Change> {
        let unit = ctx.unit()?;
        let ast = &unit.ast;
        let (expr, anchor) = self.expression.zip(self.anchor).ok_or_else(not_checked)?;
        let mut builder = ChangeBuilder::new();
        let rewrite = builder.rewrite(unit);

        let moved = rewrite.create_move_target(ast, expr)?;
        let value = if ast.kind(expr) == NodeKind::Sequence {
            vec![Part::from("("), Part::Node(moved), Part::from(")")]
        } else {
            vec![Part::Node(moved)]
        };
        let mut parts = vec![Part::Text(format!("const {} = ", self.name))];
        parts.extend(value);
        parts.push(";".into());
        let declaration = rewrite.compose(parts, NodeKind::VarDecl);

        // `f();` becomes `const v = f();` rather than `const v = f();\nv;`.
        let parent = ast.parent(expr);
        if parent == Some(anchor) && ast.kind(anchor) == NodeKind::ExprStmt {
            rewrite.replace(ast, anchor, declaration, None)?;
        } else {
            rewrite.insert_before(ast, anchor, declaration, None)?;
            let name = rewrite.create_string_placeholder(self.name.clone(), NodeKind::Name);
            rewrite.replace(ast, expr, name, None)?;
        }
        for duplicate in &self.duplicates {
            let name = rewrite.create_string_placeholder(self.name.clone(), NodeKind::Name);
            rewrite.replace(ast, *duplicate, name, None)?;
        }
        builder.build(self.name(), ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refactor::operations::{RefactoringResult, RefactoringRunner, Severity};
    use pretty_assertions::assert_eq;
    use std::path::Path;

    fn run(src: &str, selected: &str, op: &mut ExtractVariable) -> RefactoringResult {
        let ctx = RefactoringContext::for_source("t.js", src).unwrap().select(selected);
        RefactoringRunner::new().run(op, &ctx).unwrap()
    }

    fn new_source(result: RefactoringResult) -> String {
        let change = result.into_change().unwrap();
        change.new_source(Path::new("t.js")).unwrap().to_string()
    }

    #[test]
    fn test_extract_subexpression() {
        let src = "function f(a, b) {\n    return a * b + 1;\n}\n";
        let out = new_source(run(src, "a * b", &mut ExtractVariable::new("product")));
        assert_eq!(out, "function f(a, b) {\n    const product = a * b;\n    return product + 1;\n}\n");
    }

    #[test]
    fn test_replace_all_occurrences() {
        let src = "function f(a) {\n    g(a + 1);\n    h(a + 1);\n}\n";
        let out = new_source(run(src, "a + 1", &mut ExtractVariable::new("next").replace_all(true)));
        assert_eq!(out, "function f(a) {\n    const next = a + 1;\n    g(next);\n    h(next);\n}\n");
    }

    #[test]
    fn test_reassigned_variable_keeps_other_occurrences() {
        let src = "function f(a) {\n    g(a + 1);\n    a = 2;\n    h(a + 1);\n}\n";
        let result = run(src, "a + 1", &mut ExtractVariable::new("next").replace_all(true));
        assert_eq!(result.status.severity(), Some(Severity::Info));
        let out = new_source(result);
        assert!(out.contains("g(next);"));
        assert!(out.contains("h(a + 1);"));
    }

    #[test]
    fn test_loop_condition_is_fatal() {
        let result = run("while (i < n) {\n    i++;\n}\n", "i < n", &mut ExtractVariable::new("more"));
        assert!(result.status.has_fatal());
    }

    #[test]
    fn test_conditional_evaluation_warns() {
        let src = "function f(a) {\n    return a && a.b;\n}\n";
        let result = run(src, "a.b", &mut ExtractVariable::new("b"));
        assert_eq!(result.status.severity(), Some(Severity::Warning));
        assert!(new_source(result).contains("const b = a.b;\n    return a && b;"));
    }

    #[test]
    fn test_same_statement_declaration_is_fatal() {
        let result = run("const a = 1, b = a + 1;\n", "a + 1", &mut ExtractVariable::new("c"));
        assert!(result.status.has_fatal());
    }

    #[test]
    fn test_expression_statement_becomes_declaration() {
        let out = new_source(run("load();\nrun();\n", "load()", &mut ExtractVariable::new("data")));
        assert_eq!(out, "const data = load();\nrun();\n");
    }
}
