//! Extract Constant: move a constant expression into a static field or a
//! module-level `const`.

use crate::ast::{Ast, NodeId, NodeKind, Slot};
use crate::error::Result;
use crate::rewrite::Part;
use crate::scope::selection::SelectedRegion;
use crate::scope::{BindingKind, CodeScope, ProgressMonitor, SelectionAnalyzer};

use super::duplicates::DuplicateFinder;
use super::support::{is_assignment_target, not_checked, selection_status, top_level_statement};
use super::{Change, ChangeBuilder, RefactoringContext, RefactoringOperation, RefactoringStatus, check_identifier};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Holder {
    /// A static field of this class declaration.
    Class(NodeId),
    Module,
}

/// Extract a constant expression into `static NAME = ...;` of the enclosing
/// class, or `const NAME = ...;` at the top of the module.
#[derive(Debug, Clone)]
pub struct ExtractConstant {
    pub name: String,
    /// Also replace the other occurrences in the class or module.
    pub replace_all: bool,
    expression: Option<NodeId>,
    holder: Holder,
    occurrences: Vec<NodeId>,
}

impl ExtractConstant {
    /// Create a new ExtractConstant operation.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            replace_all: false,
            expression: None,
            holder: Holder::Module,
            occurrences: Vec::new(),
        }
    }

    pub fn replace_all(mut self, replace_all: bool) -> Self {
        self.replace_all = replace_all;
        self
    }
}

/// Whether `node` always evaluates to the same value: literals and operators
/// over module constants and static fields.
fn is_constant(ast: &Ast, node: NodeId) -> bool {
    match ast.kind(node) {
        NodeKind::Literal => true,
        NodeKind::Template => ast
            .children(node)
            .iter()
            .all(|c| ast.kind(*c) == NodeKind::Other || is_constant(ast, *c)),
        NodeKind::Unary => {
            !matches!(ast.token(node), Some("delete"))
                && ast.children(node).iter().all(|c| is_constant(ast, *c))
        }
        NodeKind::Binary | NodeKind::Paren | NodeKind::Conditional => {
            ast.children(node).iter().all(|c| is_constant(ast, *c))
        }
        NodeKind::Name => ast.binding_of(node).is_some_and(|b| {
            let binding = ast.binding(b);
            binding.is_const && binding.scope == ast.root()
        }),
        NodeKind::Member => {
            let object_is_class = ast.child(node, Slot::Object).is_some_and(|o| {
                ast.binding_of(o)
                    .is_some_and(|b| ast.binding(b).kind == BindingKind::Class)
            });
            object_is_class
                && ast.child(node, Slot::Property).is_some_and(|p| {
                    ast.binding_of(p).is_some_and(|b| {
                        let binding = ast.binding(b);
                        binding.kind == BindingKind::Field && binding.is_static
                    })
                })
        }
        _ => false,
    }
}

impl RefactoringOperation for ExtractConstant {
    fn name(&self) -> &'static str {
        "Extract Constant"
    }

    fn check_selection(&mut self, ctx: &RefactoringContext) -> Result<RefactoringStatus> {
        let unit = ctx.unit()?;
        let ast = &unit.ast;
        let status = check_identifier(&self.name, "constant");
        if status.has_fatal() {
            return Ok(status);
        }
        let expr = match SelectionAnalyzer::new(ast, &unit.source, ctx.selection).region(ast) {
            Ok(SelectedRegion::Expression(expr)) => expr,
            Ok(SelectedRegion::Statements(_)) => return Ok(RefactoringStatus::fatal("select an expression to extract")),
            Err(e) => return Ok(selection_status(e)),
        };
        if is_assignment_target(ast, expr) || !is_constant(ast, expr) {
            return Ok(RefactoringStatus::fatal("the selection is not a constant expression"));
        }

        let class = ast
            .ancestors(expr)
            .find(|a| ast.kind(*a) == NodeKind::ClassDecl && ast.declared_name(*a).is_some());
        self.holder = match class {
            Some(class) => {
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
                Holder::Class(class)
            }
            None => {
                let taken = CodeScope::at(ast, expr).is_in_use(&self.name)
                    || ast
                        .bindings()
                        .declared_in(ast.root())
                        .iter()
                        .any(|b| ast.binding(*b).name == self.name);
                if taken {
                    return Ok(RefactoringStatus::fatal(format!(
                        "'{}' is already used in this module",
                        self.name
                    )));
                }
                Holder::Module
            }
        };
        self.expression = Some(expr);
        self.occurrences = vec![expr];
        Ok(status)
    }

    fn check_semantics(&mut self, ctx: &RefactoringContext, _monitor: &mut dyn ProgressMonitor) -> Result<RefactoringStatus> {
        let status = RefactoringStatus::new();
        if !self.replace_all {
            return Ok(status);
        }
        let unit = ctx.unit()?;
        let ast = &unit.ast;
        let expr = self.expression.ok_or_else(not_checked)?;
        let root = match self.holder {
            Holder::Class(class) => class,
            Holder::Module => ast.root(),
        };
        let finder = DuplicateFinder::strict(ast, &unit.source, &[expr]);
        self.occurrences.extend(finder.find(root).into_iter().map(|d| d.nodes[0]));
        self.occurrences.sort_by_key(|n| ast.range(*n).start);
        tracing::debug!(count = self.occurrences.len(), "extract constant occurrences");
        Ok(status)
    }

    fn compute_edits(&mut self, ctx: &RefactoringContext, _monitor: &mut dyn ProgressMonitor) -> Result<Change> {
        let unit = ctx.unit()?;
        let ast = &unit.ast;
        let expr = self.expression.ok_or_else(not_checked)?;
        let mut builder = ChangeBuilder::new();
        let rewrite = builder.rewrite(unit);

        let moved = rewrite.create_move_target(ast, expr)?;
        let reference = match self.holder {
            Holder::Class(class) => {
                let field = rewrite.compose(
                    vec![
                        Part::Text(format!("static {} = ", self.name)),
                        Part::Node(moved),
                        ";".into(),
                    ],
                    NodeKind::FieldDecl,
                );
                rewrite.list(ast, class, Slot::Members).insert_first(field, None);
                let class_name = ast.declared_name(class).unwrap_or_default();
                format!("{class_name}.{}", self.name)
            }
            Holder::Module => {
                let declaration = rewrite.compose(
                    vec![
                        Part::Text(format!("const {} = ", self.name)),
                        Part::Node(moved),
                        ";".into(),
                    ],
                    NodeKind::VarDecl,
                );
                let first = self
                    .occurrences
                    .iter()
                    .map(|n| top_level_statement(ast, *n))
                    .min_by_key(|s| ast.range(*s).start)
                    .unwrap_or(expr);
                rewrite.insert_before(ast, first, declaration, None)?;
                self.name.clone()
            }
        };
        for occurrence in &self.occurrences {
            let id = rewrite.create_string_placeholder(reference.clone(), NodeKind::Member);
            rewrite.replace(ast, *occurrence, id, None)?;
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

    fn run(src: &str, selected: &str, op: &mut ExtractConstant) -> RefactoringResult {
        let ctx = RefactoringContext::for_source("t.js", src).unwrap().select(selected);
        RefactoringRunner::new().run(op, &ctx).unwrap()
    }

    fn new_source(result: RefactoringResult) -> String {
        let change = result.into_change().unwrap();
        change.new_source(Path::new("t.js")).unwrap().to_string()
    }

    #[test]
    fn test_module_constant_is_declared_before_use() {
        let out = new_source(run("var c = 1 + 2;\n", "1 + 2", &mut ExtractConstant::new("C")));
        assert_eq!(out, "const C = 1 + 2;\nvar c = C;\n");
    }

    #[test]
    fn test_constant_inside_class_becomes_static_field() {
        let src = "class Circle {\n    area(r) {\n        return 3.14159 * r * r;\n    }\n}\n";
        let out = new_source(run(src, "3.14159", &mut ExtractConstant::new("PI")));
        assert_eq!(
            out,
            "class Circle {\n    static PI = 3.14159;\n    area(r) {\n        return Circle.PI * r * r;\n    }\n}\n"
        );
    }

    #[test]
    fn test_replace_all_uses_earliest_statement() {
        let src = "function f() {\n    return 60 * 60;\n}\nfunction g() {\n    return 60 * 60;\n}\n";
        let out = new_source(run(src, "60 * 60", &mut ExtractConstant::new("HOUR").replace_all(true)));
        assert!(out.starts_with("const HOUR = 60 * 60;\nfunction f() {\n    return HOUR;\n}"));
        assert!(out.ends_with("function g() {\n    return HOUR;\n}\n"));
    }

    #[test]
    fn test_expression_using_parameter_is_not_constant() {
        let result = run("function f(a) {\n    return a + 1;\n}\n", "a + 1", &mut ExtractConstant::new("X"));
        assert!(result.status.has_fatal());
    }

    #[test]
    fn test_module_constants_may_be_combined() {
        let src = "const A = 2;\nfunction f() {\n    return A * 3;\n}\n";
        let out = new_source(run(src, "A * 3", &mut ExtractConstant::new("B")));
        assert!(out.contains("const B = A * 3;\nfunction f() {\n    return B;\n}"));
    }
}
