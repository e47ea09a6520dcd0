//! Promote Temp to Field: turn a method's local variable into a field of its
//! class.

use serde::{Deserialize, Serialize};

use crate::ast::{Ast, NodeId, NodeKind, Slot};
use crate::error::Result;
use crate::rewrite::{AstRewrite, Part};
use crate::scope::{BindingId, BindingKind, ProgressMonitor, UsageAnalyzer};

use super::support::{constructor_of, not_checked};
use super::{Change, ChangeBuilder, RefactoringContext, RefactoringOperation, RefactoringStatus, check_identifier, selected_node};

/// Where the promoted field gets its value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldInitialization {
    /// Where the local was initialized, as an assignment to the field.
    #[default]
    Method,
    /// In the field declaration.
    Field,
    /// At the end of the constructor.
    Constructor,
}

#[derive(Debug, Clone)]
struct Target {
    binding: BindingId,
    class: NodeId,
    declarator: NodeId,
    statement: NodeId,
    initializer: Option<NodeId>,
    is_static: bool,
    /// `this` for instance fields, the class name for static ones.
    qualifier: String,
}

#[derive(Debug, Clone)]
pub struct PromoteTempToField {
    pub name: String,
    pub initialization: FieldInitialization,
    target: Option<Target>,
}

impl PromoteTempToField {
    /// Create a new PromoteTempToField operation.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            initialization: FieldInitialization::default(),
            target: None,
        }
    }

    pub fn initialize_in(mut self, initialization: FieldInitialization) -> Self {
        self.initialization = initialization;
        self
    }
}

fn selected_local(ast: &Ast, node: NodeId) -> Option<BindingId> {
    let name = match ast.kind(node) {
        NodeKind::Declarator => ast.child(node, Slot::Name)?,
        _ => node,
    };
    ast.binding_of(name)
        .filter(|b| ast.binding(*b).kind == BindingKind::Local)
}

/// Whether a function boundary other than an arrow lies between `node` and
/// `method`.
fn crosses_function(ast: &Ast, node: NodeId, method: NodeId) -> bool {
    ast.ancestors(node)
        .take_while(|a| *a != method)
        .any(|a| ast.kind(a).is_function_like() && ast.kind(a) != NodeKind::Arrow)
}

impl RefactoringOperation for PromoteTempToField {
    fn name(&self) -> &'static str {
        "Promote Temp to Field"
    }

    fn check_selection(&mut self, ctx: &RefactoringContext) -> Result<RefactoringStatus> {
        let unit = ctx.unit()?;
        let ast = &unit.ast;
        let status = check_identifier(&self.name, "field");
        if status.has_fatal() {
            return Ok(status);
        }
        let Some(binding) = selected_local(ast, selected_node(unit, ctx.selection)) else {
            return Ok(RefactoringStatus::fatal("select a local variable"));
        };
        let Some(name) = ast.binding(binding).declaration else {
            return Ok(RefactoringStatus::fatal("the variable has no declaration"));
        };
        let Some(declarator) = ast.parent(name).filter(|d| ast.kind(*d) == NodeKind::Declarator && ast.slot(name) == Slot::Name) else {
            return Ok(RefactoringStatus::fatal("destructured variables cannot be promoted"));
        };
        let Some(statement) = ast.parent(declarator).filter(|s| ast.slot(*s) == Slot::Statements) else {
            return Ok(RefactoringStatus::fatal("loop variables cannot be promoted"));
        };
        let Some(method) = ast
            .enclosing_function(declarator)
            .filter(|m| ast.kind(*m) == NodeKind::MethodDecl)
        else {
            return Ok(RefactoringStatus::fatal("the variable is not declared directly in a method"));
        };
        let Some(class) = ast.parent(method).filter(|c| ast.kind(*c).is_class_like()) else {
            return Ok(RefactoringStatus::fatal("the method does not belong to a class"));
        };
        let is_static = ast.node(method).is_static;
        let qualifier = if is_static {
            match ast.declared_name(class) {
                Some(name) => name.to_string(),
                None => return Ok(RefactoringStatus::fatal("static fields of an anonymous class cannot be named")),
            }
        } else {
            "this".to_string()
        };
        if ast.bindings().members_of(class).iter().any(|m| ast.binding(*m).name == self.name) {
            return Ok(RefactoringStatus::fatal(format!("the class already has a member named '{}'", self.name)));
        }

        for usage in UsageAnalyzer::new(ast).references(binding, method) {
            if crosses_function(ast, usage.node, method) {
                return Ok(RefactoringStatus::fatal(
                    "the variable is used inside a nested function, where 'this' differs",
                ));
            }
        }

        self.target = Some(Target {
            binding,
            class,
            declarator,
            statement,
            initializer: ast.child(declarator, Slot::Value),
            is_static,
            qualifier,
        });
        Ok(status)
    }

    fn check_semantics(&mut self, ctx: &RefactoringContext, _monitor: &mut dyn ProgressMonitor) -> Result<RefactoringStatus> {
        let target = self.target.as_ref().ok_or_else(not_checked)?;
        let unit = ctx.unit()?;
        let ast = &unit.ast;
        let mut status = RefactoringStatus::new();
        if self.initialization == FieldInitialization::Method {
            return Ok(status);
        }

        let Some(initializer) = target.initializer else {
            return Ok(RefactoringStatus::fatal("the variable has no initializer to move"));
        };
        let method = ast.enclosing_function(target.declarator).unwrap_or(target.class);
        let depends_on_locals = std::iter::once(initializer)
            .chain(ast.descendants(initializer))
            .filter_map(|n| ast.binding_of(n))
            .filter_map(|b| ast.binding(b).declaration)
            .any(|d| ast.is_ancestor_or_self(method, d));
        if depends_on_locals {
            return Ok(RefactoringStatus::fatal(
                "the initializer uses the method's locals or parameters",
            ));
        }
        if self.initialization == FieldInitialization::Constructor {
            if target.is_static {
                return Ok(RefactoringStatus::fatal("a static field cannot be initialized in the constructor"));
            }
            if constructor_of(ast, target.class).is_none() && ast.child(target.class, Slot::Heritage).is_some() {
                return Ok(RefactoringStatus::fatal(
                    "the class extends another and has no constructor to initialize the field in",
                ));
            }
        }
        if UsageAnalyzer::new(ast).is_reassigned(target.binding, method) {
            status.add_warning("the variable is reassigned; the field is only initialized once");
        }
        Ok(status)
    }

    fn compute_edits(&mut self, ctx: &RefactoringContext, _monitor: &mut dyn ProgressMonitor) -> Result<Change> {
        let target = self.target.as_ref().ok_or_else(not_checked)?;
        let unit = ctx.unit()?;
        let ast = &unit.ast;
        let field = format!("{}.{}", target.qualifier, self.name);
        let prefix = if target.is_static { "static " } else { "" };
        let mut builder = ChangeBuilder::new();
        let rewrite = builder.rewrite(unit);

        let declaration = match (self.initialization, target.initializer) {
            (FieldInitialization::Field, Some(init)) => {
                rewrite.compose(vec![format!("{prefix}{} = ", self.name).into(), Part::Copy(init), ";".into()], NodeKind::FieldDecl)
            }
            _ => rewrite.create_string_placeholder(format!("{prefix}{};", self.name), NodeKind::FieldDecl),
        };
        rewrite.list(ast, target.class, Slot::Members).insert_first(declaration, None);

        let single = ast.children_in(target.statement, Slot::Declarators).count() == 1;
        match (self.initialization, target.initializer) {
            (FieldInitialization::Method, Some(init)) => {
                let assignment = rewrite.compose(vec![format!("{field} = ").into(), Part::Copy(init), ";".into()], NodeKind::ExprStmt);
                if single {
                    rewrite.replace(ast, target.statement, assignment, None)?;
                } else {
                    rewrite.remove(ast, target.declarator, None)?;
                    rewrite.insert_after(ast, target.statement, assignment, None)?;
                }
            }
            (FieldInitialization::Constructor, Some(init)) => {
                let assignment = rewrite.compose(vec![format!("{field} = ").into(), Part::Copy(init), ";".into()], NodeKind::ExprStmt);
                match constructor_of(ast, target.class).and_then(|c| ast.child(c, Slot::Body)) {
                    Some(body) => rewrite.list(ast, body, Slot::Statements).insert_last(assignment, None),
                    None => {
                        let indent = &ctx.config.indent;
                        let constructor = rewrite.compose(
                            vec![format!("constructor() {{\n{indent}").into(), Part::Node(assignment), "\n}".into()],
                            NodeKind::MethodDecl,
                        );
                        rewrite.list(ast, target.class, Slot::Members).insert_first(constructor, None);
                    }
                }
                remove_declarator(rewrite, ast, target, single)?;
            }
            _ => remove_declarator(rewrite, ast, target, single)?,
        }

        for usage in UsageAnalyzer::new(ast).references(target.binding, ast.root()) {
            let shorthand = ast.parent(usage.node).is_some_and(|p| ast.kind(p) == NodeKind::Object);
            let text = if shorthand {
                format!("{}: {field}", ast.binding(target.binding).name)
            } else {
                field.clone()
            };
            let replacement = rewrite.create_string_placeholder(text, NodeKind::Member);
            rewrite.replace(ast, usage.node, replacement, None)?;
        }
        tracing::debug!(field = %field, "promoted local");
        builder.build(self.name(), ctx)
    }
}

fn remove_declarator(rewrite: &mut AstRewrite, ast: &Ast, target: &Target, single: bool) -> Result<()> {
    let node = if single { target.statement } else { target.declarator };
    rewrite.remove(ast, node, None)?;
    Ok(())
}
