//! Bindings and the binder that resolves name nodes to them.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::ast::{Ast, NodeId, NodeKind, Slot};

/// Identity of a resolved name. Equality of ids is equality of variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BindingId(pub u32);

/// The kind of binding (variable, function, type, etc.).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BindingKind {
    /// `let`, `const` or `var` variable.
    Local,
    /// Function parameter.
    Parameter,
    /// `catch (e)` parameter.
    CatchParam,
    /// Function declaration (or named function expression).
    Function,
    /// Class declaration (or named class expression).
    Class,
    /// Class method.
    Method,
    /// Class field.
    Field,
    /// A name that resolves to no declaration in the unit.
    Global,
}

impl BindingKind {
    /// Returns a human-readable name for this binding kind.
    pub fn name(&self) -> &'static str {
        match self {
            BindingKind::Local => "local variable",
            BindingKind::Parameter => "parameter",
            BindingKind::CatchParam => "catch parameter",
            BindingKind::Function => "function",
            BindingKind::Class => "class",
            BindingKind::Method => "method",
            BindingKind::Field => "field",
            BindingKind::Global => "global",
        }
    }

    /// Variables whose value lives in a function frame.
    pub fn is_variable(&self) -> bool {
        matches!(
            self,
            BindingKind::Local | BindingKind::Parameter | BindingKind::CatchParam
        )
    }

    /// Class members, reached through `this.` or `ClassName.`.
    pub fn is_member(&self) -> bool {
        matches!(self, BindingKind::Method | BindingKind::Field)
    }
}

/// A named entity in the unit.
#[derive(Debug, Clone)]
pub struct Binding {
    pub name: String,
    pub kind: BindingKind,
    /// The name node of the declaration, `None` for globals.
    pub declaration: Option<NodeId>,
    /// The scope node the binding is declared in.
    pub scope: NodeId,
    /// `const` declarations.
    pub is_const: bool,
    /// Static class members.
    pub is_static: bool,
    /// Declaring class for members.
    pub owner: Option<NodeId>,
}

/// All bindings of a unit, plus the declarations of every scope.
#[derive(Debug, Clone, Default)]
pub struct BindingTable {
    bindings: Vec<Binding>,
    scopes: HashMap<NodeId, Vec<BindingId>>,
    members: HashMap<NodeId, Vec<BindingId>>,
}

impl BindingTable {
    pub fn get(&self, id: BindingId) -> &Binding {
        &self.bindings[id.0 as usize]
    }

    pub fn iter(&self) -> impl Iterator<Item = (BindingId, &Binding)> {
        self.bindings
            .iter()
            .enumerate()
            .map(|(i, b)| (BindingId(i as u32), b))
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Bindings declared directly in a scope node.
    pub fn declared_in(&self, scope: NodeId) -> &[BindingId] {
        self.scopes.get(&scope).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Members declared by a class node.
    pub fn members_of(&self, class: NodeId) -> &[BindingId] {
        self.members.get(&class).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Finds a member of `class` by name and staticness.
    pub fn member(&self, class: NodeId, name: &str, is_static: bool) -> Option<BindingId> {
        self.members_of(class)
            .iter()
            .copied()
            .find(|m| {
                let b = self.get(*m);
                b.name == name && b.is_static == is_static
            })
    }

    /// Names of all globals the unit references.
    pub fn global_names(&self) -> impl Iterator<Item = &str> {
        self.bindings
            .iter()
            .filter(|b| b.kind == BindingKind::Global)
            .map(|b| b.name.as_str())
    }

    fn add(&mut self, binding: Binding) -> BindingId {
        let id = BindingId(self.bindings.len() as u32);
        if binding.kind.is_member() {
            if let Some(owner) = binding.owner {
                self.members.entry(owner).or_default().push(id);
            }
        } else {
            self.scopes.entry(binding.scope).or_default().push(id);
        }
        self.bindings.push(binding);
        id
    }

    fn lookup(&self, scope: NodeId, name: &str) -> Option<BindingId> {
        self.declared_in(scope)
            .iter()
            .copied()
            .find(|b| self.get(*b).name == name)
    }
}

/// Resolves every name node of `ast` to a binding.
///
/// Declarations are collected first so that hoisted functions and `var`s resolve
/// regardless of textual order.
pub fn bind(ast: &mut Ast) {
    let mut table = BindingTable::default();
    let order = ast.descendants(ast.root());

    for id in &order {
        declare(ast, &mut table, *id);
    }

    let mut globals: HashMap<String, BindingId> = HashMap::new();
    for id in &order {
        match ast.kind(*id) {
            NodeKind::Name if ast.binding_of(*id).is_none() => {
                let name = ast.token(*id).unwrap_or_default().to_string();
                let resolved = ast
                    .ancestors_inclusive(*id)
                    .filter(|a| ast.kind(*a).is_scope())
                    .find_map(|scope| table.lookup(scope, &name));
                let binding = resolved.unwrap_or_else(|| {
                    *globals.entry(name.clone()).or_insert_with(|| {
                        table.add(Binding {
                            name: name.clone(),
                            kind: BindingKind::Global,
                            declaration: None,
                            scope: ast.root(),
                            is_const: false,
                            is_static: false,
                            owner: None,
                        })
                    })
                });
                ast.node_mut(*id).binding = Some(binding);
            }
            NodeKind::PropertyName if ast.binding_of(*id).is_none() => {
                if let Some(member) = resolve_member_access(ast, &table, *id) {
                    ast.node_mut(*id).binding = Some(member);
                }
            }
            _ => {}
        }
    }

    ast.bindings = table;
}

fn declare(ast: &mut Ast, table: &mut BindingTable, id: NodeId) {
    let Some(parent) = ast.parent(id) else {
        return;
    };
    match ast.kind(id) {
        NodeKind::FunctionDecl | NodeKind::ClassDecl => {
            let kind = if ast.kind(id) == NodeKind::FunctionDecl {
                BindingKind::Function
            } else {
                BindingKind::Class
            };
            if let Some(name) = ast.child(id, Slot::Name) {
                let scope = enclosing_scope(ast, parent, false);
                declare_name(ast, table, name, kind, scope, false);
            }
        }
        NodeKind::FunctionExpr | NodeKind::ClassExpr => {
            let kind = if ast.kind(id) == NodeKind::FunctionExpr {
                BindingKind::Function
            } else {
                BindingKind::Class
            };
            if let Some(name) = ast.child(id, Slot::Name) {
                declare_name(ast, table, name, kind, id, false);
            }
        }
        NodeKind::Declarator => {
            let keyword = ast.token(parent).unwrap_or("var").to_string();
            let scope = enclosing_scope(ast, parent, keyword == "var");
            if let Some(target) = ast.child(id, Slot::Name) {
                for name in pattern_names(ast, target) {
                    declare_name(ast, table, name, BindingKind::Local, scope, keyword == "const");
                }
            }
        }
        NodeKind::ForIn => {
            let Some(keyword) = ast.token(id).map(str::to_string) else {
                return;
            };
            let scope = if keyword == "var" {
                enclosing_scope(ast, parent, true)
            } else {
                id
            };
            if let Some(left) = ast.child(id, Slot::Left) {
                for name in pattern_names(ast, left) {
                    declare_name(ast, table, name, BindingKind::Local, scope, keyword == "const");
                }
            }
        }
        NodeKind::Param | NodeKind::Name if ast.slot(id) == Slot::Params => {
            let target = if ast.kind(id) == NodeKind::Param {
                ast.child(id, Slot::Name)
            } else {
                Some(id)
            };
            if let Some(target) = target {
                for name in pattern_names(ast, target) {
                    declare_name(ast, table, name, BindingKind::Parameter, parent, false);
                }
            }
        }
        NodeKind::Catch => {
            if let Some(param) = ast.child(id, Slot::Param) {
                for name in pattern_names(ast, param) {
                    declare_name(ast, table, name, BindingKind::CatchParam, id, false);
                }
            }
        }
        NodeKind::MethodDecl | NodeKind::FieldDecl if ast.kind(parent).is_class_like() => {
            let Some(name) = ast.child(id, Slot::Name) else {
                return;
            };
            let kind = if ast.kind(id) == NodeKind::MethodDecl {
                BindingKind::Method
            } else {
                BindingKind::Field
            };
            let binding = table.add(Binding {
                name: ast.token(name).unwrap_or_default().to_string(),
                kind,
                declaration: Some(name),
                scope: parent,
                is_const: false,
                is_static: ast.node(id).is_static,
                owner: Some(parent),
            });
            ast.node_mut(name).binding = Some(binding);
        }
        _ => {}
    }
}

fn declare_name(
    ast: &mut Ast,
    table: &mut BindingTable,
    name: NodeId,
    kind: BindingKind,
    scope: NodeId,
    is_const: bool,
) {
    let text = ast.token(name).unwrap_or_default().to_string();
    // Redeclaring a `var` in the same function scope reuses the binding.
    let binding = match table.lookup(scope, &text) {
        Some(existing) if kind == BindingKind::Local || kind == BindingKind::Function => existing,
        _ => table.add(Binding {
            name: text,
            kind,
            declaration: Some(name),
            scope,
            is_const,
            is_static: false,
            owner: None,
        }),
    };
    ast.node_mut(name).binding = Some(binding);
}

/// Nearest scope for a declaration at `from`: the nearest function scope for
/// `var`, the nearest block-like scope otherwise.
fn enclosing_scope(ast: &Ast, from: NodeId, function_scope: bool) -> NodeId {
    ast.ancestors_inclusive(from)
        .find(|a| {
            let kind = ast.kind(*a);
            if function_scope {
                kind == NodeKind::Program || kind.is_function_like()
            } else {
                kind.is_scope() && !kind.is_class_like()
            }
        })
        .unwrap_or_else(|| ast.root())
}

/// Name nodes declared by a binding pattern (`x`, `{a, b: c}`, `[d, ...e]`).
fn pattern_names(ast: &Ast, target: NodeId) -> Vec<NodeId> {
    if ast.kind(target) == NodeKind::Name {
        return vec![target];
    }
    ast.descendants(target)
        .into_iter()
        .filter(|id| {
            ast.kind(*id) == NodeKind::Name
                && ast.slot(*id) != Slot::Right
                && !ast
                    .ancestors(*id)
                    .take_while(|a| *a != target)
                    .any(|a| ast.slot(a) == Slot::Right)
        })
        .collect()
}

/// Resolves `this.m` and `ClassName.m` property names to class members.
fn resolve_member_access(ast: &Ast, table: &BindingTable, property: NodeId) -> Option<BindingId> {
    if ast.slot(property) != Slot::Property {
        return None;
    }
    let member = ast.parent(property)?;
    let object = ast.child(member, Slot::Object)?;
    let name = ast.token(property)?;
    match ast.kind(object) {
        NodeKind::This => {
            let (class, is_static) = this_class(ast, object)?;
            table
                .member(class, name, is_static)
                .or_else(|| table.member(class, name, !is_static))
        }
        NodeKind::Name => {
            let binding = table.get(ast.binding_of(object)?);
            if binding.kind != BindingKind::Class {
                return None;
            }
            let class = ast.parent(binding.declaration?)?;
            table.member(class, name, true)
        }
        _ => None,
    }
}

/// The class `this` refers to at `node`, and whether the context is static.
pub fn this_class(ast: &Ast, node: NodeId) -> Option<(NodeId, bool)> {
    for ancestor in ast.ancestors(node) {
        match ast.kind(ancestor) {
            NodeKind::Arrow => continue,
            NodeKind::MethodDecl | NodeKind::FieldDecl => {
                let class = ast.parent(ancestor)?;
                return ast
                    .kind(class)
                    .is_class_like()
                    .then_some((class, ast.node(ancestor).is_static));
            }
            NodeKind::FunctionDecl | NodeKind::FunctionExpr | NodeKind::Program => return None,
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::CompilationUnit;

    fn names<'a>(unit: &'a CompilationUnit, text: &str) -> Vec<NodeId> {
        unit.ast
            .descendants(unit.ast.root())
            .into_iter()
            .filter(|id| unit.ast.kind(*id) == NodeKind::Name && unit.text(*id) == text)
            .collect()
    }

    #[test]
    fn test_shadowing_resolves_to_inner_binding() {
        let unit = CompilationUnit::parse("t.js", "let x = 1; function f() { let x = 2; return x; } x;").unwrap();
        let xs = names(&unit, "x");
        assert_eq!(xs.len(), 4);
        assert!(unit.ast.same_variable(xs[1], xs[2]));
        assert!(unit.ast.same_variable(xs[0], xs[3]));
        assert!(!unit.ast.same_variable(xs[0], xs[1]));
    }

    #[test]
    fn test_hoisted_function_resolves() {
        let unit = CompilationUnit::parse("t.js", "g(); function g() {}").unwrap();
        let gs = names(&unit, "g");
        assert!(unit.ast.same_variable(gs[0], gs[1]));
        let b = unit.ast.binding(unit.ast.binding_of(gs[0]).unwrap());
        assert_eq!(b.kind, BindingKind::Function);
    }

    #[test]
    fn test_parameters_and_globals() {
        let unit = CompilationUnit::parse("t.js", "function f(a) { return a + console; }").unwrap();
        let a = names(&unit, "a");
        assert_eq!(unit.ast.binding(unit.ast.binding_of(a[1]).unwrap()).kind, BindingKind::Parameter);
        let console = names(&unit, "console")[0];
        assert_eq!(unit.ast.binding(unit.ast.binding_of(console).unwrap()).kind, BindingKind::Global);
    }

    #[test]
    fn test_this_member_resolution() {
        let unit = CompilationUnit::parse("t.js", "class A { m() { return this.n(); } n() { return 1; } }").unwrap();
        let prop = unit.find(NodeKind::PropertyName, "n").unwrap();
        let binding = unit.ast.binding(unit.ast.binding_of(prop).unwrap());
        assert_eq!(binding.kind, BindingKind::Method);
        assert_eq!(binding.name, "n");
    }

    #[test]
    fn test_block_scoped_let() {
        let unit = CompilationUnit::parse("t.js", "function f() { { let y = 1; } { let y = 2; y; } }").unwrap();
        let ys = names(&unit, "y");
        assert!(!unit.ast.same_variable(ys[0], ys[1]));
        assert!(unit.ast.same_variable(ys[1], ys[2]));
    }
}
