//! Lowering of tree-sitter trees into the arena AST.

use tree_sitter::{Node as TsNode, Tree};

use super::{Ast, Node, NodeId, NodeKind, Slot};
use crate::transform::TextRange;

/// Grammar nodes dropped entirely: comments and type-level syntax.
const SKIPPED: &[&str] = &[
    "comment",
    "hash_bang_line",
    "type_annotation",
    "type_arguments",
    "type_parameters",
    "accessibility_modifier",
    "override_modifier",
    "decorator",
    "asserts_annotation",
    "omitting_type_annotation",
    "adding_type_annotation",
    "opting_type_annotation",
];

/// Grammar nodes whose children are hoisted into the parent under a fixed slot.
fn transparent_slot(kind: &str) -> Option<Slot> {
    match kind {
        "formal_parameters" => Some(Slot::Params),
        "arguments" => Some(Slot::Arguments),
        "class_body" => Some(Slot::Members),
        "switch_body" => Some(Slot::Cases),
        "else_clause" => Some(Slot::Else),
        "class_heritage" | "extends_clause" | "implements_clause" => Some(Slot::Heritage),
        "template_substitution" => Some(Slot::Children),
        _ => None,
    }
}

/// Lowers a parsed tree into a fresh arena. Bindings are not resolved here.
pub fn lower(tree: &Tree, source: &str) -> Ast {
    let mut lowering = Lowering {
        source,
        nodes: Vec::new(),
    };
    let root = tree.root_node();
    let id = lowering.push(root, NodeKind::Program, None, Slot::Root);
    lowering.lower_children(root, id, NodeKind::Program);
    Ast::new(lowering.nodes, id)
}

struct Lowering<'s> {
    source: &'s str,
    nodes: Vec<Node>,
}

impl<'s> Lowering<'s> {
    fn text(&self, node: TsNode<'_>) -> &'s str {
        node.utf8_text(self.source.as_bytes()).unwrap_or_default()
    }

    fn push(&mut self, ts: TsNode<'_>, kind: NodeKind, parent: Option<NodeId>, slot: Slot) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        let token = match kind {
            NodeKind::Name | NodeKind::PropertyName | NodeKind::Label | NodeKind::Literal => {
                Some(self.text(ts).to_string())
            }
            _ => None,
        };
        self.nodes.push(Node {
            kind,
            range: TextRange::new(ts.start_byte(), ts.end_byte()),
            parent,
            slot,
            children: Vec::new(),
            token,
            is_static: false,
            is_prefix: false,
            binding: None,
            syntax_kind: ts.kind(),
        });
        if let Some(parent) = parent {
            self.nodes[parent.index()].children.push(id);
        }
        id
    }

    fn lower_node(&mut self, ts: TsNode<'_>, parent: NodeId, slot: Slot) {
        let kind = classify(ts.kind());
        let id = self.push(ts, kind, Some(parent), slot);
        if !matches!(
            kind,
            NodeKind::Name | NodeKind::PropertyName | NodeKind::Label | NodeKind::Literal
        ) {
            self.lower_children(ts, id, kind);
        }
    }

    fn lower_children(&mut self, ts: TsNode<'_>, id: NodeId, kind: NodeKind) {
        let mut entries = Vec::new();
        let mut cursor = ts.walk();
        if cursor.goto_first_child() {
            loop {
                entries.push((cursor.node(), cursor.field_name()));
                if !cursor.goto_next_sibling() {
                    break;
                }
            }
        }

        let mut seen_named = false;
        for (child, field) in entries {
            if !child.is_named() {
                self.lower_token(child, field, id, kind, seen_named);
                continue;
            }
            if SKIPPED.contains(&child.kind()) {
                continue;
            }
            seen_named = true;

            let slot = child_slot(kind, field, child.kind());

            // `if (x)`, `while (x)`, `switch (x)`: the parentheses are syntax, not an
            // expression of their own.
            if child.kind() == "parenthesized_expression" && slot == Slot::Condition {
                if let Some(inner) = first_named(child) {
                    self.lower_node(inner, id, Slot::Condition);
                }
                continue;
            }

            if let Some(hoisted) = transparent_slot(child.kind()) {
                self.lower_hoisted(child, id, kind, hoisted);
                continue;
            }

            // `finally { }` keeps a node so the flow analyzer can tell it apart.
            if child.kind() == "finally_clause" {
                let fin = self.push(child, NodeKind::Finally, Some(id), Slot::Finalizer);
                if let Some(body) = first_named(child) {
                    self.lower_node(body, fin, Slot::Body);
                }
                continue;
            }

            self.lower_node(child, id, slot);
        }
    }

    fn lower_hoisted(&mut self, wrapper: TsNode<'_>, id: NodeId, kind: NodeKind, slot: Slot) {
        let mut cursor = wrapper.walk();
        let children: Vec<_> = wrapper.named_children(&mut cursor).collect();
        for child in children {
            if SKIPPED.contains(&child.kind()) {
                continue;
            }
            if let Some(nested) = transparent_slot(child.kind()) {
                let nested = if slot == Slot::Heritage { Slot::Heritage } else { nested };
                self.lower_hoisted(child, id, kind, nested);
            } else {
                self.lower_node(child, id, slot);
            }
        }
    }

    fn lower_token(&mut self, token: TsNode<'_>, field: Option<&str>, id: NodeId, kind: NodeKind, seen_named: bool) {
        let text = self.text(token);
        let node = &mut self.nodes[id.index()];
        match (kind, text) {
            (NodeKind::MethodDecl | NodeKind::FieldDecl, "static") => node.is_static = true,
            (NodeKind::VarDecl | NodeKind::ForIn, "let" | "const" | "var") => {
                node.token = Some(text.to_string())
            }
            (NodeKind::Update, "++" | "--") => {
                node.token = Some(text.to_string());
                node.is_prefix = !seen_named;
            }
            (NodeKind::Assign, _) if field == Some("operator") || text == "=" => {
                node.token = Some(text.to_string())
            }
            (NodeKind::Binary | NodeKind::Unary, _) if field == Some("operator") => {
                node.token = Some(text.to_string())
            }
            (NodeKind::SwitchCase, "default") => node.token = Some(text.to_string()),
            _ => {}
        }
    }
}

fn first_named(node: TsNode<'_>) -> Option<TsNode<'_>> {
    let mut cursor = node.walk();
    let found = node.named_children(&mut cursor).find(|c| !SKIPPED.contains(&c.kind()));
    found
}

fn classify(kind: &str) -> NodeKind {
    match kind {
        "program" => NodeKind::Program,
        "function_declaration" | "generator_function_declaration" => NodeKind::FunctionDecl,
        "class_declaration" | "abstract_class_declaration" => NodeKind::ClassDecl,
        "method_definition" => NodeKind::MethodDecl,
        "public_field_definition" | "field_definition" => NodeKind::FieldDecl,
        "lexical_declaration" | "variable_declaration" => NodeKind::VarDecl,
        "variable_declarator" => NodeKind::Declarator,
        "required_parameter" | "optional_parameter" => NodeKind::Param,
        "statement_block" => NodeKind::Block,
        "expression_statement" => NodeKind::ExprStmt,
        "return_statement" => NodeKind::Return,
        "if_statement" => NodeKind::If,
        "while_statement" => NodeKind::While,
        "do_statement" => NodeKind::DoWhile,
        "for_statement" => NodeKind::For,
        "for_in_statement" => NodeKind::ForIn,
        "break_statement" => NodeKind::Break,
        "continue_statement" => NodeKind::Continue,
        "throw_statement" => NodeKind::Throw,
        "try_statement" => NodeKind::Try,
        "catch_clause" => NodeKind::Catch,
        "switch_statement" => NodeKind::Switch,
        "switch_case" | "switch_default" => NodeKind::SwitchCase,
        "labeled_statement" => NodeKind::Labeled,
        "empty_statement" => NodeKind::Empty,
        "identifier"
        | "shorthand_property_identifier"
        | "shorthand_property_identifier_pattern"
        | "type_identifier" => NodeKind::Name,
        "property_identifier" | "private_property_identifier" => NodeKind::PropertyName,
        "statement_identifier" => NodeKind::Label,
        "number" | "string" | "regex" | "true" | "false" | "null" | "undefined" => {
            NodeKind::Literal
        }
        "template_string" => NodeKind::Template,
        "this" => NodeKind::This,
        "super" => NodeKind::Super,
        "binary_expression" => NodeKind::Binary,
        "unary_expression" => NodeKind::Unary,
        "update_expression" => NodeKind::Update,
        "assignment_expression" | "augmented_assignment_expression" => NodeKind::Assign,
        "call_expression" => NodeKind::Call,
        "new_expression" => NodeKind::New,
        "member_expression" => NodeKind::Member,
        "subscript_expression" => NodeKind::Subscript,
        "parenthesized_expression" => NodeKind::Paren,
        "ternary_expression" => NodeKind::Conditional,
        "arrow_function" => NodeKind::Arrow,
        "function_expression" | "function" | "generator_function" => NodeKind::FunctionExpr,
        "class" => NodeKind::ClassExpr,
        "object" => NodeKind::Object,
        "pair" => NodeKind::Property,
        "array" => NodeKind::Array,
        "sequence_expression" => NodeKind::Sequence,
        "spread_element" => NodeKind::Spread,
        "await_expression" => NodeKind::Await,
        _ => NodeKind::Other,
    }
}

/// Maps a grammar field to the slot a child occupies in a node of `parent` kind.
fn child_slot(parent: NodeKind, field: Option<&str>, child_kind: &str) -> Slot {
    use NodeKind as K;
    match (parent, field) {
        (K::Program | K::Block, _) => Slot::Statements,
        (K::SwitchCase, Some("value")) => Slot::Condition,
        (K::SwitchCase, _) => Slot::Statements,
        (K::VarDecl, _) => Slot::Declarators,
        (K::Array, _) => Slot::Elements,
        (K::Object, _) => Slot::Members,
        (_, Some("name")) => Slot::Name,
        (K::Declarator | K::Param | K::FieldDecl | K::Property, Some("value")) => Slot::Value,
        (K::Property, Some("key")) => Slot::Name,
        (K::Param, Some("pattern")) => Slot::Name,
        (K::FieldDecl, Some("property")) => Slot::Name,
        (K::Arrow, Some("parameter")) => Slot::Params,
        (_, Some("parameters")) => Slot::Params,
        (_, Some("body")) => Slot::Body,
        (_, Some("condition")) => Slot::Condition,
        (K::Switch, Some("value")) => Slot::Condition,
        (K::If | K::Conditional, Some("consequence")) => Slot::Then,
        (K::If | K::Conditional, Some("alternative")) => Slot::Else,
        (K::For, Some("initializer")) => Slot::Init,
        (K::For, Some("increment")) => Slot::Update,
        (_, Some("left")) => Slot::Left,
        (_, Some("right")) => Slot::Right,
        (K::Unary | K::Update | K::Spread | K::Await, Some("argument")) => Slot::Operand,
        (K::Call, Some("function")) => Slot::Callee,
        (K::New, Some("constructor")) => Slot::Callee,
        (K::Member | K::Subscript, Some("object")) => Slot::Object,
        (K::Member, Some("property")) => Slot::Property,
        (K::Subscript, Some("index")) => Slot::Index,
        (K::Break | K::Continue | K::Labeled, Some("label")) => Slot::Label,
        (K::Try, Some("handler")) => Slot::Handler,
        (K::Try, Some("finalizer")) => Slot::Finalizer,
        (K::Catch, Some("parameter")) => Slot::Param,
        (K::Return | K::Throw | K::ExprStmt | K::Paren | K::Spread | K::Await, None) => {
            Slot::Expression
        }
        (K::Unary | K::Update, None) => Slot::Operand,
        (K::Labeled, None) if child_kind == "statement_identifier" => Slot::Label,
        (K::Labeled, None) => Slot::Body,
        (K::Break | K::Continue, None) => Slot::Label,
        _ => Slot::Children,
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{CompilationUnit, NodeKind, Slot};

    #[test]
    fn test_lower_for_statement() {
        let unit = CompilationUnit::parse("t.js", "for (let i = 0; i < n; i++) { s += i; }").unwrap();
        let ast = &unit.ast;
        let f = unit.find(NodeKind::For, unit.source.as_str()).unwrap();
        assert!(ast.child(f, Slot::Init).is_some());
        assert!(ast.child(f, Slot::Body).is_some());
        let update = unit.find(NodeKind::Update, "i++").unwrap();
        assert!(!ast.node(update).is_prefix);
        assert_eq!(ast.token(update), Some("++"));
    }

    #[test]
    fn test_lower_var_keyword() {
        let unit = CompilationUnit::parse("t.js", "const a = 1, b = 2;").unwrap();
        let decl = unit.find(NodeKind::VarDecl, unit.source.as_str()).unwrap();
        assert_eq!(unit.ast.token(decl), Some("const"));
        assert_eq!(unit.ast.children_in(decl, Slot::Declarators).count(), 2);
    }

    #[test]
    fn test_lower_call_arguments() {
        let unit = CompilationUnit::parse("t.js", "g(1, x);").unwrap();
        let call = unit.find(NodeKind::Call, "g(1, x)").unwrap();
        assert_eq!(unit.ast.children_in(call, Slot::Arguments).count(), 2);
        let callee = unit.ast.child(call, Slot::Callee).unwrap();
        assert_eq!(unit.ast.token(callee), Some("g"));
    }

    #[test]
    fn test_lower_compound_assignment_operator() {
        let unit = CompilationUnit::parse("t.js", "x += 2;").unwrap();
        let assign = unit.find(NodeKind::Assign, "x += 2").unwrap();
        assert_eq!(unit.ast.token(assign), Some("+="));
    }
}
