//! Parenthesization decisions driven by the configured precedence table.

use super::{Ast, NodeId, NodeKind, Slot};
use crate::config::PrecedenceTable;

/// Precedence level of an expression node.
pub fn precedence(ast: &Ast, expr: NodeId, table: &PrecedenceTable) -> u8 {
    match ast.kind(expr) {
        NodeKind::Sequence => table.sequence,
        NodeKind::Assign | NodeKind::Arrow | NodeKind::Spread => table.assignment,
        NodeKind::Conditional => table.conditional,
        NodeKind::Binary => ast
            .token(expr)
            .map(|op| table.binary_level(op))
            .unwrap_or(table.conditional + 1),
        NodeKind::Unary | NodeKind::Await => table.unary,
        NodeKind::Update if ast.node(expr).is_prefix => table.unary,
        NodeKind::Update => table.postfix,
        NodeKind::New if ast.children_in(expr, Slot::Arguments).next().is_none() => {
            table.new_without_arguments
        }
        NodeKind::New | NodeKind::Call | NodeKind::Member | NodeKind::Subscript => table.call,
        _ => table.primary,
    }
}

/// Whether an expression of level `inner` must be parenthesized when it takes the
/// place of `target` in the original tree.
pub fn needs_parentheses(inner: u8, inner_kind: NodeKind, ast: &Ast, target: NodeId, table: &PrecedenceTable) -> bool {
    let Some(parent) = ast.parent(target) else {
        return false;
    };
    let slot = ast.slot(target);
    match ast.kind(parent) {
        NodeKind::Binary => {
            let op = ast.token(parent).unwrap_or_default();
            let outer = table.binary_level(op);
            if inner != outer {
                return inner < outer;
            }
            // Equal levels: only the associative side may stay bare.
            if table.is_right_associative(op) {
                slot == Slot::Left
            } else {
                slot == Slot::Right
            }
        }
        NodeKind::Unary | NodeKind::Await => inner < table.unary,
        NodeKind::Update => inner < table.postfix,
        NodeKind::Member | NodeKind::Subscript if slot == Slot::Object => inner < table.call,
        NodeKind::Call if slot == Slot::Callee => inner < table.call,
        NodeKind::New if slot == Slot::Callee => {
            inner < table.call || matches!(inner_kind, NodeKind::Call)
        }
        NodeKind::Conditional if slot == Slot::Condition => inner <= table.conditional,
        NodeKind::Conditional => inner < table.assignment,
        NodeKind::Assign if slot == Slot::Left => inner < table.call,
        NodeKind::ExprStmt => {
            inner <= table.sequence
                || matches!(inner_kind, NodeKind::Object | NodeKind::FunctionExpr | NodeKind::ClassExpr)
        }
        NodeKind::Arrow if slot == Slot::Body => {
            inner <= table.sequence || inner_kind == NodeKind::Object
        }
        _ => inner <= table.sequence,
    }
}

/// Wraps `text` in parentheses when `needs_parentheses` says so.
pub fn parenthesize_for(text: &str, inner: u8, inner_kind: NodeKind, ast: &Ast, target: NodeId, table: &PrecedenceTable) -> String {
    if needs_parentheses(inner, inner_kind, ast, target, table) {
        format!("({text})")
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::CompilationUnit;

    #[test]
    fn test_sum_into_product_needs_parentheses() {
        let unit = CompilationUnit::parse("t.js", "let v = x * 2;").unwrap();
        let table = PrecedenceTable::default();
        let x = unit.find(NodeKind::Name, "x").unwrap();
        let sum = table.binary_level("+");
        assert!(needs_parentheses(sum, NodeKind::Binary, &unit.ast, x, &table));
        assert!(!needs_parentheses(table.primary, NodeKind::Literal, &unit.ast, x, &table));
    }

    #[test]
    fn test_right_operand_of_same_level_needs_parentheses() {
        let unit = CompilationUnit::parse("t.js", "let v = a - b;").unwrap();
        let table = PrecedenceTable::default();
        let b = unit.find(NodeKind::Name, "b").unwrap();
        let a = unit.find(NodeKind::Name, "a").unwrap();
        let level = table.binary_level("+");
        assert!(needs_parentheses(level, NodeKind::Binary, &unit.ast, b, &table));
        assert!(!needs_parentheses(level, NodeKind::Binary, &unit.ast, a, &table));
    }

    #[test]
    fn test_declarator_value_only_wraps_sequences() {
        let unit = CompilationUnit::parse("t.js", "let v = a;").unwrap();
        let table = PrecedenceTable::default();
        let a = unit.find(NodeKind::Name, "a").unwrap();
        assert!(!needs_parentheses(table.conditional, NodeKind::Conditional, &unit.ast, a, &table));
        assert!(needs_parentheses(table.sequence, NodeKind::Sequence, &unit.ast, a, &table));
    }

    #[test]
    fn test_precedence_of_nodes() {
        let unit = CompilationUnit::parse("t.js", "let v = a + b * c;").unwrap();
        let table = PrecedenceTable::default();
        let sum = unit.find(NodeKind::Binary, "a + b * c").unwrap();
        assert_eq!(precedence(&unit.ast, sum, &table), 12);
    }
}
