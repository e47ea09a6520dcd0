//! Tree walk computing [`FlowInfo`] for a region relative to a selection.

use crate::ast::{Ast, NodeId, NodeKind, Slot};
use crate::scope::BindingKind;
use crate::scope::selection::{NodePosition, Selection};
use crate::scope::usage::{AccessKind, access_kind};
use crate::transform::TextRange;

use super::{AccessMode, FlowInfo, ReturnKind};

/// Which accesses a walk records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowMode {
    /// Only the walked nodes, all of them recorded as they are.
    InOut,
    /// Accesses inside the selection are recorded as they are, every other
    /// access as [`AccessMode::UNKNOWN`].
    Input,
    /// Only accesses that may run after the selection: code following it, and
    /// when the selection sits in a loop, the rest of that loop.
    After,
}

enum Record {
    Actual,
    Potential,
    Unknown,
    Skip,
}

/// Computes [`FlowInfo`] over statements and expressions.
#[derive(Debug, Clone, Copy)]
pub struct FlowAnalyzer<'a> {
    ast: &'a Ast,
    mode: FlowMode,
    selection: TextRange,
    /// Outermost loop around the selection in its function (after mode only).
    loop_scope: Option<NodeId>,
}

impl<'a> FlowAnalyzer<'a> {
    /// Analyzes exactly the nodes passed to [`FlowAnalyzer::perform`].
    pub fn in_out(ast: &'a Ast) -> Self {
        Self {
            ast,
            mode: FlowMode::InOut,
            selection: TextRange::empty(0),
            loop_scope: None,
        }
    }

    /// Walks a whole body; only the selection's accesses are known.
    pub fn input(ast: &'a Ast, selection: TextRange) -> Self {
        Self {
            ast,
            mode: FlowMode::Input,
            selection,
            loop_scope: None,
        }
    }

    /// Walks a whole body recording what may run after the selection.
    pub fn after(ast: &'a Ast, selection: TextRange) -> Self {
        let covering = ast.covering_node(selection);
        let loop_scope = ast
            .ancestors_inclusive(covering)
            .take_while(|a| !ast.kind(*a).is_function_like())
            .filter(|a| ast.kind(*a).is_loop() && !selection.covers(ast.range(*a)))
            .last();
        Self {
            ast,
            mode: FlowMode::After,
            selection,
            loop_scope,
        }
    }

    pub fn mode(&self) -> FlowMode {
        self.mode
    }

    /// Analyzes `nodes` as a statement sequence.
    pub fn perform(&self, nodes: &[NodeId]) -> FlowInfo {
        let mut info = FlowInfo::new();
        for node in nodes {
            info.merge_sequential(self.visit(*node, false));
        }
        info
    }

    fn position(&self, node: NodeId) -> NodePosition {
        Selection::from_range(self.selection).classify_node(self.ast, node)
    }

    fn record(&self, node: NodeId) -> Record {
        match self.mode {
            FlowMode::InOut => Record::Actual,
            FlowMode::Input => match self.position(node) {
                NodePosition::Selected => Record::Actual,
                _ => Record::Unknown,
            },
            FlowMode::After => match self.position(node) {
                NodePosition::Selected => Record::Skip,
                _ if self
                    .loop_scope
                    .is_some_and(|l| self.ast.is_ancestor_or_self(l, node)) =>
                {
                    Record::Potential
                }
                NodePosition::After => Record::Actual,
                _ => Record::Skip,
            },
        }
    }

    fn tracked(&self, node: NodeId) -> Option<crate::scope::BindingId> {
        let binding = self.ast.binding_of(node)?;
        match self.ast.binding(binding).kind {
            BindingKind::Global | BindingKind::Method | BindingKind::Field => None,
            _ => Some(binding),
        }
    }

    fn name(&self, node: NodeId, in_closure: bool) -> FlowInfo {
        let Some(binding) = self.tracked(node) else {
            return FlowInfo::new();
        };
        let mode = match access_kind(self.ast, node) {
            AccessKind::Read => AccessMode::READ,
            AccessKind::Write => AccessMode::WRITE,
            AccessKind::ReadWrite => AccessMode::READ | AccessMode::WRITE,
            AccessKind::Declare => return FlowInfo::new(),
        };
        let mode = match self.record(node) {
            Record::Skip => return FlowInfo::new(),
            Record::Unknown => AccessMode::UNKNOWN,
            Record::Potential => mode.to_potential(),
            Record::Actual => mode,
        };
        let mode = if in_closure {
            mode.to_potential() | AccessMode::UNKNOWN
        } else {
            mode
        };
        FlowInfo::access(binding, mode)
    }

    fn sequence(&self, nodes: impl IntoIterator<Item = NodeId>, in_closure: bool) -> FlowInfo {
        let mut info = FlowInfo::new();
        for node in nodes {
            info.merge_sequential(self.visit(node, in_closure));
        }
        info
    }

    fn slot(&self, node: NodeId, slot: Slot, in_closure: bool) -> FlowInfo {
        self.sequence(self.ast.children_in(node, slot).collect::<Vec<_>>(), in_closure)
    }

    fn visit(&self, node: NodeId, in_closure: bool) -> FlowInfo {
        let ast = self.ast;
        match ast.kind(node) {
            NodeKind::Name => self.name(node, in_closure),
            NodeKind::PropertyName | NodeKind::Label | NodeKind::Literal | NodeKind::This => {
                FlowInfo::new()
            }

            NodeKind::FunctionDecl
            | NodeKind::FunctionExpr
            | NodeKind::Arrow
            | NodeKind::MethodDecl
            | NodeKind::ClassDecl
            | NodeKind::ClassExpr => {
                // Bodies of nested functions run at an unknown time, if at all.
                strip_returns(self.sequence(ast.children(node).to_vec(), true))
            }

            NodeKind::Assign => {
                let mut info = self.slot(node, Slot::Right, in_closure);
                info.merge_sequential(self.slot(node, Slot::Left, in_closure));
                info
            }
            NodeKind::Declarator => {
                let mut info = self.slot(node, Slot::Value, in_closure);
                info.merge_sequential(self.slot(node, Slot::Name, in_closure));
                info
            }
            NodeKind::Binary if matches!(ast.token(node), Some("&&" | "||" | "??")) => {
                let mut info = self.slot(node, Slot::Left, in_closure);
                info.merge_sequential(FlowInfo::merge_conditional(
                    &[self.slot(node, Slot::Right, in_closure)],
                    false,
                ));
                info
            }
            NodeKind::If | NodeKind::Conditional => {
                let mut info = self.slot(node, Slot::Condition, in_closure);
                let then = self.slot(node, Slot::Then, in_closure);
                let otherwise = ast.child(node, Slot::Else);
                let branches = match otherwise {
                    Some(e) => FlowInfo::merge_conditional(&[then, self.visit(e, in_closure)], true),
                    None => FlowInfo::merge_conditional(&[then], false),
                };
                info.merge_sequential(branches);
                info
            }
            NodeKind::While => {
                let mut info = self.slot(node, Slot::Condition, in_closure);
                info.merge_sequential(self.loop_body(node, in_closure).into_repeated());
                info
            }
            NodeKind::DoWhile => {
                let mut info = self.loop_body(node, in_closure);
                info.merge_sequential(self.slot(node, Slot::Condition, in_closure));
                info
            }
            NodeKind::For => {
                let mut info = self.slot(node, Slot::Init, in_closure);
                info.merge_sequential(self.slot(node, Slot::Condition, in_closure));
                let mut body = self.loop_body(node, in_closure);
                body.merge_sequential(self.slot(node, Slot::Update, in_closure));
                info.merge_sequential(body.into_repeated());
                info
            }
            NodeKind::ForIn => {
                let mut info = self.slot(node, Slot::Right, in_closure);
                let mut body = self.slot(node, Slot::Left, in_closure);
                body.merge_sequential(self.loop_body(node, in_closure));
                info.merge_sequential(body.into_repeated());
                info
            }
            NodeKind::Switch => {
                let mut info = self.slot(node, Slot::Condition, in_closure);
                let cases: Vec<NodeId> = ast.children_in(node, Slot::Cases).collect();
                let exhaustive = cases
                    .iter()
                    .any(|c| ast.token(*c) == Some("default"));
                let arms: Vec<FlowInfo> = cases
                    .iter()
                    .map(|c| {
                        let mut arm = self.slot(*c, Slot::Condition, in_closure);
                        arm.merge_sequential(self.slot(*c, Slot::Statements, in_closure));
                        arm
                    })
                    .collect();
                info.merge_sequential(FlowInfo::merge_conditional(&arms, exhaustive));
                info
            }
            NodeKind::Try => {
                let mut info = self.slot(node, Slot::Body, in_closure);
                if let Some(handler) = ast.child(node, Slot::Handler) {
                    let caught = self.visit(handler, in_closure);
                    info = FlowInfo::merge_conditional(&[info, caught], true);
                }
                info.merge_sequential(self.slot(node, Slot::Finalizer, in_closure));
                info
            }
            NodeKind::Return => {
                let mut info = self.slot(node, Slot::Expression, in_closure);
                let kind = if ast.child(node, Slot::Expression).is_some() {
                    ReturnKind::ValueReturn
                } else {
                    ReturnKind::VoidReturn
                };
                info.merge_sequential(FlowInfo::with_return(kind));
                info
            }
            NodeKind::Throw => {
                let mut info = self.slot(node, Slot::Expression, in_closure);
                info.merge_sequential(FlowInfo::with_return(ReturnKind::Throw));
                info
            }
            NodeKind::Break | NodeKind::Continue => FlowInfo::branch(),
            _ => self.sequence(ast.children(node).to_vec(), in_closure),
        }
    }

    fn loop_body(&self, node: NodeId, in_closure: bool) -> FlowInfo {
        let body = self.slot(node, Slot::Body, in_closure);
        match body.return_kind() {
            ReturnKind::NoReturn => body,
            // Leaving through `break` makes any exit from the body partial.
            _ => with_returns(body, ReturnKind::PartialReturn),
        }
    }
}

fn strip_returns(info: FlowInfo) -> FlowInfo {
    with_returns(info, ReturnKind::NoReturn)
}

fn with_returns(info: FlowInfo, returns: ReturnKind) -> FlowInfo {
    let mut out = FlowInfo::with_return(returns);
    for (binding, mode) in info.iter() {
        out.modes.insert(binding, mode);
    }
    out
}

/// `break` and `continue` statements inside `nodes` whose target lies outside
/// them.
pub fn branch_escapes(ast: &Ast, nodes: &[NodeId]) -> Vec<NodeId> {
    let inside = |target: NodeId| nodes.iter().any(|n| ast.is_ancestor_or_self(*n, target));
    let mut escapes = Vec::new();
    for root in nodes {
        for node in ast.descendants(*root) {
            let kind = ast.kind(node);
            if kind != NodeKind::Break && kind != NodeKind::Continue {
                continue;
            }
            if let Some(target) = branch_target(ast, node)
                && !inside(target)
            {
                escapes.push(node);
            }
        }
    }
    escapes
}

/// The statement a `break` or `continue` transfers control to.
fn branch_target(ast: &Ast, node: NodeId) -> Option<NodeId> {
    let label = ast.child(node, Slot::Label).and_then(|l| ast.token(l));
    for ancestor in ast.ancestors(node) {
        let kind = ast.kind(ancestor);
        if kind.is_function_like() {
            return None;
        }
        match label {
            Some(label) => {
                if kind == NodeKind::Labeled
                    && ast.child(ancestor, Slot::Label).and_then(|l| ast.token(l)) == Some(label)
                {
                    return Some(ancestor);
                }
            }
            None => {
                if kind.is_loop() || (kind == NodeKind::Switch && ast.kind(node) == NodeKind::Break) {
                    return Some(ancestor);
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::CompilationUnit;
    use crate::scope::BindingId;

    fn binding(unit: &CompilationUnit, name: &str) -> BindingId {
        let node = unit.find(NodeKind::Name, name).unwrap();
        unit.ast.binding_of(node).unwrap()
    }

    fn statements(unit: &CompilationUnit, first: &str, last: &str) -> Vec<NodeId> {
        let start = unit.source.find(first).unwrap();
        let end = unit.source.find(last).unwrap() + last.len();
        let range = TextRange::new(start, end);
        let covering = unit.ast.covering_node(range);
        unit.ast
            .children(covering)
            .iter()
            .copied()
            .filter(|c| range.covers(unit.ast.range(*c)))
            .collect()
    }

    #[test]
    fn test_in_out_read_and_write() {
        let unit = CompilationUnit::parse("t.js", "function f(a) { let b = a + 1; b++; return b; }").unwrap();
        let nodes = statements(&unit, "let b", "b++;");
        let info = FlowAnalyzer::in_out(&unit.ast).perform(&nodes);
        assert_eq!(info.get(binding(&unit, "a")), AccessMode::READ);
        assert_eq!(info.get(binding(&unit, "b")), AccessMode::WRITE);
        assert_eq!(info.return_kind(), ReturnKind::NoReturn);
    }

    #[test]
    fn test_branch_accesses_are_potential() {
        let src = "function f(c, x) { if (c) { x = 1; } else { g(x); } }";
        let unit = CompilationUnit::parse("t.js", src).unwrap();
        let stmt = unit.find(NodeKind::If, "if (c) { x = 1; } else { g(x); }").unwrap();
        let info = FlowAnalyzer::in_out(&unit.ast).perform(&[stmt]);
        assert_eq!(
            info.get(binding(&unit, "x")),
            AccessMode::READ_POTENTIAL | AccessMode::WRITE_POTENTIAL
        );
        assert_eq!(info.get(binding(&unit, "c")), AccessMode::READ);
    }

    #[test]
    fn test_partial_return() {
        let src = "function f(c) { if (c) { return 1; } g(); }";
        let unit = CompilationUnit::parse("t.js", src).unwrap();
        let stmt = unit.find(NodeKind::If, "if (c) { return 1; }").unwrap();
        let info = FlowAnalyzer::in_out(&unit.ast).perform(&[stmt]);
        assert_eq!(info.return_kind(), ReturnKind::PartialReturn);
    }

    #[test]
    fn test_closure_access_is_unknown() {
        let src = "function f(x) { run(() => x); }";
        let unit = CompilationUnit::parse("t.js", src).unwrap();
        let stmt = unit.find(NodeKind::ExprStmt, "run(() => x);").unwrap();
        let info = FlowAnalyzer::in_out(&unit.ast).perform(&[stmt]);
        let mode = info.get(binding(&unit, "x"));
        assert!(mode.contains(AccessMode::UNKNOWN));
        assert!(mode.contains(AccessMode::READ_POTENTIAL));
    }

    #[test]
    fn test_input_mode_marks_outside_unknown() {
        let src = "function f() { let a = 1; let b = a; g(b); }";
        let unit = CompilationUnit::parse("t.js", src).unwrap();
        let func = unit.find(NodeKind::FunctionDecl, src).unwrap();
        let start = src.find("let b = a;").unwrap();
        let selection = TextRange::at(start, "let b = a;".len());
        let body = unit.ast.body_statements(func);
        let info = FlowAnalyzer::input(&unit.ast, selection).perform(&body);
        let b = binding(&unit, "b");
        assert!(info.get(b).contains(AccessMode::WRITE));
        assert!(info.get(b).contains(AccessMode::UNKNOWN));
    }

    #[test]
    fn test_after_mode_in_loop() {
        let src = "function f() { let s = 0; for (let i = 0; i < 3; i++) { g(s); s = s + i; } }";
        let unit = CompilationUnit::parse("t.js", src).unwrap();
        let func = unit.find(NodeKind::FunctionDecl, src).unwrap();
        let start = src.find("s = s + i;").unwrap();
        let selection = TextRange::at(start, "s = s + i;".len());
        let info = FlowAnalyzer::after(&unit.ast, selection).perform(&unit.ast.body_statements(func));
        assert!(info.get(binding(&unit, "s")).intersects(AccessMode::ANY_READ));
    }

    #[test]
    fn test_after_mode_write_hides_later_read() {
        let src = "function f() { let a = 1; a = 2; g(a); }";
        let unit = CompilationUnit::parse("t.js", src).unwrap();
        let func = unit.find(NodeKind::FunctionDecl, src).unwrap();
        let selection = TextRange::at(src.find("let a = 1;").unwrap(), "let a = 1;".len());
        let info = FlowAnalyzer::after(&unit.ast, selection).perform(&unit.ast.body_statements(func));
        assert!(!info.get(binding(&unit, "a")).intersects(AccessMode::ANY_READ));
    }

    #[test]
    fn test_branch_escapes() {
        let src = "function f() { while (c) { if (d) { break; } for (;;) { continue; } } }";
        let unit = CompilationUnit::parse("t.js", src).unwrap();
        let stmt = unit.find(NodeKind::If, "if (d) { break; }").unwrap();
        assert_eq!(branch_escapes(&unit.ast, &[stmt]).len(), 1);
        let inner = unit.find(NodeKind::For, "for (;;) { continue; }").unwrap();
        assert!(branch_escapes(&unit.ast, &[inner]).is_empty());
    }
}
