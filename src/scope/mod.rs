//! Scope analysis for semantic refactoring operations.
//!
//! - **Binding**: a named entity resolved by the binder ([`binding`])
//! - **Selection**: a source interval and the nodes it covers ([`selection`])
//! - **Reference**: uses of a binding across a workspace ([`reference`])
//! - **Usage**: how a binding is accessed inside a subtree ([`usage`])
//! - **Scope**: the names visible at a cursor, used to synthesize fresh names
//!   ([`CodeScope`])
//!
//! ## Example
//!
//! ```rust
//! use refactor_js::ast::{CompilationUnit, NodeKind};
//! use refactor_js::scope::CodeScope;
//!
//! let unit = CompilationUnit::parse("a.js", "function f(x) { let x1 = x; return x1; }")?;
//! let ret = unit.find(NodeKind::Return, "return x1;").unwrap();
//! let mut scope = CodeScope::at(&unit.ast, ret);
//! assert_eq!(scope.create_name("x", true), "x2");
//! # Ok::<(), refactor_js::error::RefactorError>(())
//! ```

pub mod binding;
pub mod reference;
pub mod selection;
pub mod usage;

pub use binding::{Binding, BindingId, BindingKind, BindingTable};
pub use reference::{
    CancellationToken, NullProgressMonitor, ProgressMonitor, ReferenceIndex, ResolutionConfidence,
    SearchEngine, SearchMatch, SymbolKey, TokenMonitor,
};
pub use selection::{NodePosition, Selection, SelectionAnalyzer};
pub use usage::{AccessKind, Usage, UsageAnalyzer};

use std::collections::BTreeSet;

use crate::ast::{Ast, NodeId};

/// Words that can never be used as identifiers.
const RESERVED: &[&str] = &[
    "arguments", "await", "break", "case", "catch", "class", "const", "continue",
    "debugger", "default", "delete", "do", "else", "enum", "eval", "export", "extends",
    "false", "finally", "for", "function", "if", "import", "in", "instanceof", "let",
    "new", "null", "return", "static", "super", "switch", "this", "throw", "true", "try",
    "typeof", "undefined", "var", "void", "while", "with", "yield",
];

/// Whether `name` is a reserved word that cannot be declared.
pub fn is_reserved(name: &str) -> bool {
    RESERVED.contains(&name)
}

/// The names visible at a cursor position, used to synthesize collision-free
/// identifiers.
///
/// A name counts as taken when it is declared in any scope enclosing the cursor,
/// in any scope nested inside the cursor's innermost scope (a new declaration
/// there would shadow it), or is a global the unit refers to. Names handed out
/// by [`CodeScope::create_name`] are remembered separately so one refactoring
/// can ask for several distinct names.
#[derive(Debug, Clone, Default)]
pub struct CodeScope {
    visible: BTreeSet<String>,
    synthesized: BTreeSet<String>,
}

impl CodeScope {
    /// Builds the scope visible at `cursor`.
    pub fn at(ast: &Ast, cursor: NodeId) -> Self {
        let mut visible = BTreeSet::new();
        let table = ast.bindings();
        let innermost = ast
            .ancestors_inclusive(cursor)
            .find(|a| ast.kind(*a).is_scope())
            .unwrap_or_else(|| ast.root());

        for scope in ast.ancestors_inclusive(innermost) {
            for binding in table.declared_in(scope) {
                visible.insert(table.get(*binding).name.clone());
            }
        }
        for nested in ast.descendants(innermost) {
            for binding in table.declared_in(nested) {
                visible.insert(table.get(*binding).name.clone());
            }
        }
        visible.extend(table.global_names().map(str::to_string));

        Self {
            visible,
            synthesized: BTreeSet::new(),
        }
    }

    /// Whether `name` collides with anything visible or already synthesized.
    pub fn is_in_use(&self, name: &str) -> bool {
        RESERVED.contains(&name) || self.visible.contains(name) || self.synthesized.contains(name)
    }

    /// Marks `name` as taken without synthesizing it.
    pub fn reserve(&mut self, name: impl Into<String>) {
        self.visible.insert(name.into());
    }

    /// Returns `base`, or `base` with the smallest numeric suffix that is free.
    ///
    /// With `must_be_new`, the result is also distinct from every name this
    /// scope has already produced, and is remembered for later calls.
    pub fn create_name(&mut self, base: &str, must_be_new: bool) -> String {
        let base = if base.is_empty() { "temp" } else { base };
        let taken = |name: &str| {
            RESERVED.contains(&name)
                || self.visible.contains(name)
                || (must_be_new && self.synthesized.contains(name))
        };
        let mut candidate = base.to_string();
        let mut suffix = 1;
        while taken(&candidate) {
            candidate = format!("{base}{suffix}");
            suffix += 1;
        }
        if must_be_new {
            self.synthesized.insert(candidate.clone());
        }
        candidate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{CompilationUnit, NodeKind};

    #[test]
    fn test_create_name_is_deterministic() {
        let unit = CompilationUnit::parse("t.js", "function f(a) { let b = a; return b; }").unwrap();
        let ret = unit.find(NodeKind::Return, "return b;").unwrap();
        let mut first = CodeScope::at(&unit.ast, ret);
        let mut second = CodeScope::at(&unit.ast, ret);
        assert_eq!(first.create_name("a", true), second.create_name("a", true));
        assert_eq!(first.create_name("a", false), "a1");
    }

    #[test]
    fn test_must_be_new_avoids_previous_results() {
        let unit = CompilationUnit::parse("t.js", "function f() { return 1; }").unwrap();
        let ret = unit.find(NodeKind::Return, "return 1;").unwrap();
        let mut scope = CodeScope::at(&unit.ast, ret);
        assert_eq!(scope.create_name("value", true), "value");
        assert_eq!(scope.create_name("value", true), "value1");
        assert_eq!(scope.create_name("value", false), "value");
    }

    #[test]
    fn test_nested_declarations_count_as_taken() {
        let unit = CompilationUnit::parse("t.js", "function f() { g(); { let tmp = 1; } }").unwrap();
        let call = unit.find(NodeKind::ExprStmt, "g();").unwrap();
        let mut scope = CodeScope::at(&unit.ast, call);
        assert!(scope.is_in_use("g"));
        assert_eq!(scope.create_name("tmp", true), "tmp1");
    }

    #[test]
    fn test_reserved_words_are_skipped() {
        let unit = CompilationUnit::parse("t.js", "f();").unwrap();
        let mut scope = CodeScope::at(&unit.ast, unit.ast.root());
        assert_eq!(scope.create_name("new", true), "new1");
    }
}
