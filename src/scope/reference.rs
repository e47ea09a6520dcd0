//! Cross-unit reference search.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::ast::{Ast, CompilationUnit, NodeId, NodeKind, Slot};
use crate::error::{RefactorError, Result};
use crate::transform::TextRange;

use super::binding::{BindingId, BindingKind};

/// Identity of a symbol that can be referenced from other units.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymbolKey {
    /// A top-level function.
    Function { name: String },
    /// A top-level class.
    Class { name: String },
    /// A method or field of a named class.
    Member {
        class: String,
        name: String,
        is_static: bool,
    },
}

impl SymbolKey {
    /// The key of a binding, when it is visible outside its unit.
    pub fn of(ast: &Ast, binding: BindingId) -> Option<Self> {
        let b = ast.binding(binding);
        match b.kind {
            BindingKind::Function if b.scope == ast.root() => Some(SymbolKey::Function {
                name: b.name.clone(),
            }),
            BindingKind::Class if b.scope == ast.root() => Some(SymbolKey::Class {
                name: b.name.clone(),
            }),
            BindingKind::Method | BindingKind::Field => {
                let owner = b.owner?;
                let class = ast.declared_name(owner)?.to_string();
                Some(SymbolKey::Member {
                    class,
                    name: b.name.clone(),
                    is_static: b.is_static,
                })
            }
            _ => None,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            SymbolKey::Function { name } | SymbolKey::Class { name } => name,
            SymbolKey::Member { name, .. } => name,
        }
    }
}

impl fmt::Display for SymbolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolKey::Function { name } => write!(f, "function {name}"),
            SymbolKey::Class { name } => write!(f, "class {name}"),
            SymbolKey::Member {
                class,
                name,
                is_static: true,
            } => write!(f, "{class}.{name}"),
            SymbolKey::Member { class, name, .. } => write!(f, "{class}.prototype.{name}"),
        }
    }
}

/// Confidence level for reference resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResolutionConfidence {
    /// Low confidence (name match on a receiver of unknown type).
    Low,
    /// Medium confidence (name resolves to a global of the same name).
    Medium,
    /// Certain (the binder resolved it to the declaration).
    Certain,
}

/// One reference occurrence reported by a [`SearchEngine`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchMatch {
    pub unit: PathBuf,
    pub offset: usize,
    pub length: usize,
    pub confidence: ResolutionConfidence,
}

impl SearchMatch {
    pub fn range(&self) -> TextRange {
        TextRange::at(self.offset, self.length)
    }

    /// Re-resolves the match to the name node it denotes in `unit`.
    pub fn resolve(&self, unit: &CompilationUnit) -> Option<NodeId> {
        let node = unit.ast.covering_node(self.range());
        (matches!(unit.ast.kind(node), NodeKind::Name | NodeKind::PropertyName)
            && unit.ast.range(node) == self.range())
        .then_some(node)
    }
}

/// Progress reporting and cancellation for long scans.
pub trait ProgressMonitor {
    /// Starts a task of `total` work units.
    fn begin(&mut self, _task: &str, _total: usize) {}

    /// Reports `amount` finished units.
    fn worked(&mut self, _amount: usize) {}

    fn is_canceled(&self) -> bool {
        false
    }

    fn done(&mut self) {}
}

/// A monitor that ignores progress and is never canceled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgressMonitor;

impl ProgressMonitor for NullProgressMonitor {}

/// Shared cancellation flag.
#[derive(Debug, Default, Clone)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A monitor that counts ticks and observes a [`CancellationToken`].
#[derive(Debug, Default, Clone)]
pub struct TokenMonitor {
    pub token: CancellationToken,
    pub total: usize,
    pub ticks: usize,
    /// Cancel the token once this many ticks have been reported.
    pub cancel_after: Option<usize>,
}

impl TokenMonitor {
    pub fn new(token: CancellationToken) -> Self {
        Self {
            token,
            ..Self::default()
        }
    }
}

impl ProgressMonitor for TokenMonitor {
    fn begin(&mut self, _task: &str, total: usize) {
        self.total = total;
        self.ticks = 0;
    }

    fn worked(&mut self, amount: usize) {
        self.ticks += amount;
        if self.cancel_after.is_some_and(|limit| self.ticks >= limit) {
            self.token.cancel();
        }
    }

    fn is_canceled(&self) -> bool {
        self.token.is_canceled()
    }
}

/// Finds reference occurrences of a symbol across a project.
pub trait SearchEngine {
    fn find_references(
        &self,
        key: &SymbolKey,
        monitor: &mut dyn ProgressMonitor,
    ) -> Result<Vec<SearchMatch>>;
}

/// In-memory search over a set of parsed units.
#[derive(Debug, Clone, Copy)]
pub struct ReferenceIndex<'a> {
    units: &'a [CompilationUnit],
}

impl<'a> ReferenceIndex<'a> {
    pub fn new(units: &'a [CompilationUnit]) -> Self {
        Self { units }
    }

    fn scan_unit(&self, unit: &CompilationUnit, key: &SymbolKey, out: &mut Vec<SearchMatch>) {
        let ast = &unit.ast;
        for node in ast.descendants(ast.root()) {
            let Some(confidence) = match_confidence(ast, node, key) else {
                continue;
            };
            let range = ast.range(node);
            if confidence == ResolutionConfidence::Low {
                tracing::trace!(unit = %unit.path.display(), offset = range.start, "low-confidence match for {key}");
            }
            out.push(SearchMatch {
                unit: unit.path.clone(),
                offset: range.start,
                length: range.len(),
                confidence,
            });
        }
    }
}

impl SearchEngine for ReferenceIndex<'_> {
    fn find_references(
        &self,
        key: &SymbolKey,
        monitor: &mut dyn ProgressMonitor,
    ) -> Result<Vec<SearchMatch>> {
        monitor.begin(&format!("searching references to {key}"), self.units.len());
        let mut matches = Vec::new();
        for unit in self.units {
            if monitor.is_canceled() {
                return Err(RefactorError::Canceled);
            }
            self.scan_unit(unit, key, &mut matches);
            monitor.worked(1);
        }
        monitor.done();
        tracing::debug!(count = matches.len(), "found references to {key}");
        Ok(matches)
    }
}

fn is_declaration(ast: &Ast, node: NodeId) -> bool {
    ast.binding_of(node)
        .is_some_and(|b| ast.binding(b).declaration == Some(node))
}

fn match_confidence(ast: &Ast, node: NodeId, key: &SymbolKey) -> Option<ResolutionConfidence> {
    if ast.token(node) != Some(key.name()) || is_declaration(ast, node) {
        return None;
    }
    match (ast.kind(node), key) {
        (NodeKind::Name, SymbolKey::Function { .. } | SymbolKey::Class { .. }) => {
            let binding = ast.binding(ast.binding_of(node)?);
            let expected = match key {
                SymbolKey::Function { .. } => BindingKind::Function,
                _ => BindingKind::Class,
            };
            if binding.kind == expected && binding.scope == ast.root() {
                Some(ResolutionConfidence::Certain)
            } else if binding.kind == BindingKind::Global {
                Some(ResolutionConfidence::Medium)
            } else {
                None
            }
        }
        (
            NodeKind::PropertyName,
            SymbolKey::Member {
                class, is_static, ..
            },
        ) => {
            if ast.slot(node) != Slot::Property {
                return None;
            }
            if let Some(binding) = ast.binding_of(node) {
                let b = ast.binding(binding);
                let owner = b.owner.and_then(|o| ast.declared_name(o));
                return (owner == Some(class.as_str()) && b.is_static == *is_static)
                    .then_some(ResolutionConfidence::Certain);
            }
            let object = ast.child(ast.parent(node)?, Slot::Object)?;
            match ast.kind(object) {
                NodeKind::Name => {
                    let receiver = ast.binding(ast.binding_of(object)?);
                    if receiver.kind == BindingKind::Global && receiver.name == *class {
                        is_static.then_some(ResolutionConfidence::Medium)
                    } else if receiver.kind == BindingKind::Class {
                        None
                    } else {
                        (!is_static).then_some(ResolutionConfidence::Low)
                    }
                }
                NodeKind::This | NodeKind::Super => None,
                _ => (!is_static).then_some(ResolutionConfidence::Low),
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn units() -> Vec<CompilationUnit> {
        vec![
            CompilationUnit::parse(
                "lib.js",
                "function helper(x) { return x * 2; }\nclass Box { static make() { return new Box(); } get() { return helper(1); } }\n",
            )
            .unwrap(),
            CompilationUnit::parse("main.js", "helper(3);\nconst b = Box.make();\nb.get();\n").unwrap(),
        ]
    }

    #[test]
    fn test_function_references_across_units() {
        let units = units();
        let index = ReferenceIndex::new(&units);
        let key = SymbolKey::Function {
            name: "helper".to_string(),
        };
        let matches = index.find_references(&key, &mut NullProgressMonitor).unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].confidence, ResolutionConfidence::Certain);
        assert_eq!(matches[1].unit, PathBuf::from("main.js"));
        assert_eq!(matches[1].confidence, ResolutionConfidence::Medium);
        assert!(matches[1].resolve(&units[1]).is_some());
    }

    #[test]
    fn test_member_references() {
        let units = units();
        let index = ReferenceIndex::new(&units);
        let make = SymbolKey::Member {
            class: "Box".to_string(),
            name: "make".to_string(),
            is_static: true,
        };
        let matches = index.find_references(&make, &mut NullProgressMonitor).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].confidence, ResolutionConfidence::Medium);

        let get = SymbolKey::Member {
            class: "Box".to_string(),
            name: "get".to_string(),
            is_static: false,
        };
        let matches = index.find_references(&get, &mut NullProgressMonitor).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].confidence, ResolutionConfidence::Low);
    }

    #[test]
    fn test_symbol_key_of_binding() {
        let units = units();
        let ast = &units[0].ast;
        let name = units[0].find(NodeKind::Name, "helper").unwrap();
        let key = SymbolKey::of(ast, ast.binding_of(name).unwrap()).unwrap();
        assert_eq!(key.to_string(), "function helper");
    }

    #[test]
    fn test_cancellation_between_units() {
        let units = units();
        let index = ReferenceIndex::new(&units);
        let mut monitor = TokenMonitor::new(CancellationToken::new());
        monitor.cancel_after = Some(1);
        let key = SymbolKey::Class {
            name: "Box".to_string(),
        };
        let result = index.find_references(&key, &mut monitor);
        assert!(matches!(result, Err(RefactorError::Canceled)));
        assert_eq!(monitor.ticks, 1);
    }
}
