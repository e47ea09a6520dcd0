//! # Refactor JS
//!
//! A flow-aware refactoring engine for JavaScript and TypeScript sources.
//!
//! This crate provides:
//! - A typed AST lowered from tree-sitter, with scope and binding resolution
//! - Flow analysis that classifies every variable access in a region as read,
//!   written or unused, definitely or potentially
//! - A node-level rewrite overlay that turns structural edits into one
//!   consistent set of text edits
//! - Refactorings built on these: extract, inline, introduce, promote and
//!   convert operations
//!
//! ## Quick Start
//!
//! ```rust
//! use refactor_js::prelude::*;
//!
//! let src = "function total(items) {\n    let sum = 0;\n    for (const i of items) {\n        sum += i.price;\n    }\n    return sum * 1.2;\n}\n";
//! let ctx = RefactoringContext::for_source("cart.js", src)?.select("sum * 1.2");
//! let mut op = ExtractMethod::new("withTax");
//! let result = RefactoringRunner::new().run(&mut op, &ctx)?;
//! assert!(result.is_success());
//!
//! let change = result.into_change()?;
//! println!("{}", change.diff());
//! # Ok::<(), refactor_js::error::RefactorError>(())
//! ```
//!
//! ## Flow Analysis
//!
//! ```rust
//! use refactor_js::prelude::*;
//!
//! let unit = CompilationUnit::parse("a.js", "function f(a) { let b = a + 1; return b; }")?;
//! let decl = unit.find(NodeKind::VarDecl, "let b = a + 1;").unwrap();
//! let info = FlowAnalyzer::in_out(&unit.ast).perform(&[decl]);
//! let a = unit.ast.bindings().iter().find(|(_, b)| b.name == "a").map(|(id, _)| id).unwrap();
//! assert!(info.get(a).intersects(AccessMode::READ));
//! # Ok::<(), refactor_js::error::RefactorError>(())
//! ```
//!
//! ## Workspaces
//!
//! Operations that update references (inline, introduce parameter, factory
//! and indirection) search every unit of the [`refactor::Workspace`]:
//!
//! ```rust,no_run
//! use refactor_js::prelude::*;
//!
//! let config = RefactorConfig::default();
//! let workspace = Workspace::load("./web", &config)?;
//! let ctx = RefactoringContext::new(workspace, "src/point.js")
//!     .with_config(config)
//!     .select("constructor");
//! let result = RefactoringRunner::new().run(&mut IntroduceFactory::new(), &ctx)?;
//! result.into_change()?.write()?;
//! # Ok::<(), refactor_js::error::RefactorError>(())
//! ```

pub mod ast;
pub mod config;
pub mod diff;
pub mod error;
pub mod flow;
pub mod lang;
pub mod refactor;
pub mod rewrite;
pub mod scope;
pub mod transform;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::ast::{Ast, CompilationUnit, NodeId, NodeKind, Slot};
    pub use crate::config::{PrecedenceTable, RefactorConfig};
    pub use crate::error::{RefactorError, Result};
    pub use crate::flow::{AccessMode, FlowAnalyzer, FlowInfo, ReturnKind};
    pub use crate::lang::{Language, LanguageRegistry, Tsx, TypeScript};
    pub use crate::refactor::Workspace;
    pub use crate::refactor::operations::{
        CallContext, Change, ConvertAnonymousToNested, ExtractConstant, ExtractMethod,
        ExtractVariable, FieldInitialization, InlineConstant, InlineMethod, IntroduceFactory,
        IntroduceIndirection, IntroduceParameter, PromoteTempToField, RefactoringContext,
        RefactoringOperation, RefactoringResult, RefactoringRunner, RefactoringState,
        RefactoringStatus, Severity,
    };
    pub use crate::rewrite::{AstRewrite, Part, RewriteError};
    pub use crate::scope::{
        Binding, BindingKind, CancellationToken, CodeScope, ProgressMonitor, Selection,
        SymbolKey, UsageAnalyzer,
    };
    pub use crate::transform::{FileChange, TextEdit, TextEditSet, TextRange};
}

pub use prelude::*;
