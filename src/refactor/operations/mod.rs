//! Refactoring operations and the runner that sequences their checks.
//!
//! Every operation implements [`RefactoringOperation`]: a cheap check of the
//! selection, a semantic check that may search the workspace, and the edit
//! computation. [`RefactoringRunner`] drives the three phases, stops at the
//! first fatal status, and re-parses the result to catch new syntax errors.
//!
//! ## Available Operations
//!
//! ### Extract Operations
//! - [`ExtractMethod`] - Extract statements or an expression into a function or method
//! - [`ExtractVariable`] - Extract an expression into a local constant
//! - [`ExtractConstant`] - Extract a constant expression into a static field or module constant
//!
//! ### Inline Operations
//! - [`InlineMethod`] - Replace calls with the callee's body
//! - [`InlineConstant`] - Replace references to a constant with its value
//!
//! ### Introduce Operations
//! - [`IntroduceParameter`] - Turn an expression into a new parameter
//! - [`IntroduceFactory`] - Route constructor calls through a static factory
//! - [`IntroduceIndirection`] - Add a static delegate for a function or method
//!
//! ### Class Operations
//! - [`PromoteTempToField`] - Turn a local variable into a field
//! - [`ConvertAnonymousToNested`] - Turn a class expression into a named class
//!
//! ## Example
//!
//! ```rust
//! use refactor_js::refactor::operations::{ExtractMethod, RefactoringContext, RefactoringRunner};
//!
//! let ctx = RefactoringContext::for_source("a.js", "function f() { var a = 1, b = 2; return a + b; }")?
//!     .select("a + b");
//! let mut op = ExtractMethod::new("sum");
//! let result = RefactoringRunner::new().run(&mut op, &ctx)?;
//! let change = result.change.expect("extract method succeeds");
//! assert!(change.diff().contains("return sum(a, b);"));
//! # Ok::<(), refactor_js::error::RefactorError>(())
//! ```

mod context;
mod convert_anonymous;
mod duplicates;
mod extract;
mod extract_constant;
mod extract_variable;
mod inline;
mod inline_constant;
mod introduce_factory;
mod introduce_indirection;
mod introduce_parameter;
mod promote_temp;
mod status;
mod support;

pub use context::{Change, ChangeBuilder, RefactoringContext, UnitEdits, selected_node};
pub use convert_anonymous::ConvertAnonymousToNested;
pub use duplicates::{Duplicate, DuplicateFinder};
pub use extract::ExtractMethod;
pub use extract_constant::ExtractConstant;
pub use extract_variable::ExtractVariable;
pub use inline::{CallContext, InlineMethod};
pub use inline_constant::InlineConstant;
pub use introduce_factory::IntroduceFactory;
pub use introduce_indirection::IntroduceIndirection;
pub use introduce_parameter::IntroduceParameter;
pub use promote_temp::{FieldInitialization, PromoteTempToField};
pub use status::{RefactoringStatus, Severity, StatusEntry, StatusLocation};

use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use crate::error::{RefactorError, Result};
use crate::lang::{Language, LanguageRegistry, TypeScript, syntax_diagnostics};
use crate::scope::{ProgressMonitor, is_reserved};

/// A refactoring, split into the phases the runner sequences.
///
/// Operations keep the analysis of one phase for the next, so the phases must
/// be called in order on one instance.
pub trait RefactoringOperation {
    /// Returns the name of this operation.
    fn name(&self) -> &'static str;

    /// Checks the selection and the inputs that need no search.
    fn check_selection(&mut self, ctx: &RefactoringContext) -> Result<RefactoringStatus>;

    /// Checks bindings and semantics, searching the workspace where needed.
    fn check_semantics(
        &mut self,
        ctx: &RefactoringContext,
        monitor: &mut dyn ProgressMonitor,
    ) -> Result<RefactoringStatus>;

    /// Records the edits and converts them into a [`Change`].
    fn compute_edits(&mut self, ctx: &RefactoringContext, monitor: &mut dyn ProgressMonitor) -> Result<Change>;
}

/// States of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RefactoringState {
    Initial,
    CheckSelection,
    CheckSemantics,
    ComputeEdits,
    ValidateNewSource,
    Done,
    Failed,
}

impl fmt::Display for RefactoringState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Outcome of a run: every status entry collected, and the change unless a
/// check was fatal.
#[derive(Debug, Clone)]
pub struct RefactoringResult {
    pub status: RefactoringStatus,
    pub change: Option<Change>,
    pub state: RefactoringState,
}

impl RefactoringResult {
    pub fn is_success(&self) -> bool {
        self.state == RefactoringState::Done && self.change.is_some()
    }

    /// The change, or [`RefactorError::Refused`] with the blocking message.
    pub fn into_change(self) -> Result<Change> {
        match self.change {
            Some(change) if self.state == RefactoringState::Done => Ok(change),
            _ => Err(RefactorError::Refused(
                self.status
                    .first_message()
                    .unwrap_or("refactoring did not complete")
                    .to_string(),
            )),
        }
    }
}

/// Drives an operation through its phases.
#[derive(Debug, Clone)]
pub struct RefactoringRunner {
    state: RefactoringState,
    validate: Option<bool>,
}

impl Default for RefactoringRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl RefactoringRunner {
    pub fn new() -> Self {
        Self {
            state: RefactoringState::Initial,
            validate: None,
        }
    }

    /// Overrides the configured re-parse validation.
    pub fn validate(mut self, validate: bool) -> Self {
        self.validate = Some(validate);
        self
    }

    pub fn state(&self) -> RefactoringState {
        self.state
    }

    fn transition(&mut self, operation: &str, next: RefactoringState) {
        tracing::debug!(operation, from = %self.state, to = %next, "refactoring state");
        self.state = next;
    }

    fn failed(&mut self, operation: &str, status: RefactoringStatus) -> RefactoringResult {
        self.transition(operation, RefactoringState::Failed);
        RefactoringResult {
            status,
            change: None,
            state: self.state,
        }
    }

    fn check_canceled(&mut self, operation: &str, ctx: &RefactoringContext) -> Result<()> {
        if ctx.token.is_canceled() {
            self.transition(operation, RefactoringState::Failed);
            return Err(RefactorError::Canceled);
        }
        Ok(())
    }

    /// Runs `operation` against `ctx`. Nothing is written to disk.
    pub fn run(&mut self, operation: &mut dyn RefactoringOperation, ctx: &RefactoringContext) -> Result<RefactoringResult> {
        let name = operation.name();
        let span = tracing::debug_span!("refactoring", operation = name);
        let _enter = span.enter();
        self.state = RefactoringState::Initial;
        let mut monitor = ctx.monitor();

        self.transition(name, RefactoringState::CheckSelection);
        let selection = operation.check_selection(ctx);
        let mut status = self.guard(name, selection)?;
        if status.has_fatal() {
            return Ok(self.failed(name, status));
        }

        self.check_canceled(name, ctx)?;
        self.transition(name, RefactoringState::CheckSemantics);
        let semantics = operation.check_semantics(ctx, &mut monitor);
        let semantics = self.guard(name, semantics)?;
        status.merge(semantics);
        if status.has_fatal() {
            return Ok(self.failed(name, status));
        }

        self.check_canceled(name, ctx)?;
        self.transition(name, RefactoringState::ComputeEdits);
        let change = operation.compute_edits(ctx, &mut monitor);
        let change = self.guard(name, change)?;

        if self.validate.unwrap_or(ctx.config.validate_new_source) {
            self.transition(name, RefactoringState::ValidateNewSource);
            status.merge(validate_new_source(&change)?);
        }

        self.transition(name, RefactoringState::Done);
        for entry in status.entries() {
            tracing::debug!(severity = %entry.severity, "{}", entry.message);
        }
        Ok(RefactoringResult {
            status,
            change: Some(change),
            state: self.state,
        })
    }

    fn guard<T>(&mut self, operation: &str, result: Result<T>) -> Result<T> {
        if result.is_err() {
            self.transition(operation, RefactoringState::Failed);
        }
        result
    }
}

/// Re-parses every changed unit and reports each syntax diagnostic the
/// original did not have.
pub fn validate_new_source(change: &Change) -> Result<RefactoringStatus> {
    let registry = LanguageRegistry::new();
    let fallback = TypeScript;
    let mut status = RefactoringStatus::new();
    for file in change.files.iter().filter(|f| f.is_modified()) {
        let lang: &dyn Language = registry.detect(&file.path).unwrap_or(&fallback);
        let mut known: HashMap<String, usize> = HashMap::new();
        for diagnostic in syntax_diagnostics(lang, &file.original)? {
            *known.entry(diagnostic.message).or_default() += 1;
        }
        for diagnostic in syntax_diagnostics(lang, &file.transformed)? {
            match known.get_mut(&diagnostic.message) {
                Some(count) if *count > 0 => *count -= 1,
                _ => status.add_located(
                    Severity::Error,
                    format!("the refactored code does not parse: {}", diagnostic.message),
                    StatusLocation::new(&file.path, &file.transformed, diagnostic.range),
                ),
            }
        }
    }
    Ok(status)
}

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").expect("invalid regex"));

/// Checks that `name` can be declared.
pub(crate) fn check_identifier(name: &str, what: &str) -> RefactoringStatus {
    if name.is_empty() {
        return RefactoringStatus::fatal(format!("the {what} name is empty"));
    }
    if !IDENTIFIER.is_match(name) {
        return RefactoringStatus::fatal(format!("'{name}' is not a valid {what} name"));
    }
    if is_reserved(name) {
        return RefactoringStatus::fatal(format!("'{name}' is a reserved word"));
    }
    RefactoringStatus::new()
}
