//! Error types for the refactoring engine.

use std::path::PathBuf;
use thiserror::Error;

use crate::rewrite::RewriteError;
use crate::transform::EditError;

/// The main error type for refactoring operations.
#[derive(Error, Debug)]
pub enum RefactorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("Glob pattern error: {0}")]
    Glob(#[from] globset::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Tree-sitter parse error for {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Tree-sitter query error: {0}")]
    Query(#[from] tree_sitter::QueryError),

    #[error("Language not supported: {0}")]
    UnsupportedLanguage(String),

    #[error("Compilation unit not found: {0}")]
    UnitNotFound(PathBuf),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Rewrite failed: {0}")]
    Rewrite(#[from] RewriteError),

    #[error("Text edit failed: {0}")]
    Edit(#[from] EditError),

    #[error("Refactoring refused: {0}")]
    Refused(String),

    #[error("Operation canceled")]
    Canceled,
}

/// A specialized Result type for refactoring operations.
pub type Result<T> = std::result::Result<T, RefactorError>;
