//! TypeScript and JavaScript language support.

use super::Language;
use tree_sitter::Language as TsLanguage;

/// TypeScript programming language. Plain JavaScript parses with the same grammar.
pub struct TypeScript;

impl Language for TypeScript {
    fn name(&self) -> &'static str {
        "typescript"
    }

    fn extensions(&self) -> &[&'static str] {
        &["ts", "js", "mjs", "cjs", "mts", "cts"]
    }

    fn grammar(&self) -> TsLanguage {
        tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()
    }
}

/// TypeScript and JavaScript with JSX elements.
pub struct Tsx;

impl Language for Tsx {
    fn name(&self) -> &'static str {
        "tsx"
    }

    fn extensions(&self) -> &[&'static str] {
        &["tsx", "jsx"]
    }

    fn grammar(&self) -> TsLanguage {
        tree_sitter_typescript::LANGUAGE_TSX.into()
    }
}
