//! Serializable configuration for refactoring runs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{RefactorError, Result};

/// Engine-wide settings.
///
/// Can be saved to and loaded from YAML or JSON files.
///
/// # Example YAML
///
/// ```yaml
/// indent: "  "
/// validate_new_source: true
/// exclude_patterns:
///   - "**/node_modules/**"
/// precedence:
///   binary:
///     "??": 4
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefactorConfig {
    /// One level of indentation in generated code.
    pub indent: String,

    /// Line delimiter used in generated code.
    pub line_delimiter: String,

    /// Re-parse every changed unit and report new syntax errors.
    pub validate_new_source: bool,

    /// Operator precedence policy used to decide parenthesization.
    pub precedence: PrecedenceTable,

    /// File extensions loaded into a workspace.
    pub extensions: Vec<String>,

    /// Glob patterns excluded from a workspace.
    pub exclude_patterns: Vec<String>,
}

impl Default for RefactorConfig {
    fn default() -> Self {
        Self {
            indent: "    ".to_string(),
            line_delimiter: "\n".to_string(),
            validate_new_source: true,
            precedence: PrecedenceTable::default(),
            extensions: ["js", "mjs", "cjs", "ts", "jsx", "tsx"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            exclude_patterns: vec![
                "**/node_modules/**".to_string(),
                "**/dist/**".to_string(),
                "**/.git/**".to_string(),
            ],
        }
    }
}

impl RefactorConfig {
    /// Load config from a YAML file.
    pub fn from_yaml(path: impl AsRef<Path>) -> Result<Self> {
        let content = read_config(path.as_ref())?;
        serde_yaml::from_str(&content).map_err(|e| {
            RefactorError::InvalidConfig(format!("Failed to parse YAML config: {}", e))
        })
    }

    /// Load config from a JSON file.
    pub fn from_json(path: impl AsRef<Path>) -> Result<Self> {
        let content = read_config(path.as_ref())?;
        serde_json::from_str(&content).map_err(|e| {
            RefactorError::InvalidConfig(format!("Failed to parse JSON config: {}", e))
        })
    }

    /// Load config choosing the format from the file extension.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(path),
            _ => Self::from_yaml(path),
        }
    }

    /// Save config to a YAML file.
    pub fn to_yaml(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_yaml::to_string(self).map_err(|e| {
            RefactorError::InvalidConfig(format!("Failed to serialize config: {}", e))
        })?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }
}

fn read_config(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| {
        RefactorError::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to read config file {}: {}", path.display(), e),
        ))
    })
}

/// Operator precedence levels. Higher binds tighter.
///
/// Binary and logical operators are looked up by their token; the remaining levels
/// are per expression form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrecedenceTable {
    pub binary: BTreeMap<String, u8>,
    pub sequence: u8,
    pub assignment: u8,
    pub conditional: u8,
    pub unary: u8,
    pub postfix: u8,
    pub new_without_arguments: u8,
    pub call: u8,
    pub primary: u8,
    /// Binary operators that associate to the right.
    pub right_associative: Vec<String>,
}

impl Default for PrecedenceTable {
    fn default() -> Self {
        let levels: &[(&[&str], u8)] = &[
            (&["||", "??"], 4),
            (&["&&"], 5),
            (&["|"], 6),
            (&["^"], 7),
            (&["&"], 8),
            (&["==", "!=", "===", "!=="], 9),
            (&["<", ">", "<=", ">=", "in", "instanceof"], 10),
            (&["<<", ">>", ">>>"], 11),
            (&["+", "-"], 12),
            (&["*", "/", "%"], 13),
            (&["**"], 14),
        ];
        let mut binary = BTreeMap::new();
        for (ops, level) in levels {
            for op in *ops {
                binary.insert(op.to_string(), *level);
            }
        }
        Self {
            binary,
            sequence: 1,
            assignment: 2,
            conditional: 3,
            unary: 15,
            postfix: 16,
            new_without_arguments: 17,
            call: 18,
            primary: 19,
            right_associative: vec!["**".to_string()],
        }
    }
}

impl PrecedenceTable {
    /// Level of a binary operator; unknown operators bind loosest among binaries.
    pub fn binary_level(&self, op: &str) -> u8 {
        self.binary.get(op).copied().unwrap_or(self.conditional + 1)
    }

    pub fn is_right_associative(&self, op: &str) -> bool {
        self.right_associative.iter().any(|o| o == op)
    }
}
