use serde::{Deserialize, Serialize};

/// Default nesting limit for `@file` expansion.
pub const DEFAULT_MAX_RESPONSE_DEPTH: usize = 16;

/// Parser behavior fixed at registry construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ParserConfig {
    /// Expand `@path` arguments.
    pub response_files: bool,
    /// How deep response files may include each other.
    pub max_response_depth: usize,
    /// Treat `-5` or `-2.5` as operands when no short name is a digit.
    pub allow_negative_numbers: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            response_files: true,
            max_response_depth: DEFAULT_MAX_RESPONSE_DEPTH,
            allow_negative_numbers: true,
        }
    }
}
