//! Engine configuration
//!
//! Limits that keep a single evaluation bounded. Every field has a default so a
//! partial `[engine]` table in a config file is enough.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Hard wall-clock budget for one evaluation
    #[serde(default = "default_evaluation_timeout_ms")]
    pub evaluation_timeout_ms: u64,
    /// Longest accepted formula, in characters
    #[serde(default = "default_max_formula_length")]
    pub max_formula_length: usize,
    /// Deepest accepted nesting of parentheses, calls and unary operators
    #[serde(default = "default_max_expression_depth")]
    pub max_expression_depth: usize,
    /// Compiled formulas kept in memory; 0 disables the cache
    #[serde(default = "default_formula_cache_capacity")]
    pub formula_cache_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            evaluation_timeout_ms: default_evaluation_timeout_ms(),
            max_formula_length: default_max_formula_length(),
            max_expression_depth: default_max_expression_depth(),
            formula_cache_capacity: default_formula_cache_capacity(),
        }
    }
}

impl EngineConfig {
    pub fn evaluation_timeout(&self) -> Duration {
        Duration::from_millis(self.evaluation_timeout_ms)
    }

    pub fn parse_limits(&self) -> crate::formula::parser::ParseLimits {
        crate::formula::parser::ParseLimits {
            max_length: self.max_formula_length,
            max_depth: self.max_expression_depth,
        }
    }
}

fn default_evaluation_timeout_ms() -> u64 {
    250
}
fn default_max_formula_length() -> usize {
    10_000
}
fn default_max_expression_depth() -> usize {
    64
}
fn default_formula_cache_capacity() -> usize {
    1024
}
