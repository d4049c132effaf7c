//! Formula evaluation engine for user-built calculators.
//!
//! A calculator is a list of typed fields plus a formula over their ids. This
//! crate turns `(formula, fields, values)` into an [`EvaluationResult`]: a
//! rounded number or a text value on success, or a classified failure. Formulas
//! are parsed into an AST and walked by an interpreter whose only reachable
//! names are the bound field values and the registered helpers.

use calcforge_types::{CalculatorDefinition, CalculatorField, FieldValueMap};
use chrono::{DateTime, Utc};
use std::sync::LazyLock;

/// Engine limits
pub mod config;
/// Calculator evaluation engine and compiled-formula cache
pub mod engine;
/// Error taxonomy
pub mod error;
/// Formula language: coercion, parsing, helpers, evaluation and normalization
pub mod formula;
/// Built-in calculator templates
pub mod templates;
/// Input precondition and definition checks
pub mod validation;

pub use config::EngineConfig;
pub use engine::CalculatorEngine;
pub use error::{DefinitionError, DefinitionProblem, ErrorKind, FormulaError, FormulaResult};
pub use formula::{
    CalculatorFunction, CompiledFormula, ContextAwareFunction, EvaluationContext,
    EvaluationResult, FunctionRegistry, LiteralToken, ResultValue, Value, coerce,
};
pub use validation::validate_inputs;

static DEFAULT_ENGINE: LazyLock<CalculatorEngine> = LazyLock::new(CalculatorEngine::new);

/// Process-wide engine with the built-in helpers and default limits
pub fn default_engine() -> &'static CalculatorEngine {
    &DEFAULT_ENGINE
}

/// Evaluate a formula against field values as of now
pub fn evaluate_calculator(
    formula: &str,
    fields: &[CalculatorField],
    values: &FieldValueMap,
) -> EvaluationResult {
    DEFAULT_ENGINE.evaluate_calculator(formula, fields, values, Utc::now())
}

/// Evaluate a formula against field values at a fixed instant
pub fn evaluate_calculator_at(
    formula: &str,
    fields: &[CalculatorField],
    values: &FieldValueMap,
    as_of: DateTime<Utc>,
) -> EvaluationResult {
    DEFAULT_ENGINE.evaluate_calculator(formula, fields, values, as_of)
}

/// Check a calculator definition against the built-in helpers
pub fn validate_definition(definition: &CalculatorDefinition) -> Result<(), DefinitionError> {
    DEFAULT_ENGINE.validate_definition(definition)
}

/// Formula text with field values spliced in as literals
pub fn substitute(formula: &str, values: &FieldValueMap) -> FormulaResult<String> {
    formula::substitute(formula, values)
}
