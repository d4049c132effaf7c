//! Error taxonomy for formula evaluation
//!
//! Every failure the engine can report maps onto one [`ErrorKind`]. The kinds are
//! stable identifiers the calling UI translates into user-facing text, while
//! [`FormulaError`] carries the detailed message produced by the failing stage.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Public failure categories of an evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// A required field has no value
    #[serde(rename = "MissingRequiredFieldError")]
    MissingRequiredField,
    /// A numeric value does not parse, is out of bounds, or an operand is not a number
    #[serde(rename = "InvalidNumberError")]
    InvalidNumber,
    /// The formula contains a character outside the allow-list
    #[serde(rename = "InvalidFormulaCharactersError")]
    InvalidFormulaCharacters,
    /// The formula does not parse or references something that does not exist
    #[serde(rename = "InvalidFormulaError")]
    InvalidFormula,
    /// A date helper received an unparsable date
    #[serde(rename = "InvalidDateError")]
    InvalidDate,
    /// Division or modulo by zero
    #[serde(rename = "DivisionByZeroError")]
    DivisionByZero,
    /// The numeric result is infinite or NaN
    #[serde(rename = "InvalidResultError")]
    InvalidResult,
    /// Anything the taxonomy does not cover
    #[serde(rename = "UnknownEvaluationError")]
    UnknownEvaluation,
}

impl ErrorKind {
    /// All kinds, in declaration order
    pub const ALL: [ErrorKind; 8] = [
        ErrorKind::MissingRequiredField,
        ErrorKind::InvalidNumber,
        ErrorKind::InvalidFormulaCharacters,
        ErrorKind::InvalidFormula,
        ErrorKind::InvalidDate,
        ErrorKind::DivisionByZero,
        ErrorKind::InvalidResult,
        ErrorKind::UnknownEvaluation,
    ];

    /// Wire name of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::MissingRequiredField => "MissingRequiredFieldError",
            ErrorKind::InvalidNumber => "InvalidNumberError",
            ErrorKind::InvalidFormulaCharacters => "InvalidFormulaCharactersError",
            ErrorKind::InvalidFormula => "InvalidFormulaError",
            ErrorKind::InvalidDate => "InvalidDateError",
            ErrorKind::DivisionByZero => "DivisionByZeroError",
            ErrorKind::InvalidResult => "InvalidResultError",
            ErrorKind::UnknownEvaluation => "UnknownEvaluationError",
        }
    }

    /// Kinds the caller should log for monitoring; they point at a gap in the taxonomy
    pub fn is_reportable(&self) -> bool {
        matches!(self, ErrorKind::UnknownEvaluation)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detailed failure raised by one of the evaluation stages
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormulaError {
    #[error("{label} is required")]
    MissingRequiredField { field: String, label: String },

    #[error("{message}")]
    InvalidNumber { field: Option<String>, message: String },

    #[error("Formula contains invalid character '{character}' at position {position}")]
    InvalidFormulaCharacters { character: char, position: usize },

    #[error("Invalid formula: {message}")]
    InvalidFormula { message: String },

    #[error("Unknown identifier '{name}'")]
    UnknownIdentifier { name: String },

    #[error("Unknown function '{name}'")]
    UnknownFunction { name: String },

    #[error("Function '{function}' expects {expected} argument(s), got {actual}")]
    InvalidArity { function: String, expected: String, actual: usize },

    #[error("Invalid date: {input}")]
    InvalidDate { input: String },

    #[error("Cannot divide by zero")]
    DivisionByZero,

    #[error("Invalid calculation result: {value}")]
    InvalidResult { value: f64 },

    #[error("Evaluation exceeded its time budget of {budget_ms} ms")]
    Timeout { budget_ms: u64 },

    #[error("{message}")]
    Unknown { message: String },
}

impl FormulaError {
    /// Public category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            FormulaError::MissingRequiredField { .. } => ErrorKind::MissingRequiredField,
            FormulaError::InvalidNumber { .. } => ErrorKind::InvalidNumber,
            FormulaError::InvalidFormulaCharacters { .. } => ErrorKind::InvalidFormulaCharacters,
            FormulaError::InvalidFormula { .. }
            | FormulaError::UnknownIdentifier { .. }
            | FormulaError::UnknownFunction { .. }
            | FormulaError::InvalidArity { .. } => ErrorKind::InvalidFormula,
            FormulaError::InvalidDate { .. } => ErrorKind::InvalidDate,
            FormulaError::DivisionByZero => ErrorKind::DivisionByZero,
            FormulaError::InvalidResult { .. } => ErrorKind::InvalidResult,
            FormulaError::Timeout { .. } | FormulaError::Unknown { .. } => {
                ErrorKind::UnknownEvaluation
            }
        }
    }

    /// Whether the caller should log this failure for monitoring
    pub fn is_reportable(&self) -> bool {
        self.kind().is_reportable()
    }

    pub fn invalid_formula(message: impl Into<String>) -> Self {
        Self::InvalidFormula { message: message.into() }
    }

    pub fn invalid_number(message: impl Into<String>) -> Self {
        Self::InvalidNumber { field: None, message: message.into() }
    }

    pub fn invalid_date(input: impl Into<String>) -> Self {
        Self::InvalidDate { input: input.into() }
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::Unknown { message: message.into() }
    }
}

/// Result type alias for evaluation stages that report typed errors
pub type FormulaResult<T> = Result<T, FormulaError>;

/// A single problem found while validating a calculator definition
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DefinitionProblem {
    #[error("calculator name is empty")]
    EmptyName,

    #[error("formula is empty")]
    EmptyFormula,

    #[error("field id '{0}' is used more than once")]
    DuplicateFieldId(String),

    #[error("field id '{0}' is not a valid identifier")]
    InvalidFieldId(String),

    #[error("field id '{0}' collides with a built-in helper or constant")]
    ReservedFieldId(String),

    #[error("field '{0}' has options but is not a select field")]
    OptionsOnNonSelect(String),

    #[error("select field '{0}' has no options")]
    SelectWithoutOptions(String),

    #[error("field '{0}' has numeric bounds but is not a number field")]
    BoundsOnNonNumber(String),

    #[error("field '{field}' has min {min} greater than max {max}")]
    InvertedBounds { field: String, min: f64, max: f64 },

    #[error("formula references unknown field '{0}'")]
    UnknownField(String),

    #[error("formula references result field '{0}'")]
    ResultFieldReferenced(String),

    #[error("{0}")]
    Formula(FormulaError),
}

/// All problems found in one calculator definition
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Invalid calculator definition: {}", join_problems(.problems))]
pub struct DefinitionError {
    pub problems: Vec<DefinitionProblem>,
}

fn join_problems(problems: &[DefinitionProblem]) -> String {
    problems.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(FormulaError::DivisionByZero.kind(), ErrorKind::DivisionByZero);
        assert_eq!(
            FormulaError::UnknownIdentifier { name: "x".into() }.kind(),
            ErrorKind::InvalidFormula
        );
        assert_eq!(FormulaError::Timeout { budget_ms: 10 }.kind(), ErrorKind::UnknownEvaluation);
        assert!(FormulaError::unknown("boom").is_reportable());
        assert!(!FormulaError::invalid_date("x").is_reportable());
    }

    #[test]
    fn test_kind_wire_names() {
        for kind in ErrorKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn test_definition_error_lists_every_problem() {
        let error = DefinitionError {
            problems: vec![
                DefinitionProblem::EmptyName,
                DefinitionProblem::DuplicateFieldId("a".into()),
            ],
        };
        assert_eq!(
            error.to_string(),
            "Invalid calculator definition: calculator name is empty; field id 'a' is used more than once"
        );
    }
}
