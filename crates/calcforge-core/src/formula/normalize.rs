//! Result normalization and error classification
//!
//! Turns the raw outcome of an evaluation into the public [`EvaluationResult`]
//! contract. Numbers are rounded to cents, dates become short date text and
//! every failure is classified into an [`ErrorKind`].

use crate::error::{ErrorKind, FormulaError};
use crate::formula::functions::round_half_up;
use crate::formula::value::{Value, format_short_date};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Successful evaluation value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResultValue {
    Number(f64),
    Text(String),
}

impl ResultValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ResultValue::Number(n) => Some(*n),
            ResultValue::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ResultValue::Number(_) => None,
            ResultValue::Text(s) => Some(s),
        }
    }

    /// Display form: integral numbers without decimals, others with two
    pub fn display(&self) -> String {
        match self {
            ResultValue::Number(n) if n.fract() == 0.0 => format!("{n:.0}"),
            ResultValue::Number(n) => format!("{n:.2}"),
            ResultValue::Text(s) => s.clone(),
        }
    }
}

impl fmt::Display for ResultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

/// Outcome of one evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum EvaluationResult {
    Success { value: ResultValue },
    Failure { kind: ErrorKind, message: String },
}

impl EvaluationResult {
    pub fn success(value: ResultValue) -> Self {
        Self::Success { value }
    }

    pub fn failure(error: &FormulaError) -> Self {
        Self::Failure { kind: error.kind(), message: error.to_string() }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn value(&self) -> Option<&ResultValue> {
        match self {
            Self::Success { value } => Some(value),
            Self::Failure { .. } => None,
        }
    }

    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { kind, .. } => Some(*kind),
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { message, .. } => Some(message),
        }
    }
}

/// Round to two decimals, half toward positive infinity, with `-0` as `0`
pub fn round_to_cents(value: f64) -> f64 {
    // Every double at or above 2^52 is already whole
    if value.abs() >= 4_503_599_627_370_496.0 {
        return value;
    }
    let rounded = round_half_up(value, 2);
    if rounded == 0.0 { 0.0 } else { rounded }
}

/// Recover the typed error behind an `anyhow` error; anything untyped is unknown
pub fn classify(error: anyhow::Error) -> FormulaError {
    match error.downcast::<FormulaError>() {
        Ok(formula_error) => formula_error,
        Err(other) => FormulaError::unknown(format!("{other:#}")),
    }
}

/// Map a raw evaluation outcome onto the public result contract
pub fn normalize(outcome: anyhow::Result<Value>) -> EvaluationResult {
    let value = match outcome {
        Ok(value) => value,
        Err(error) => return EvaluationResult::failure(&classify(error)),
    };

    match value {
        Value::Number(n) => {
            let rounded = round_to_cents(n);
            if n.is_finite() && rounded.is_finite() {
                EvaluationResult::success(ResultValue::Number(rounded))
            } else {
                EvaluationResult::failure(&FormulaError::InvalidResult { value: n })
            }
        }
        Value::Text(s) => EvaluationResult::success(ResultValue::Text(s)),
        Value::Boolean(b) => EvaluationResult::success(ResultValue::Text(b.to_string())),
        Value::Date(d) => EvaluationResult::success(ResultValue::Text(format_short_date(d))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use chrono::NaiveDate;

    #[test]
    fn test_numbers_are_rounded_to_cents() {
        assert_eq!(normalize(Ok(Value::Number(22.857_142))).value(), Some(&ResultValue::Number(22.86)));
        assert_eq!(normalize(Ok(Value::Number(-0.001))).value(), Some(&ResultValue::Number(0.0)));
        assert_eq!(normalize(Ok(Value::Number(2.0))).value(), Some(&ResultValue::Number(2.0)));
    }

    #[test]
    fn test_non_finite_numbers_are_invalid_results() {
        for n in [f64::INFINITY, f64::NEG_INFINITY, f64::NAN] {
            assert_eq!(normalize(Ok(Value::Number(n))).kind(), Some(ErrorKind::InvalidResult));
        }
    }

    #[test]
    fn test_dates_and_booleans_become_text() {
        let date = NaiveDate::from_ymd_opt(1990, 1, 1).unwrap();
        assert_eq!(
            normalize(Ok(Value::Date(date))).value(),
            Some(&ResultValue::Text("1/1/1990".into()))
        );
        assert_eq!(
            normalize(Ok(Value::Boolean(true))).value(),
            Some(&ResultValue::Text("true".into()))
        );
    }

    #[test]
    fn test_classification() {
        let result = normalize(Err(FormulaError::DivisionByZero.into()));
        assert_eq!(result.kind(), Some(ErrorKind::DivisionByZero));
        assert_eq!(result.message(), Some("Cannot divide by zero"));

        let result = normalize(Err(anyhow!("stack exhausted")));
        assert_eq!(result.kind(), Some(ErrorKind::UnknownEvaluation));
        assert_eq!(result.message(), Some("stack exhausted"));
    }

    #[test]
    fn test_display() {
        assert_eq!(ResultValue::Number(3.0).display(), "3");
        assert_eq!(ResultValue::Number(34.5).display(), "34.50");
        assert_eq!(ResultValue::Text("hi".into()).display(), "hi");
    }

    #[test]
    fn test_wire_shape() {
        let json = serde_json::to_value(normalize(Ok(Value::Number(22.86)))).unwrap();
        assert_eq!(json, serde_json::json!({"status": "success", "value": 22.86}));

        let json = serde_json::to_value(normalize(Err(FormulaError::DivisionByZero.into()))).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "status": "failure",
                "kind": "DivisionByZeroError",
                "message": "Cannot divide by zero"
            })
        );
    }
}
