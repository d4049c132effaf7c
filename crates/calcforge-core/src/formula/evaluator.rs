//! Tree-walking evaluator
//!
//! Identifiers resolve against the bound field values and then the registry's
//! constants; calls resolve only against the registry. Nothing else is
//! reachable from a formula.

use crate::error::FormulaError;
use crate::formula::ast::{BinaryOperator, Expression, UnaryOperator};
use crate::formula::functions::FunctionRegistry;
use crate::formula::value::Value;
use anyhow::{Result, bail};
use chrono::{DateTime, NaiveDate, Utc};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
struct Deadline {
    at: Instant,
    budget: Duration,
}

/// Everything an evaluation can see: field values, the evaluation instant and
/// the time budget
#[derive(Debug, Clone)]
pub struct EvaluationContext {
    /// Field values by id
    pub bindings: HashMap<String, Value>,
    /// Instant the evaluation runs at; `today()` and `now()` derive from it
    pub as_of: DateTime<Utc>,
    deadline: Option<Deadline>,
}

impl EvaluationContext {
    pub fn new(as_of: DateTime<Utc>) -> Self {
        Self { bindings: HashMap::new(), as_of, deadline: None }
    }

    #[must_use]
    pub fn with_binding(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.bindings.insert(name.into(), value.into());
        self
    }

    /// Start the evaluation clock; evaluation fails once `budget` has elapsed
    #[must_use]
    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.deadline = Some(Deadline { at: Instant::now() + budget, budget });
        self
    }

    /// Calendar date of the evaluation instant, in UTC
    pub fn today(&self) -> NaiveDate {
        self.as_of.date_naive()
    }

    fn check_deadline(&self) -> Result<()> {
        if let Some(deadline) = self.deadline {
            if Instant::now() > deadline.at {
                #[allow(clippy::cast_possible_truncation)]
                let budget_ms = deadline.budget.as_millis() as u64;
                bail!(FormulaError::Timeout { budget_ms });
            }
        }
        Ok(())
    }
}

/// Evaluate an expression in the given context
pub fn evaluate_expression(
    expr: &Expression,
    context: &EvaluationContext,
    functions: &FunctionRegistry,
) -> Result<Value> {
    context.check_deadline()?;

    match expr {
        Expression::Literal(value) => Ok(value.clone()),

        Expression::Variable(name) => {
            if let Some(value) = context.bindings.get(name) {
                return Ok(value.clone());
            }
            if let Some(value) = functions.constant(name) {
                return Ok(Value::Number(value));
            }
            bail!(FormulaError::UnknownIdentifier { name: name.clone() })
        }

        Expression::Constant(name) => match functions.constant(name) {
            Some(value) => Ok(Value::Number(value)),
            None => bail!(FormulaError::UnknownIdentifier { name: format!("Math.{name}") }),
        },

        Expression::BinaryOp { left, operator, right } => {
            let left_val = evaluate_expression(left, context, functions)?;
            let right_val = evaluate_expression(right, context, functions)?;
            evaluate_binary_op(&left_val, *operator, &right_val)
        }

        Expression::UnaryOp { operator, operand } => {
            let operand_val = evaluate_expression(operand, context, functions)?;
            evaluate_unary_op(*operator, &operand_val)
        }

        Expression::FunctionCall { name, args } => {
            let mut arg_values = Vec::with_capacity(args.len());
            for arg in args {
                arg_values.push(evaluate_expression(arg, context, functions)?);
            }

            functions.call_with_context(name, &arg_values, context)
        }
    }
}

fn non_numeric(operator: BinaryOperator, left: &Value, right: &Value) -> anyhow::Error {
    FormulaError::invalid_number(format!(
        "cannot apply '{}' to {} '{}' and {} '{}'",
        operator.symbol(),
        left.type_name(),
        left,
        right.type_name(),
        right
    ))
    .into()
}

/// Evaluate a binary operation
fn evaluate_binary_op(left: &Value, operator: BinaryOperator, right: &Value) -> Result<Value> {
    use BinaryOperator::*;
    use Value::*;

    match (left, right, operator) {
        // Arithmetic operations
        (Number(a), Number(b), Add) => Ok(Number(a + b)),
        (Text(_), _, Add) | (_, Text(_), Add) => Ok(Text(format!("{left}{right}"))),
        (Number(a), Number(b), Subtract) => Ok(Number(a - b)),
        (Number(a), Number(b), Multiply) => Ok(Number(a * b)),
        (Number(a), Number(b), Divide) => {
            if *b == 0.0 {
                bail!(FormulaError::DivisionByZero)
            }
            Ok(Number(a / b))
        }
        (Number(a), Number(b), Modulo) => {
            if *b == 0.0 {
                bail!(FormulaError::DivisionByZero)
            }
            Ok(Number(a % b))
        }
        (Number(a), Number(b), Power) => Ok(Number(a.powf(*b))),
        (_, _, Add | Subtract | Multiply | Divide | Modulo | Power) => {
            Err(non_numeric(operator, left, right))
        }

        // Equality
        (a, b, Equal) => Ok(Boolean(a == b)),
        (a, b, NotEqual) => Ok(Boolean(a != b)),

        // Ordering
        (Number(a), Number(b), LessThan) => Ok(Boolean(a < b)),
        (Number(a), Number(b), LessThanOrEqual) => Ok(Boolean(a <= b)),
        (Number(a), Number(b), GreaterThan) => Ok(Boolean(a > b)),
        (Number(a), Number(b), GreaterThanOrEqual) => Ok(Boolean(a >= b)),
        (_, _, LessThan | LessThanOrEqual | GreaterThan | GreaterThanOrEqual) => {
            let ordering = compare(left, right)?;
            Ok(Boolean(match operator {
                LessThan => ordering == Ordering::Less,
                LessThanOrEqual => ordering != Ordering::Greater,
                GreaterThan => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            }))
        }
    }
}

fn compare(left: &Value, right: &Value) -> Result<Ordering> {
    match (left, right) {
        (Value::Text(a), Value::Text(b)) => Ok(a.cmp(b)),
        (Value::Date(a), Value::Date(b)) => Ok(a.cmp(b)),
        _ => bail!(FormulaError::unknown(format!(
            "cannot order {} '{}' against {} '{}'",
            left.type_name(),
            left,
            right.type_name(),
            right
        ))),
    }
}

/// Evaluate a unary operation
fn evaluate_unary_op(operator: UnaryOperator, operand: &Value) -> Result<Value> {
    match (operator, operand) {
        (UnaryOperator::Negate, Value::Number(n)) => Ok(Value::Number(-n)),
        (UnaryOperator::Plus, Value::Number(n)) => Ok(Value::Number(*n)),
        (_, other) => bail!(FormulaError::invalid_number(format!(
            "cannot apply unary '{}' to {} '{}'",
            if operator == UnaryOperator::Negate { "-" } else { "+" },
            other.type_name(),
            other
        ))),
    }
}
