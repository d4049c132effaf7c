//! Abstract Syntax Tree for formulas

use crate::formula::value::Value;
use std::collections::BTreeSet;

/// AST node representing an expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Literal value (number, string, boolean)
    Literal(Value),

    /// Bare identifier: a field id or a constant
    Variable(String),

    /// `Math.NAME` outside a call; resolves only against constants
    Constant(String),

    /// Binary operation (a + b, a > b, etc.)
    BinaryOp { left: Box<Expression>, operator: BinaryOperator, right: Box<Expression> },

    /// Unary operation (-a, +a)
    UnaryOp { operator: UnaryOperator, operand: Box<Expression> },

    /// Helper call (sqrt(x), yearsBetween(a, b))
    FunctionCall { name: String, args: Vec<Expression> },
}

/// Binary operators supported in formulas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Power,

    // Comparison
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

/// Unary operators supported in formulas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    /// Numeric negation (-x)
    Negate,
    /// Numeric identity (+x)
    Plus,
}

impl Expression {
    /// Create a literal number expression
    pub fn number(value: f64) -> Self {
        Self::Literal(Value::Number(value))
    }

    /// Create a literal string expression
    pub fn string(value: impl Into<String>) -> Self {
        Self::Literal(Value::Text(value.into()))
    }

    /// Create a literal boolean expression
    pub fn bool(value: bool) -> Self {
        Self::Literal(Value::Boolean(value))
    }

    /// Create a variable reference
    pub fn var(name: &str) -> Self {
        Self::Variable(name.to_string())
    }

    /// Create a `Math.` constant reference
    pub fn constant(name: &str) -> Self {
        Self::Constant(name.to_string())
    }

    /// Create a binary operation
    pub fn binary(left: Expression, op: BinaryOperator, right: Expression) -> Self {
        Self::BinaryOp { left: Box::new(left), operator: op, right: Box::new(right) }
    }

    /// Create a unary operation
    pub fn unary(op: UnaryOperator, operand: Expression) -> Self {
        Self::UnaryOp { operator: op, operand: Box::new(operand) }
    }

    /// Create a function call
    pub fn call(name: &str, args: Vec<Expression>) -> Self {
        Self::FunctionCall { name: name.to_string(), args }
    }
}

impl BinaryOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Modulo => "%",
            BinaryOperator::Power => "**",
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessThanOrEqual => "<=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterThanOrEqual => ">=",
        }
    }
}

/// Extract all variable names referenced in an expression, sorted
pub fn extract_variables(expr: &Expression) -> Vec<String> {
    let mut variables = BTreeSet::new();
    walk(expr, &mut |node| {
        if let Expression::Variable(name) = node {
            variables.insert(name.clone());
        }
    });
    variables.into_iter().collect()
}

/// Extract all helper names called in an expression, sorted
pub fn extract_functions(expr: &Expression) -> Vec<String> {
    let mut functions = BTreeSet::new();
    walk(expr, &mut |node| {
        if let Expression::FunctionCall { name, .. } = node {
            functions.insert(name.clone());
        }
    });
    functions.into_iter().collect()
}

/// Extract all `Math.` constant names referenced in an expression, sorted
pub fn extract_constants(expr: &Expression) -> Vec<String> {
    let mut constants = BTreeSet::new();
    walk(expr, &mut |node| {
        if let Expression::Constant(name) = node {
            constants.insert(name.clone());
        }
    });
    constants.into_iter().collect()
}

fn walk(expr: &Expression, visit: &mut impl FnMut(&Expression)) {
    visit(expr);
    match expr {
        Expression::BinaryOp { left, right, .. } => {
            walk(left, visit);
            walk(right, visit);
        }
        Expression::UnaryOp { operand, .. } => walk(operand, visit),
        Expression::FunctionCall { args, .. } => {
            for arg in args {
                walk(arg, visit);
            }
        }
        Expression::Literal(_) | Expression::Variable(_) | Expression::Constant(_) => {}
    }
}
