//! Conversion of raw field values into formula literals
//!
//! The checks run in a fixed order: blank, boolean, number, date-shaped text,
//! numeric text, other text. Date-shaped text is kept as a string before the
//! numeric attempt so that a date never turns into a number.

use crate::formula::dates::is_date_shaped;
use crate::formula::value::{Value, format_number};
use calcforge_types::FieldValue;
use std::fmt;

/// A field value in the form it takes inside a formula
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralToken {
    /// Absent or blank value; the empty string literal, never `0`
    Empty,
    Boolean(bool),
    /// A finite number
    Number(f64),
    /// Text in a recognised date shape, left for a date helper to parse
    DateText(String),
    Text(String),
}

/// Convert a raw value into its literal token
pub fn coerce(value: &FieldValue) -> LiteralToken {
    match value {
        FieldValue::Null => LiteralToken::Empty,
        FieldValue::Boolean(b) => LiteralToken::Boolean(*b),
        FieldValue::Number(n) if n.is_finite() => LiteralToken::Number(*n),
        FieldValue::Number(n) => LiteralToken::Text(format_number(*n)),
        FieldValue::Text(text) => coerce_text(text),
    }
}

fn coerce_text(text: &str) -> LiteralToken {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return LiteralToken::Empty;
    }
    if is_date_shaped(trimmed) {
        return LiteralToken::DateText(trimmed.to_string());
    }
    match trimmed.parse::<f64>() {
        Ok(n) if n.is_finite() => LiteralToken::Number(n),
        _ => LiteralToken::Text(text.to_string()),
    }
}

impl LiteralToken {
    /// Runtime value this literal evaluates to
    pub fn to_value(&self) -> Value {
        match self {
            LiteralToken::Empty => Value::Text(String::new()),
            LiteralToken::Boolean(b) => Value::Boolean(*b),
            LiteralToken::Number(n) => Value::Number(*n),
            LiteralToken::DateText(s) | LiteralToken::Text(s) => Value::Text(s.clone()),
        }
    }
}

fn write_quoted(f: &mut fmt::Formatter<'_>, text: &str) -> fmt::Result {
    f.write_str("\"")?;
    for ch in text.chars() {
        match ch {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            _ => write!(f, "{ch}")?,
        }
    }
    f.write_str("\"")
}

/// Formula-safe literal text
impl fmt::Display for LiteralToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiteralToken::Empty => f.write_str("\"\""),
            LiteralToken::Boolean(b) => write!(f, "{b}"),
            // The sign must not merge with a preceding operator
            LiteralToken::Number(n) if *n < 0.0 => write!(f, "({})", format_number(*n)),
            LiteralToken::Number(n) => f.write_str(&format_number(*n)),
            LiteralToken::DateText(s) | LiteralToken::Text(s) => write_quoted(f, s),
        }
    }
}
