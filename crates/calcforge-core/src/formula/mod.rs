//! Formula language
//!
//! Formulas are small arithmetic expressions over field ids. The pipeline is:
//! - coerce each raw field value into a literal ([`coercion`])
//! - tokenize and parse the formula into an AST ([`parser`], [`ast`])
//! - walk the AST with the helper registry as the only call scope ([`evaluator`])
//! - normalize the outcome into an [`EvaluationResult`] ([`normalize`])
//!
//! [`substitution`] renders the formula with literals spliced in, for previews.

pub mod ast;
pub mod coercion;
pub mod dates;
pub mod evaluator;
pub mod functions;
pub mod normalize;
pub mod parser;
pub mod substitution;
pub mod value;

pub use coercion::{LiteralToken, coerce};
pub use evaluator::{EvaluationContext, evaluate_expression};
pub use functions::{CalculatorFunction, ContextAwareFunction, FunctionRegistry};
pub use normalize::{EvaluationResult, ResultValue, normalize};
pub use parser::ParseLimits;
pub use substitution::substitute;
pub use value::Value;

use crate::error::FormulaResult;

/// A parsed formula together with the names it references
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFormula {
    /// Original formula text
    pub source: String,
    /// Parsed expression
    pub ast: ast::Expression,
    /// Bare identifiers referenced by the formula, sorted
    pub variables: Vec<String>,
    /// Helpers called by the formula, sorted
    pub functions: Vec<String>,
    /// `Math.` constants referenced by the formula, sorted
    pub constants: Vec<String>,
}

impl CompiledFormula {
    /// Parse a formula and collect its references
    pub fn compile(source: &str, limits: &ParseLimits) -> FormulaResult<Self> {
        let ast = parser::parse_formula(source, limits)?;
        Ok(Self {
            source: source.to_string(),
            variables: ast::extract_variables(&ast),
            functions: ast::extract_functions(&ast),
            constants: ast::extract_constants(&ast),
            ast,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expression_compilation() {
        let compiled =
            CompiledFormula::compile("ageInYears(date(born)) + Math.PI * r", &ParseLimits::default())
                .unwrap();
        assert_eq!(compiled.source, "ageInYears(date(born)) + Math.PI * r");
        assert_eq!(compiled.variables, vec!["born", "r"]);
        assert_eq!(compiled.functions, vec!["ageInYears", "date"]);
        assert_eq!(compiled.constants, vec!["PI"]);
    }
}
