//! Input and definition validation
//!
//! [`validate_inputs`] checks the preconditions a caller must satisfy before
//! evaluating: required values are present, numbers parse and respect their
//! bounds, dates parse. [`validate_definition`] checks a calculator definition
//! as a whole and reports every problem it finds.

use crate::error::{DefinitionError, DefinitionProblem, FormulaError, FormulaResult};
use crate::formula::dates::parse_date;
use crate::formula::{CompiledFormula, FunctionRegistry, ParseLimits};
use calcforge_types::{CalculatorDefinition, CalculatorField, FieldType, FieldValue, FieldValueMap};
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::debug;

/// Names the parser treats specially
const KEYWORDS: [&str; 3] = ["true", "false", "Math"];

static BUILTINS: LazyLock<FunctionRegistry> = LazyLock::new(FunctionRegistry::with_builtins);

/// Check the values of every input field against its declaration.
///
/// Stops at the first failing field, in field order.
pub fn validate_inputs(fields: &[CalculatorField], values: &FieldValueMap) -> FormulaResult<()> {
    for field in fields.iter().filter(|f| f.field_type.is_input()) {
        let value = values.get(&field.id).unwrap_or(&FieldValue::Null);

        if value.is_blank() {
            if field.required {
                return Err(FormulaError::MissingRequiredField {
                    field: field.id.clone(),
                    label: field.display_name().to_string(),
                });
            }
            continue;
        }

        match field.field_type {
            FieldType::Number => check_number(field, value)?,
            FieldType::Date => check_date(field, value)?,
            _ => {}
        }
    }
    Ok(())
}

fn check_number(field: &CalculatorField, value: &FieldValue) -> FormulaResult<()> {
    let label = field.display_name();
    let invalid = |message: String| FormulaError::InvalidNumber { field: Some(field.id.clone()), message };

    let number = match value {
        FieldValue::Number(n) => Some(*n),
        FieldValue::Text(s) => s.trim().parse::<f64>().ok(),
        FieldValue::Boolean(_) | FieldValue::Null => None,
    };
    let number = match number {
        Some(n) if n.is_finite() => n,
        _ => return Err(invalid(format!("{label} must be a valid number"))),
    };

    if let Some(bounds) = &field.validation {
        if let Some(min) = bounds.min {
            if number < min {
                return Err(invalid(format!("{label} must be at least {min}")));
            }
        }
        if let Some(max) = bounds.max {
            if number > max {
                return Err(invalid(format!("{label} must be at most {max}")));
            }
        }
    }
    Ok(())
}

fn check_date(field: &CalculatorField, value: &FieldValue) -> FormulaResult<()> {
    match value.as_text().and_then(parse_date) {
        Some(_) => Ok(()),
        None => Err(FormulaError::invalid_date(format!("{}: {}", field.display_name(), value))),
    }
}

/// Validate a definition against the built-in helpers and default limits
pub fn validate_definition(definition: &CalculatorDefinition) -> Result<(), DefinitionError> {
    validate_definition_with(definition, &BUILTINS, &ParseLimits::default())
}

/// Validate a definition against a specific helper registry and limits
pub fn validate_definition_with(
    definition: &CalculatorDefinition,
    functions: &FunctionRegistry,
    limits: &ParseLimits,
) -> Result<(), DefinitionError> {
    let mut problems = Vec::new();

    if definition.name.trim().is_empty() {
        problems.push(DefinitionProblem::EmptyName);
    }

    let mut seen = HashSet::new();
    for field in &definition.fields {
        check_field(field, functions, &mut seen, &mut problems);
    }

    if definition.formula.trim().is_empty() {
        problems.push(DefinitionProblem::EmptyFormula);
    } else {
        check_formula(definition, functions, limits, &mut problems);
    }

    if problems.is_empty() {
        Ok(())
    } else {
        debug!(problem_count = problems.len(), "Calculator definition rejected");
        Err(DefinitionError { problems })
    }
}

fn check_field<'a>(
    field: &'a CalculatorField,
    functions: &FunctionRegistry,
    seen: &mut HashSet<&'a str>,
    problems: &mut Vec<DefinitionProblem>,
) {
    let id = field.id.as_str();

    if !is_identifier(id) {
        problems.push(DefinitionProblem::InvalidFieldId(id.to_string()));
    } else if functions.has_function(id) || functions.has_constant(id) || KEYWORDS.contains(&id) {
        problems.push(DefinitionProblem::ReservedFieldId(id.to_string()));
    }
    if !seen.insert(id) {
        problems.push(DefinitionProblem::DuplicateFieldId(id.to_string()));
    }

    let has_options = field.options.as_ref().is_some_and(|o| !o.is_empty());
    match field.field_type {
        FieldType::Select if !has_options => {
            problems.push(DefinitionProblem::SelectWithoutOptions(id.to_string()));
        }
        FieldType::Select => {}
        _ if field.options.is_some() => {
            problems.push(DefinitionProblem::OptionsOnNonSelect(id.to_string()));
        }
        _ => {}
    }

    if let Some(bounds) = &field.validation {
        let has_bounds = bounds.min.is_some() || bounds.max.is_some();
        if has_bounds && field.field_type != FieldType::Number {
            problems.push(DefinitionProblem::BoundsOnNonNumber(id.to_string()));
        }
        if let (Some(min), Some(max)) = (bounds.min, bounds.max) {
            if min > max {
                problems.push(DefinitionProblem::InvertedBounds { field: id.to_string(), min, max });
            }
        }
    }
}

fn check_formula(
    definition: &CalculatorDefinition,
    functions: &FunctionRegistry,
    limits: &ParseLimits,
    problems: &mut Vec<DefinitionProblem>,
) {
    let compiled = match CompiledFormula::compile(&definition.formula, limits) {
        Ok(compiled) => compiled,
        Err(error) => {
            problems.push(DefinitionProblem::Formula(error));
            return;
        }
    };

    for name in &compiled.variables {
        match definition.field(name) {
            Some(field) if field.field_type == FieldType::Result => {
                problems.push(DefinitionProblem::ResultFieldReferenced(name.clone()));
            }
            Some(_) => {}
            None if functions.has_constant(name) => {}
            None => problems.push(DefinitionProblem::UnknownField(name.clone())),
        }
    }
    for name in compiled.functions.iter().filter(|f| !functions.has_function(f)) {
        problems.push(DefinitionProblem::Formula(FormulaError::UnknownFunction { name: name.clone() }));
    }
    for name in compiled.constants.iter().filter(|c| !functions.has_constant(c)) {
        problems.push(DefinitionProblem::Formula(FormulaError::UnknownIdentifier {
            name: format!("Math.{name}"),
        }));
    }
}

/// ASCII identifier that the lexer reads as a single identifier token
fn is_identifier(id: &str) -> bool {
    let mut chars = id.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}
