//! Calculator evaluation engine
//!
//! [`CalculatorEngine`] ties the formula pipeline together: it owns the helper
//! registry, the limits from [`EngineConfig`] and a concurrent cache of
//! compiled formulas. Once built it is only read, so one instance can be shared
//! across threads by reference.

use crate::config::EngineConfig;
use crate::error::{DefinitionError, FormulaError, FormulaResult};
use crate::formula::{
    CalculatorFunction, CompiledFormula, ContextAwareFunction, EvaluationContext,
    EvaluationResult, FunctionRegistry, Value, coerce, evaluate_expression, normalize,
    substitute,
};
use crate::validation;
use anyhow::bail;
use calcforge_types::{CalculatorDefinition, CalculatorField, FieldType, FieldValueMap};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, trace, warn};

/// Formula evaluation engine with a compiled-formula cache
pub struct CalculatorEngine {
    functions: FunctionRegistry,
    config: EngineConfig,
    cache: DashMap<String, Arc<CompiledFormula>>,
}

impl std::fmt::Debug for CalculatorEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalculatorEngine")
            .field("functions", &self.functions)
            .field("config", &self.config)
            .field("cached_formulas", &self.cache.len())
            .finish()
    }
}

impl Default for CalculatorEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl CalculatorEngine {
    /// Create an engine with the built-in helpers and default limits
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    #[instrument(skip(config))]
    pub fn with_config(config: EngineConfig) -> Self {
        info!(
            evaluation_timeout_ms = config.evaluation_timeout_ms,
            max_formula_length = config.max_formula_length,
            formula_cache_capacity = config.formula_cache_capacity,
            "Creating calculator engine"
        );
        Self { functions: FunctionRegistry::with_builtins(), config, cache: DashMap::new() }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    /// Add a helper callable from formulas
    pub fn register_function<F: CalculatorFunction + 'static>(&mut self, name: &str, function: F) {
        debug!(function = name, "Registering helper function");
        self.functions.register(name, Box::new(function));
        self.cache.clear();
    }

    /// Add a helper that needs the evaluation context
    pub fn register_context_function<F: ContextAwareFunction + 'static>(
        &mut self,
        name: &str,
        function: F,
    ) {
        debug!(function = name, "Registering context-aware helper function");
        self.functions.register_context_function(name, Box::new(function));
        self.cache.clear();
    }

    /// Number of compiled formulas currently cached
    pub fn cached_formulas(&self) -> usize {
        self.cache.len()
    }

    /// Parse a formula and check that every helper and constant it names exists.
    ///
    /// Results are cached by formula text.
    pub fn compile(&self, formula: &str) -> FormulaResult<Arc<CompiledFormula>> {
        if let Some(compiled) = self.cache.get(formula) {
            trace!("Formula cache hit");
            return Ok(Arc::clone(compiled.value()));
        }

        let compiled = CompiledFormula::compile(formula, &self.config.parse_limits())?;
        if let Some(name) = compiled.functions.iter().find(|f| !self.functions.has_function(f)) {
            return Err(FormulaError::UnknownFunction { name: name.clone() });
        }
        if let Some(name) = compiled.constants.iter().find(|c| !self.functions.has_constant(c)) {
            return Err(FormulaError::UnknownIdentifier { name: format!("Math.{name}") });
        }

        let compiled = Arc::new(compiled);
        let capacity = self.config.formula_cache_capacity;
        if capacity > 0 {
            if self.cache.len() >= capacity {
                debug!(capacity, "Formula cache full, clearing");
                self.cache.clear();
            }
            self.cache.insert(formula.to_string(), Arc::clone(&compiled));
        }
        Ok(compiled)
    }

    /// Evaluate a formula against the values of a calculator's fields.
    ///
    /// Never fails: every failure is reported as an [`EvaluationResult::Failure`].
    #[instrument(skip_all, fields(formula_len = formula.len(), bound_fields = values.len()))]
    pub fn evaluate_calculator(
        &self,
        formula: &str,
        fields: &[CalculatorField],
        values: &FieldValueMap,
        as_of: DateTime<Utc>,
    ) -> EvaluationResult {
        let started = Instant::now();
        let result = normalize(self.evaluate_raw(formula, fields, values, as_of));
        #[allow(clippy::cast_possible_truncation)]
        let elapsed_us = started.elapsed().as_micros() as u64;

        match &result {
            EvaluationResult::Success { .. } => {
                debug!(elapsed_us, outcome = "success", "Formula evaluated");
            }
            EvaluationResult::Failure { kind, message } => {
                debug!(elapsed_us, outcome = kind.as_str(), "Formula evaluation failed");
                if kind.is_reportable() {
                    warn!(kind = kind.as_str(), message = %message, "Unclassified evaluation failure");
                }
            }
        }
        result
    }

    /// Evaluate a formula that references no fields
    pub fn evaluate_formula(&self, formula: &str, as_of: DateTime<Utc>) -> EvaluationResult {
        self.evaluate_calculator(formula, &[], &FieldValueMap::new(), as_of)
    }

    /// Check the input preconditions, then evaluate the definition's formula
    #[instrument(skip_all, fields(calculator = %definition.name))]
    pub fn run(
        &self,
        definition: &CalculatorDefinition,
        values: &FieldValueMap,
        as_of: DateTime<Utc>,
    ) -> EvaluationResult {
        if let Err(error) = validation::validate_inputs(&definition.fields, values) {
            debug!(kind = error.kind().as_str(), "Input validation failed");
            return EvaluationResult::failure(&error);
        }
        self.evaluate_calculator(&definition.formula, &definition.fields, values, as_of)
    }

    /// Validate a definition against this engine's helpers and limits
    pub fn validate_definition(&self, definition: &CalculatorDefinition) -> Result<(), DefinitionError> {
        validation::validate_definition_with(definition, &self.functions, &self.config.parse_limits())
    }

    /// Formula text with field values spliced in as literals
    pub fn substitute(&self, formula: &str, values: &FieldValueMap) -> FormulaResult<String> {
        substitute(formula, values)
    }

    fn evaluate_raw(
        &self,
        formula: &str,
        fields: &[CalculatorField],
        values: &FieldValueMap,
        as_of: DateTime<Utc>,
    ) -> anyhow::Result<Value> {
        let mut context =
            EvaluationContext::new(as_of).with_time_budget(self.config.evaluation_timeout());

        trace!("Compiling formula");
        let compiled = self.compile(formula)?;

        context.bindings = bind_values(fields, values);
        trace!(bindings = context.bindings.len(), "Bound field values");

        for name in &compiled.variables {
            if context.bindings.contains_key(name) || self.functions.has_constant(name) {
                continue;
            }
            if fields.iter().any(|f| &f.id == name && f.field_type == FieldType::Result) {
                bail!(FormulaError::invalid_formula(format!(
                    "formula references result field '{name}'"
                )));
            }
            bail!(FormulaError::UnknownIdentifier { name: name.clone() });
        }

        trace!("Evaluating formula");
        evaluate_expression(&compiled.ast, &context, &self.functions)
    }
}

/// Coerce the supplied values of non-result fields; declared inputs without a
/// value bind to the empty string
fn bind_values(fields: &[CalculatorField], values: &FieldValueMap) -> HashMap<String, Value> {
    let result_ids: HashSet<&str> = fields
        .iter()
        .filter(|f| f.field_type == FieldType::Result)
        .map(|f| f.id.as_str())
        .collect();

    let mut bindings: HashMap<String, Value> = values
        .iter()
        .filter(|(id, _)| !result_ids.contains(id.as_str()))
        .map(|(id, value)| (id.clone(), coerce(value).to_value()))
        .collect();

    for field in fields.iter().filter(|f| f.field_type.is_input()) {
        bindings.entry(field.id.clone()).or_insert_with(|| Value::Text(String::new()));
    }
    bindings
}
