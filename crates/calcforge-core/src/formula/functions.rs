//! Helper functions callable from formulas
//!
//! The registry is the only name-resolution scope for calls: a formula can reach
//! exactly the helpers registered here and nothing else. Names are matched
//! case-insensitively.

use crate::error::FormulaError;
use crate::formula::EvaluationContext;
use crate::formula::dates;
use crate::formula::value::Value;
use anyhow::{Result, bail};
use std::collections::HashMap;

/// Trait for functions that can be called from formulas
pub trait CalculatorFunction: Send + Sync {
    /// Call the function with the given arguments
    fn call(&self, args: &[Value]) -> Result<Value>;

    /// Get the expected number of arguments (None for variadic)
    fn arity(&self) -> Option<usize>;

    /// Get a description of this function
    fn description(&self) -> &'static str;
}

/// Trait for functions that need the evaluation context, such as the current date
pub trait ContextAwareFunction: Send + Sync {
    /// Call the function with arguments and context
    fn call_with_context(&self, args: &[Value], context: &EvaluationContext) -> Result<Value>;

    /// Get the expected number of arguments (None for variadic)
    fn arity(&self) -> Option<usize>;

    /// Get a description of this function
    fn description(&self) -> &'static str;
}

/// Registry for helper functions and named constants
pub struct FunctionRegistry {
    functions: HashMap<String, Box<dyn CalculatorFunction>>,
    context_functions: HashMap<String, Box<dyn ContextAwareFunction>>,
    constants: HashMap<String, f64>,
}

impl std::fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .field("context_functions", &self.context_functions.keys().collect::<Vec<_>>())
            .field("constants", &self.constants.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl FunctionRegistry {
    /// Create a new empty function registry
    pub fn new() -> Self {
        Self {
            functions: HashMap::new(),
            context_functions: HashMap::new(),
            constants: HashMap::new(),
        }
    }

    /// Create a function registry with built-in helpers and constants
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();

        // Mathematical functions
        registry.register("abs", Box::new(AbsFunction));
        registry.register("min", Box::new(MinFunction));
        registry.register("max", Box::new(MaxFunction));
        registry.register("round", Box::new(RoundFunction));
        registry.register("floor", Box::new(FloorFunction));
        registry.register("ceil", Box::new(CeilFunction));
        registry.register("sqrt", Box::new(SqrtFunction));
        registry.register("pow", Box::new(PowerFunction));

        registry.register_constant("PI", std::f64::consts::PI);
        registry.register_constant("E", std::f64::consts::E);

        dates::register_builtins(&mut registry);

        registry
    }

    /// Register a new function
    pub fn register(&mut self, name: &str, function: Box<dyn CalculatorFunction>) {
        self.functions.insert(name.to_lowercase(), function);
    }

    /// Register a new context-aware function
    pub fn register_context_function(&mut self, name: &str, function: Box<dyn ContextAwareFunction>) {
        self.context_functions.insert(name.to_lowercase(), function);
    }

    /// Register a named constant; constant names are case-sensitive
    pub fn register_constant(&mut self, name: &str, value: f64) {
        self.constants.insert(name.to_string(), value);
    }

    pub fn has_function(&self, name: &str) -> bool {
        let key = name.to_lowercase();
        self.functions.contains_key(&key) || self.context_functions.contains_key(&key)
    }

    pub fn constant(&self, name: &str) -> Option<f64> {
        self.constants.get(name).copied()
    }

    pub fn has_constant(&self, name: &str) -> bool {
        self.constants.contains_key(name)
    }

    /// Call a function by name
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value> {
        let Some(function) = self.functions.get(&name.to_lowercase()) else {
            bail!(FormulaError::UnknownFunction { name: name.to_string() });
        };

        check_arity(name, function.arity(), args)?;
        function.call(args)
    }

    /// Call a function by name, giving context-aware functions access to the context
    pub fn call_with_context(
        &self,
        name: &str,
        args: &[Value],
        context: &EvaluationContext,
    ) -> Result<Value> {
        // Try context-aware functions first
        if let Some(function) = self.context_functions.get(&name.to_lowercase()) {
            check_arity(name, function.arity(), args)?;
            return function.call_with_context(args, context);
        }

        // Fall back to regular functions
        self.call(name, args)
    }

    /// Description of a registered function
    pub fn description(&self, name: &str) -> Option<&'static str> {
        let key = name.to_lowercase();
        self.context_functions
            .get(&key)
            .map(|f| f.description())
            .or_else(|| self.functions.get(&key).map(|f| f.description()))
    }

    /// Get a sorted list of available function names
    pub fn list_functions(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .functions
            .keys()
            .chain(self.context_functions.keys())
            .map(|s| s.as_str())
            .collect();
        names.sort_unstable();
        names
    }

    /// Get a sorted list of constant names
    pub fn list_constants(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.constants.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

fn check_arity(name: &str, arity: Option<usize>, args: &[Value]) -> Result<()> {
    if let Some(expected) = arity {
        if args.len() != expected {
            bail!(FormulaError::InvalidArity {
                function: name.to_string(),
                expected: expected.to_string(),
                actual: args.len(),
            });
        }
    }
    Ok(())
}

/// Arity check for functions registered as variadic
pub(crate) fn check_arity_range(
    name: &str,
    args: &[Value],
    min: usize,
    max: Option<usize>,
) -> Result<()> {
    let too_many = max.is_some_and(|max| args.len() > max);
    if args.len() < min || too_many {
        let expected = match max {
            Some(max) if max == min => min.to_string(),
            Some(max) => format!("{min} to {max}"),
            None => format!("at least {min}"),
        };
        bail!(FormulaError::InvalidArity {
            function: name.to_string(),
            expected,
            actual: args.len(),
        });
    }
    Ok(())
}

/// Numeric argument at `index`
pub(crate) fn number_arg(name: &str, args: &[Value], index: usize) -> Result<f64> {
    match args.get(index) {
        Some(Value::Number(n)) => Ok(*n),
        Some(other) => bail!(FormulaError::invalid_number(format!(
            "{name}() requires a numeric argument, got {} '{}'",
            other.type_name(),
            other
        ))),
        None => bail!(FormulaError::InvalidArity {
            function: name.to_string(),
            expected: format!("at least {}", index + 1),
            actual: args.len(),
        }),
    }
}

/// Round half toward positive infinity, optionally to a number of decimal places
pub fn round_half_up(value: f64, places: i32) -> f64 {
    if places == 0 {
        return (value + 0.5).floor();
    }
    let multiplier = 10.0_f64.powi(places);
    (value * multiplier + 0.5).floor() / multiplier
}

// Mathematical functions

struct AbsFunction;
impl CalculatorFunction for AbsFunction {
    fn call(&self, args: &[Value]) -> Result<Value> {
        Ok(Value::Number(number_arg("abs", args, 0)?.abs()))
    }

    fn arity(&self) -> Option<usize> {
        Some(1)
    }
    fn description(&self) -> &'static str {
        "Returns the absolute value of a number"
    }
}

struct MinFunction;
impl CalculatorFunction for MinFunction {
    fn call(&self, args: &[Value]) -> Result<Value> {
        check_arity_range("min", args, 1, None)?;

        let mut min_val = f64::INFINITY;
        for i in 0..args.len() {
            min_val = min_val.min(number_arg("min", args, i)?);
        }
        Ok(Value::Number(min_val))
    }

    fn arity(&self) -> Option<usize> {
        None
    } // Variadic
    fn description(&self) -> &'static str {
        "Returns the minimum of the given numbers"
    }
}

struct MaxFunction;
impl CalculatorFunction for MaxFunction {
    fn call(&self, args: &[Value]) -> Result<Value> {
        check_arity_range("max", args, 1, None)?;

        let mut max_val = f64::NEG_INFINITY;
        for i in 0..args.len() {
            max_val = max_val.max(number_arg("max", args, i)?);
        }
        Ok(Value::Number(max_val))
    }

    fn arity(&self) -> Option<usize> {
        None
    } // Variadic
    fn description(&self) -> &'static str {
        "Returns the maximum of the given numbers"
    }
}

struct RoundFunction;
impl CalculatorFunction for RoundFunction {
    fn call(&self, args: &[Value]) -> Result<Value> {
        check_arity_range("round", args, 1, Some(2))?;

        let value = number_arg("round", args, 0)?;
        let places = if args.len() > 1 {
            let places = number_arg("round", args, 1)?;
            if places.fract() != 0.0 || !(0.0..=15.0).contains(&places) {
                bail!(FormulaError::invalid_number(format!(
                    "round() decimal places must be a whole number from 0 to 15, got {places}"
                )));
            }
            #[allow(clippy::cast_possible_truncation)]
            let places = places as i32;
            places
        } else {
            0
        };

        Ok(Value::Number(round_half_up(value, places)))
    }

    fn arity(&self) -> Option<usize> {
        None
    } // 1 or 2 arguments
    fn description(&self) -> &'static str {
        "Rounds a number to specified decimal places (default 0)"
    }
}

struct FloorFunction;
impl CalculatorFunction for FloorFunction {
    fn call(&self, args: &[Value]) -> Result<Value> {
        Ok(Value::Number(number_arg("floor", args, 0)?.floor()))
    }

    fn arity(&self) -> Option<usize> {
        Some(1)
    }
    fn description(&self) -> &'static str {
        "Returns the largest integer less than or equal to the number"
    }
}

struct CeilFunction;
impl CalculatorFunction for CeilFunction {
    fn call(&self, args: &[Value]) -> Result<Value> {
        Ok(Value::Number(number_arg("ceil", args, 0)?.ceil()))
    }

    fn arity(&self) -> Option<usize> {
        Some(1)
    }
    fn description(&self) -> &'static str {
        "Returns the smallest integer greater than or equal to the number"
    }
}

struct SqrtFunction;
impl CalculatorFunction for SqrtFunction {
    // A negative input yields NaN, which result normalization rejects
    fn call(&self, args: &[Value]) -> Result<Value> {
        Ok(Value::Number(number_arg("sqrt", args, 0)?.sqrt()))
    }

    fn arity(&self) -> Option<usize> {
        Some(1)
    }
    fn description(&self) -> &'static str {
        "Returns the square root of a number"
    }
}

struct PowerFunction;
impl CalculatorFunction for PowerFunction {
    fn call(&self, args: &[Value]) -> Result<Value> {
        let base = number_arg("pow", args, 0)?;
        let exponent = number_arg("pow", args, 1)?;
        Ok(Value::Number(base.powf(exponent)))
    }

    fn arity(&self) -> Option<usize> {
        Some(2)
    }
    fn description(&self) -> &'static str {
        "Returns base raised to the power of exponent"
    }
}
