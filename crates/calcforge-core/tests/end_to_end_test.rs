use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use calcforge_core::{
    CalculatorEngine, CalculatorFunction, ErrorKind, EvaluationResult, ResultValue, Value,
    evaluate_calculator_at, substitute,
};
use calcforge_types::{CalculatorField, FieldType, FieldValue, FieldValueMap};
use chrono::{DateTime, TimeZone, Utc};

fn as_of() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 15, 9, 30, 0).unwrap()
}

fn number_fields(ids: &[&str]) -> Vec<CalculatorField> {
    ids.iter().map(|id| CalculatorField::new(*id, FieldType::Number, *id)).collect()
}

fn values(pairs: &[(&str, FieldValue)]) -> FieldValueMap {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

fn number(result: &EvaluationResult) -> f64 {
    result.value().and_then(ResultValue::as_number).unwrap_or_else(|| panic!("expected a number, got {result:?}"))
}

#[test]
fn bmi_scenario() {
    let result = evaluate_calculator_at(
        "weight / ((height / 100) * (height / 100))",
        &number_fields(&["weight", "height"]),
        &values(&[("weight", 70.0.into()), ("height", 175.0.into())]),
        as_of(),
    );
    assert_eq!(result, EvaluationResult::success(ResultValue::Number(22.86)));
}

#[test]
fn mortgage_scenario() {
    let result = evaluate_calculator_at(
        "principal * (rate / 100 / 12) * pow(1 + rate / 100 / 12, years * 12) / (pow(1 + rate / 100 / 12, years * 12) - 1)",
        &number_fields(&["principal", "rate", "years"]),
        &values(&[("principal", 100_000.0.into()), ("rate", 5.0.into()), ("years", 30.0.into())]),
        as_of(),
    );
    assert!((number(&result) - 536.82).abs() <= 0.01);
}

#[test]
fn quadratic_scenario() {
    let result = evaluate_calculator_at(
        "(-b + sqrt(b*b - 4*a*c)) / (2*a)",
        &number_fields(&["a", "b", "c"]),
        &values(&[("a", 1.0.into()), ("b", (-5.0).into()), ("c", 6.0.into())]),
        as_of(),
    );
    assert_eq!(number(&result), 3.0);
}

#[test]
fn division_by_zero_is_contained() {
    let fields = number_fields(&["field1", "field2"]);
    let result = evaluate_calculator_at(
        "field1 / field2",
        &fields,
        &values(&[("field1", 10.0.into()), ("field2", 0.0.into())]),
        as_of(),
    );
    assert_eq!(result.kind(), Some(ErrorKind::DivisionByZero));

    let result = evaluate_calculator_at(
        "field1 % (field2 * 3)",
        &fields,
        &values(&[("field1", 10.0.into()), ("field2", "0".into())]),
        as_of(),
    );
    assert_eq!(result.kind(), Some(ErrorKind::DivisionByZero));
}

#[test]
fn long_operator_chains_are_rejected_not_evaluated() {
    let chain = vec!["1"; 4_999].join("+");
    let grouped = (0..40).fold("1".to_string(), |inner, _| format!("({inner}+1+1+1+1+1+1+1+1+1+1)"));

    let results = std::thread::Builder::new()
        .stack_size(2 << 20)
        .spawn(move || {
            [chain, grouped].map(|formula| {
                evaluate_calculator_at(&formula, &[], &FieldValueMap::new(), as_of())
            })
        })
        .unwrap()
        .join()
        .unwrap();

    for result in results {
        assert_eq!(result.kind(), Some(ErrorKind::InvalidFormula));
    }
}

#[test]
fn moderate_chains_still_evaluate() {
    let chain = vec!["1"; 60].join(" + ");
    let result = evaluate_calculator_at(&chain, &[], &FieldValueMap::new(), as_of());
    assert_eq!(result.value(), Some(&ResultValue::Number(60.0)));
}

#[test]
fn whole_token_substitution() {
    let fields = number_fields(&["a", "abc"]);
    let map = values(&[("a", 1.0.into()), ("abc", 2.0.into())]);

    assert_eq!(substitute("abc + a", &map).unwrap(), "2 + 1");
    let result = evaluate_calculator_at("abc + a", &fields, &map, as_of());
    assert_eq!(number(&result), 3.0);
}

#[test]
fn non_finite_results_are_rejected() {
    let fields = number_fields(&["x"]);
    let result = evaluate_calculator_at("sqrt(x)", &fields, &values(&[("x", (-4.0).into())]), as_of());
    assert_eq!(result.kind(), Some(ErrorKind::InvalidResult));

    let result = evaluate_calculator_at("pow(x, 10000)", &fields, &values(&[("x", 10.0.into())]), as_of());
    assert_eq!(result.kind(), Some(ErrorKind::InvalidResult));
}

#[test]
fn text_results_pass_through() {
    let fields = vec![CalculatorField::new("name", FieldType::Text, "Name")];
    let result = evaluate_calculator_at(
        "'Hello, ' + name + '!'",
        &fields,
        &values(&[("name", "Ada".into())]),
        as_of(),
    );
    assert_eq!(result.value(), Some(&ResultValue::Text("Hello, Ada!".into())));
}

#[test]
fn arithmetic_on_text_is_an_invalid_number() {
    let fields = vec![CalculatorField::new("amount", FieldType::Text, "Amount")];
    let result = evaluate_calculator_at("amount * 2", &fields, &values(&[("amount", "twelve".into())]), as_of());
    assert_eq!(result.kind(), Some(ErrorKind::InvalidNumber));

    let result = evaluate_calculator_at("amount * 2", &fields, &FieldValueMap::new(), as_of());
    assert_eq!(result.kind(), Some(ErrorKind::InvalidNumber));
}

#[test]
fn syntax_errors_are_invalid_formulas() {
    for formula in ["1 +", "(1 + 2", "sqrt(4", "1 2", "round(1, 2, 3)", ""] {
        let result = evaluate_calculator_at(formula, &[], &FieldValueMap::new(), as_of());
        assert_eq!(result.kind(), Some(ErrorKind::InvalidFormula), "formula {formula:?}");
    }
}

struct CallCounter(Arc<AtomicUsize>);

impl CalculatorFunction for CallCounter {
    fn call(&self, _args: &[Value]) -> Result<Value> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(Value::Number(0.0))
    }

    fn arity(&self) -> Option<usize> {
        None
    }

    fn description(&self) -> &'static str {
        "Counts its calls"
    }
}

#[test]
fn unsafe_characters_are_rejected_before_evaluation() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut engine = CalculatorEngine::new();
    engine.register_function("doSomethingBad", CallCounter(Arc::clone(&calls)));
    let fields = number_fields(&["field1"]);
    let map = values(&[("field1", 1.0.into())]);

    for formula in [
        "field1; doSomethingBad()",
        "doSomethingBad() + `field1`",
        "doSomethingBad(field1) && 1",
        "{ doSomethingBad() }",
        "doSomethingBad()[0]",
        "doSomethingBad() + $field1",
    ] {
        let result = engine.evaluate_calculator(formula, &fields, &map, as_of());
        assert_eq!(result.kind(), Some(ErrorKind::InvalidFormulaCharacters), "formula {formula:?}");
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let result = engine.evaluate_calculator("field1; doSomethingBad()", &fields, &map, as_of());
    assert_eq!(result.message(), Some("Formula contains invalid character ';' at position 6"));

    let result = engine.evaluate_calculator("doSomethingBad(field1)", &fields, &map, as_of());
    assert!(result.is_success());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn unsafe_characters_inside_strings_are_inert() {
    let result = evaluate_calculator_at("'a;b' + \"`c`\"", &[], &FieldValueMap::new(), as_of());
    assert_eq!(result.value(), Some(&ResultValue::Text("a;b`c`".into())));
}

#[test]
fn field_values_cannot_inject_code() {
    let fields = vec![CalculatorField::new("name", FieldType::Text, "Name")];
    let map = values(&[("name", "\" + sqrt(4) + \"".into())]);

    let result = evaluate_calculator_at("name", &fields, &map, as_of());
    assert_eq!(result.value(), Some(&ResultValue::Text("\" + sqrt(4) + \"".into())));

    let substituted = substitute("name", &map).unwrap();
    assert_eq!(substituted, r#""\" + sqrt(4) + \"""#);
}

#[test]
fn failures_serialize_with_their_kind() {
    let result = evaluate_calculator_at("1 / 0", &[], &FieldValueMap::new(), as_of());
    let json = serde_json::to_string(&result).unwrap();
    assert_eq!(json, r#"{"status":"failure","kind":"DivisionByZeroError","message":"Cannot divide by zero"}"#);
}
