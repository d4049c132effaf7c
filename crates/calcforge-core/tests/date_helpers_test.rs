use calcforge_core::{ErrorKind, EvaluationResult, ResultValue, evaluate_calculator_at};
use calcforge_types::{CalculatorField, FieldType, FieldValue, FieldValueMap};
use chrono::{DateTime, TimeZone, Utc};

fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap()
}

fn eval(formula: &str, as_of: DateTime<Utc>) -> EvaluationResult {
    evaluate_calculator_at(formula, &[], &FieldValueMap::new(), as_of)
}

fn eval_number(formula: &str, as_of: DateTime<Utc>) -> f64 {
    let result = eval(formula, as_of);
    result.value().and_then(ResultValue::as_number).unwrap_or_else(|| panic!("{formula}: {result:?}"))
}

#[test]
fn age_from_birth_date_field() {
    let fields = vec![CalculatorField::new("birthDate", FieldType::Date, "Birth date")];
    let values: FieldValueMap =
        [("birthDate".to_string(), FieldValue::from("01/01/1990"))].into_iter().collect();

    for as_of in [at(2020, 1, 2), at(2024, 6, 15), at(2031, 12, 31)] {
        let result = evaluate_calculator_at("ageInYears(date(birthDate))", &fields, &values, as_of);
        let age = result.value().and_then(ResultValue::as_number).unwrap();
        assert!(age >= 30.0);
        assert_eq!(age.fract(), 0.0);
    }

    let result = evaluate_calculator_at("ageInYears(date(birthDate))", &fields, &values, at(2024, 6, 15));
    assert_eq!(result.value(), Some(&ResultValue::Number(34.0)));
}

#[test]
fn year_boundary_is_calendar_aware() {
    let as_of = at(2024, 1, 1);
    assert_eq!(eval_number(r#"yearsBetween(date("2020-03-01"), date("2021-02-28"))"#, as_of), 0.0);
    assert_eq!(eval_number(r#"yearsBetween(date("2020-03-01"), date("2021-03-01"))"#, as_of), 1.0);
    assert_eq!(eval_number(r#"yearsBetween(date("2021-03-01"), date("2020-03-01"))"#, as_of), 1.0);
}

#[test]
fn months_and_days_between() {
    let as_of = at(2024, 1, 1);
    assert_eq!(eval_number(r#"monthsBetween("1/31/2024", "2/29/2024")"#, as_of), 0.0);
    assert_eq!(eval_number(r#"monthsBetween("1/15/2024", "3/15/2024")"#, as_of), 2.0);
    assert_eq!(eval_number(r#"daysBetween(date("2024-01-01"), date("2024-03-01"))"#, as_of), 60.0);
    assert_eq!(eval_number(r#"daysBetween(date("2024-03-01"), date("2024-01-01"))"#, as_of), 60.0);
}

#[test]
fn today_is_fixed_for_one_evaluation() {
    let as_of = at(2024, 2, 29);
    assert_eq!(eval_number("daysBetween(today(), now())", as_of), 0.0);
    assert_eq!(eval_number("getYear(today()) * 10000 + getMonth(today()) * 100 + getDay(today())", as_of), 20_240_229.0);
    assert_eq!(eval("today()", as_of).value(), Some(&ResultValue::Text("2/29/2024".into())));
}

#[test]
fn age_in_months_and_days() {
    let as_of = at(2024, 6, 15);
    assert_eq!(eval_number(r#"ageInMonths("2024-01-20")"#, as_of), 4.0);
    assert_eq!(eval_number(r#"ageInDays("2024-06-01")"#, as_of), 14.0);
}

#[test]
fn format_date_tokens() {
    let result = eval(r#"formatDate(date("2024-03-05"), "DD.MM.YYYY / YY")"#, at(2024, 1, 1));
    assert_eq!(result.value(), Some(&ResultValue::Text("05.03.2024 / 24".into())));
}

#[test]
fn unparsable_dates_are_reported() {
    for formula in [r#"date("not a date")"#, r#"date("2024-02-30")"#, r#"ageInYears("13/45/1990")"#, "getYear(12)"] {
        assert_eq!(eval(formula, at(2024, 1, 1)).kind(), Some(ErrorKind::InvalidDate), "{formula}");
    }
}

#[test]
fn date_comparisons() {
    let as_of = at(2024, 1, 1);
    let result = eval(r#"date("2024-01-01") < date("2024-01-02")"#, as_of);
    assert_eq!(result.value(), Some(&ResultValue::Text("true".into())));

    let result = eval(r#"date("1/1/2024") == date("2024-01-01")"#, as_of);
    assert_eq!(result.value(), Some(&ResultValue::Text("true".into())));
}
