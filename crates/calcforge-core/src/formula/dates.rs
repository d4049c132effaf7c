//! Date helpers
//!
//! Dates are calendar dates without a time of day. Differences are symmetric:
//! the earlier argument may come first or second. Year and month counts only
//! include completed periods, so a birthday that has not been reached yet in the
//! later year does not count.

use crate::error::FormulaError;
use crate::formula::EvaluationContext;
use crate::formula::functions::{CalculatorFunction, ContextAwareFunction, FunctionRegistry};
use crate::formula::value::Value;
use anyhow::{Result, bail};
use chrono::{DateTime, Datelike, NaiveDate, Utc};

pub(crate) fn register_builtins(registry: &mut FunctionRegistry) {
    registry.register_context_function("today", Box::new(TodayFunction));
    registry.register_context_function("now", Box::new(TodayFunction));
    registry.register("date", Box::new(DateFunction));

    registry.register("yearsBetween", Box::new(BetweenFunction(Unit::Years)));
    registry.register("monthsBetween", Box::new(BetweenFunction(Unit::Months)));
    registry.register("daysBetween", Box::new(BetweenFunction(Unit::Days)));

    registry.register_context_function("ageInYears", Box::new(AgeFunction(Unit::Years)));
    registry.register_context_function("ageInMonths", Box::new(AgeFunction(Unit::Months)));
    registry.register_context_function("ageInDays", Box::new(AgeFunction(Unit::Days)));

    registry.register("getYear", Box::new(ComponentFunction(Component::Year)));
    registry.register("getMonth", Box::new(ComponentFunction(Component::Month)));
    registry.register("getDay", Box::new(ComponentFunction(Component::Day)));
    registry.register("formatDate", Box::new(FormatDateFunction));
}

fn digits(text: &str, min: usize, max: usize) -> Option<u32> {
    if (min..=max).contains(&text.len()) && text.bytes().all(|b| b.is_ascii_digit()) {
        text.parse().ok()
    } else {
        None
    }
}

/// `M/D/YYYY` with one- or two-digit month and day, as (year, month, day)
fn us_date_parts(text: &str) -> Option<(i32, u32, u32)> {
    let mut parts = text.split('/');
    let month = digits(parts.next()?, 1, 2)?;
    let day = digits(parts.next()?, 1, 2)?;
    let year = digits(parts.next()?, 4, 4)?;
    if parts.next().is_some() {
        return None;
    }
    Some((i32::try_from(year).ok()?, month, day))
}

/// `YYYY-MM-DD`, as (year, month, day)
fn iso_date_parts(text: &str) -> Option<(i32, u32, u32)> {
    let mut parts = text.split('-');
    let year = digits(parts.next()?, 4, 4)?;
    let month = digits(parts.next()?, 2, 2)?;
    let day = digits(parts.next()?, 2, 2)?;
    if parts.next().is_some() {
        return None;
    }
    Some((i32::try_from(year).ok()?, month, day))
}

/// Whether text has one of the recognised date shapes.
///
/// Only the shape is checked; `13/45/2024` is date-shaped but does not parse.
pub fn is_date_shaped(text: &str) -> bool {
    us_date_parts(text).is_some() || iso_date_parts(text).is_some()
}

/// Parse `M/D/YYYY`, `YYYY-MM-DD` or an RFC 3339 timestamp (taken in UTC)
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if let Some((year, month, day)) = us_date_parts(text).or_else(|| iso_date_parts(text)) {
        return NaiveDate::from_ymd_opt(year, month, day);
    }
    DateTime::parse_from_rfc3339(text).ok().map(|dt| dt.with_timezone(&Utc).date_naive())
}

fn ordered(a: NaiveDate, b: NaiveDate) -> (NaiveDate, NaiveDate) {
    if a <= b { (a, b) } else { (b, a) }
}

/// Completed years between two dates
pub fn years_between(a: NaiveDate, b: NaiveDate) -> i64 {
    let (older, newer) = ordered(a, b);
    let mut years = i64::from(newer.year() - older.year());
    if (newer.month(), newer.day()) < (older.month(), older.day()) {
        years -= 1;
    }
    years
}

/// Completed months between two dates
pub fn months_between(a: NaiveDate, b: NaiveDate) -> i64 {
    let (older, newer) = ordered(a, b);
    let mut months = i64::from(newer.year() - older.year()) * 12;
    months += i64::from(newer.month()) - i64::from(older.month());
    if newer.day() < older.day() {
        months -= 1;
    }
    months
}

/// Whole days between two dates
pub fn days_between(a: NaiveDate, b: NaiveDate) -> i64 {
    (b - a).num_days().abs()
}

/// Replace `YYYY`, `YY`, `MM` and `DD` in `pattern`; other characters are copied
pub fn format_date(date: NaiveDate, pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 4);
    let mut rest = pattern;

    while let Some(ch) = rest.chars().next() {
        if let Some(tail) = rest.strip_prefix("YYYY") {
            out.push_str(&format!("{:04}", date.year()));
            rest = tail;
        } else if let Some(tail) = rest.strip_prefix("YY") {
            out.push_str(&format!("{:02}", date.year().rem_euclid(100)));
            rest = tail;
        } else if let Some(tail) = rest.strip_prefix("MM") {
            out.push_str(&format!("{:02}", date.month()));
            rest = tail;
        } else if let Some(tail) = rest.strip_prefix("DD") {
            out.push_str(&format!("{:02}", date.day()));
            rest = tail;
        } else {
            out.push(ch);
            rest = &rest[ch.len_utf8()..];
        }
    }

    out
}

/// Date argument at `index`; date strings are parsed like `date()`
fn date_arg(name: &str, args: &[Value], index: usize) -> Result<NaiveDate> {
    match args.get(index) {
        Some(Value::Date(date)) => Ok(*date),
        Some(Value::Text(text)) => match parse_date(text) {
            Some(date) => Ok(date),
            None => bail!(FormulaError::invalid_date(format!("'{text}' passed to {name}()"))),
        },
        Some(other) => bail!(FormulaError::invalid_date(format!(
            "{name}() expects a date, got {} '{}'",
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

#[allow(clippy::cast_precision_loss)]
fn count(n: i64) -> Value {
    Value::Number(n as f64)
}

#[derive(Debug, Clone, Copy)]
enum Unit {
    Years,
    Months,
    Days,
}

impl Unit {
    fn between(self, a: NaiveDate, b: NaiveDate) -> i64 {
        match self {
            Unit::Years => years_between(a, b),
            Unit::Months => months_between(a, b),
            Unit::Days => days_between(a, b),
        }
    }
}

struct TodayFunction;
impl ContextAwareFunction for TodayFunction {
    fn call_with_context(&self, _args: &[Value], context: &EvaluationContext) -> Result<Value> {
        Ok(Value::Date(context.today()))
    }

    fn arity(&self) -> Option<usize> {
        Some(0)
    }
    fn description(&self) -> &'static str {
        "Returns the date of the evaluation"
    }
}

struct DateFunction;
impl CalculatorFunction for DateFunction {
    fn call(&self, args: &[Value]) -> Result<Value> {
        Ok(Value::Date(date_arg("date", args, 0)?))
    }

    fn arity(&self) -> Option<usize> {
        Some(1)
    }
    fn description(&self) -> &'static str {
        "Parses M/D/YYYY, YYYY-MM-DD or an RFC 3339 timestamp into a date"
    }
}

struct BetweenFunction(Unit);
impl CalculatorFunction for BetweenFunction {
    fn call(&self, args: &[Value]) -> Result<Value> {
        let name = match self.0 {
            Unit::Years => "yearsBetween",
            Unit::Months => "monthsBetween",
            Unit::Days => "daysBetween",
        };
        let a = date_arg(name, args, 0)?;
        let b = date_arg(name, args, 1)?;
        Ok(count(self.0.between(a, b)))
    }

    fn arity(&self) -> Option<usize> {
        Some(2)
    }
    fn description(&self) -> &'static str {
        match self.0 {
            Unit::Years => "Completed years between two dates",
            Unit::Months => "Completed months between two dates",
            Unit::Days => "Whole days between two dates",
        }
    }
}

struct AgeFunction(Unit);
impl ContextAwareFunction for AgeFunction {
    fn call_with_context(&self, args: &[Value], context: &EvaluationContext) -> Result<Value> {
        let name = match self.0 {
            Unit::Years => "ageInYears",
            Unit::Months => "ageInMonths",
            Unit::Days => "ageInDays",
        };
        let birth = date_arg(name, args, 0)?;
        Ok(count(self.0.between(birth, context.today())))
    }

    fn arity(&self) -> Option<usize> {
        Some(1)
    }
    fn description(&self) -> &'static str {
        match self.0 {
            Unit::Years => "Completed years from a date until today",
            Unit::Months => "Completed months from a date until today",
            Unit::Days => "Whole days from a date until today",
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Component {
    Year,
    Month,
    Day,
}

impl Component {
    fn name(self) -> &'static str {
        match self {
            Component::Year => "getYear",
            Component::Month => "getMonth",
            Component::Day => "getDay",
        }
    }

    fn of(self, date: NaiveDate) -> i64 {
        match self {
            Component::Year => i64::from(date.year()),
            Component::Month => i64::from(date.month()),
            Component::Day => i64::from(date.day()),
        }
    }
}

struct ComponentFunction(Component);
impl CalculatorFunction for ComponentFunction {
    fn call(&self, args: &[Value]) -> Result<Value> {
        let date = date_arg(self.0.name(), args, 0)?;
        Ok(count(self.0.of(date)))
    }

    fn arity(&self) -> Option<usize> {
        Some(1)
    }
    fn description(&self) -> &'static str {
        match self.0 {
            Component::Year => "Returns the year of a date",
            Component::Month => "Returns the month of a date (1-12)",
            Component::Day => "Returns the day of the month of a date (1-31)",
        }
    }
}

struct FormatDateFunction;
impl CalculatorFunction for FormatDateFunction {
    fn call(&self, args: &[Value]) -> Result<Value> {
        let date = date_arg("formatDate", args, 0)?;
        let pattern = match &args[1] {
            Value::Text(pattern) => pattern,
            other => bail!(FormulaError::invalid_formula(format!(
                "formatDate() pattern must be a string, got {}",
                other.type_name()
            ))),
        };
        Ok(Value::Text(format_date(date, pattern)))
    }

    fn arity(&self) -> Option<usize> {
        Some(2)
    }
    fn description(&self) -> &'static str {
        "Formats a date using the YYYY, YY, MM and DD tokens"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_date_formats() {
        assert_eq!(parse_date("01/01/1990"), Some(ymd(1990, 1, 1)));
        assert_eq!(parse_date("3/7/2024"), Some(ymd(2024, 3, 7)));
        assert_eq!(parse_date("2024-03-07"), Some(ymd(2024, 3, 7)));
        assert_eq!(parse_date(" 2024-03-07 "), Some(ymd(2024, 3, 7)));
        assert_eq!(parse_date("2024-03-07T23:30:00-02:00"), Some(ymd(2024, 3, 8)));
        assert_eq!(parse_date("2024-3-7"), None);
        assert_eq!(parse_date("02/30/2024"), None);
        assert_eq!(parse_date("yesterday"), None);
        assert_eq!(parse_date("2024"), None);
    }

    #[test]
    fn test_date_shape() {
        assert!(is_date_shaped("12/31/2024"));
        assert!(is_date_shaped("2024-12-31"));
        assert!(is_date_shaped("13/45/2024"));
        assert!(!is_date_shaped("2024"));
        assert!(!is_date_shaped("12/31/24"));
        assert!(!is_date_shaped("2024-12-31T00:00:00Z"));
    }

    #[test]
    fn test_years_between_counts_completed_years() {
        assert_eq!(years_between(ymd(2020, 3, 1), ymd(2021, 2, 28)), 0);
        assert_eq!(years_between(ymd(2020, 3, 1), ymd(2021, 3, 1)), 1);
        assert_eq!(years_between(ymd(2021, 3, 1), ymd(2020, 3, 1)), 1);
        assert_eq!(years_between(ymd(2000, 2, 29), ymd(2001, 2, 28)), 0);
    }

    #[test]
    fn test_months_between() {
        assert_eq!(months_between(ymd(2020, 1, 31), ymd(2020, 2, 29)), 0);
        assert_eq!(months_between(ymd(2020, 1, 15), ymd(2020, 3, 15)), 2);
        assert_eq!(months_between(ymd(2021, 6, 10), ymd(2020, 1, 15)), 16);
    }

    #[test]
    fn test_days_between() {
        assert_eq!(days_between(ymd(2020, 1, 1), ymd(2020, 1, 2)), 1);
        assert_eq!(days_between(ymd(2020, 3, 1), ymd(2020, 2, 1)), 29);
        assert_eq!(days_between(ymd(2024, 5, 5), ymd(2024, 5, 5)), 0);
    }

    #[test]
    fn test_format_date() {
        let date = ymd(2024, 3, 7);
        assert_eq!(format_date(date, "MM/DD/YYYY"), "03/07/2024");
        assert_eq!(format_date(date, "DD.MM.YY"), "07.03.24");
        assert_eq!(format_date(date, "YYYYMMDD"), "20240307");
        assert_eq!(format_date(date, "Day DD"), "Day 07");
    }

    #[test]
    fn test_age_uses_context_date() {
        let registry = FunctionRegistry::with_builtins();
        let context = EvaluationContext::new(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap());

        let age = registry
            .call_with_context("ageInYears", &[Value::Date(ymd(1990, 6, 2))], &context)
            .unwrap();
        assert_eq!(age, Value::Number(33.0));

        let today = registry.call_with_context("today", &[], &context).unwrap();
        assert_eq!(today, Value::Date(ymd(2024, 6, 1)));
    }

    #[test]
    fn test_helpers_accept_date_strings() {
        let registry = FunctionRegistry::with_builtins();
        let result = registry
            .call("daysBetween", &[Value::from("01/01/2020"), Value::from("2020-01-31")])
            .unwrap();
        assert_eq!(result, Value::Number(30.0));

        let err = registry.call("date", &[Value::from("not a date")]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<FormulaError>(),
            Some(FormulaError::InvalidDate { .. })
        ));
    }
}
