use super::{Template, samples, template};
use calcforge_types::{CalculatorField, FieldType};

pub(super) fn age() -> Template {
    template(
        "dates",
        "age",
        "Age Calculator",
        "Completed years since a birth date",
        vec![
            CalculatorField::new("birthDate", FieldType::Date, "Birth date")
                .required()
                .with_placeholder("MM/DD/YYYY"),
            CalculatorField::new("age", FieldType::Result, "Age"),
        ],
        "ageInYears(date(birthDate))",
        samples([("birthDate", "01/01/1990".into())]),
    )
}

pub(super) fn days_between() -> Template {
    template(
        "dates",
        "days-between",
        "Days Between Dates",
        "Whole days separating two dates",
        vec![
            CalculatorField::new("startDate", FieldType::Date, "Start date").required(),
            CalculatorField::new("endDate", FieldType::Date, "End date").required(),
            CalculatorField::new("days", FieldType::Result, "Days"),
        ],
        "daysBetween(date(startDate), date(endDate))",
        samples([("startDate", "2024-01-01".into()), ("endDate", "2024-03-01".into())]),
    )
}
