use super::{Template, samples, template};
use calcforge_types::{CalculatorField, FieldType};

pub(super) fn mortgage() -> Template {
    template(
        "finance",
        "mortgage",
        "Mortgage Payment",
        "Monthly payment of a fixed-rate loan",
        vec![
            CalculatorField::new("principal", FieldType::Number, "Loan amount")
                .required()
                .with_bounds(Some(1.0), None),
            CalculatorField::new("rate", FieldType::Number, "Annual interest rate (%)")
                .required()
                .with_bounds(Some(0.01), Some(100.0)),
            CalculatorField::new("years", FieldType::Number, "Term (years)")
                .required()
                .with_bounds(Some(1.0), Some(50.0)),
            CalculatorField::new("payment", FieldType::Result, "Monthly payment"),
        ],
        "principal * (rate / 100 / 12) * pow(1 + rate / 100 / 12, years * 12) \
         / (pow(1 + rate / 100 / 12, years * 12) - 1)",
        samples([
            ("principal", 100_000.0.into()),
            ("rate", 5.0.into()),
            ("years", 30.0.into()),
        ]),
    )
}

pub(super) fn compound_interest() -> Template {
    template(
        "finance",
        "compound-interest",
        "Compound Interest",
        "Future value of a deposit with periodic compounding",
        vec![
            CalculatorField::new("principal", FieldType::Number, "Initial deposit")
                .required()
                .with_bounds(Some(0.0), None),
            CalculatorField::new("rate", FieldType::Number, "Annual interest rate (%)")
                .required()
                .with_bounds(Some(0.0), Some(100.0)),
            CalculatorField::new("years", FieldType::Number, "Years").required(),
            CalculatorField::new("compounds", FieldType::Number, "Compounds per year")
                .required()
                .with_bounds(Some(1.0), Some(365.0)),
            CalculatorField::new("futureValue", FieldType::Result, "Future value"),
        ],
        "principal * pow(1 + rate / 100 / compounds, compounds * years)",
        samples([
            ("principal", 1000.0.into()),
            ("rate", 5.0.into()),
            ("years", 10.0.into()),
            ("compounds", 12.0.into()),
        ]),
    )
}

pub(super) fn tip_splitter() -> Template {
    template(
        "finance",
        "tip-splitter",
        "Tip Splitter",
        "Share of a bill per person, tip included",
        vec![
            CalculatorField::new("bill", FieldType::Number, "Bill amount")
                .required()
                .with_bounds(Some(0.0), None),
            CalculatorField::new("tip", FieldType::Select, "Tip (%)")
                .required()
                .with_options(["10", "15", "18", "20"]),
            CalculatorField::new("people", FieldType::Number, "People")
                .required()
                .with_bounds(Some(1.0), Some(100.0)),
            CalculatorField::new("share", FieldType::Result, "Per person"),
        ],
        "(bill + bill * tip / 100) / people",
        samples([("bill", 120.0.into()), ("tip", "15".into()), ("people", 4.0.into())]),
    )
}
