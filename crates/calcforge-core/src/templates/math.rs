use super::{Template, samples, template};
use calcforge_types::{CalculatorField, FieldType};

pub(super) fn quadratic_root() -> Template {
    template(
        "math",
        "quadratic-root",
        "Quadratic Root",
        "Larger real root of a*x^2 + b*x + c",
        vec![
            CalculatorField::new("a", FieldType::Number, "a").required(),
            CalculatorField::new("b", FieldType::Number, "b").required(),
            CalculatorField::new("c", FieldType::Number, "c").required(),
            CalculatorField::new("root", FieldType::Result, "Root"),
        ],
        "(-b + sqrt(b*b - 4*a*c)) / (2*a)",
        samples([("a", 1.0.into()), ("b", (-5.0).into()), ("c", 6.0.into())]),
    )
}
