use super::{Template, samples, template};
use calcforge_types::{CalculatorField, FieldType};

pub(super) fn bmi() -> Template {
    template(
        "health",
        "bmi",
        "BMI Calculator",
        "Body mass index from weight in kilograms and height in centimetres",
        vec![
            CalculatorField::new("weight", FieldType::Number, "Weight (kg)")
                .required()
                .with_placeholder("70")
                .with_bounds(Some(1.0), Some(500.0)),
            CalculatorField::new("height", FieldType::Number, "Height (cm)")
                .required()
                .with_placeholder("175")
                .with_bounds(Some(30.0), Some(300.0)),
            CalculatorField::new("bmi", FieldType::Result, "BMI"),
        ],
        "weight / ((height / 100) * (height / 100))",
        samples([("weight", 70.0.into()), ("height", 175.0.into())]),
    )
}
