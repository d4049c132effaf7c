//! Built-in calculator templates
//!
//! A fixed catalog of ready-made calculators. Every template is a complete
//! [`CalculatorDefinition`] plus sample values that evaluate successfully.

mod dates;
mod finance;
mod health;
mod math;

use calcforge_types::{CalculatorDefinition, CalculatorField, FieldPosition, FieldValueMap};
use serde::Serialize;
use std::sync::LazyLock;

/// One catalog entry
#[derive(Debug, Clone, Serialize)]
pub struct Template {
    /// Grouping used by the catalog browser
    pub category: &'static str,
    /// The calculator itself; `definition.id` is the template id
    pub definition: CalculatorDefinition,
    /// Values that produce a meaningful result
    #[serde(rename = "sampleValues")]
    pub sample_values: FieldValueMap,
}

impl Template {
    pub fn id(&self) -> &str {
        self.definition.id.as_deref().unwrap_or_default()
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }
}

static CATALOG: LazyLock<Vec<Template>> = LazyLock::new(|| {
    vec![
        health::bmi(),
        finance::mortgage(),
        finance::compound_interest(),
        finance::tip_splitter(),
        math::quadratic_root(),
        dates::age(),
        dates::days_between(),
    ]
});

/// Every template, in catalog order
pub fn all() -> &'static [Template] {
    &CATALOG
}

pub fn by_id(id: &str) -> Option<&'static Template> {
    CATALOG.iter().find(|t| t.id() == id)
}

/// Templates of one category; the match ignores case
pub fn by_category(category: &str) -> Vec<&'static Template> {
    CATALOG.iter().filter(|t| t.category.eq_ignore_ascii_case(category)).collect()
}

/// Distinct categories, in catalog order
pub fn categories() -> Vec<&'static str> {
    let mut categories: Vec<&'static str> = Vec::new();
    for template in CATALOG.iter() {
        if !categories.contains(&template.category) {
            categories.push(template.category);
        }
    }
    categories
}

/// Assemble a template, stacking the fields vertically in the given order
fn template(
    category: &'static str,
    id: &str,
    name: &str,
    description: &str,
    fields: Vec<CalculatorField>,
    formula: &str,
    sample_values: FieldValueMap,
) -> Template {
    let fields = fields
        .into_iter()
        .enumerate()
        .map(|(row, mut field)| {
            #[allow(clippy::cast_precision_loss)]
            let y = row as f64 * 80.0;
            field.position = FieldPosition { x: 0.0, y };
            field
        })
        .collect();

    let mut definition = CalculatorDefinition::new(name, fields, formula);
    definition.id = Some(id.to_string());
    definition.description = Some(description.to_string());
    definition.template = Some(id.to_string());

    Template { category, definition, sample_values }
}

fn samples<const N: usize>(pairs: [(&str, calcforge_types::FieldValue); N]) -> FieldValueMap {
    pairs.into_iter().map(|(id, value)| (id.to_string(), value)).collect()
}
