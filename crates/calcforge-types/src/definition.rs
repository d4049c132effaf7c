use serde::{Deserialize, Serialize};

/// Kind of a calculator field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Free text
    Text,
    /// Numeric input, optionally bounded
    Number,
    /// One of a fixed list of options
    Select,
    /// Boolean toggle
    Checkbox,
    /// Calendar date typed as `MM/DD/YYYY` or `YYYY-MM-DD`
    Date,
    /// Output slot showing the formula result; never an input
    Result,
}

impl FieldType {
    /// Whether values for this field are supplied by the end user
    #[must_use]
    pub const fn is_input(self) -> bool {
        !matches!(self, Self::Result)
    }

    /// Lowercase name as used in the stored JSON
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Select => "select",
            Self::Checkbox => "checkbox",
            Self::Date => "date",
            Self::Result => "result",
        }
    }
}

/// Bounds for number fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldValidation {
    /// Inclusive lower bound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// Inclusive upper bound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Pattern hint carried for the builder UI; not enforced here
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

/// Layout coordinates owned by the visual builder
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldPosition {
    /// Horizontal offset
    pub x: f64,
    /// Vertical offset
    pub y: f64,
}

/// One input or output slot of a calculator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculatorField {
    /// Identifier referenced from the formula
    pub id: String,
    /// Field kind
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Display label
    #[serde(default)]
    pub label: String,
    /// Input placeholder text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    /// Whether a value must be supplied before evaluation
    #[serde(default)]
    pub required: bool,
    /// Options offered by a select field
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    /// Bounds for a number field
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<FieldValidation>,
    /// Builder layout position
    #[serde(default)]
    pub position: FieldPosition,
}

impl CalculatorField {
    /// Create an optional field with no placeholder, options or bounds
    pub fn new(id: impl Into<String>, field_type: FieldType, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            field_type,
            label: label.into(),
            placeholder: None,
            required: false,
            options: None,
            validation: None,
            position: FieldPosition::default(),
        }
    }

    /// Mark the field as required
    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Set the placeholder text
    #[must_use]
    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    /// Set the options of a select field
    #[must_use]
    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = Some(options.into_iter().map(Into::into).collect());
        self
    }

    /// Set inclusive numeric bounds
    #[must_use]
    pub fn with_bounds(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.validation = Some(FieldValidation { min, max, pattern: None });
        self
    }

    /// Label for user-facing messages, falling back to the id
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.label.trim().is_empty() { &self.id } else { &self.label }
    }
}

/// A calculator as handed to the engine: its fields and its formula
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculatorDefinition {
    /// Storage identifier, when persisted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Calculator name
    pub name: String,
    /// Optional description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Template the calculator was created from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    /// Field list in display order
    pub fields: Vec<CalculatorField>,
    /// Formula text referencing field ids
    #[serde(default)]
    pub formula: String,
}

impl CalculatorDefinition {
    /// Create a definition without storage metadata
    pub fn new(
        name: impl Into<String>,
        fields: Vec<CalculatorField>,
        formula: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            name: name.into(),
            description: None,
            template: None,
            fields,
            formula: formula.into(),
        }
    }

    /// Look up a field by id
    #[must_use]
    pub fn field(&self, id: &str) -> Option<&CalculatorField> {
        self.fields.iter().find(|f| f.id == id)
    }

    /// Fields whose values come from the end user
    pub fn input_fields(&self) -> impl Iterator<Item = &CalculatorField> {
        self.fields.iter().filter(|f| f.field_type.is_input())
    }

    /// Append a default `result` field unless one is already present.
    ///
    /// Returns `true` when a field was added.
    pub fn ensure_result_field(&mut self) -> bool {
        if self.fields.iter().any(|f| f.field_type == FieldType::Result) {
            return false;
        }

        let mut id = "result".to_string();
        let mut suffix = 1;
        while self.field(&id).is_some() {
            id = format!("result_{suffix}");
            suffix += 1;
        }

        #[allow(clippy::cast_precision_loss)]
        let y = self.fields.len() as f64 * 80.0;
        let mut field = CalculatorField::new(id, FieldType::Result, "Result");
        field.position = FieldPosition { x: 0.0, y };
        self.fields.push(field);
        true
    }
}
