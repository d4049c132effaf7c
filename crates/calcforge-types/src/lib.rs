//! Calcforge Types
//!
//! This crate defines the data model shared by the Calcforge crates: calculator
//! definitions as stored by the persistence layer, their fields, and the raw
//! values an end user types into those fields.

#![deny(missing_docs)]

mod definition;
mod types;

pub use definition::{
    CalculatorDefinition, CalculatorField, FieldPosition, FieldType, FieldValidation,
};
pub use types::{FieldValue, FieldValueMap};
