//! Error taxonomy for the landslide probability engine.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LandslideError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LandslideError {
    /// Invalid or missing construction parameters.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A required input field is not present on the field accessor.
    #[error("missing field: {0}")]
    MissingField(String),

    /// A field exists but does not hold one value per node.
    #[error("field {field} has {actual} values, expected {expected}")]
    FieldLength {
        field: String,
        expected: usize,
        actual: usize,
    },

    /// A physically invalid input value.
    #[error("invalid {field} at node {node}: {value} ({reason})")]
    Domain {
        field: String,
        node: usize,
        value: f64,
        reason: &'static str,
    },
}

impl LandslideError {
    pub fn config(message: impl Into<String>) -> Self {
        LandslideError::Configuration(message.into())
    }

    /// True for errors in the configuration class (bad parameters or shapes).
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            LandslideError::Configuration(_) | LandslideError::FieldLength { .. }
        )
    }
}
