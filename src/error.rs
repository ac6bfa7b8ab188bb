use std::fmt;

use thiserror::Error;

/// One field-level diagnostic produced while validating a module's configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Dotted path of the offending field, relative to the module root.
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration for module '{module}': {}", join_fields(.errors))]
    Validation {
        module: String,
        errors: Vec<FieldError>,
    },

    #[error("Environment overrides {vars:?} all target '{path}' after key normalization")]
    AmbiguousOverride { path: String, vars: Vec<String> },

    #[error("Key not found: {0}")]
    KeyNotFound(String),
}

impl ConfigError {
    /// Field diagnostics carried by a validation failure; empty for other variants.
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            ConfigError::Validation { errors, .. } => errors,
            _ => &[],
        }
    }
}

fn join_fields(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
