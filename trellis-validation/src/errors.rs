// Validation errors

use serde::Serialize;
use std::fmt;

/// Validation failure for a single field.
///
/// `field` is fully qualified: nested objects are joined with `.` and array
/// elements carry their index, e.g. `items[2].name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    /// Field (or schema subject) that failed validation
    pub field: String,

    /// Human-readable reason
    pub reason: String,

    /// Constraint that failed (`type`, `min`, `max`, `required`)
    pub constraint: String,
}

impl ValidationError {
    /// Create a new validation error
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
            constraint: "custom".to_string(),
        }
    }

    /// Set the constraint name
    pub fn with_constraint(mut self, constraint: impl Into<String>) -> Self {
        self.constraint = constraint.into();
        self
    }

    /// Qualify this error with the name of the enclosing object field.
    pub fn within(mut self, parent: &str) -> Self {
        self.field = if self.field.starts_with('[') {
            format!("{}{}", parent, self.field)
        } else {
            format!("{}.{}", parent, self.field)
        };
        self
    }

    /// Qualify this error with the index of the enclosing array element.
    pub fn at_index(mut self, index: usize) -> Self {
        self.field = format!("[{}].{}", index, self.field);
        self
    }

    /// Convert to JSON representation
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "field": self.field,
            "reason": self.reason,
            "constraint": self.constraint,
        })
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

impl std::error::Error for ValidationError {}
