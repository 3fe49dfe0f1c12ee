// src/utils/validation.rs
use serde_json::{json, Value};

/// Accumulated field-level validation failures, rendered into the error
/// payload of a 422 response.
#[derive(Debug, Default)]
pub struct ValidationErrors {
    errors: Vec<(&'static str, String)>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push((field, message.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    pub fn to_json(&self) -> Value {
        json!({
            "fields": self
                .errors
                .iter()
                .map(|(field, message)| json!({ "field": field, "message": message }))
                .collect::<Vec<_>>()
        })
    }

    #[cfg(test)]
    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|(f, _)| *f == field)
    }
}

pub fn require_non_empty(errors: &mut ValidationErrors, field: &'static str, value: &str) {
    if value.trim().is_empty() {
        errors.push(field, "must not be empty");
    }
}

pub fn require_positive_bounded(
    errors: &mut ValidationErrors,
    field: &'static str,
    value: i32,
    max: i32,
) {
    if value < 1 {
        errors.push(field, "must be a positive integer");
    } else if value > max {
        errors.push(field, format!("must not exceed {max}"));
    }
}
