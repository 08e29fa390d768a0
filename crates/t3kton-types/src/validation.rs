//! Aggregate validation errors.

use thiserror::Error;

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct FieldError {
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

/// All validation failures found for one object.
///
/// Validation never stops at the first problem; callers get the full list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Error)]
#[error("{}", render(.errors))]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }

    /// Appends every error from `other`.
    pub fn merge(&mut self, other: ValidationErrors) {
        self.errors.extend(other.errors);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// `Ok(())` when nothing was collected, otherwise `Err(self)`.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

fn render(errors: &[FieldError]) -> String {
    match errors {
        [] => "no validation errors".to_string(),
        [only] => only.to_string(),
        many => {
            let joined: Vec<String> = many.iter().map(FieldError::to_string).collect();
            format!("[{}]", joined.join(", "))
        }
    }
}

impl FromIterator<FieldError> for ValidationErrors {
    fn from_iter<I: IntoIterator<Item = FieldError>>(iter: I) -> Self {
        Self {
            errors: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_error_display() {
        let mut errs = ValidationErrors::new();
        errs.push("spec.id", "can not change the ID");
        assert_eq!(errs.to_string(), "spec.id: can not change the ID");
    }

    #[test]
    fn test_aggregate_display() {
        let mut errs = ValidationErrors::new();
        errs.push("spec.id", "can not change the ID");
        errs.push("spec.blueprint", "blueprint not found");
        assert_eq!(
            errs.to_string(),
            "[spec.id: can not change the ID, spec.blueprint: blueprint not found]"
        );
    }

    #[test]
    fn test_is_std_error() {
        let mut errs = ValidationErrors::new();
        errs.push("spec.state", "invalid target state 'ready'");
        let boxed: Box<dyn std::error::Error> = Box::new(errs);
        assert_eq!(boxed.to_string(), "spec.state: invalid target state 'ready'");
        assert_eq!(ValidationErrors::new().to_string(), "no validation errors");
    }

    #[test]
    fn test_into_result() {
        assert!(ValidationErrors::new().into_result().is_ok());

        let mut errs = ValidationErrors::new();
        errs.push("a", "b");
        let mut more = ValidationErrors::new();
        more.push("c", "d");
        errs.merge(more);
        assert_eq!(errs.clone().into_result().unwrap_err().len(), 2);
        assert_eq!(errs.errors()[1].field, "c");
    }
}
