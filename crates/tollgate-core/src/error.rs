use std::fmt;

/// A single structural problem found in an approval spec.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{path}: {message}")]
pub struct FieldError {
    /// Field path such as `approvers[2].users[0].name`.
    pub path: String,
    /// What is wrong with the field.
    pub message: String,
}

impl FieldError {
    /// Create a field error.
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Ordered, non-empty list of validation failures.
///
/// Displays as its first error, which is what callers show to users.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub(crate) fn from_vec(errors: Vec<FieldError>) -> Option<Self> {
        if errors.is_empty() {
            None
        } else {
            Some(Self(errors))
        }
    }

    /// The first error in document order.
    #[must_use]
    pub fn first(&self) -> &FieldError {
        // Never empty: constructed only through `from_vec`.
        &self.0[0]
    }

    /// Iterate over every error in document order.
    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }

    /// Number of errors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; kept for API symmetry with `len`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consume into the underlying list.
    #[must_use]
    pub fn into_inner(self) -> Vec<FieldError> {
        self.0
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.first())
    }
}

impl std::error::Error for ValidationErrors {}

/// Result type for spec validation.
pub type ValidationResult<T> = Result<T, ValidationErrors>;
