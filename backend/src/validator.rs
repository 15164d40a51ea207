//! Field-level validation accumulator.
//!
//! A [`Validator`] collects at most one message per field. Entity validation
//! functions (see [`crate::models`]) run every check against a candidate and
//! record the failures, so a single response can report all problems at once.

use std::collections::BTreeMap;

/// Mapping of field name to its first recorded error message.
pub type FieldErrors = BTreeMap<String, String>;

/// Accumulates named field errors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validator {
    errors: FieldErrors,
}

impl Validator {
    /// Create an empty validator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when no error has been recorded.
    pub fn valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Record `message` for `key` unless the key already has an error.
    pub fn add_error(&mut self, key: impl Into<String>, message: impl Into<String>) {
        self.errors.entry(key.into()).or_insert_with(|| message.into());
    }

    /// Record `message` for `key` when `ok` is false.
    pub fn check(&mut self, ok: bool, key: &str, message: &str) {
        if !ok {
            self.add_error(key, message);
        }
    }

    /// Drop all recorded errors so the validator can be reused.
    pub fn reset(&mut self) {
        self.errors.clear();
    }

    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    pub fn into_errors(self) -> FieldErrors {
        self.errors
    }
}

/// Returns `true` if `value` is one of `permitted`.
pub fn permitted_value<T: PartialEq + ?Sized>(value: &T, permitted: &[&T]) -> bool {
    permitted.iter().any(|p| *p == value)
}
