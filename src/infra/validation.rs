//! Utilities for validating constraints on types.
//!
//! JSON endpoints use [`Valid`] and turn failures into client errors.
//! HTML forms collect failures into [`FormErrors`] instead, so that the form
//! can be shown again with every problem annotated.

use serde::Deserialize;
use std::collections::BTreeMap;
use validator::{Validate, ValidationErrors};

/// A type that cannot be instatiated without validating the value within.
/// That is, if you have a [`Valid<T>`], `T` is guaranteed to be valid.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Valid<T> {
    value: T,
}

impl<T> Valid<T> {
    /// Constructs a new validated value.
    pub fn new(value: T) -> Result<Valid<T>, ValidationErrors>
    where
        T: Validate,
    {
        value.validate().map(|_| Valid { value })
    }

    /// Returns a reference to the validated value.
    pub fn inner(&self) -> &T {
        &self.value
    }

    /// Returns the validated value.
    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T> AsRef<T> for Valid<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}

impl<'de, T: Deserialize<'de> + Validate> Deserialize<'de> for Valid<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value: T = T::deserialize(deserializer)?;
        Valid::new(value).map_err(|e| serde::de::Error::custom(e.to_string()))
    }
}

/// A failed constraint on a single form field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldError {
    /// The rule that failed, e.g. `range` or `typeMismatch`.
    pub code: String,
    /// A message suitable for showing next to the field.
    pub message: String,
}

/// A failed rule that spans several fields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GlobalError {
    /// The rule that failed, e.g. `totalPriceMin`.
    pub code: String,
    /// Ordered arguments used when formatting the message.
    pub args: Vec<i64>,
}

impl GlobalError {
    /// Formats the message for this error, replacing `{n}` with the n-th argument.
    pub fn message(&self) -> String {
        let template = match self.code.as_str() {
            "totalPriceMin" => {
                "The total of price * quantity must be at least {0}. Current value = {1}"
            }
            _ => return self.code.clone(),
        };
        self.args
            .iter()
            .enumerate()
            .fold(template.to_string(), |msg, (i, arg)| {
                msg.replace(&format!("{{{i}}}"), &arg.to_string())
            })
    }
}

/// Every binding, field and global error found while validating a form.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FormErrors {
    fields: BTreeMap<String, Vec<FieldError>>,
    global: Vec<GlobalError>,
}

impl FormErrors {
    /// Constructs an empty error set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an error on a single field.
    pub fn reject_field(&mut self, field: &str, code: &str, message: impl Into<String>) {
        self.fields
            .entry(field.to_string())
            .or_default()
            .push(FieldError {
                code: code.to_string(),
                message: message.into(),
            });
    }

    /// Records an error that is not tied to a single field.
    pub fn reject(&mut self, code: &str, args: Vec<i64>) {
        self.global.push(GlobalError {
            code: code.to_string(),
            args,
        });
    }

    /// Merges constraint errors from [`validator`].
    ///
    /// Fields that already failed to bind keep only their binding error.
    pub fn add_validation_errors(&mut self, errors: &ValidationErrors) {
        for (field, errors) in errors.field_errors() {
            let field = field.to_string();
            if self.has_field_errors(&field) {
                continue;
            }
            for e in errors {
                let message = e
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| e.code.to_string());
                self.reject_field(&field, &e.code, message);
            }
        }
    }

    /// Whether anything at all failed.
    pub fn has_errors(&self) -> bool {
        !self.fields.is_empty() || !self.global.is_empty()
    }

    /// Whether the given field failed.
    pub fn has_field_errors(&self, field: &str) -> bool {
        self.fields.get(field).is_some_and(|e| !e.is_empty())
    }

    /// The errors recorded for a field.
    pub fn field_errors(&self, field: &str) -> &[FieldError] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or_default()
    }

    /// The messages recorded for a field.
    pub fn field_messages(&self, field: &str) -> Vec<String> {
        self.field_errors(field)
            .iter()
            .map(|e| e.message.clone())
            .collect()
    }

    /// The errors not tied to a field.
    pub fn global_errors(&self) -> &[GlobalError] {
        &self.global
    }

    /// The formatted messages of the errors not tied to a field.
    pub fn global_messages(&self) -> Vec<String> {
        self.global.iter().map(GlobalError::message).collect()
    }
}
