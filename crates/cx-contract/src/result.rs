use std::fmt;

use serde::Serialize;

pub(crate) const UNKNOWN: &str = "unknown";

/// One schema violation reported for a payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// JSON pointer into the payload; `/` is the payload root.
    pub location: String,
    pub message: String,
    /// Keyword location in the contract that was violated.
    pub schema_location: String,
}

impl Diagnostic {
    pub fn new(
        location: impl Into<String>,
        message: impl Into<String>,
        schema_location: impl Into<String>,
    ) -> Self {
        Self {
            location: non_empty_or_unknown(location.into()),
            message: message.into(),
            schema_location: non_empty_or_unknown(schema_location.into()),
        }
    }
}

fn non_empty_or_unknown(value: String) -> String {
    if value.trim().is_empty() {
        UNKNOWN.to_string()
    } else {
        value
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Diagnostic[location='{}', message='{}', schema_location='{}']",
            self.location, self.message, self.schema_location
        )
    }
}

/// Outcome of validating one payload against one operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum ValidationResult {
    Valid,
    Invalid(Vec<Diagnostic>),
    /// The payload could not be checked at all: unknown operation, unparseable
    /// body or a fault inside the schema engine.
    Error(String),
}

/// A non-valid [`ValidationResult`] as an error value.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{summary}")]
pub struct ValidationFailure {
    pub summary: String,
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }

    pub fn has_errors(&self) -> bool {
        !self.is_valid()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            ValidationResult::Invalid(diagnostics) => diagnostics,
            _ => &[],
        }
    }

    /// First diagnostic message, or the error message for [`ValidationResult::Error`].
    pub fn first_error_message(&self) -> Option<&str> {
        match self {
            ValidationResult::Valid => None,
            ValidationResult::Invalid(diagnostics) => {
                diagnostics.first().map(|d| d.message.as_str())
            }
            ValidationResult::Error(message) => Some(message),
        }
    }

    pub fn error_summary(&self) -> String {
        match self {
            ValidationResult::Valid => "No errors".to_string(),
            ValidationResult::Error(message) => message.clone(),
            ValidationResult::Invalid(diagnostics) => {
                let mut out = format!("Validation failed with {} error(s):\n", diagnostics.len());
                for d in diagnostics {
                    out.push_str("  - ");
                    out.push_str(&d.location);
                    out.push_str(": ");
                    out.push_str(&d.message);
                    out.push('\n');
                }
                out
            }
        }
    }

    pub fn into_result(self) -> Result<(), ValidationFailure> {
        if self.is_valid() {
            return Ok(());
        }
        let summary = self.error_summary();
        let diagnostics = match self {
            ValidationResult::Invalid(diagnostics) => diagnostics,
            _ => Vec::new(),
        };
        Err(ValidationFailure {
            summary,
            diagnostics,
        })
    }
}
