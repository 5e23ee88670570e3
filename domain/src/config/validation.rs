//! Configuration issues reported by file-config validation.

/// Severity level of a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Fatal: the configuration cannot work at all.
    Error,
    /// Non-fatal: a default is used instead of the configured value.
    Warning,
}

/// Identifies a specific configuration issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigIssueCode {
    /// A required name is empty.
    EmptyValue { field: String },
    /// A numeric value is outside its accepted range.
    OutOfRange { field: String, value: String },
}

/// A detected issue in the configuration.
#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: Severity,
    pub code: ConfigIssueCode,
    pub message: String,
}

impl ConfigIssue {
    pub fn empty(field: &str) -> Self {
        Self {
            severity: Severity::Error,
            code: ConfigIssueCode::EmptyValue {
                field: field.to_string(),
            },
            message: format!("{field}: must not be empty"),
        }
    }

    pub fn out_of_range(field: &str, value: impl ToString, fallback: impl ToString) -> Self {
        let value = value.to_string();
        Self {
            severity: Severity::Warning,
            code: ConfigIssueCode::OutOfRange {
                field: field.to_string(),
                value: value.clone(),
            },
            message: format!(
                "{field}: value '{value}' is out of range, falling back to '{}'",
                fallback.to_string()
            ),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}
