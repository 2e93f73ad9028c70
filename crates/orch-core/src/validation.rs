//! Result types produced by the Validation Pipeline.

use serde::{Deserialize, Serialize};

/// Severity of a single validation issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// One finding from a validator run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub file: String,
    pub line: Option<u32>,
    pub column: Option<u32>,
    pub severity: Severity,
    pub message: String,
    pub rule: Option<String>,
}

/// Outcome of a single validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Passed,
    Failed,
    Skipped,
    Error,
}

/// Result produced by one gate in the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub gate_name: String,
    pub status: ValidationStatus,
    pub duration: std::time::Duration,
    pub issues: Vec<ValidationIssue>,
    pub error_message: Option<String>,
}

impl ValidationResult {
    #[must_use]
    pub fn skipped(gate_name: impl Into<String>) -> Self {
        Self {
            gate_name: gate_name.into(),
            status: ValidationStatus::Skipped,
            duration: std::time::Duration::ZERO,
            issues: Vec::new(),
            error_message: None,
        }
    }

    #[must_use]
    pub fn error(gate_name: impl Into<String>, duration: std::time::Duration, message: impl Into<String>) -> Self {
        Self {
            gate_name: gate_name.into(),
            status: ValidationStatus::Error,
            duration,
            issues: Vec::new(),
            error_message: Some(message.into()),
        }
    }

    /// Passing requires zero issues at error severity; warnings alone still
    /// yield `Passed`.
    #[must_use]
    pub fn from_issues(gate_name: impl Into<String>, duration: std::time::Duration, issues: Vec<ValidationIssue>) -> Self {
        let status = if issues.iter().any(|i| i.severity == Severity::Error) {
            ValidationStatus::Failed
        } else {
            ValidationStatus::Passed
        };
        Self {
            gate_name: gate_name.into(),
            status,
            duration,
            issues,
            error_message: None,
        }
    }
}
