//! Linting via `ruff` for Python and `eslint` for JS/TS, whichever tools
//! and file types are present.

use std::path::Path;
use std::time::Instant;

use async_trait::async_trait;
use orch_core::{Severity, ValidationIssue, ValidationResult};
use serde::Deserialize;

use crate::command::{has_files_with_extension, run};
use crate::pipeline::QualityGate;

pub struct LintValidator;

#[derive(Deserialize)]
struct RuffMessage {
    filename: String,
    location: RuffLocation,
    code: Option<String>,
    message: String,
}

#[derive(Deserialize)]
struct RuffLocation {
    row: u32,
    column: u32,
}

#[async_trait]
impl QualityGate for LintValidator {
    fn name(&self) -> &str {
        "Linting"
    }

    fn is_skippable(&self, worktree_path: &Path) -> bool {
        !has_files_with_extension(worktree_path, &["py", "js", "jsx", "ts", "tsx"])
    }

    async fn validate(&self, worktree_path: &Path) -> ValidationResult {
        let started = Instant::now();
        let mut issues = Vec::new();

        if has_files_with_extension(worktree_path, &["py"]) {
            issues.extend(lint_python(worktree_path));
        }
        if has_files_with_extension(worktree_path, &["js", "jsx", "ts", "tsx"]) {
            issues.extend(lint_javascript(worktree_path));
        }

        ValidationResult::from_issues(self.name(), started.elapsed(), issues)
    }
}

fn lint_python(worktree_path: &Path) -> Vec<ValidationIssue> {
    let Some(output) = run("ruff", &["check", "--output-format=json", "."], worktree_path) else {
        return Vec::new();
    };

    let Ok(messages) = serde_json::from_slice::<Vec<RuffMessage>>(&output.stdout) else {
        return Vec::new();
    };

    messages
        .into_iter()
        .map(|m| ValidationIssue {
            file: m.filename,
            line: Some(m.location.row),
            column: Some(m.location.column),
            severity: Severity::Warning,
            message: m.message,
            rule: m.code,
        })
        .collect()
}

fn lint_javascript(worktree_path: &Path) -> Vec<ValidationIssue> {
    let Some(output) = run("eslint", &[".", "--format=compact"], worktree_path) else {
        return Vec::new();
    };

    let stdout = String::from_utf8_lossy(&output.stdout);
    stdout
        .lines()
        .filter(|line| line.contains("problem"))
        .map(|line| ValidationIssue {
            file: line.split(':').next().unwrap_or("").trim().to_string(),
            line: None,
            column: None,
            severity: Severity::Warning,
            message: line.to_string(),
            rule: Some("eslint".to_string()),
        })
        .collect()
}
