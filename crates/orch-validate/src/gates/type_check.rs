//! Type checking via `mypy` for Python and `tsc --noEmit` for TypeScript.

use std::path::Path;
use std::time::Instant;

use async_trait::async_trait;
use orch_core::{Severity, ValidationIssue, ValidationResult};
use regex::Regex;

use crate::command::{has_files_with_extension, run};
use crate::pipeline::QualityGate;

pub struct TypeCheckValidator;

#[async_trait]
impl QualityGate for TypeCheckValidator {
    fn name(&self) -> &str {
        "Type Checking"
    }

    fn is_skippable(&self, worktree_path: &Path) -> bool {
        !has_files_with_extension(worktree_path, &["py", "ts", "tsx"])
    }

    async fn validate(&self, worktree_path: &Path) -> ValidationResult {
        let started = Instant::now();
        let mut issues = Vec::new();

        if has_files_with_extension(worktree_path, &["py"]) {
            issues.extend(check_mypy(worktree_path));
        }
        if has_files_with_extension(worktree_path, &["ts", "tsx"]) {
            issues.extend(check_tsc(worktree_path));
        }

        ValidationResult::from_issues(self.name(), started.elapsed(), issues)
    }
}

fn check_mypy(worktree_path: &Path) -> Vec<ValidationIssue> {
    let Some(output) = run("mypy", &[".", "--no-error-summary"], worktree_path) else {
        return Vec::new();
    };

    // mypy lines look like: path/to/file.py:12: error: message [rule]
    let re = Regex::new(r"^(?P<file>[^:]+):(?P<line>\d+): (?P<severity>\w+): (?P<message>.+)$").unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);

    stdout
        .lines()
        .filter_map(|line| {
            let caps = re.captures(line)?;
            let severity = if &caps["severity"] == "error" {
                Severity::Error
            } else {
                Severity::Warning
            };
            Some(ValidationIssue {
                file: caps["file"].to_string(),
                line: caps["line"].parse().ok(),
                column: None,
                severity,
                message: caps["message"].to_string(),
                rule: Some("mypy".to_string()),
            })
        })
        .collect()
}

fn check_tsc(worktree_path: &Path) -> Vec<ValidationIssue> {
    let Some(output) = run("tsc", &["--noEmit", "--pretty", "false"], worktree_path) else {
        return Vec::new();
    };

    // tsc lines look like: file.ts(12,5): error TSxxxx: message
    let re = Regex::new(r"^(?P<file>[^(]+)\((?P<line>\d+),(?P<col>\d+)\): (?P<severity>\w+) \w+: (?P<message>.+)$").unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);

    stdout
        .lines()
        .filter_map(|line| {
            let caps = re.captures(line)?;
            let severity = if &caps["severity"] == "error" {
                Severity::Error
            } else {
                Severity::Warning
            };
            Some(ValidationIssue {
                file: caps["file"].to_string(),
                line: caps["line"].parse().ok(),
                column: caps["col"].parse().ok(),
                severity,
                message: caps["message"].to_string(),
                rule: Some("tsc".to_string()),
            })
        })
        .collect()
}
