//! Test execution via `pytest` for Python and `npm test` for JS/TS
//! projects that declare a `package.json` test script.

use std::path::Path;
use std::time::Instant;

use async_trait::async_trait;
use orch_core::{Severity, ValidationIssue, ValidationResult};

use crate::command::{has_files_with_extension, run};
use crate::pipeline::QualityGate;

pub struct TestRunner;

#[async_trait]
impl QualityGate for TestRunner {
    fn name(&self) -> &str {
        "Tests"
    }

    fn is_skippable(&self, worktree_path: &Path) -> bool {
        let has_python_tests = has_files_with_extension(worktree_path, &["py"]);
        let has_package_json = worktree_path.join("package.json").is_file();
        !(has_python_tests || has_package_json)
    }

    async fn validate(&self, worktree_path: &Path) -> ValidationResult {
        let started = Instant::now();
        let mut issues = Vec::new();

        if has_files_with_extension(worktree_path, &["py"]) {
            if let Some(issue) = run_pytest(worktree_path) {
                issues.push(issue);
            }
        }
        if worktree_path.join("package.json").is_file() {
            if let Some(issue) = run_npm_test(worktree_path) {
                issues.push(issue);
            }
        }

        ValidationResult::from_issues(self.name(), started.elapsed(), issues)
    }
}

fn run_pytest(worktree_path: &Path) -> Option<ValidationIssue> {
    let output = run("pytest", &["-q"], worktree_path)?;
    if output.status.success() {
        return None;
    }

    Some(ValidationIssue {
        file: worktree_path.display().to_string(),
        line: None,
        column: None,
        severity: Severity::Error,
        message: String::from_utf8_lossy(&output.stdout).trim().to_string(),
        rule: Some("pytest".to_string()),
    })
}

fn run_npm_test(worktree_path: &Path) -> Option<ValidationIssue> {
    let output = run("npm", &["test", "--silent"], worktree_path)?;
    if output.status.success() {
        return None;
    }

    Some(ValidationIssue {
        file: worktree_path.display().to_string(),
        line: None,
        column: None,
        severity: Severity::Error,
        message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        rule: Some("npm-test".to_string()),
    })
}
