//! Syntax validation: parse every source file with its language's own
//! compiler front end, without executing anything.

use std::path::Path;
use std::time::Instant;

use async_trait::async_trait;
use orch_core::{Severity, ValidationIssue, ValidationResult};
use regex::Regex;

use crate::command::{has_files_with_extension, run};
use crate::pipeline::QualityGate;

pub struct SyntaxValidator;

const PYTHON_LINE: &str = r"line (\d+)";

#[async_trait]
impl QualityGate for SyntaxValidator {
    fn name(&self) -> &str {
        "Syntax Validation"
    }

    fn is_skippable(&self, worktree_path: &Path) -> bool {
        !has_files_with_extension(worktree_path, &["py", "js", "jsx", "ts", "tsx"])
    }

    async fn validate(&self, worktree_path: &Path) -> ValidationResult {
        let started = Instant::now();
        let mut issues = Vec::new();

        for entry in walkdir::WalkDir::new(worktree_path)
            .into_iter()
            .filter_map(std::result::Result::ok)
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(ext) = entry.path().extension().and_then(std::ffi::OsStr::to_str) else {
                continue;
            };
            let relative = entry
                .path()
                .strip_prefix(worktree_path)
                .unwrap_or(entry.path())
                .display()
                .to_string();

            if ext == "py" {
                if let Some(issue) = check_python_file(entry.path(), &relative) {
                    issues.push(issue);
                }
            } else if matches!(ext, "js" | "jsx" | "ts" | "tsx") {
                if let Some(issue) = check_node_file(entry.path(), &relative) {
                    issues.push(issue);
                }
            }
        }

        ValidationResult::from_issues(self.name(), started.elapsed(), issues)
    }
}

fn check_python_file(path: &Path, relative: &str) -> Option<ValidationIssue> {
    let output = run("python3", &["-m", "py_compile", path.to_str()?], path.parent()?)?;
    if output.status.success() {
        return None;
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let line = Regex::new(PYTHON_LINE)
        .ok()
        .and_then(|re| re.captures(&stderr))
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok());

    Some(ValidationIssue {
        file: relative.to_string(),
        line,
        column: None,
        severity: Severity::Error,
        message: stderr.trim().to_string(),
        rule: Some("python-syntax".to_string()),
    })
}

fn check_node_file(path: &Path, relative: &str) -> Option<ValidationIssue> {
    let output = run("node", &["--check", path.to_str()?], path.parent()?)?;
    if output.status.success() {
        return None;
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    Some(ValidationIssue {
        file: relative.to_string(),
        line: None,
        column: None,
        severity: Severity::Error,
        message: stderr.trim().to_string(),
        rule: Some("node-syntax".to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skippable_when_no_relevant_files() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("README.md"), "hi").unwrap();
        assert!(SyntaxValidator.is_skippable(tmp.path()));
    }

    #[test]
    fn not_skippable_with_python_file() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("app.py"), "print(1)\n").unwrap();
        assert!(!SyntaxValidator.is_skippable(tmp.path()));
    }
}
