//! Secret and common-vulnerability scanning, run directly against file
//! contents rather than shelling out to an external tool.

use std::path::Path;
use std::time::Instant;

use async_trait::async_trait;
use orch_core::{Severity, ValidationIssue, ValidationResult};
use regex::Regex;

use crate::pipeline::QualityGate;

pub struct SecurityScanner;

const EXCLUDED_SUFFIXES: &[&str] = &[".pyc", ".log", ".md"];
const EXCLUDED_COMPONENTS: &[&str] = &[".git", "node_modules", "__pycache__"];

const PLACEHOLDER_MARKERS: &[&str] = &[
    "example", "your_", "my_", "test_", "dummy", "fake", "placeholder", "insert", "replace",
    "xxx", "yyy", "zzz", "123456", "password",
];

struct SecretPattern {
    regex: &'static str,
    label: &'static str,
}

const SECRET_PATTERNS: &[SecretPattern] = &[
    SecretPattern { regex: r"(?i)(aws_access_key_id)\s*[:=]\s*['\x22]?([A-Z0-9]{20})['\x22]?", label: "AWS Access Key" },
    SecretPattern { regex: r"(?i)(aws_secret_access_key)\s*[:=]\s*['\x22]?([A-Za-z0-9/+=]{40})['\x22]?", label: "AWS Secret Key" },
    SecretPattern { regex: r"(?i)(api[_-]?key|apikey)\s*[:=]\s*['\x22]([a-zA-Z0-9_-]{20,})['\x22]", label: "API Key" },
    SecretPattern { regex: r"(?i)(password|passwd|pwd)\s*[:=]\s*['\x22]([^'\x22]{8,})['\x22]", label: "Hardcoded Password" },
    SecretPattern { regex: r"(?i)(bearer|token)\s+([a-zA-Z0-9_.-]{20,})", label: "Bearer Token" },
    SecretPattern { regex: r"sk_live_[a-zA-Z0-9]{24,}|pk_live_[a-zA-Z0-9]{24,}", label: "Stripe API Key" },
    SecretPattern { regex: r"ghp_[a-zA-Z0-9]{36}|gho_[a-zA-Z0-9]{36}", label: "GitHub Personal Access Token" },
    SecretPattern { regex: r"xox[baprs]-[a-zA-Z0-9-]+", label: "Slack Token" },
    SecretPattern { regex: r"AIza[a-zA-Z0-9_-]{35}", label: "Google API Key" },
];

struct VulnPattern {
    regex: &'static str,
    extensions: &'static [&'static str],
    severity: Severity,
    message: &'static str,
    rule: &'static str,
}

const VULN_PATTERNS: &[VulnPattern] = &[
    VulnPattern { regex: r"\beval\s*\(", extensions: &["py", "js", "jsx", "ts", "tsx"], severity: Severity::Warning, message: "use of eval() detected (code injection risk)", rule: "no-eval" },
    VulnPattern { regex: r"\bexec\s*\(", extensions: &["py"], severity: Severity::Warning, message: "use of exec() detected (code injection risk)", rule: "no-exec" },
    VulnPattern { regex: r"import\s+pickle|from\s+pickle\s+import", extensions: &["py"], severity: Severity::Info, message: "pickle usage detected (potential deserialization risk)", rule: "pickle-usage" },
    VulnPattern { regex: r"dangerouslySetInnerHTML", extensions: &["js", "jsx", "ts", "tsx"], severity: Severity::Warning, message: "dangerouslySetInnerHTML detected (XSS risk)", rule: "no-dangerous-html" },
];

fn is_excluded(relative: &str) -> bool {
    EXCLUDED_SUFFIXES.iter().any(|suffix| relative.ends_with(suffix))
        || EXCLUDED_COMPONENTS
            .iter()
            .any(|component| relative.split(['/', '\\']).any(|part| part == *component))
}

fn is_likely_real_secret(matched_text: &str) -> bool {
    let lower = matched_text.to_lowercase();
    if PLACEHOLDER_MARKERS.iter().any(|marker| lower.contains(marker)) {
        return false;
    }
    !matched_text.chars().all(|c| !c.is_alphabetic() || c.is_uppercase())
}

fn line_of(content: &str, byte_offset: usize) -> u32 {
    content[..byte_offset].matches('\n').count() as u32 + 1
}

#[async_trait]
impl QualityGate for SecurityScanner {
    fn name(&self) -> &str {
        "Security Scanning"
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
            let relative = entry
                .path()
                .strip_prefix(worktree_path)
                .unwrap_or(entry.path())
                .display()
                .to_string();
            if is_excluded(&relative) {
                continue;
            }
            let Ok(content) = std::fs::read_to_string(entry.path()) else {
                continue;
            };

            scan_for_secrets(&content, &relative, &mut issues);

            let ext = entry.path().extension().and_then(std::ffi::OsStr::to_str).unwrap_or("");
            scan_for_vulnerabilities(&content, &relative, ext, &mut issues);
        }

        ValidationResult::from_issues(self.name(), started.elapsed(), issues)
    }
}

fn scan_for_secrets(content: &str, relative: &str, issues: &mut Vec<ValidationIssue>) {
    for pattern in SECRET_PATTERNS {
        let Ok(re) = Regex::new(pattern.regex) else { continue };
        for m in re.find_iter(content) {
            if !is_likely_real_secret(m.as_str()) {
                continue;
            }
            issues.push(ValidationIssue {
                file: relative.to_string(),
                line: Some(line_of(content, m.start())),
                column: None,
                severity: Severity::Error,
                message: format!("potential {} detected", pattern.label),
                rule: Some("secret-detection".to_string()),
            });
        }
    }
}

fn scan_for_vulnerabilities(content: &str, relative: &str, ext: &str, issues: &mut Vec<ValidationIssue>) {
    for pattern in VULN_PATTERNS {
        if !pattern.extensions.contains(&ext) {
            continue;
        }
        let Ok(re) = Regex::new(pattern.regex) else { continue };
        if let Some(m) = re.find(content) {
            issues.push(ValidationIssue {
                file: relative.to_string(),
                line: Some(line_of(content, m.start())),
                column: None,
                severity: pattern.severity,
                message: pattern.message.to_string(),
                rule: Some(pattern.rule.to_string()),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn flags_hardcoded_password_but_not_placeholder() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("config.py"),
            "password = \"sup3rSecret99\"\nYOUR_PASSWORD = \"dummy_value_ok\"\n",
        )
        .unwrap();

        let result = SecurityScanner.validate(tmp.path()).await;
        assert_eq!(result.issues.len(), 1);
        assert!(result.issues[0].message.contains("Password"));
    }

    #[tokio::test]
    async fn flags_eval_usage_as_warning() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("app.js"), "eval(userInput);\n").unwrap();

        let result = SecurityScanner.validate(tmp.path()).await;
        assert!(result.issues.iter().any(|i| i.rule.as_deref() == Some("no-eval")));
    }

    #[tokio::test]
    async fn ignores_excluded_directories() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("node_modules")).unwrap();
        std::fs::write(
            tmp.path().join("node_modules/lib.js"),
            "password = \"sup3rSecret99\"\n",
        )
        .unwrap();

        let result = SecurityScanner.validate(tmp.path()).await;
        assert!(result.issues.is_empty());
    }
}
