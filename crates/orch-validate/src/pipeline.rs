//! Quality gate trait and the pipeline that runs a sequence of them.

use std::time::Instant;

use async_trait::async_trait;
use orch_core::{ValidationResult, ValidationStatus};
use tracing::{info, warn};

/// A single quality gate: syntax check, linter, type checker, test runner,
/// or security scan.
#[async_trait]
pub trait QualityGate: Send + Sync {
    fn name(&self) -> &str;

    /// Run the gate against `worktree_path` and return its result. Timing
    /// is the gate's own responsibility; implementations should wrap their
    /// work and report `duration` in the returned `ValidationResult`.
    async fn validate(&self, worktree_path: &std::path::Path) -> ValidationResult;

    /// Whether this gate has nothing to do for this worktree (for example,
    /// a TypeScript checker when no `.ts` files exist). Skipped gates are
    /// recorded in the pipeline's results but never run.
    fn is_skippable(&self, _worktree_path: &std::path::Path) -> bool {
        false
    }
}

/// Runs a fixed sequence of quality gates against a worktree.
#[derive(Default)]
pub struct ValidationPipeline {
    gates: Vec<Box<dyn QualityGate>>,
}

impl ValidationPipeline {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_gate(&mut self, gate: Box<dyn QualityGate>) -> &mut Self {
        self.gates.push(gate);
        self
    }

    /// Run every gate in order. If `stop_on_failure`, stop at the first
    /// gate whose status is `Failed` or `Error`. Returns whether every
    /// ran gate passed (skipped gates do not count against this) and the
    /// per-gate results collected so far.
    pub async fn run_all(
        &self,
        worktree_path: &std::path::Path,
        stop_on_failure: bool,
    ) -> (bool, Vec<ValidationResult>) {
        let mut results = Vec::with_capacity(self.gates.len());
        let mut all_passed = true;

        for gate in &self.gates {
            if gate.is_skippable(worktree_path) {
                results.push(ValidationResult::skipped(gate.name()));
                continue;
            }

            info!(gate = gate.name(), "running quality gate");
            let started = Instant::now();
            let result = gate.validate(worktree_path).await;
            let _ = started.elapsed();

            match result.status {
                ValidationStatus::Failed | ValidationStatus::Error => {
                    all_passed = false;
                    warn!(gate = gate.name(), issues = result.issues.len(), "quality gate did not pass");
                    results.push(result);
                    if stop_on_failure {
                        info!("stopping pipeline after gate failure");
                        break;
                    }
                }
                ValidationStatus::Passed | ValidationStatus::Skipped => {
                    results.push(result);
                }
            }
        }

        (all_passed, results)
    }

    #[must_use]
    pub fn summary(results: &[ValidationResult]) -> String {
        let total = results.len();
        let passed = results.iter().filter(|r| r.status == ValidationStatus::Passed).count();
        let failed = results.iter().filter(|r| r.status == ValidationStatus::Failed).count();
        let errors = results.iter().filter(|r| r.status == ValidationStatus::Error).count();
        let skipped = results.iter().filter(|r| r.status == ValidationStatus::Skipped).count();
        let total_issues: usize = results.iter().map(|r| r.issues.len()).sum();

        let mut summary = format!("Quality Gate Summary:\n  Total gates: {total}\n  Passed: {passed}\n");
        if failed > 0 {
            summary.push_str(&format!("  Failed: {failed}\n"));
        }
        if errors > 0 {
            summary.push_str(&format!("  Errors: {errors}\n"));
        }
        if skipped > 0 {
            summary.push_str(&format!("  Skipped: {skipped}\n"));
        }
        if total_issues > 0 {
            summary.push_str(&format!("  Issues found: {total_issues}\n"));
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orch_core::ValidationIssue;
    use std::time::Duration;

    struct AlwaysPasses;
    #[async_trait]
    impl QualityGate for AlwaysPasses {
        fn name(&self) -> &str {
            "always-passes"
        }
        async fn validate(&self, _worktree_path: &std::path::Path) -> ValidationResult {
            ValidationResult::from_issues("always-passes", Duration::from_millis(1), vec![])
        }
    }

    struct AlwaysFails;
    #[async_trait]
    impl QualityGate for AlwaysFails {
        fn name(&self) -> &str {
            "always-fails"
        }
        async fn validate(&self, _worktree_path: &std::path::Path) -> ValidationResult {
            let issue = ValidationIssue {
                file: "x.py".to_string(),
                line: Some(1),
                column: None,
                severity: orch_core::Severity::Error,
                message: "boom".to_string(),
                rule: None,
            };
            ValidationResult::from_issues("always-fails", Duration::from_millis(1), vec![issue])
        }
    }

    struct NeverApplicable;
    #[async_trait]
    impl QualityGate for NeverApplicable {
        fn name(&self) -> &str {
            "never-applicable"
        }
        async fn validate(&self, _worktree_path: &std::path::Path) -> ValidationResult {
            unreachable!("should be skipped")
        }
        fn is_skippable(&self, _worktree_path: &std::path::Path) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn stop_on_failure_halts_remaining_gates() {
        let mut pipeline = ValidationPipeline::new();
        pipeline.add_gate(Box::new(AlwaysFails)).add_gate(Box::new(AlwaysPasses));

        let (passed, results) = pipeline.run_all(std::path::Path::new("/tmp"), true).await;
        assert!(!passed);
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn continues_past_failure_when_not_stopping() {
        let mut pipeline = ValidationPipeline::new();
        pipeline.add_gate(Box::new(AlwaysFails)).add_gate(Box::new(AlwaysPasses));

        let (passed, results) = pipeline.run_all(std::path::Path::new("/tmp"), false).await;
        assert!(!passed);
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn skipped_gate_does_not_run_and_does_not_fail_pipeline() {
        let mut pipeline = ValidationPipeline::new();
        pipeline.add_gate(Box::new(NeverApplicable)).add_gate(Box::new(AlwaysPasses));

        let (passed, results) = pipeline.run_all(std::path::Path::new("/tmp"), true).await;
        assert!(passed);
        assert_eq!(results[0].status, ValidationStatus::Skipped);
    }
}
