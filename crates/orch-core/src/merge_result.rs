//! Result type produced by the Merge Orchestrator.

use serde::{Deserialize, Serialize};

use crate::validation::ValidationResult;

/// Outcome of one merge-orchestration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeResult {
    pub success: bool,
    pub source_branch: String,
    pub target_branch: String,
    pub commit_id: Option<String>,
    pub conflict_detected: bool,
    pub conflicts: Vec<String>,
    pub quality_gates_passed: bool,
    pub validation_results: Vec<ValidationResult>,
    pub error_message: Option<String>,
    pub rollback_performed: bool,
}

impl MergeResult {
    #[must_use]
    pub fn conflict(source_branch: impl Into<String>, target_branch: impl Into<String>, conflicts: Vec<String>) -> Self {
        let n = conflicts.len();
        Self {
            success: false,
            source_branch: source_branch.into(),
            target_branch: target_branch.into(),
            commit_id: None,
            conflict_detected: true,
            conflicts,
            quality_gates_passed: false,
            validation_results: Vec::new(),
            error_message: Some(format!("merge conflicts detected in {n} files")),
            rollback_performed: false,
        }
    }
}
