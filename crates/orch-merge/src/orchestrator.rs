//! Coordinates merging an agent's finished work back into the target
//! branch: conflict pre-check, quality gates, merge, rollback on failure.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use orch_core::MergeResult;
use orch_git::{MergeOutcome, MergeStrategy, WorkspaceManager};
use orch_validate::ValidationPipeline;
use tracing::{info, warn};

use crate::error::Result;

/// Orchestrates merging agent work with conflict detection and quality
/// gates.
///
/// Workflow:
/// 1. Detect conflicts before attempting merge.
/// 2. Run quality gates on the agent's worktree.
/// 3. If all pass, merge into the target branch.
/// 4. If anything fails, leave the branch untouched (or roll back a
///    started merge) and report why.
pub struct MergeOrchestrator {
    target_branch: String,
    run_quality_gates: bool,
    merge: MergeStrategy,
    git: WorkspaceManager,
    pipeline: ValidationPipeline,
}

impl MergeOrchestrator {
    pub fn new(
        project_path: impl Into<PathBuf>,
        target_branch: impl Into<String>,
        run_quality_gates: bool,
    ) -> Result<Self> {
        let project_path = project_path.into();
        let target_branch = target_branch.into();
        let git = WorkspaceManager::open(&project_path)?;
        let merge = MergeStrategy::new(&project_path);

        info!(target_branch, run_quality_gates, "initialized merge orchestrator");

        Ok(Self {
            target_branch,
            run_quality_gates,
            merge,
            git,
            pipeline: orch_validate::standard_pipeline(),
        })
    }

    /// Merge an agent's completed work, running the full validation
    /// pipeline first.
    pub async fn merge_agent_work(
        &self,
        agent_branch: &str,
        worktree_path: &Path,
        agent_id: &str,
        task_id: &str,
    ) -> MergeResult {
        info!(agent_id, task_id, agent_branch, "starting merge orchestration");

        let (has_conflicts, conflicts) = self.detect_conflicts(agent_branch);
        if has_conflicts {
            warn!(count = conflicts.len(), "conflicts detected before merge attempt");
            return MergeResult::conflict(agent_branch, &self.target_branch, conflicts);
        }
        info!("no conflicts detected");

        let validation_results = if self.run_quality_gates {
            // Never stop early: a security issue must always show up in the
            // results even when an earlier gate (e.g. syntax) also failed.
            let (passed, results) = self.pipeline.run_all(worktree_path, false).await;
            info!("{}", ValidationPipeline::summary(&results));

            if !passed {
                let failed_gates: Vec<&str> = results
                    .iter()
                    .filter(|r| matches!(r.status, orch_core::ValidationStatus::Failed | orch_core::ValidationStatus::Error))
                    .map(|r| r.gate_name.as_str())
                    .collect();
                warn!(gates = failed_gates.join(", "), "quality gates failed");

                return MergeResult {
                    success: false,
                    source_branch: agent_branch.to_string(),
                    target_branch: self.target_branch.clone(),
                    commit_id: None,
                    conflict_detected: false,
                    conflicts: Vec::new(),
                    quality_gates_passed: false,
                    validation_results: results,
                    error_message: Some(format!("quality gates failed: {}", failed_gates.join(", "))),
                    rollback_performed: false,
                };
            }
            info!("all quality gates passed");
            results
        } else {
            info!("skipping quality gates (disabled)");
            Vec::new()
        };

        let commit_message = format!("Merge agent work: {agent_id} completed {task_id}");
        match self.merge.merge_branch(agent_branch, &self.target_branch, &commit_message) {
            Ok(MergeOutcome::FastForward { commit_id } | MergeOutcome::Merged { commit_id }) => {
                info!(commit_id, "merge successful");
                MergeResult {
                    success: true,
                    source_branch: agent_branch.to_string(),
                    target_branch: self.target_branch.clone(),
                    commit_id: Some(commit_id),
                    conflict_detected: false,
                    conflicts: Vec::new(),
                    quality_gates_passed: true,
                    validation_results,
                    error_message: None,
                    rollback_performed: false,
                }
            }
            Ok(MergeOutcome::UpToDate) => MergeResult {
                success: true,
                source_branch: agent_branch.to_string(),
                target_branch: self.target_branch.clone(),
                commit_id: None,
                conflict_detected: false,
                conflicts: Vec::new(),
                quality_gates_passed: true,
                validation_results,
                error_message: None,
                rollback_performed: false,
            },
            Ok(MergeOutcome::Conflicted { files }) => {
                warn!(count = files.len(), "merge produced conflicts");
                let rollback_performed = self.rollback_merge();
                MergeResult {
                    success: false,
                    source_branch: agent_branch.to_string(),
                    target_branch: self.target_branch.clone(),
                    commit_id: None,
                    conflict_detected: true,
                    conflicts: files.clone(),
                    quality_gates_passed: true,
                    validation_results,
                    error_message: Some(format!("merge operation failed: {} conflicts", files.len())),
                    rollback_performed,
                }
            }
            Err(err) => {
                warn!(%err, "merge operation errored");
                let rollback_performed = self.rollback_merge();
                MergeResult {
                    success: false,
                    source_branch: agent_branch.to_string(),
                    target_branch: self.target_branch.clone(),
                    commit_id: None,
                    conflict_detected: false,
                    conflicts: Vec::new(),
                    quality_gates_passed: true,
                    validation_results,
                    error_message: Some(format!("merge operation failed: {err}")),
                    rollback_performed,
                }
            }
        }
    }

    /// Delete an agent branch once its work has been merged.
    pub fn cleanup_agent_branch(&self, agent_branch: &str) -> bool {
        info!(agent_branch, "cleaning up agent branch");
        match self.git.delete_branch(agent_branch, false) {
            Ok(()) => {
                info!(agent_branch, "deleted branch");
                true
            }
            Err(err) => {
                warn!(agent_branch, %err, "failed to delete branch");
                false
            }
        }
    }

    fn rollback_merge(&self) -> bool {
        info!("attempting to roll back merge");
        match self.merge.abort_merge() {
            Ok(()) => {
                info!("merge rollback successful");
                true
            }
            Err(err) => {
                warn!(%err, "failed to roll back merge");
                false
            }
        }
    }

    /// Files changed by `agent_branch` that were also touched on the
    /// target branch since they diverged. A non-empty result means a
    /// real merge attempt would need to reconcile overlapping edits.
    fn detect_conflicts(&self, agent_branch: &str) -> (bool, Vec<String>) {
        let agent_changed = match self.merge.changed_files(agent_branch, &self.target_branch) {
            Ok(files) => files,
            Err(err) => return (true, vec![format!("error checking conflicts: {err}")]),
        };
        let target_changed: HashSet<String> = self
            .merge
            .changed_files(&self.target_branch, agent_branch)
            .unwrap_or_default()
            .into_iter()
            .collect();

        let conflicts: Vec<String> = agent_changed
            .into_iter()
            .filter(|f| target_changed.contains(f))
            .collect();
        (!conflicts.is_empty(), conflicts)
    }
}

/// Human-readable rendering of a [`MergeResult`], mirroring what gets
/// logged at the end of an orchestration run.
#[must_use]
pub fn summarize(result: &MergeResult) -> String {
    let mut lines = vec![format!(
        "Merge Summary: {} -> {}",
        result.source_branch, result.target_branch
    )];
    lines.push(format!("Status: {}", if result.success { "SUCCESS" } else { "FAILED" }));

    if let Some(commit_id) = &result.commit_id {
        lines.push(format!("Commit: {}", &commit_id[..commit_id.len().min(8)]));
    }

    if result.conflict_detected {
        lines.push(format!("Conflicts detected ({} files):", result.conflicts.len()));
        for conflict in result.conflicts.iter().take(10) {
            lines.push(format!("  - {conflict}"));
        }
        if result.conflicts.len() > 10 {
            lines.push(format!("  ... and {} more", result.conflicts.len() - 10));
        }
    }

    if !result.validation_results.is_empty() {
        lines.push(ValidationPipeline::summary(&result.validation_results));
    }

    if let Some(message) = &result.error_message {
        lines.push(format!("Error: {message}"));
    }

    if result.rollback_performed {
        lines.push("Rollback performed".to_string());
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::process::Command;

    fn git(dir: &Path, args: &[&str]) {
        let status = Command::new("git").args(args).current_dir(dir).status().unwrap();
        assert!(status.success(), "git {args:?} failed");
    }

    fn init_repo(dir: &Path) {
        git(dir, &["init", "-b", "main"]);
        git(dir, &["config", "user.email", "test@example.com"]);
        git(dir, &["config", "user.name", "Test"]);
        fs::write(dir.join("README.md"), "hello\n").unwrap();
        git(dir, &["add", "."]);
        git(dir, &["commit", "-m", "initial"]);
    }

    #[tokio::test]
    async fn merges_clean_agent_branch_successfully() {
        let tmp = tempfile::tempdir().unwrap();
        init_repo(tmp.path());

        let worktree_manager = orch_git::WorkspaceManager::open(tmp.path()).unwrap();
        let workspace = worktree_manager.create_workspace("agent-1", "main").unwrap();
        fs::write(workspace.path.join("notes.txt"), "agent output\n").unwrap();
        worktree_manager.commit_workspace(&workspace, "agent work", None).unwrap();

        let orchestrator = MergeOrchestrator::new(tmp.path(), "main", true).unwrap();
        let result = orchestrator
            .merge_agent_work("agent-1", &workspace.path, "agent-1", "task-1")
            .await;

        assert!(result.success, "{result:?}");
        assert!(result.quality_gates_passed);
        assert!(result.commit_id.is_some());
        assert!(tmp.path().join("notes.txt").exists());
    }

    #[tokio::test]
    async fn rejects_merge_when_quality_gates_fail() {
        let tmp = tempfile::tempdir().unwrap();
        init_repo(tmp.path());

        let worktree_manager = orch_git::WorkspaceManager::open(tmp.path()).unwrap();
        let workspace = worktree_manager.create_workspace("agent-2", "main").unwrap();
        fs::write(
            workspace.path.join("config.py"),
            "password = \"sup3rSecret99\"\n",
        )
        .unwrap();
        worktree_manager.commit_workspace(&workspace, "agent work with a secret", None).unwrap();

        let orchestrator = MergeOrchestrator::new(tmp.path(), "main", true).unwrap();
        let result = orchestrator
            .merge_agent_work("agent-2", &workspace.path, "agent-2", "task-2")
            .await;

        assert!(!result.success);
        assert!(!result.quality_gates_passed);
        assert!(result.commit_id.is_none());
    }

    /// A syntax failure must never suppress the security scan: both show up
    /// in the results even though syntax runs first.
    #[tokio::test]
    async fn syntax_failure_does_not_prevent_security_scan_from_running() {
        let tmp = tempfile::tempdir().unwrap();
        init_repo(tmp.path());

        let worktree_manager = orch_git::WorkspaceManager::open(tmp.path()).unwrap();
        let workspace = worktree_manager.create_workspace("agent-6", "main").unwrap();
        fs::write(
            workspace.path.join("config.py"),
            "password = \"sup3rSecret99\"\ndef broken(:\n",
        )
        .unwrap();
        worktree_manager.commit_workspace(&workspace, "agent work with broken syntax and a secret", None).unwrap();

        let orchestrator = MergeOrchestrator::new(tmp.path(), "main", true).unwrap();
        let result = orchestrator
            .merge_agent_work("agent-6", &workspace.path, "agent-6", "task-6")
            .await;

        assert!(!result.success);
        assert!(!result.quality_gates_passed);
        assert!(result.validation_results.iter().any(|r| r.gate_name == "Syntax Validation" && !r.issues.is_empty()));
        assert!(result.validation_results.iter().any(|r| r.gate_name == "Security Scanning" && !r.issues.is_empty()));
    }

    #[tokio::test]
    async fn merges_even_with_bad_code_when_quality_gates_disabled() {
        let tmp = tempfile::tempdir().unwrap();
        init_repo(tmp.path());

        let worktree_manager = orch_git::WorkspaceManager::open(tmp.path()).unwrap();
        let workspace = worktree_manager.create_workspace("agent-3", "main").unwrap();
        fs::write(
            workspace.path.join("config.py"),
            "password = \"sup3rSecret99\"\n",
        )
        .unwrap();
        worktree_manager.commit_workspace(&workspace, "agent work with a secret", None).unwrap();

        let orchestrator = MergeOrchestrator::new(tmp.path(), "main", false).unwrap();
        let result = orchestrator
            .merge_agent_work("agent-3", &workspace.path, "agent-3", "task-3")
            .await;

        assert!(result.success, "{result:?}");
        assert!(result.validation_results.is_empty());
    }

    #[tokio::test]
    async fn detects_conflicting_edits_before_attempting_merge() {
        let tmp = tempfile::tempdir().unwrap();
        init_repo(tmp.path());

        let worktree_manager = orch_git::WorkspaceManager::open(tmp.path()).unwrap();
        let workspace = worktree_manager.create_workspace("agent-4", "main").unwrap();
        fs::write(workspace.path.join("README.md"), "agent changed this\n").unwrap();
        worktree_manager.commit_workspace(&workspace, "agent edits readme", None).unwrap();

        // Target branch also edits the same file after the agent branched.
        fs::write(tmp.path().join("README.md"), "main changed this too\n").unwrap();
        git(tmp.path(), &["add", "."]);
        git(tmp.path(), &["commit", "-m", "main edits readme"]);

        let orchestrator = MergeOrchestrator::new(tmp.path(), "main", true).unwrap();
        let result = orchestrator
            .merge_agent_work("agent-4", &workspace.path, "agent-4", "task-4")
            .await;

        assert!(!result.success);
        assert!(result.conflict_detected);
        assert_eq!(result.conflicts, vec!["README.md".to_string()]);
    }

    #[test]
    fn cleanup_agent_branch_deletes_merged_branch() {
        let tmp = tempfile::tempdir().unwrap();
        init_repo(tmp.path());

        let worktree_manager = orch_git::WorkspaceManager::open(tmp.path()).unwrap();
        worktree_manager.create_workspace("agent-5", "main").unwrap();
        // merge the branch into main so it's fully contained and deletable.
        git(tmp.path(), &["merge", "--ff-only", "agent-5"]);

        let orchestrator = MergeOrchestrator::new(tmp.path(), "main", true).unwrap();
        assert!(orchestrator.cleanup_agent_branch("agent-5"));
    }
}
