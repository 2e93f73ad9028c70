//! Task descriptors, state transitions, and execution results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::specialty::Specialty;

/// Immutable task descriptor, as produced by the Planner.
///
/// Never mutated after enqueue; the queue tracks mutable status separately
/// in [`TaskState`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    pub specialty: Specialty,
    pub files_to_create: Vec<String>,
    pub files_to_modify: Vec<String>,
    pub dependencies: Vec<String>,
    pub estimated_hours: f64,
    pub project_id: String,
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Union of `files_to_create` and `files_to_modify`, the file-scope a
    /// worker must lock before executing this task.
    #[must_use]
    pub fn file_scope(&self) -> Vec<String> {
        let mut files: Vec<String> = self
            .files_to_create
            .iter()
            .chain(self.files_to_modify.iter())
            .cloned()
            .collect();
        files.sort();
        files.dedup();
        files
    }
}

/// Mutable status of a task as tracked by the queue.
///
/// Transition graph: `Pending -> InProgress -> {Completed, Failed}`. No task
/// may re-enter `Pending` once it leaves it; `Failed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl TaskState {
    /// Whether `next` is a legal transition from `self`.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::InProgress)
                | (Self::InProgress, Self::Completed)
                | (Self::InProgress, Self::Failed)
        )
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Outcome of one task execution, produced by a Worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub success: bool,
    pub commit_id: Option<String>,
    pub modified_files: Vec<String>,
    pub error: Option<String>,
    pub duration: std::time::Duration,
}

impl TaskResult {
    #[must_use]
    pub fn success(commit_id: String, modified_files: Vec<String>, duration: std::time::Duration) -> Self {
        Self {
            success: true,
            commit_id: Some(commit_id),
            modified_files,
            error: None,
            duration,
        }
    }

    #[must_use]
    pub fn failure(error: impl Into<String>, duration: std::time::Duration) -> Self {
        Self {
            success: false,
            commit_id: None,
            modified_files: Vec::new(),
            error: Some(error.into()),
            duration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_task() -> Task {
        Task {
            id: "t1".into(),
            title: "Add login form".into(),
            description: "desc".into(),
            specialty: Specialty::Frontend,
            files_to_create: vec!["b.ts".into(), "a.ts".into()],
            files_to_modify: vec!["a.ts".into()],
            dependencies: vec![],
            estimated_hours: 2.0,
            project_id: "proj".into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn file_scope_is_sorted_and_deduped() {
        let task = sample_task();
        assert_eq!(task.file_scope(), vec!["a.ts".to_string(), "b.ts".to_string()]);
    }

    #[test]
    fn state_transitions_reject_reentering_pending() {
        assert!(TaskState::Pending.can_transition_to(TaskState::InProgress));
        assert!(TaskState::InProgress.can_transition_to(TaskState::Completed));
        assert!(TaskState::InProgress.can_transition_to(TaskState::Failed));
        assert!(!TaskState::Failed.can_transition_to(TaskState::Pending));
        assert!(!TaskState::Completed.can_transition_to(TaskState::InProgress));
    }

    #[test]
    fn failed_is_terminal() {
        assert!(TaskState::Failed.is_terminal());
        assert!(TaskState::Completed.is_terminal());
        assert!(!TaskState::InProgress.is_terminal());
    }
}
