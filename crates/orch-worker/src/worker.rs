//! Worker agent: claims tasks of its specialty, invokes the model, applies
//! the resulting changes in its own worktree, commits, and reports back.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use orch_core::{Lock, Task, TaskResult, WorkspaceRecord};
use orch_git::WorkspaceManager;
use orch_llm::LlmClient;
use orch_store::{LockStore, TaskQueue};
use tracing::{error, info, warn};

use crate::config::WorkerConfig;
use crate::error::{Error, Result};
use crate::file_parser::ParserRegistry;
use crate::state::WorkerState;

const POLL_TIMEOUT: Duration = Duration::from_secs(10);
const IDLE_BACKOFF: Duration = Duration::from_secs(1);
const ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// A lightweight, cloneable stop switch for a [`Worker`]'s run loop.
#[derive(Clone)]
pub struct WorkerHandle {
    running: Arc<AtomicBool>,
}

impl WorkerHandle {
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

pub struct Worker {
    config: WorkerConfig,
    llm: Arc<dyn LlmClient>,
    queue: Arc<dyn TaskQueue>,
    locks: Arc<dyn LockStore>,
    git: Arc<WorkspaceManager>,
    parsers: Arc<ParserRegistry>,
    state: WorkerState,
    workspace: Option<WorkspaceRecord>,
    acquired_locks: Vec<Lock>,
    running: Arc<AtomicBool>,
}

impl Worker {
    pub fn new(
        config: WorkerConfig,
        llm: Arc<dyn LlmClient>,
        queue: Arc<dyn TaskQueue>,
        locks: Arc<dyn LockStore>,
        git: Arc<WorkspaceManager>,
        parsers: Arc<ParserRegistry>,
    ) -> Self {
        info!(agent_id = %config.agent_id, specialty = %config.specialty, "initialized worker");
        Self {
            config,
            llm,
            queue,
            locks,
            git,
            parsers,
            state: WorkerState::New,
            workspace: None,
            acquired_locks: Vec::new(),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    #[must_use]
    pub fn handle(&self) -> WorkerHandle {
        WorkerHandle {
            running: self.running.clone(),
        }
    }

    #[must_use]
    pub const fn state(&self) -> WorkerState {
        self.state
    }

    fn transition(&mut self, target: WorkerState) -> Result<()> {
        if !self.state.can_transition_to(target) {
            return Err(Error::Spawn(format!(
                "cannot transition worker {} from {} to {target}",
                self.config.agent_id, self.state
            )));
        }
        self.state = target;
        Ok(())
    }

    /// Create this worker's dedicated worktree, branching off `base_branch`.
    pub fn spawn(&mut self, base_branch: &str) -> Result<()> {
        self.transition(WorkerState::Spawned)?;
        let workspace = self.git.create_workspace(&self.config.branch_name(), base_branch)?;
        info!(agent_id = %self.config.agent_id, path = %workspace.path.display(), "agent spawned");
        self.workspace = Some(workspace);
        Ok(())
    }

    /// Poll the queue for tasks matching this worker's specialty, executing
    /// and reporting each until [`WorkerHandle::stop`] is called.
    pub async fn run_loop(&mut self) -> Result<()> {
        self.transition(WorkerState::Running)?;
        self.running.store(true, Ordering::SeqCst);
        info!(agent_id = %self.config.agent_id, "worker starting run loop");

        while self.running.load(Ordering::SeqCst) {
            let Some(task) = self.queue.dequeue(self.config.specialty, POLL_TIMEOUT).await else {
                tokio::time::sleep(IDLE_BACKOFF).await;
                continue;
            };

            info!(agent_id = %self.config.agent_id, task_id = %task.id, "received task");
            let result = self.execute_task(&task).await;

            let report = self.queue.mark_completed(&task.id, result.clone()).await;
            match report {
                Ok(promoted) => {
                    if result.success {
                        info!(task_id = %task.id, commit = ?result.commit_id, "task completed");
                    } else {
                        error!(task_id = %task.id, error = ?result.error, "task failed");
                    }
                    if !promoted.is_empty() {
                        info!(count = promoted.len(), "dependents promoted to ready");
                    }
                }
                Err(err) => {
                    error!(task_id = %task.id, %err, "failed to report task result to queue");
                    tokio::time::sleep(ERROR_BACKOFF).await;
                }
            }
        }

        self.state = WorkerState::Stopped;
        info!(agent_id = %self.config.agent_id, "worker stopped");
        Ok(())
    }

    async fn execute_task(&mut self, task: &Task) -> TaskResult {
        let started = Instant::now();
        let outcome = self.execute_task_inner(task).await;
        self.release_file_locks().await;

        match outcome {
            Ok((commit_id, modified_files)) => TaskResult::success(commit_id, modified_files, started.elapsed()),
            Err(err) => {
                warn!(task_id = %task.id, %err, "task execution failed");
                TaskResult::failure(err.to_string(), started.elapsed())
            }
        }
    }

    async fn execute_task_inner(&mut self, task: &Task) -> Result<(String, Vec<String>)> {
        self.acquire_file_locks(task).await?;

        let prompt = build_prompt(task);
        let llm_response = self.llm.invoke(&prompt, Some(system_prompt(task)), None, None).await?;

        let workspace = self
            .workspace
            .as_ref()
            .ok_or_else(|| Error::Spawn(format!("worker {} has no workspace", self.config.agent_id)))?;

        let parser = self.parsers.resolve(task.specialty);
        let modified = parser.apply(&llm_response.content, task, &workspace.path)?;

        let commit_message = format!("{}\n\n{}", task.title, task.description);
        let author_name = format!("Agent-{}", self.config.specialty);
        let author_email = format!("agent-{}@orchestrator.local", self.config.agent_id);
        let commit_id = self
            .git
            .commit_workspace(workspace, &commit_message, Some((&author_name, &author_email)))?;

        Ok((commit_id, modified))
    }

    async fn acquire_file_locks(&mut self, task: &Task) -> Result<()> {
        let resources: Vec<String> = task.file_scope().into_iter().map(|f| format!("file:{f}")).collect();
        if resources.is_empty() {
            return Ok(());
        }

        match self.locks.acquire_multiple(&resources, self.config.task_timeout_secs).await {
            Ok(locks) => {
                self.acquired_locks = locks;
                Ok(())
            }
            Err(err) => Err(Error::LockAcquisition {
                resource: resources.join(", "),
                reason: err.to_string(),
            }),
        }
    }

    async fn release_file_locks(&mut self) {
        if self.acquired_locks.is_empty() {
            return;
        }
        let released = self.locks.release_multiple(&self.acquired_locks).await;
        if released < self.acquired_locks.len() {
            warn!(
                agent_id = %self.config.agent_id,
                released,
                held = self.acquired_locks.len(),
                "not all locks released cleanly"
            );
        }
        self.acquired_locks.clear();
    }

    /// Release any held locks and remove this worker's worktree.
    pub fn cleanup(&mut self) -> Result<()> {
        if let Some(workspace) = self.workspace.take() {
            self.git.remove_workspace(&workspace.path)?;
        }
        self.transition(WorkerState::CleanedUp)?;
        info!(agent_id = %self.config.agent_id, "worker cleaned up");
        Ok(())
    }
}

fn system_prompt(task: &Task) -> &'static str {
    match task.specialty {
        orch_core::Specialty::Frontend => "You are a frontend engineer. Respond only with FILE blocks.",
        orch_core::Specialty::Backend => "You are a backend engineer. Respond only with FILE blocks.",
        orch_core::Specialty::Testing => "You are a test engineer. Respond only with FILE blocks.",
        orch_core::Specialty::Docs => "You are a technical writer. Respond only with FILE blocks.",
        orch_core::Specialty::Infra => "You are an infrastructure engineer. Respond only with FILE blocks.",
        orch_core::Specialty::Integration => "You are an integration engineer. Respond only with FILE blocks.",
    }
}

fn build_prompt(task: &Task) -> String {
    format!(
        "Task: {}\n\nDescription:\n{}\n\nFiles to create: {:?}\nFiles to modify: {:?}\n\n\
         Respond with one or more blocks in this exact format for every file you touch:\n\n\
         ### FILE: <path>\n```\n<full file contents>\n```\n",
        task.title, task.description, task.files_to_create, task.files_to_modify
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use orch_core::Specialty;
    use orch_llm::FakeLlmClient;
    use orch_store::{InMemoryLockStore, InMemoryTaskQueue};
    use std::process::Command;

    fn init_repo(dir: &std::path::Path) {
        let run = |args: &[&str]| {
            let status = Command::new("git").args(args).current_dir(dir).status().unwrap();
            assert!(status.success());
        };
        run(&["init", "-b", "main"]);
        run(&["config", "user.email", "test@example.com"]);
        run(&["config", "user.name", "Test"]);
        std::fs::write(dir.join("README.md"), "hi\n").unwrap();
        run(&["add", "."]);
        run(&["commit", "-m", "initial"]);
    }

    fn sample_task() -> Task {
        Task {
            id: "t1".to_string(),
            title: "add hello module".to_string(),
            description: "create a module that prints hello".to_string(),
            specialty: Specialty::Backend,
            files_to_create: vec!["hello.py".to_string()],
            files_to_modify: vec![],
            dependencies: vec![],
            estimated_hours: 1.0,
            project_id: "p1".to_string(),
            created_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn executes_one_task_end_to_end_and_stops_cleanly() {
        let tmp = tempfile::tempdir().unwrap();
        init_repo(tmp.path());

        let git = Arc::new(WorkspaceManager::open(tmp.path()).unwrap());
        let llm: Arc<dyn LlmClient> = Arc::new(FakeLlmClient::with_json(vec![
            "### FILE: hello.py\n```\nprint('hello')\n```\n",
        ]));
        let locks: Arc<dyn LockStore> = Arc::new(InMemoryLockStore::new());
        let queue = InMemoryTaskQueue::new();
        let parsers = Arc::new(ParserRegistry::new());

        let config = WorkerConfig::new("1", Specialty::Backend, tmp.path());
        let mut worker = Worker::new(config, llm, queue.clone(), locks, git, parsers);
        worker.spawn("main").unwrap();

        queue.enqueue(sample_task()).await.unwrap();

        let handle = worker.handle();
        let run_loop = tokio::spawn(async move {
            worker.run_loop().await.unwrap();
            worker
        });

        // give the loop time to dequeue and execute the single task, then stop it
        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.stop();
        let mut worker = run_loop.await.unwrap();

        assert_eq!(queue.status("t1").await, Some(orch_core::TaskState::Completed));
        assert_eq!(worker.state(), WorkerState::Stopped);

        worker.cleanup().unwrap();
        assert_eq!(worker.state(), WorkerState::CleanedUp);
    }
}
