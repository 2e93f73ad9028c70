//! Per-specialty FIFO task queues plus a pending-holding set for tasks with
//! unmet dependencies.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use orch_core::{Specialty, Task, TaskResult, TaskState};
use tokio::sync::{Mutex, Notify};
use tracing::info;

use crate::error::{Error, Result};

/// Durable task-queue contract, backed by a shared key-value store so state
/// survives restarts and is visible across worker processes.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Write task metadata, initialize status to pending, and either
    /// enqueue directly (no/all dependencies satisfied) or hold in the
    /// pending set.
    async fn enqueue(&self, task: Task) -> Result<()>;

    /// Blocking pop with a timeout; atomically advances status to
    /// `in_progress`. Returns `None` on timeout, never an error.
    async fn dequeue(&self, specialty: Specialty, timeout: std::time::Duration) -> Option<Task>;

    /// Set terminal status; on success, promote newly-ready dependents.
    async fn mark_completed(&self, task_id: &str, result: TaskResult) -> Result<Vec<Task>>;

    /// Re-enqueue a task that previously failed or stalled, for an external
    /// supervisor to call. Nothing in this crate calls it on its own.
    async fn requeue(&self, task_id: &str) -> Result<()>;

    async fn status(&self, task_id: &str) -> Option<TaskState>;
    async fn queue_depth(&self, specialty: Specialty) -> usize;
    async fn pending_count(&self) -> usize;
    async fn clear_queue(&self, specialty: Specialty);
}

#[derive(Default)]
struct Inner {
    tasks: HashMap<String, Task>,
    status: HashMap<String, TaskState>,
    results: HashMap<String, TaskResult>,
    remaining_deps: HashMap<String, HashSet<String>>,
    pending: HashSet<String>,
    queues: HashMap<Specialty, VecDeque<String>>,
}

/// In-process task queue backed by a mutex-guarded map, mirroring the
/// per-specialty/pending-set shape of the key-value contract. Used for tests
/// and as the default backend when `REDIS_URL` is unset.
pub struct InMemoryTaskQueue {
    inner: Mutex<Inner>,
    notify: Notify,
}

impl Default for InMemoryTaskQueue {
    fn default() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            notify: Notify::new(),
        }
    }
}

impl InMemoryTaskQueue {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Iterate the pending set and promote any task whose dependencies are
    /// now fully satisfied by `completed_task_id`.
    fn promote_locked(inner: &mut Inner, completed_task_id: &str) -> Vec<Task> {
        let mut newly_ready = Vec::new();
        let pending_ids: Vec<String> = inner.pending.iter().cloned().collect();

        for task_id in pending_ids {
            if let Some(deps) = inner.remaining_deps.get_mut(&task_id) {
                if deps.remove(completed_task_id) && deps.is_empty() {
                    inner.pending.remove(&task_id);
                    if let Some(task) = inner.tasks.get(&task_id).cloned() {
                        inner
                            .queues
                            .entry(task.specialty)
                            .or_default()
                            .push_back(task_id.clone());
                        newly_ready.push(task);
                    }
                }
            }
        }

        newly_ready
    }
}

#[async_trait]
impl TaskQueue for InMemoryTaskQueue {
    async fn enqueue(&self, task: Task) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let task_id = task.id.clone();
        let specialty = task.specialty;
        let deps: HashSet<String> = task.dependencies.iter().cloned().collect();

        inner.status.insert(task_id.clone(), TaskState::Pending);

        let unsatisfied: HashSet<String> = deps
            .into_iter()
            .filter(|dep| inner.status.get(dep) != Some(&TaskState::Completed))
            .collect();

        inner.tasks.insert(task_id.clone(), task);

        if unsatisfied.is_empty() {
            inner.queues.entry(specialty).or_default().push_back(task_id.clone());
            info!(task_id, %specialty, "enqueued task");
        } else {
            inner.remaining_deps.insert(task_id.clone(), unsatisfied);
            inner.pending.insert(task_id.clone());
            info!(task_id, "task held pending unmet dependencies");
        }

        drop(inner);
        self.notify.notify_waiters();
        Ok(())
    }

    async fn dequeue(&self, specialty: Specialty, timeout: std::time::Duration) -> Option<Task> {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            {
                let mut inner = self.inner.lock().await;
                if let Some(task_id) = inner.queues.entry(specialty).or_default().pop_front() {
                    inner.status.insert(task_id.clone(), TaskState::InProgress);
                    return inner.tasks.get(&task_id).cloned();
                }
            }

            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return None;
            }

            tokio::select! {
                () = self.notify.notified() => {},
                () = tokio::time::sleep(remaining) => return None,
            }
        }
    }

    async fn mark_completed(&self, task_id: &str, result: TaskResult) -> Result<Vec<Task>> {
        let mut inner = self.inner.lock().await;
        if !inner.tasks.contains_key(task_id) {
            return Err(Error::UnknownTask(task_id.to_string()));
        }

        let state = if result.success { TaskState::Completed } else { TaskState::Failed };
        inner.status.insert(task_id.to_string(), state);
        inner.results.insert(task_id.to_string(), result.clone());

        let newly_ready = if result.success {
            let promoted = Self::promote_locked(&mut inner, task_id);
            drop(inner);
            self.notify.notify_waiters();
            promoted
        } else {
            Vec::new()
        };

        Ok(newly_ready)
    }

    async fn requeue(&self, task_id: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let specialty = inner
            .tasks
            .get(task_id)
            .map(|t| t.specialty)
            .ok_or_else(|| Error::UnknownTask(task_id.to_string()))?;

        inner.status.insert(task_id.to_string(), TaskState::Pending);
        inner.results.remove(task_id);
        inner.queues.entry(specialty).or_default().push_back(task_id.to_string());
        info!(task_id, %specialty, "requeued task");

        drop(inner);
        self.notify.notify_waiters();
        Ok(())
    }

    async fn status(&self, task_id: &str) -> Option<TaskState> {
        self.inner.lock().await.status.get(task_id).copied()
    }

    async fn queue_depth(&self, specialty: Specialty) -> usize {
        self.inner
            .lock()
            .await
            .queues
            .get(&specialty)
            .map_or(0, VecDeque::len)
    }

    async fn pending_count(&self) -> usize {
        self.inner.lock().await.pending.len()
    }

    async fn clear_queue(&self, specialty: Specialty) {
        self.inner.lock().await.queues.remove(&specialty);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn task(id: &str, specialty: Specialty, deps: &[&str]) -> Task {
        Task {
            id: id.to_string(),
            title: id.to_string(),
            description: String::new(),
            specialty,
            files_to_create: vec![],
            files_to_modify: vec![],
            dependencies: deps.iter().map(|d| (*d).to_string()).collect(),
            estimated_hours: 1.0,
            project_id: "p".to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn fifo_within_one_specialty_queue() {
        let queue = InMemoryTaskQueue::new();
        queue.enqueue(task("t1", Specialty::Backend, &[])).await.unwrap();
        queue.enqueue(task("t2", Specialty::Backend, &[])).await.unwrap();

        let first = queue.dequeue(Specialty::Backend, std::time::Duration::from_millis(50)).await;
        let second = queue.dequeue(Specialty::Backend, std::time::Duration::from_millis(50)).await;

        assert_eq!(first.unwrap().id, "t1");
        assert_eq!(second.unwrap().id, "t2");
    }

    #[tokio::test]
    async fn dependency_respect_blocks_dequeue_until_prerequisite_completes() {
        let queue = InMemoryTaskQueue::new();
        queue.enqueue(task("t1", Specialty::Backend, &[])).await.unwrap();
        queue.enqueue(task("t2", Specialty::Frontend, &["t1"])).await.unwrap();

        assert_eq!(queue.pending_count().await, 1);
        assert_eq!(queue.queue_depth(Specialty::Frontend).await, 0);

        let t1 = queue.dequeue(Specialty::Backend, std::time::Duration::from_millis(50)).await.unwrap();
        queue.mark_completed(&t1.id, TaskResult::success("c1".into(), vec![], std::time::Duration::ZERO)).await.unwrap();

        assert_eq!(queue.pending_count().await, 0);
        assert_eq!(queue.status("t1").await, Some(TaskState::Completed));
        let t2 = queue.dequeue(Specialty::Frontend, std::time::Duration::from_millis(50)).await;
        assert_eq!(t2.unwrap().id, "t2");
    }

    #[tokio::test]
    async fn failed_task_blocks_dependents_indefinitely() {
        let queue = InMemoryTaskQueue::new();
        queue.enqueue(task("t1", Specialty::Backend, &[])).await.unwrap();
        queue.enqueue(task("t2", Specialty::Frontend, &["t1"])).await.unwrap();

        let t1 = queue.dequeue(Specialty::Backend, std::time::Duration::from_millis(50)).await.unwrap();
        queue.mark_completed(&t1.id, TaskResult::failure("boom", std::time::Duration::ZERO)).await.unwrap();

        assert_eq!(queue.status("t1").await, Some(TaskState::Failed));
        assert_eq!(queue.pending_count().await, 1);
        let t2 = queue.dequeue(Specialty::Frontend, std::time::Duration::from_millis(30)).await;
        assert!(t2.is_none());
    }

    #[tokio::test]
    async fn requeue_puts_a_failed_task_back_on_its_queue() {
        let queue = InMemoryTaskQueue::new();
        queue.enqueue(task("t1", Specialty::Backend, &[])).await.unwrap();

        let t1 = queue.dequeue(Specialty::Backend, std::time::Duration::from_millis(50)).await.unwrap();
        queue.mark_completed(&t1.id, TaskResult::failure("boom", std::time::Duration::ZERO)).await.unwrap();
        assert_eq!(queue.status("t1").await, Some(TaskState::Failed));

        queue.requeue("t1").await.unwrap();
        assert_eq!(queue.status("t1").await, Some(TaskState::Pending));
        let redone = queue.dequeue(Specialty::Backend, std::time::Duration::from_millis(50)).await;
        assert_eq!(redone.unwrap().id, "t1");
    }

    #[tokio::test]
    async fn requeue_unknown_task_is_an_error() {
        let queue = InMemoryTaskQueue::new();
        assert!(queue.requeue("ghost").await.is_err());
    }

    #[tokio::test]
    async fn dequeue_on_empty_queue_times_out_without_error() {
        let queue = InMemoryTaskQueue::new();
        let result = queue.dequeue(Specialty::Docs, std::time::Duration::from_millis(20)).await;
        assert!(result.is_none());
    }
}
