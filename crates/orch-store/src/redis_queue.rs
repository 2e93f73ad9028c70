//! Redis-backed implementation of [`crate::queue_store::TaskQueue`], per the
//! key-value contract in the external interfaces section: a per-specialty
//! list `queue:<specialty>`, a task hash `task:<id>`, a status string
//! `task:<id>:status`, a dependency set `deps:<id>`, and a global `pending`
//! set.

use std::time::Duration;

use async_trait::async_trait;
use orch_core::{Specialty, Task, TaskResult, TaskState};
use redis::AsyncCommands;

use crate::error::{Error, Result};
use crate::queue_store::TaskQueue;

pub struct RedisTaskQueue {
    manager: redis::aio::ConnectionManager,
}

impl RedisTaskQueue {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url).map_err(|e| Error::TransientInfra(e.to_string()))?;
        let manager = client
            .get_connection_manager()
            .await
            .map_err(|e| Error::TransientInfra(e.to_string()))?;
        Ok(Self { manager })
    }

    fn queue_key(specialty: Specialty) -> String {
        format!("queue:{specialty}")
    }
}

fn status_of(s: &str) -> Option<TaskState> {
    match s {
        "pending" => Some(TaskState::Pending),
        "in_progress" => Some(TaskState::InProgress),
        "completed" => Some(TaskState::Completed),
        "failed" => Some(TaskState::Failed),
        _ => None,
    }
}

#[async_trait]
impl TaskQueue for RedisTaskQueue {
    async fn enqueue(&self, task: Task) -> Result<()> {
        let mut conn = self.manager.clone();
        let task_id = task.id.clone();
        let payload = serde_json::to_string(&task).map_err(|e| Error::TransientInfra(e.to_string()))?;

        conn.set::<_, _, ()>(format!("task:{task_id}"), payload)
            .await
            .map_err(|e| Error::TransientInfra(e.to_string()))?;
        conn.set::<_, _, ()>(format!("task:{task_id}:status"), "pending")
            .await
            .map_err(|e| Error::TransientInfra(e.to_string()))?;

        if task.dependencies.is_empty() {
            conn.lpush::<_, _, ()>(Self::queue_key(task.specialty), &task_id)
                .await
                .map_err(|e| Error::TransientInfra(e.to_string()))?;
            return Ok(());
        }

        let deps_key = format!("deps:{task_id}");
        conn.sadd::<_, _, ()>(&deps_key, &task.dependencies)
            .await
            .map_err(|e| Error::TransientInfra(e.to_string()))?;

        let mut all_satisfied = true;
        for dep in &task.dependencies {
            let status: Option<String> = conn
                .get(format!("task:{dep}:status"))
                .await
                .map_err(|e| Error::TransientInfra(e.to_string()))?;
            if status.as_deref() != Some("completed") {
                all_satisfied = false;
                break;
            }
        }

        if all_satisfied {
            conn.lpush::<_, _, ()>(Self::queue_key(task.specialty), &task_id)
                .await
                .map_err(|e| Error::TransientInfra(e.to_string()))?;
        } else {
            conn.sadd::<_, _, ()>("pending", &task_id)
                .await
                .map_err(|e| Error::TransientInfra(e.to_string()))?;
        }

        Ok(())
    }

    async fn dequeue(&self, specialty: Specialty, timeout: Duration) -> Option<Task> {
        let mut conn = self.manager.clone();
        let seconds = timeout.as_secs().max(1);
        let popped: Option<(String, String)> = redis::cmd("BRPOP")
            .arg(Self::queue_key(specialty))
            .arg(seconds)
            .query_async(&mut conn)
            .await
            .ok()?;

        let (_, task_id) = popped?;
        let payload: Option<String> = conn.get(format!("task:{task_id}")).await.ok()?;
        let task: Task = serde_json::from_str(&payload?).ok()?;

        conn.set::<_, _, ()>(format!("task:{task_id}:status"), "in_progress")
            .await
            .ok()?;

        Some(task)
    }

    async fn mark_completed(&self, task_id: &str, result: TaskResult) -> Result<Vec<Task>> {
        let mut conn = self.manager.clone();
        let status = if result.success { "completed" } else { "failed" };
        conn.set::<_, _, ()>(format!("task:{task_id}:status"), status)
            .await
            .map_err(|e| Error::TransientInfra(e.to_string()))?;

        let result_json = serde_json::to_string(&result).map_err(|e| Error::TransientInfra(e.to_string()))?;
        conn.set::<_, _, ()>(format!("task:{task_id}:result"), result_json)
            .await
            .map_err(|e| Error::TransientInfra(e.to_string()))?;

        if !result.success {
            return Ok(Vec::new());
        }

        let pending_ids: Vec<String> = conn
            .smembers("pending")
            .await
            .map_err(|e| Error::TransientInfra(e.to_string()))?;

        let mut promoted = Vec::new();
        for pending_id in pending_ids {
            let deps_key = format!("deps:{pending_id}");
            let is_dep: bool = conn
                .sismember(&deps_key, task_id)
                .await
                .map_err(|e| Error::TransientInfra(e.to_string()))?;
            if !is_dep {
                continue;
            }

            conn.srem::<_, _, ()>(&deps_key, task_id)
                .await
                .map_err(|e| Error::TransientInfra(e.to_string()))?;
            let remaining: usize = conn
                .scard(&deps_key)
                .await
                .map_err(|e| Error::TransientInfra(e.to_string()))?;

            if remaining == 0 {
                conn.srem::<_, _, ()>("pending", &pending_id)
                    .await
                    .map_err(|e| Error::TransientInfra(e.to_string()))?;

                let payload: Option<String> = conn
                    .get(format!("task:{pending_id}"))
                    .await
                    .map_err(|e| Error::TransientInfra(e.to_string()))?;
                if let Some(payload) = payload {
                    if let Ok(task) = serde_json::from_str::<Task>(&payload) {
                        conn.lpush::<_, _, ()>(Self::queue_key(task.specialty), &pending_id)
                            .await
                            .map_err(|e| Error::TransientInfra(e.to_string()))?;
                        promoted.push(task);
                    }
                }
            }
        }

        Ok(promoted)
    }

    async fn requeue(&self, task_id: &str) -> Result<()> {
        let mut conn = self.manager.clone();
        let payload: Option<String> = conn
            .get(format!("task:{task_id}"))
            .await
            .map_err(|e| Error::TransientInfra(e.to_string()))?;
        let task: Task = serde_json::from_str(&payload.ok_or_else(|| Error::UnknownTask(task_id.to_string()))?)
            .map_err(|e| Error::TransientInfra(e.to_string()))?;

        conn.set::<_, _, ()>(format!("task:{task_id}:status"), "pending")
            .await
            .map_err(|e| Error::TransientInfra(e.to_string()))?;
        conn.del::<_, ()>(format!("task:{task_id}:result"))
            .await
            .map_err(|e| Error::TransientInfra(e.to_string()))?;
        conn.lpush::<_, _, ()>(Self::queue_key(task.specialty), task_id)
            .await
            .map_err(|e| Error::TransientInfra(e.to_string()))?;
        Ok(())
    }

    async fn status(&self, task_id: &str) -> Option<TaskState> {
        let mut conn = self.manager.clone();
        let raw: Option<String> = conn.get(format!("task:{task_id}:status")).await.ok()?;
        raw.and_then(|s| status_of(&s))
    }

    async fn queue_depth(&self, specialty: Specialty) -> usize {
        let mut conn = self.manager.clone();
        conn.llen(Self::queue_key(specialty)).await.unwrap_or(0)
    }

    async fn pending_count(&self) -> usize {
        let mut conn = self.manager.clone();
        conn.scard("pending").await.unwrap_or(0)
    }

    async fn clear_queue(&self, specialty: Specialty) {
        let mut conn = self.manager.clone();
        let _: Result<(), _> = conn.del(Self::queue_key(specialty)).await;
    }
}
