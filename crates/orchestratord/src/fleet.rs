//! Wires the planner, task queue, lock service, workers, and merge
//! orchestrator into one running fleet.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use orch_core::Specialty;
use orch_git::WorkspaceManager;
use orch_llm::{HttpLlmClient, LlmClient, LlmConfig};
use orch_merge::MergeOrchestrator;
use orch_plan::Planner;
use orch_store::{InMemoryLockStore, InMemoryTaskQueue, LockStore, RedisLockStore, RedisTaskQueue, TaskQueue};
use orch_worker::{ParserRegistry, Worker, WorkerConfig};
use tracing::info;

use crate::config::Settings;

const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Builds the model-invocation client from `settings`. Bedrock-style
/// endpoint, matching `orch-llm`'s request shape.
#[must_use]
pub fn build_llm_client(settings: &Settings) -> Arc<dyn LlmClient> {
    let endpoint = format!("https://bedrock-runtime.{}.amazonaws.com", settings.llm_region);
    let config = LlmConfig {
        profile: settings.llm_profile.clone(),
        region: settings.llm_region.clone(),
        model_id: settings.llm_model_id.clone(),
        ..LlmConfig::default()
    };
    Arc::new(HttpLlmClient::new(endpoint, config))
}

/// Backs the task queue with Redis when `REDIS_URL` is set, otherwise
/// falls back to the in-memory queue used by tests.
pub async fn build_queue(settings: &Settings) -> Result<Arc<dyn TaskQueue>> {
    match &settings.redis_url {
        Some(url) => {
            info!(redis_url = %url, "connecting task queue to redis");
            let queue = RedisTaskQueue::connect(url).await.context("connecting task queue to redis")?;
            Ok(Arc::new(queue))
        }
        None => {
            info!("REDIS_URL unset, using in-memory task queue");
            Ok(InMemoryTaskQueue::new())
        }
    }
}

/// Same dual-backend treatment as [`build_queue`], for the lock service.
pub async fn build_locks(settings: &Settings) -> Result<Arc<dyn LockStore>> {
    match &settings.redis_url {
        Some(url) => {
            let locks = RedisLockStore::connect(url).await.context("connecting lock store to redis")?;
            Ok(Arc::new(locks))
        }
        None => Ok(Arc::new(InMemoryLockStore::new())),
    }
}

/// Decompose `requirements` into a validated plan and print its execution
/// schedule. Does not touch the queue or spawn any agents.
pub async fn plan_only(llm: Arc<dyn LlmClient>, requirements: &str, context: Option<&str>) -> Result<()> {
    let planner = Planner::new(llm);
    let plan = planner.decompose(requirements, context).await.context("decomposing requirements")?;
    let graph = planner.validate(&plan).context("validating plan")?;
    let execution = planner.build_execution_plan(&graph).context("building execution plan")?;

    println!("{}", serde_json::to_string_pretty(&execution)?);
    info!(
        tasks = plan.tasks.len(),
        levels = execution.levels.len(),
        sequential_hours = execution.sequential_hours,
        parallel_hours = execution.parallel_hours,
        speedup = execution.speedup_factor,
        "plan ready"
    );
    Ok(())
}

/// One running agent: its worker, worktree path, and branch name, kept
/// around so the fleet can merge and clean it up once its queue drains.
struct RunningAgent {
    agent_id: String,
    specialty: Specialty,
    branch: String,
    worktree: PathBuf,
    join: tokio::task::JoinHandle<Worker>,
    handle: orch_worker::WorkerHandle,
}

/// Plan, enqueue, spawn one worker per specialty present in the plan, wait
/// for the queues to drain, then merge each agent's branch back.
#[allow(clippy::too_many_arguments)]
pub async fn run_fleet(
    project: &Path,
    requirements: &str,
    target_branch: &str,
    run_quality_gates: bool,
    llm: Arc<dyn LlmClient>,
    queue: Arc<dyn TaskQueue>,
    locks: Arc<dyn LockStore>,
) -> Result<()> {
    let planner = Planner::new(llm.clone());
    let plan = planner.decompose(requirements, None).await.context("decomposing requirements")?;
    let graph = planner.validate(&plan).context("validating plan")?;
    let execution = planner.build_execution_plan(&graph)?;
    info!(
        project_name = plan.project_name,
        tasks = plan.tasks.len(),
        levels = execution.levels.len(),
        "plan decomposed"
    );

    let tasks = Planner::into_tasks(&plan, &plan.project_name);
    let specialties: HashSet<Specialty> = tasks.iter().map(|t| t.specialty).collect();
    for task in tasks {
        queue.enqueue(task).await.context("enqueueing task")?;
    }

    let git = Arc::new(WorkspaceManager::open(project).context("opening project repository")?);
    let parsers = Arc::new(ParserRegistry::new());

    let mut agents = Vec::new();
    for specialty in specialties {
        let agent_id = format!("{specialty}-1");
        let config = WorkerConfig::new(agent_id.as_str(), specialty, project);
        let branch = config.branch_name();

        let mut worker = Worker::new(config, llm.clone(), queue.clone(), locks.clone(), git.clone(), parsers.clone());
        worker.spawn(target_branch).context("spawning agent worktree")?;
        let worktree = git.worktree_path(&branch);
        let handle = worker.handle();

        let join = tokio::spawn(async move {
            if let Err(err) = worker.run_loop().await {
                tracing::error!(%err, "worker run loop exited with error");
            }
            worker
        });

        agents.push(RunningAgent { agent_id, specialty, branch, worktree, join, handle });
    }

    let in_flight_specialties: Vec<Specialty> = agents.iter().map(|a| a.specialty).collect();
    wait_for_drain(queue.as_ref(), &in_flight_specialties).await;

    for agent in &agents {
        agent.handle.stop();
    }

    let orchestrator = MergeOrchestrator::new(project, target_branch, run_quality_gates)
        .context("initializing merge orchestrator")?;

    for agent in agents {
        let mut worker = agent.join.await.context("joining worker task")?;

        let result = orchestrator
            .merge_agent_work(&agent.branch, &agent.worktree, &agent.agent_id, "all queued tasks")
            .await;
        info!("{}", orch_merge::summarize(&result));

        worker.cleanup().context("cleaning up agent worktree")?;
        if result.success {
            orchestrator.cleanup_agent_branch(&agent.branch);
        }
    }

    Ok(())
}

async fn wait_for_drain(queue: &dyn TaskQueue, specialties: &[Specialty]) {
    loop {
        let pending = queue.pending_count().await;
        let mut in_flight = pending;
        for specialty in specialties {
            in_flight += queue.queue_depth(*specialty).await;
        }
        if in_flight == 0 {
            return;
        }
        tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
    }
}

