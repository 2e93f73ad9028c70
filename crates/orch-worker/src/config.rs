//! Worker agent configuration.

use std::path::PathBuf;

use orch_core::Specialty;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub agent_id: String,
    pub specialty: Specialty,
    pub project_path: PathBuf,
    pub max_retries: u32,
    pub task_timeout_secs: i64,
    pub heartbeat_interval_secs: u64,
}

impl WorkerConfig {
    #[must_use]
    pub fn new(agent_id: impl Into<String>, specialty: Specialty, project_path: impl Into<PathBuf>) -> Self {
        Self {
            agent_id: agent_id.into(),
            specialty,
            project_path: project_path.into(),
            max_retries: 3,
            task_timeout_secs: 300,
            heartbeat_interval_secs: 30,
        }
    }

    #[must_use]
    pub fn branch_name(&self) -> String {
        format!("agent-{}", self.agent_id)
    }
}
