//! Error types shared by the orchestrator core.

use thiserror::Error;

/// Core error type for graph and task-model operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The dependency graph contains a cycle.
    #[error("cycle detected: {0}")]
    Cycle(String),

    /// A referenced task id does not exist in the graph.
    #[error("unknown task: {0}")]
    UnknownTask(String),

    /// A plan produced by the planner failed validation.
    #[error("plan validation failed: {0}")]
    PlanValidation(String),

    /// An environment-supplied configuration value could not be parsed.
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

/// Result type alias for `orch-core` operations.
pub type Result<T> = std::result::Result<T, Error>;
