//! Error types for the worker agent.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to spawn worker: {0}")]
    Spawn(String),

    #[error("failed to acquire lock on {resource}: {reason}")]
    LockAcquisition { resource: String, reason: String },

    #[error("model invocation failed: {0}")]
    LlmInvocation(#[from] orch_llm::Error),

    #[error("failed to apply changes to file {file}: {reason}")]
    FileOperation { file: String, reason: String },

    #[error("git operation failed: {0}")]
    Git(#[from] orch_git::Error),

    #[error("queue operation failed: {0}")]
    Queue(#[from] orch_store::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
