//! Error types for the Merge Orchestrator.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("git operation failed: {0}")]
    Git(#[from] orch_git::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
