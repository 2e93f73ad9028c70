//! Error types for the Planner.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Graph(#[from] orch_core::Error),

    #[error("llm invocation failed: {0}")]
    Llm(#[from] orch_llm::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
