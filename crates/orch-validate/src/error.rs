//! Error types for the validation pipeline.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to spawn validator tool {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to walk worktree at {0}")]
    Walk(String),
}

pub type Result<T> = std::result::Result<T, Error>;
