//! Error types for the Workspace Manager.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("git operation failed: {0}")]
    Git(#[from] git2::Error),

    #[error("worktree already exists at {0}")]
    WorktreeExists(PathBuf),

    #[error("no worktree found for branch {0}")]
    UnknownBranch(String),

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
