//! Error types for the Lock Service and Task Queue.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Lock acquisition exceeded its deadline.
    #[error("timed out acquiring lock on {resource}")]
    LockTimeout { resource: String },

    /// A release/extend call did not own the record it targeted.
    #[error("lock ownership violation on {resource}: caller does not hold the current lock")]
    LockOwnershipViolation { resource: String },

    /// The backing KV store is unreachable or returned an infra error.
    #[error("store unavailable: {0}")]
    TransientInfra(String),

    /// Referenced a task id the queue has no record of.
    #[error("unknown task: {0}")]
    UnknownTask(String),
}

pub type Result<T> = std::result::Result<T, Error>;
