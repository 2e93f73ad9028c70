//! Lock Service and Task Queue: the shared coordination state that workers
//! and the merge orchestrator use to avoid stepping on each other and to
//! hand tasks off in dependency order.
//!
//! Two backends are provided for each contract: an in-memory one (default,
//! used in tests) and a Redis-backed one for multi-process deployments.

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod lock_store;
pub mod queue_store;
pub mod redis_queue;

pub use error::{Error, Result};
pub use lock_store::{InMemoryLockStore, LockStore, RedisLockStore};
pub use queue_store::{InMemoryTaskQueue, TaskQueue};
pub use redis_queue::RedisTaskQueue;
