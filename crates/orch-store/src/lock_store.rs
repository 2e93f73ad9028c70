//! Distributed named-resource locks with owner identity, TTL auto-expiry,
//! atomic release-by-owner, and bulk all-or-nothing acquisition.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use orch_core::Lock;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Mutual-exclusion service over arbitrary string resources, implemented
/// against a shared key-value store so it holds across process boundaries.
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Attempt a set-if-absent-with-expiry; retry with exponential backoff
    /// (doubling, capped at 5s) until `now + ttl_seconds` elapses.
    async fn acquire(&self, resource: &str, ttl_seconds: i64) -> Result<Lock>;

    /// Atomically compare the stored owner against `lock.owner_token` and
    /// delete only on match.
    async fn release(&self, lock: &Lock) -> Result<bool>;

    /// Same compare-and-swap semantics as `release`, extending TTL instead
    /// of deleting.
    async fn extend(&self, lock: &Lock, additional_ttl_seconds: i64) -> Result<bool>;

    /// Point-in-time observation; not a reservation.
    async fn is_locked(&self, resource: &str) -> Result<bool>;

    /// Acquire every resource in `resources`, in the order given. On any
    /// failure, release everything acquired so far and fail.
    async fn acquire_multiple(&self, resources: &[String], ttl_seconds: i64) -> Result<Vec<Lock>> {
        let mut acquired = Vec::with_capacity(resources.len());
        for resource in resources {
            match self.acquire(resource, ttl_seconds).await {
                Ok(lock) => acquired.push(lock),
                Err(err) => {
                    warn!(
                        resource,
                        acquired = acquired.len(),
                        "bulk lock acquisition failed, releasing partial set"
                    );
                    self.release_multiple(&acquired).await;
                    return Err(err);
                }
            }
        }
        Ok(acquired)
    }

    /// Release every lock in `locks`, returning the count actually released.
    async fn release_multiple(&self, locks: &[Lock]) -> usize {
        let mut released = 0;
        for lock in locks {
            match self.release(lock).await {
                Ok(true) => released += 1,
                Ok(false) => warn!(resource = %lock.resource, "release returned false during bulk release"),
                Err(err) => warn!(resource = %lock.resource, error = %err, "release failed during bulk release"),
            }
        }
        released
    }
}

const INITIAL_RETRY_DELAY: Duration = Duration::from_millis(100);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(5);

/// In-process lock store backed by a mutex-guarded map. Used for tests and
/// as the default backend when `REDIS_URL` is unset.
#[derive(Default, Clone)]
pub struct InMemoryLockStore {
    locks: Arc<Mutex<HashMap<String, Lock>>>,
}

impl InMemoryLockStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    async fn try_acquire_once(&self, resource: &str, ttl_seconds: i64) -> Option<Lock> {
        let mut locks = self.locks.lock().await;
        if let Some(existing) = locks.get(resource) {
            if !existing.is_expired() {
                return None;
            }
        }
        let lock = Lock::new(resource, Uuid::new_v4().to_string(), ttl_seconds);
        locks.insert(resource.to_string(), lock.clone());
        Some(lock)
    }
}

#[async_trait]
impl LockStore for InMemoryLockStore {
    async fn acquire(&self, resource: &str, ttl_seconds: i64) -> Result<Lock> {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(ttl_seconds.max(0) as u64);
        let mut delay = INITIAL_RETRY_DELAY;

        loop {
            if let Some(lock) = self.try_acquire_once(resource, ttl_seconds).await {
                debug!(resource, owner = %lock.owner_token, "acquired lock");
                return Ok(lock);
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(Error::LockTimeout {
                    resource: resource.to_string(),
                });
            }

            tokio::time::sleep(delay.min(MAX_RETRY_DELAY)).await;
            delay = (delay * 2).min(MAX_RETRY_DELAY);
        }
    }

    async fn release(&self, lock: &Lock) -> Result<bool> {
        let mut locks = self.locks.lock().await;
        match locks.get(&lock.resource) {
            Some(current) if current.owner_token == lock.owner_token => {
                locks.remove(&lock.resource);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn extend(&self, lock: &Lock, additional_ttl_seconds: i64) -> Result<bool> {
        let mut locks = self.locks.lock().await;
        match locks.get_mut(&lock.resource) {
            Some(current) if current.owner_token == lock.owner_token => {
                current.ttl_seconds += additional_ttl_seconds;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn is_locked(&self, resource: &str) -> Result<bool> {
        let locks = self.locks.lock().await;
        Ok(locks.get(resource).is_some_and(|l| !l.is_expired()))
    }
}

/// Redis-backed lock store. Release and extend run as server-side `EVAL`
/// scripts so the compare-and-delete/compare-and-expire is atomic — a
/// read-then-delete would race with a concurrent acquirer.
pub struct RedisLockStore {
    manager: redis::aio::ConnectionManager,
}

impl RedisLockStore {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| Error::TransientInfra(e.to_string()))?;
        let manager = client
            .get_connection_manager()
            .await
            .map_err(|e| Error::TransientInfra(e.to_string()))?;
        Ok(Self { manager })
    }
}

const RELEASE_SCRIPT: &str = r"
if redis.call('get', KEYS[1]) == ARGV[1] then
    return redis.call('del', KEYS[1])
else
    return 0
end
";

const EXTEND_SCRIPT: &str = r"
if redis.call('get', KEYS[1]) == ARGV[1] then
    return redis.call('expire', KEYS[1], ARGV[2])
else
    return 0
end
";

#[async_trait]
impl LockStore for RedisLockStore {
    async fn acquire(&self, resource: &str, ttl_seconds: i64) -> Result<Lock> {
        let key = format!("lock:{resource}");
        let owner_token = Uuid::new_v4().to_string();
        let deadline = tokio::time::Instant::now() + Duration::from_secs(ttl_seconds.max(0) as u64);
        let mut delay = INITIAL_RETRY_DELAY;
        let mut conn = self.manager.clone();

        loop {
            let set: Option<String> = redis::cmd("SET")
                .arg(&key)
                .arg(&owner_token)
                .arg("NX")
                .arg("EX")
                .arg(ttl_seconds.max(1))
                .query_async(&mut conn)
                .await
                .map_err(|e| Error::TransientInfra(e.to_string()))?;

            if set.is_some() {
                return Ok(Lock::new(resource, owner_token, ttl_seconds));
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(Error::LockTimeout {
                    resource: resource.to_string(),
                });
            }

            tokio::time::sleep(delay.min(MAX_RETRY_DELAY)).await;
            delay = (delay * 2).min(MAX_RETRY_DELAY);
        }
    }

    async fn release(&self, lock: &Lock) -> Result<bool> {
        let mut conn = self.manager.clone();
        let result: i64 = redis::Script::new(RELEASE_SCRIPT)
            .key(lock.resource_key())
            .arg(&lock.owner_token)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| Error::TransientInfra(e.to_string()))?;
        Ok(result == 1)
    }

    async fn extend(&self, lock: &Lock, additional_ttl_seconds: i64) -> Result<bool> {
        let mut conn = self.manager.clone();
        let result: i64 = redis::Script::new(EXTEND_SCRIPT)
            .key(lock.resource_key())
            .arg(&lock.owner_token)
            .arg(additional_ttl_seconds.max(1))
            .invoke_async(&mut conn)
            .await
            .map_err(|e| Error::TransientInfra(e.to_string()))?;
        Ok(result == 1)
    }

    async fn is_locked(&self, resource: &str) -> Result<bool> {
        let mut conn = self.manager.clone();
        let exists: bool = redis::cmd("EXISTS")
            .arg(format!("lock:{resource}"))
            .query_async(&mut conn)
            .await
            .map_err(|e| Error::TransientInfra(e.to_string()))?;
        Ok(exists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scenario_c_mutual_exclusion_between_two_acquirers() {
        let store = InMemoryLockStore::new();
        let first = store.acquire("file:src/app.py", 60).await.unwrap();

        let second = tokio::time::timeout(Duration::from_millis(300), store.acquire("file:src/app.py", 60)).await;
        assert!(second.is_err(), "second acquirer must not succeed while first holds the lock");

        assert!(store.release(&first).await.unwrap());
        let third = store.acquire("file:src/app.py", 60).await.unwrap();
        assert_eq!(third.resource, "file:src/app.py");
    }

    #[tokio::test]
    async fn release_returns_false_when_not_owner() {
        let store = InMemoryLockStore::new();
        let lock = store.acquire("r1", 60).await.unwrap();
        store.release(&lock).await.unwrap();

        // lock already released: releasing again (stale token) must report false, not panic
        assert!(!store.release(&lock).await.unwrap());
    }

    #[tokio::test]
    async fn bulk_acquire_is_all_or_nothing() {
        let store = InMemoryLockStore::new();
        let blocker = store.acquire("b", 60).await.unwrap();

        // short ttl so the internal deadline for "b" fires on its own,
        // letting acquire_multiple's failure branch run its own cleanup
        let result = store
            .acquire_multiple(&["a".to_string(), "b".to_string()], 1)
            .await;
        assert!(result.is_err());

        assert!(!store.is_locked("a").await.unwrap());
        drop(blocker);
    }
}
