//! Lock record type shared between the Lock Service and its callers.
//!
//! The record itself is data; acquire/release/extend semantics against the
//! backing KV store live in `orch-store`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A lock on a named resource, owned by a random token chosen by the
/// acquirer. At most one live lock may exist per resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lock {
    pub resource: String,
    pub owner_token: String,
    pub acquired_at: DateTime<Utc>,
    pub ttl_seconds: i64,
}

impl Lock {
    #[must_use]
    pub fn new(resource: impl Into<String>, owner_token: impl Into<String>, ttl_seconds: i64) -> Self {
        Self {
            resource: resource.into(),
            owner_token: owner_token.into(),
            acquired_at: Utc::now(),
            ttl_seconds,
        }
    }

    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.acquired_at + chrono::Duration::seconds(self.ttl_seconds)
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at()
    }

    #[must_use]
    pub fn resource_key(&self) -> String {
        format!("lock:{}", self.resource)
    }
}
