mod memory;
mod redis;

use std::time::Duration;

use async_trait::async_trait;
use lockward_common::helpers::time::duration_millis;

pub use self::memory::MemoryAttemptStore;
pub use self::redis::RedisAttemptStore;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Redis(#[from] ::redis::RedisError),
    #[error("store operation timed out")]
    Timeout,
    #[error("key {0} holds a value of the wrong type")]
    WrongType(String),
    #[error("key {key} holds an invalid value: {value}")]
    InvalidValue { key: String, value: String },
}

/// Minimal key-value surface the lockout state machine needs: scored sets, expiring plain keys.
#[async_trait]
pub trait AttemptStore: Send + Sync {
    async fn add_scored(&self, key: &str, member: &str, score: i64) -> Result<(), StoreError>;

    /// Removes members with `min <= score <= max`, returns how many were removed
    async fn remove_scored_range(&self, key: &str, min: i64, max: i64)
        -> Result<u64, StoreError>;

    async fn cardinality(&self, key: &str) -> Result<u64, StoreError>;

    async fn set_expiring(&self, key: &str, value: &str, ttl: Duration)
        -> Result<(), StoreError>;

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError>;

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Drops scores at or before `now - window`, records `member` at `now`,
    /// refreshes the key TTL to `window` and returns the resulting count.
    async fn push_window(
        &self,
        key: &str,
        member: &str,
        now_ms: i64,
        window: Duration,
    ) -> Result<u64, StoreError> {
        self.remove_scored_range(key, i64::MIN, now_ms.saturating_sub(duration_millis(window)))
            .await?;
        self.add_scored(key, member, now_ms).await?;
        self.expire(key, window).await?;
        self.cardinality(key).await
    }
}
