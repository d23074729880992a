use std::time::Duration;

use ::redis::aio::{ConnectionManager, ConnectionManagerConfig};
use ::redis::{AsyncCommands, Client};
use async_trait::async_trait;
use lockward_common::helpers::time::duration_millis;
use lockward_common::LockoutStoreConfig;
use tracing::info;

use super::{AttemptStore, StoreError};

/// Shared store so that every instance sees the same attempts and locks
#[derive(Clone)]
pub struct RedisAttemptStore {
    connection: ConnectionManager,
}

fn ttl_millis(ttl: Duration) -> i64 {
    duration_millis(ttl).max(1)
}

impl RedisAttemptStore {
    pub async fn connect(config: &LockoutStoreConfig) -> Result<Self, StoreError> {
        let client = Client::open(config.url.expose_secret().as_str())?;
        let manager_config = ConnectionManagerConfig::new()
            .set_number_of_retries(config.retries)
            .set_connection_timeout(config.connection_timeout)
            .set_response_timeout(config.connection_timeout);

        let attempts = u32::try_from(config.retries).unwrap_or(u32::MAX).saturating_add(1);
        let connection = tokio::time::timeout(
            config.connection_timeout.saturating_mul(attempts),
            client.get_connection_manager_with_config(manager_config),
        )
        .await
        .map_err(|_| StoreError::Timeout)??;

        let store = Self { connection };
        store.ping().await?;
        info!("Connected to lockout store");
        Ok(store)
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        let _: String = ::redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

#[async_trait]
impl AttemptStore for RedisAttemptStore {
    async fn add_scored(&self, key: &str, member: &str, score: i64) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        let _: () = conn.zadd(key, member, score).await?;
        Ok(())
    }

    async fn remove_scored_range(
        &self,
        key: &str,
        min: i64,
        max: i64,
    ) -> Result<u64, StoreError> {
        let mut conn = self.connection.clone();
        Ok(conn.zrembyscore(key, min, max).await?)
    }

    async fn cardinality(&self, key: &str) -> Result<u64, StoreError> {
        let mut conn = self.connection.clone();
        Ok(conn.zcard(key).await?)
    }

    async fn set_expiring(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        let _: () = conn
            .pset_ex(key, value, ttl_millis(ttl).unsigned_abs())
            .await?;
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        let _: () = conn.pexpire(key, ttl_millis(ttl)).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.connection.clone();
        Ok(conn.get(key).await?)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        let _: () = conn.del(key).await?;
        Ok(())
    }

    async fn push_window(
        &self,
        key: &str,
        member: &str,
        now_ms: i64,
        window: Duration,
    ) -> Result<u64, StoreError> {
        let mut conn = self.connection.clone();
        let cutoff = now_ms.saturating_sub(duration_millis(window));
        let (count,): (u64,) = ::redis::pipe()
            .atomic()
            .zrembyscore(key, "-inf", cutoff)
            .ignore()
            .zadd(key, member, now_ms)
            .ignore()
            .pexpire(key, ttl_millis(window))
            .ignore()
            .zcard(key)
            .query_async(&mut conn)
            .await?;
        Ok(count)
    }
}
