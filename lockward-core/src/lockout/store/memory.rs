use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lockward_common::helpers::time::{duration_millis, SystemTimeSource, TimeSource};
use tokio::sync::RwLock;

use super::{AttemptStore, StoreError};
use crate::lockout::CleanupStats;

#[derive(Debug, Clone)]
enum Value {
    Plain(String),
    /// member -> score
    Scored(HashMap<String, i64>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<i64>,
}

impl Entry {
    fn is_expired(&self, now_ms: i64) -> bool {
        self.expires_at.is_some_and(|at| at <= now_ms)
    }
}

/// In-process store with the same expiry semantics as the shared store
pub struct MemoryAttemptStore {
    entries: RwLock<HashMap<String, Entry>>,
    time: Arc<dyn TimeSource>,
}

impl MemoryAttemptStore {
    pub fn new() -> Self {
        Self::with_time_source(Arc::new(SystemTimeSource))
    }

    pub fn with_time_source(time: Arc<dyn TimeSource>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            time,
        }
    }

    /// Removes expired keys and empty attempt sets
    pub async fn vacuum(&self) -> CleanupStats {
        let now = self.time.now_millis();
        let mut entries = self.entries.write().await;
        let mut stats = CleanupStats::default();
        entries.retain(|_, entry| {
            if entry.is_expired(now) {
                stats.expired_entries_removed += 1;
                return false;
            }
            if let Value::Scored(members) = &entry.value {
                if members.is_empty() {
                    stats.empty_windows_removed += 1;
                    return false;
                }
            }
            true
        });
        stats
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for MemoryAttemptStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AttemptStore for MemoryAttemptStore {
    async fn add_scored(&self, key: &str, member: &str, score: i64) -> Result<(), StoreError> {
        let now = self.time.now_millis();
        let mut entries = self.entries.write().await;
        let entry = entries
            .entry(key.to_owned())
            .and_modify(|e| {
                if e.is_expired(now) {
                    *e = Entry {
                        value: Value::Scored(HashMap::new()),
                        expires_at: None,
                    };
                }
            })
            .or_insert_with(|| Entry {
                value: Value::Scored(HashMap::new()),
                expires_at: None,
            });
        match &mut entry.value {
            Value::Scored(members) => {
                members.insert(member.to_owned(), score);
                Ok(())
            }
            Value::Plain(_) => Err(StoreError::WrongType(key.to_owned())),
        }
    }

    async fn remove_scored_range(
        &self,
        key: &str,
        min: i64,
        max: i64,
    ) -> Result<u64, StoreError> {
        let now = self.time.now_millis();
        let mut entries = self.entries.write().await;
        let Some(entry) = entries.get_mut(key).filter(|e| !e.is_expired(now)) else {
            return Ok(0);
        };
        match &mut entry.value {
            Value::Scored(members) => {
                let before = members.len();
                members.retain(|_, score| *score < min || *score > max);
                Ok((before - members.len()) as u64)
            }
            Value::Plain(_) => Err(StoreError::WrongType(key.to_owned())),
        }
    }

    async fn cardinality(&self, key: &str) -> Result<u64, StoreError> {
        let now = self.time.now_millis();
        let entries = self.entries.read().await;
        match entries.get(key).filter(|e| !e.is_expired(now)) {
            None => Ok(0),
            Some(Entry {
                value: Value::Scored(members),
                ..
            }) => Ok(members.len() as u64),
            Some(_) => Err(StoreError::WrongType(key.to_owned())),
        }
    }

    async fn set_expiring(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let expires_at = self.time.now_millis().saturating_add(duration_millis(ttl));
        self.entries.write().await.insert(
            key.to_owned(),
            Entry {
                value: Value::Plain(value.to_owned()),
                expires_at: Some(expires_at),
            },
        );
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        let now = self.time.now_millis();
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get_mut(key).filter(|e| !e.is_expired(now)) {
            entry.expires_at = Some(now.saturating_add(duration_millis(ttl)));
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = self.time.now_millis();
        let entries = self.entries.read().await;
        match entries.get(key).filter(|e| !e.is_expired(now)) {
            None => Ok(None),
            Some(Entry {
                value: Value::Plain(value),
                ..
            }) => Ok(Some(value.clone())),
            Some(_) => Err(StoreError::WrongType(key.to_owned())),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}
