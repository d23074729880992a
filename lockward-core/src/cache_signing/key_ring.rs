use std::time::Duration;

use chrono::{DateTime, Utc};
use lockward_common::{Secret, SigningAlgorithm};
use serde::Serialize;
use uuid::Uuid;

pub struct SigningKey {
    key_id: String,
    secret: Secret<Vec<u8>>,
    created_at: DateTime<Utc>,
}

impl SigningKey {
    pub fn generate(algorithm: SigningAlgorithm, created_at: DateTime<Utc>) -> Self {
        Self {
            key_id: Uuid::new_v4().to_string(),
            secret: Secret::random(algorithm.key_len()),
            created_at,
        }
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub(crate) fn secret(&self) -> &[u8] {
        self.secret.expose_secret()
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.created_at).to_std().unwrap_or_default()
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("key_id", &self.key_id)
            .field("secret", &self.secret)
            .field("created_at", &self.created_at)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyAgeInfo {
    pub key_id: String,
    pub created_at: DateTime<Utc>,
    pub age_seconds: u64,
    pub current: bool,
}

/// Diagnostic snapshot of the key ring; never exposes secret material
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyInfo {
    pub algorithm: &'static str,
    pub current_key_id: Option<String>,
    pub active_keys: usize,
    pub keys: Vec<KeyAgeInfo>,
}

/// Keys ordered oldest first; the last one signs new payloads.
#[derive(Debug)]
pub struct KeyRing {
    algorithm: SigningAlgorithm,
    keys: Vec<SigningKey>,
}

impl KeyRing {
    pub fn new(algorithm: SigningAlgorithm) -> Self {
        Self {
            algorithm,
            keys: vec![],
        }
    }

    pub fn algorithm(&self) -> SigningAlgorithm {
        self.algorithm
    }

    pub fn mint(&mut self, now: DateTime<Utc>) -> &SigningKey {
        self.keys.push(SigningKey::generate(self.algorithm, now));
        &self.keys[self.keys.len() - 1]
    }

    pub fn current(&self) -> Option<&SigningKey> {
        self.keys.last()
    }

    pub fn get(&self, key_id: &str) -> Option<&SigningKey> {
        self.keys.iter().find(|k| k.key_id == key_id)
    }

    /// Drops keys older than `max_age`. The current key always survives.
    pub fn prune(&mut self, now: DateTime<Utc>, max_age: Duration) -> usize {
        let before = self.keys.len();
        let current_id = self.current().map(|k| k.key_id.clone());
        self.keys
            .retain(|k| k.age(now) <= max_age || Some(&k.key_id) == current_id.as_ref());
        before - self.keys.len()
    }

    /// Mints a new current key, then prunes. Returns the new key id and the number of pruned keys.
    pub fn rotate(&mut self, now: DateTime<Utc>, max_age: Duration) -> (String, usize) {
        let key_id = self.mint(now).key_id.clone();
        let pruned = self.prune(now, max_age);
        (key_id, pruned)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn info(&self, now: DateTime<Utc>) -> KeyInfo {
        let current_key_id = self.current().map(|k| k.key_id.clone());
        KeyInfo {
            algorithm: self.algorithm.name(),
            active_keys: self.keys.len(),
            keys: self
                .keys
                .iter()
                .map(|k| KeyAgeInfo {
                    key_id: k.key_id.clone(),
                    created_at: k.created_at,
                    age_seconds: k.age(now).as_secs(),
                    current: Some(&k.key_id) == current_key_id.as_ref(),
                })
                .collect(),
            current_key_id,
        }
    }
}
