use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use data_encoding::{BASE64, HEXLOWER};
use hmac::{Hmac, Mac};
use lockward_common::helpers::time::{duration_millis, SystemTimeSource, TimeSource};
use lockward_common::{CacheSigningConfig, SignatureEncoding, SigningAlgorithm};
use serde::Serialize;
use serde_json::Value;
use sha2::{Sha256, Sha512};
use subtle::ConstantTimeEq;
use tracing::{debug, info};

use super::payload::{CacheEntry, CanonicalPayload};
use super::{
    KeyInfo, KeyRing, RotationHandle, SignedPayload, SigningError, VerificationError,
    VerifiedPayload,
};

type HmacSha256 = Hmac<Sha256>;
type HmacSha512 = Hmac<Sha512>;

fn compute_mac(
    algorithm: SigningAlgorithm,
    secret: &[u8],
    message: &[u8],
) -> Result<Vec<u8>, SigningError> {
    Ok(match algorithm {
        SigningAlgorithm::Sha256 => {
            let mut mac =
                HmacSha256::new_from_slice(secret).map_err(|_| SigningError::InvalidKey)?;
            mac.update(message);
            mac.finalize().into_bytes().to_vec()
        }
        SigningAlgorithm::Sha512 => {
            let mut mac =
                HmacSha512::new_from_slice(secret).map_err(|_| SigningError::InvalidKey)?;
            mac.update(message);
            mac.finalize().into_bytes().to_vec()
        }
    })
}

/// Signs and verifies cached values with a rotating set of HMAC keys
pub struct CacheSigningService {
    config: CacheSigningConfig,
    keys: RwLock<KeyRing>,
    time: Arc<dyn TimeSource>,
}

impl CacheSigningService {
    pub fn new(config: CacheSigningConfig) -> Self {
        Self::with_time_source(config, Arc::new(SystemTimeSource))
    }

    pub fn with_time_source(config: CacheSigningConfig, time: Arc<dyn TimeSource>) -> Self {
        let mut ring = KeyRing::new(config.algorithm);
        ring.mint(time.now());
        Self::with_key_ring(config, ring, time)
    }

    /// Uses `ring` as-is, without minting an initial key.
    pub fn with_key_ring(
        config: CacheSigningConfig,
        ring: KeyRing,
        time: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            config,
            keys: RwLock::new(ring),
            time,
        }
    }

    fn read_keys(&self) -> RwLockReadGuard<'_, KeyRing> {
        self.keys.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_keys(&self) -> RwLockWriteGuard<'_, KeyRing> {
        self.keys.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn encode(&self, mac: &[u8]) -> String {
        match self.config.encoding {
            SignatureEncoding::Hex => HEXLOWER.encode(mac),
            SignatureEncoding::Base64 => BASE64.encode(mac),
        }
    }

    fn decode(&self, signature: &str) -> Option<Vec<u8>> {
        match self.config.encoding {
            SignatureEncoding::Hex => HEXLOWER.decode(signature.as_bytes()).ok(),
            SignatureEncoding::Base64 => BASE64.decode(signature.as_bytes()).ok(),
        }
    }

    pub fn start_rotation(self: &Arc<Self>) -> RotationHandle {
        info!(
            interval = ?self.config.key_rotation_interval,
            max_key_age = ?self.config.max_key_age,
            "Starting cache signing key rotation"
        );
        RotationHandle::spawn(Arc::downgrade(self), self.config.key_rotation_interval)
    }

    pub fn sign<T: Serialize + ?Sized>(&self, data: &T) -> Result<SignedPayload, SigningError> {
        let data = serde_json::to_value(data)?;
        let timestamp = self.time.now_millis();

        let keys = self.read_keys();
        let key = keys.current().ok_or(SigningError::NoActiveKey)?;
        let message = CanonicalPayload {
            data: &data,
            timestamp,
            key_id: key.key_id(),
        }
        .to_bytes()?;
        let mac = compute_mac(keys.algorithm(), key.secret(), &message)?;

        Ok(SignedPayload {
            signature: self.encode(&mac),
            key_id: key.key_id().to_owned(),
            timestamp,
            data,
        })
    }

    pub fn verify(&self, payload: &SignedPayload) -> Result<VerifiedPayload, VerificationError> {
        let expected = {
            let keys = self.read_keys();
            let key = keys
                .get(&payload.key_id)
                .ok_or_else(|| VerificationError::UnknownKey(payload.key_id.clone()))?;
            let message = CanonicalPayload {
                data: &payload.data,
                timestamp: payload.timestamp,
                key_id: &payload.key_id,
            }
            .to_bytes()
            .map_err(|e| VerificationError::Malformed(e.to_string()))?;
            compute_mac(keys.algorithm(), key.secret(), &message)
                .map_err(|_| VerificationError::SignatureMismatch)?
        };

        let provided = self
            .decode(&payload.signature)
            .ok_or(VerificationError::SignatureMismatch)?;
        if provided.len() != expected.len() || !bool::from(provided.ct_eq(&expected)) {
            debug!(key_id = %payload.key_id, "Cache payload signature mismatch");
            return Err(VerificationError::SignatureMismatch);
        }

        let age = self.time.now_millis().saturating_sub(payload.timestamp);
        if age > duration_millis(self.config.max_key_age) {
            return Err(VerificationError::Expired);
        }

        Ok(VerifiedPayload {
            data: payload.data.clone(),
            key_id: payload.key_id.clone(),
        })
    }

    /// Parses a persisted payload, then verifies it.
    pub fn verify_blob(&self, blob: &str) -> Result<VerifiedPayload, VerificationError> {
        self.verify(&SignedPayload::from_blob(blob)?)
    }

    pub fn sign_cache_entry<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
    ) -> Result<SignedPayload, SigningError> {
        self.sign(&CacheEntry {
            key: key.to_owned(),
            value,
        })
    }

    /// Verifies a persisted cache entry and checks it was stored under `key`.
    pub fn verify_cache_entry(&self, key: &str, blob: &str) -> Result<Value, VerificationError> {
        let verified = self.verify_blob(blob)?;
        let entry: CacheEntry<Value> = serde_json::from_value(verified.data)
            .map_err(|e| VerificationError::Malformed(e.to_string()))?;
        if entry.key != key {
            return Err(VerificationError::KeyMismatch {
                expected: key.to_owned(),
                found: entry.key,
            });
        }
        Ok(entry.value)
    }

    pub fn rotate_keys(&self) -> String {
        let now = self.time.now();
        let (key_id, pruned, active) = {
            let mut keys = self.write_keys();
            let (key_id, pruned) = keys.rotate(now, self.config.max_key_age);
            (key_id, pruned, keys.len())
        };
        info!(key_id = %key_id, pruned, active_keys = active, "Rotated cache signing key");
        key_id
    }

    pub fn key_info(&self) -> KeyInfo {
        self.read_keys().info(self.time.now())
    }
}
