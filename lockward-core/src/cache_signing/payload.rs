use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::VerificationError;

/// A value together with the MAC that authenticates it. Field names are the persisted wire shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedPayload {
    #[serde(deserialize_with = "required_value")]
    pub data: Value,
    pub signature: String,
    pub key_id: String,
    /// Unix epoch milliseconds at signing time
    pub timestamp: i64,
}

impl SignedPayload {
    pub fn to_blob(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_blob(blob: &str) -> Result<Self, VerificationError> {
        serde_json::from_str(blob).map_err(|e| VerificationError::Malformed(e.to_string()))
    }
}

// A plain `Value` field would accept an absent `data` as null
fn required_value<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Value, D::Error> {
    Value::deserialize(deserializer)
}

#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedPayload {
    pub data: Value,
    pub key_id: String,
}

/// Field order here is the MAC input order
#[derive(Serialize)]
pub(super) struct CanonicalPayload<'a> {
    pub data: &'a Value,
    pub timestamp: i64,
    #[serde(rename = "keyId")]
    pub key_id: &'a str,
}

impl CanonicalPayload<'_> {
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// Binds a cache key name into the signed data
#[derive(Debug, Serialize, Deserialize)]
pub(super) struct CacheEntry<V> {
    pub key: String,
    pub value: V,
}
