/// Fatal: signing cannot proceed with the current configuration
#[derive(thiserror::Error, Debug)]
pub enum SigningError {
    #[error("no active signing key")]
    NoActiveKey,
    #[error("signing key rejected by the MAC implementation")]
    InvalidKey,
    #[error("payload is not serializable: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Recoverable: the cached value must be treated as absent and recomputed
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum VerificationError {
    #[error("unknown signing key {0}")]
    UnknownKey(String),
    #[error("signature mismatch")]
    SignatureMismatch,
    #[error("signed payload expired")]
    Expired,
    #[error("cache key mismatch: expected {expected}, found {found}")]
    KeyMismatch { expected: String, found: String },
    #[error("malformed signed payload: {0}")]
    Malformed(String),
}

impl VerificationError {
    /// Whether the failure points at a forged or substituted entry rather than plain staleness
    pub fn is_tampering(&self) -> bool {
        matches!(self, Self::SignatureMismatch | Self::KeyMismatch { .. })
    }
}
