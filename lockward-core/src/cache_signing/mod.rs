mod error;
mod key_ring;
mod payload;
mod rotation;
mod service;

pub use error::{SigningError, VerificationError};
pub use key_ring::{KeyAgeInfo, KeyInfo, KeyRing, SigningKey};
pub use payload::{SignedPayload, VerifiedPayload};
pub use rotation::RotationHandle;
pub use service::CacheSigningService;
