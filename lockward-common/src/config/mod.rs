mod defaults;

use std::time::Duration;

use defaults::*;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{ListenEndpoint, LockwardError, Secret};

#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
pub enum Environment {
    #[serde(rename = "development")]
    #[default]
    Development,
    #[serde(rename = "production")]
    Production,
}

/// MAC digest; also determines the secret length of every minted key
#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
pub enum SigningAlgorithm {
    #[serde(rename = "sha256")]
    #[default]
    Sha256,
    #[serde(rename = "sha512")]
    Sha512,
}

impl SigningAlgorithm {
    /// Digest output size, in bytes
    pub const fn key_len(&self) -> usize {
        match self {
            Self::Sha256 => 32,
            Self::Sha512 => 64,
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
pub enum SignatureEncoding {
    #[serde(rename = "hex")]
    #[default]
    Hex,
    #[serde(rename = "base64")]
    Base64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CacheSigningConfig {
    #[serde(default)]
    pub algorithm: SigningAlgorithm,

    #[serde(default = "_default_key_rotation_interval", with = "humantime_serde")]
    pub key_rotation_interval: Duration,

    #[serde(default = "_default_max_key_age", with = "humantime_serde")]
    pub max_key_age: Duration,

    #[serde(default)]
    pub encoding: SignatureEncoding,
}

impl Default for CacheSigningConfig {
    fn default() -> Self {
        Self {
            algorithm: SigningAlgorithm::default(),
            key_rotation_interval: _default_key_rotation_interval(),
            max_key_age: _default_max_key_age(),
            encoding: SignatureEncoding::default(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LockoutStoreConfig {
    pub url: Secret<String>,

    #[serde(
        default = "_default_store_connection_timeout",
        with = "humantime_serde"
    )]
    pub connection_timeout: Duration,

    /// Reconnection attempts made by the connection manager before a call fails
    #[serde(default = "_default_store_retries")]
    pub retries: usize,
}

impl LockoutStoreConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Secret::new(url.into()),
            connection_timeout: _default_store_connection_timeout(),
            retries: _default_store_retries(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LockoutConfig {
    #[serde(default = "_default_true")]
    pub enable: bool,

    #[serde(default = "_default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "_default_lockout_window", with = "humantime_serde")]
    pub window: Duration,

    #[serde(default = "_default_lockout_duration", with = "humantime_serde")]
    pub lockout_duration: Duration,

    /// Escalation hook; the shipped policy still applies `lockout_duration` as-is
    #[serde(default = "_default_false")]
    pub progressive_lockout: bool,

    #[serde(default = "_default_key_prefix")]
    pub key_prefix: String,

    #[serde(default = "_default_true")]
    pub log_attempts: bool,

    #[serde(default = "_default_store_timeout", with = "humantime_serde")]
    pub store_timeout: Duration,

    #[serde(default = "_default_cleanup_interval", with = "humantime_serde")]
    pub cleanup_interval: Duration,

    #[serde(default)]
    pub store: Option<LockoutStoreConfig>,
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            enable: true,
            max_attempts: _default_max_attempts(),
            window: _default_lockout_window(),
            lockout_duration: _default_lockout_duration(),
            progressive_lockout: false,
            key_prefix: _default_key_prefix(),
            log_attempts: true,
            store_timeout: _default_store_timeout(),
            cleanup_interval: _default_cleanup_interval(),
            store: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HttpConfig {
    #[serde(default = "_default_true")]
    pub enable: bool,

    #[serde(default = "_default_http_listen")]
    pub listen: ListenEndpoint,

    #[serde(default)]
    pub trust_x_forwarded_headers: bool,

    /// Required in the `x-lockward-token` header by the admin API, which is disabled when unset
    #[serde(default)]
    pub admin_token: Option<Secret<String>>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enable: true,
            listen: _default_http_listen(),
            trust_x_forwarded_headers: false,
            admin_token: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct LockwardConfigStore {
    #[serde(default)]
    pub environment: Environment,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub cache_signing: CacheSigningConfig,

    #[serde(default)]
    pub lockout: LockoutConfig,
}

#[derive(Debug, Clone)]
pub struct LockwardConfig {
    pub store: LockwardConfigStore,
}

impl LockwardConfig {
    pub fn is_production(&self) -> bool {
        self.store.environment == Environment::Production
    }

    pub fn validate(&self) -> Result<(), LockwardError> {
        let signing = &self.store.cache_signing;
        let lockout = &self.store.lockout;

        if signing.key_rotation_interval.is_zero() {
            return Err(LockwardError::InvalidConfig(
                "`cache_signing.key_rotation_interval` must be greater than zero".into(),
            ));
        }
        if signing.max_key_age < signing.key_rotation_interval {
            return Err(LockwardError::InvalidConfig(
                "`cache_signing.max_key_age` must not be shorter than the rotation interval"
                    .into(),
            ));
        }
        if signing.max_key_age < signing.key_rotation_interval * 2 {
            warn!("`cache_signing.max_key_age` is less than twice the rotation interval - superseded keys will expire before a full rotation period has passed.");
        }

        if lockout.enable {
            if lockout.max_attempts == 0 {
                return Err(LockwardError::InvalidConfig(
                    "`lockout.max_attempts` must be at least 1".into(),
                ));
            }
            if lockout.window.is_zero() || lockout.lockout_duration.is_zero() {
                return Err(LockwardError::InvalidConfig(
                    "`lockout.window` and `lockout.lockout_duration` must be greater than zero"
                        .into(),
                ));
            }
            if self.is_production() && lockout.store.is_none() {
                return Err(LockwardError::StoreRequiredInProduction);
            }
            if lockout.store.is_none() {
                warn!("No lockout store configured - lockout state is local to this instance.");
            }
            if lockout.progressive_lockout {
                warn!("`lockout.progressive_lockout` is set, but lockouts currently always last `lockout.lockout_duration`.");
            }
        }

        Ok(())
    }
}
