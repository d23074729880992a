use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use lockward_common::LockwardConfig;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::cache_signing::{CacheSigningService, RotationHandle};
use crate::lockout::store::{AttemptStore, RedisAttemptStore};
use crate::lockout::LockoutService;

#[derive(Clone)]
pub struct Services {
    pub config: Arc<Mutex<LockwardConfig>>,
    pub cache_signing: Arc<CacheSigningService>,
    pub lockout: Arc<LockoutService>,
    rotation: Arc<Mutex<Option<RotationHandle>>>,
    cleanup: Arc<Mutex<Option<JoinHandle<()>>>>,
}

/// Connects the shared lockout store, if one is configured.
///
/// In production a store that cannot be reached is fatal; otherwise the
/// service continues with local-only lockout state.
pub async fn connect_lockout_store(
    config: &LockwardConfig,
) -> Result<Option<Arc<dyn AttemptStore>>> {
    let Some(store_config) = config.store.lockout.store.as_ref() else {
        return Ok(None);
    };
    match RedisAttemptStore::connect(store_config).await {
        Ok(store) => Ok(Some(Arc::new(store))),
        Err(error) if config.is_production() => {
            Err(error).context("connecting to the lockout store")
        }
        Err(error) => {
            warn!(%error, "Could not connect to the lockout store, using local lockout state");
            Ok(None)
        }
    }
}

impl Services {
    pub async fn new(config: LockwardConfig) -> Result<Self> {
        config.validate()?;

        let cache_signing = Arc::new(CacheSigningService::new(
            config.store.cache_signing.clone(),
        ));
        let rotation = cache_signing.start_rotation();

        let store = connect_lockout_store(&config).await?;
        let lockout = Arc::new(LockoutService::new(config.store.lockout.clone(), store));
        info!(backend = ?lockout.backend_status(), "Lockout service ready");

        let cleanup = lockout.is_enabled().then(|| {
            let lockout = lockout.clone();
            let period = config.store.lockout.cleanup_interval.max(Duration::from_secs(1));
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                interval.tick().await;
                loop {
                    interval.tick().await;
                    lockout.cleanup_expired().await;
                }
            })
        });

        Ok(Self {
            config: Arc::new(Mutex::new(config)),
            cache_signing,
            lockout,
            rotation: Arc::new(Mutex::new(Some(rotation))),
            cleanup: Arc::new(Mutex::new(cleanup)),
        })
    }

    /// Stops background tasks. Safe to call more than once.
    pub async fn shutdown(&self) {
        if let Some(mut rotation) = self.rotation.lock().await.take() {
            rotation.stop();
        }
        if let Some(cleanup) = self.cleanup.lock().await.take() {
            cleanup.abort();
        }
        info!("Background tasks stopped");
    }
}

#[cfg(test)]
mod tests {
    use lockward_common::{Environment, LockoutStoreConfig, LockwardConfigStore};

    use super::*;
    use crate::lockout::BackendStatus;

    fn config(store: LockwardConfigStore) -> LockwardConfig {
        LockwardConfig { store }
    }

    fn unreachable_store() -> LockoutStoreConfig {
        let mut store = LockoutStoreConfig::new("redis://127.0.0.1:1");
        store.retries = 0;
        store.connection_timeout = Duration::from_millis(200);
        store
    }

    #[tokio::test]
    async fn test_development_without_store_is_local() {
        let services = Services::new(config(LockwardConfigStore::default()))
            .await
            .unwrap();
        assert_eq!(services.lockout.backend_status(), BackendStatus::Local);
        assert_eq!(services.cache_signing.key_info().active_keys, 1);

        services.shutdown().await;
        services.shutdown().await;
    }

    #[tokio::test]
    async fn test_development_tolerates_unreachable_store() {
        let mut store = LockwardConfigStore::default();
        store.lockout.store = Some(unreachable_store());
        let services = Services::new(config(store)).await.unwrap();
        assert_eq!(services.lockout.backend_status(), BackendStatus::Local);
    }

    #[tokio::test]
    async fn test_production_requires_reachable_store() {
        let mut store = LockwardConfigStore {
            environment: Environment::Production,
            ..Default::default()
        };
        assert!(Services::new(config(store.clone())).await.is_err());

        store.lockout.store = Some(unreachable_store());
        assert!(Services::new(config(store)).await.is_err());
    }
}
