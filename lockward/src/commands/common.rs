use anyhow::{Context, Result};
use lockward_common::LockwardConfig;
use lockward_core::lockout::store::RedisAttemptStore;
use lockward_core::lockout::LockoutService;
use std::sync::Arc;

/// Lockout service backed by the shared store of the running instances.
///
/// Local lockout state lives inside the `run` process, so without a shared
/// store there is nothing to inspect from the outside.
pub(crate) async fn shared_lockout_service(config: &LockwardConfig) -> Result<LockoutService> {
    config.validate()?;
    let Some(store_config) = config.store.lockout.store.as_ref() else {
        anyhow::bail!(
            "`lockout.store` is not configured, lockout state is only kept inside the running instance"
        );
    };
    let store = RedisAttemptStore::connect(store_config)
        .await
        .context("connecting to the lockout store")?;
    Ok(LockoutService::new(
        config.store.lockout.clone(),
        Some(Arc::new(store)),
    ))
}
