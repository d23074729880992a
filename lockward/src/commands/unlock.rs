use anyhow::Result;
use tracing::*;

use crate::commands::common::shared_lockout_service;
use crate::config::load_config;

pub(crate) async fn command(cli: &crate::Cli, identifier: &str) -> Result<()> {
    let config = load_config(&cli.config)?;
    let lockout = shared_lockout_service(&config).await?;

    let was_locked = lockout.is_locked(identifier).await;
    lockout.reset(identifier).await;
    if was_locked {
        info!(%identifier, "Lock removed");
    } else {
        info!(%identifier, "Failed attempts cleared, no lock was active");
    }
    Ok(())
}
