use anyhow::Result;

use crate::commands::common::shared_lockout_service;
use crate::config::load_config;

pub(crate) async fn command(cli: &crate::Cli, identifier: &str) -> Result<()> {
    let config = load_config(&cli.config)?;
    let lockout = shared_lockout_service(&config).await?;

    let info = lockout.lockout_info(identifier).await;
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}
