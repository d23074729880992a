use anyhow::Result;
use futures::StreamExt;
use lockward_core::Services;
use lockward_protocol_http::HTTPProtocolServer;
use tracing::*;

use crate::config::load_config;

pub(crate) async fn command(cli: &crate::Cli) -> Result<()> {
    let version = env!("CARGO_PKG_VERSION");
    info!(%version, "Lockward");

    let config = load_config(&cli.config)?;
    let services = Services::new(config.clone()).await?;

    let mut protocol_futures = futures::stream::FuturesUnordered::new();

    if config.store.http.enable {
        protocol_futures.push(
            HTTPProtocolServer::new(&services)
                .await?
                .run(config.store.http.listen.address()),
        );
    }

    if console::user_attended() {
        info!("--------------------------------------------");
        info!("Lockward is now running.");
        info!(
            "Signing with {}, rotating keys every {:?}",
            config.store.cache_signing.algorithm.name(),
            config.store.cache_signing.key_rotation_interval
        );
        info!("Lockout backend: {:?}", services.lockout.backend_status());
        if config.store.http.enable {
            info!("Accepting HTTP connections on {}", config.store.http.listen);
        }
        info!("--------------------------------------------");
    }

    drop(config);

    let result = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                break Ok(());
            }
            result = protocol_futures.next(), if !protocol_futures.is_empty() => {
                match result {
                    Some(Err(error)) => {
                        error!(?error, "HTTP server error");
                        break Err(error);
                    },
                    None => break Ok(()),
                    _ => (),
                }
            }
        }
    };

    services.shutdown().await;
    info!("Exiting");
    result
}
