mod api;
pub mod common;
pub mod logging;
pub mod middleware;

use std::fmt::Debug;
use std::net::SocketAddr;

use anyhow::{Context, Result};
use lockward_common::HttpConfig;
use lockward_core::Services;
use poem::listener::TcpListener;
use poem::web::Data;
use poem::{Endpoint, EndpointExt, FromRequest, IntoResponse, Route, Server};
use tracing::*;

use crate::common::get_client_ip;
use crate::logging::{log_request_error, log_request_result, span_for_request};
pub use crate::middleware::LockoutMiddleware;

/// Builds the full application: `/api` routes with per-request logging.
pub fn app(services: &Services, http_config: &HttpConfig) -> impl Endpoint {
    Route::new()
        .nest("/api", api::routes(services, http_config))
        .around(|ep, req| async move {
            let services = Data::<&Services>::from_request_without_body(&req)
                .await
                .ok()
                .map(|x| x.0.clone());
            let client_ip = get_client_ip(&req, services.as_ref()).await;
            let method = req.method().clone();
            let url = req.original_uri().clone();

            async {
                match ep.call(req).await {
                    Ok(response) => {
                        let response = response.into_response();
                        log_request_result(
                            &method,
                            &url,
                            client_ip.as_deref(),
                            &response.status(),
                        );
                        Ok(response)
                    }
                    Err(error) if error.status().is_server_error() => {
                        log_request_error(&method, &url, client_ip.as_deref(), &error);
                        Err(error)
                    }
                    Err(error) => {
                        log_request_result(
                            &method,
                            &url,
                            client_ip.as_deref(),
                            &error.status(),
                        );
                        Err(error)
                    }
                }
            }
            .instrument(span_for_request(client_ip.as_deref()))
            .await
        })
        .data(services.clone())
}

#[derive(Clone)]
pub struct HTTPProtocolServer {
    services: Services,
}

impl HTTPProtocolServer {
    pub async fn new(services: &Services) -> Result<Self> {
        Ok(HTTPProtocolServer {
            services: services.clone(),
        })
    }

    pub async fn run(self, address: SocketAddr) -> Result<()> {
        let http_config = self.services.config.lock().await.store.http.clone();
        if http_config.admin_token.is_none() {
            warn!("No `http.admin_token` configured, the admin API is disabled");
        }
        let app = app(&self.services, &http_config);

        info!(?address, "Listening");
        Server::new(TcpListener::bind(address))
            .run(app)
            .await
            .context("Failed to start HTTP server")
    }
}

impl Debug for HTTPProtocolServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HTTPProtocolServer")
    }
}
