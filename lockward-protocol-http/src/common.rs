use std::sync::Arc;

use http::{HeaderName, StatusCode};
use lockward_common::Secret;
use lockward_core::Services;
use poem::{Endpoint, EndpointExt, IntoResponse, Request};
use subtle::ConstantTimeEq;

pub static X_LOCKWARD_TOKEN: HeaderName = HeaderName::from_static("x-lockward-token");

/// Remote IP of the request, or the first `X-Forwarded-For` hop when trusted
pub fn client_ip(req: &Request, trust_x_forwarded_headers: bool) -> Option<String> {
    let remote_ip = req.remote_addr().as_socket_addr().map(|x| x.ip().to_string());

    if trust_x_forwarded_headers {
        req.header("x-forwarded-for")
            .and_then(|x| x.split(',').next())
            .map(|x| x.trim().to_string())
            .filter(|x| !x.is_empty())
            .or(remote_ip)
    } else {
        remote_ip
    }
}

pub async fn get_client_ip(req: &Request, services: Option<&Services>) -> Option<String> {
    let trust_x_forwarded_headers = if let Some(services) = services {
        let config = services.config.lock().await;
        config.store.http.trust_x_forwarded_headers
    } else {
        false
    };
    client_ip(req, trust_x_forwarded_headers)
}

pub fn endpoint_admin_auth<E: Endpoint + 'static>(
    e: E,
    admin_token: Option<Secret<String>>,
) -> impl Endpoint {
    let admin_token = Arc::new(admin_token);
    e.around(move |ep, req| {
        let admin_token = admin_token.clone();
        async move {
            let Some(expected) = admin_token.as_ref() else {
                return Err(poem::Error::from_string(
                    "Admin API is disabled",
                    StatusCode::FORBIDDEN,
                ));
            };
            let provided = req.header(&X_LOCKWARD_TOKEN).unwrap_or_default();
            if bool::from(
                provided
                    .as_bytes()
                    .ct_eq(expected.expose_secret().as_bytes()),
            ) {
                return Ok(ep.call(req).await?.into_response());
            }
            Err(poem::Error::from_status(StatusCode::UNAUTHORIZED))
        }
    })
}
