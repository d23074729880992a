use std::fmt::Display;

use poem::http::{Method, StatusCode, Uri};
use tracing::*;

pub fn span_for_request(client_ip: Option<&str>) -> Span {
    match client_ip {
        Some(client_ip) => info_span!("HTTP", %client_ip),
        None => info_span!("HTTP"),
    }
}

pub fn log_request_result(
    method: &Method,
    url: &Uri,
    client_ip: Option<&str>,
    status: &StatusCode,
) {
    let client_ip = client_ip.unwrap_or("<unknown>");
    if status.is_server_error() || status.is_client_error() {
        warn!(%method, %url, %status, %client_ip, "Request failed");
    } else {
        info!(%method, %url, %status, %client_ip, "Request");
    }
}

pub fn log_request_error<E: Display>(
    method: &Method,
    url: &Uri,
    client_ip: Option<&str>,
    error: &E,
) {
    let client_ip = client_ip.unwrap_or("<unknown>");
    error!(%method, %url, %error, %client_ip, "Request failed");
}
