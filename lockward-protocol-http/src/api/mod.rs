use lockward_common::HttpConfig;
use lockward_core::Services;
use poem::endpoint::BoxEndpoint;
use poem::{get, post, Endpoint, EndpointExt, Response, Route};

use crate::common::endpoint_admin_auth;
use crate::middleware::LockoutMiddleware;

mod health;
mod lockouts;
mod signing;

/// `/api` routes. Everything but health needs the admin token; failed
/// token checks count against the caller's lockout record.
pub fn routes(services: &Services, http_config: &HttpConfig) -> impl Endpoint {
    let guard = LockoutMiddleware::new(services.lockout.clone())
        .trust_x_forwarded_headers(http_config.trust_x_forwarded_headers)
        .tracking_responses();
    let admin_token = http_config.admin_token.clone();
    let admin = |e: BoxEndpoint<'static, Response>| {
        endpoint_admin_auth(e, admin_token.clone()).with(guard.clone())
    };

    Route::new()
        .at("/health", get(health::api_get_health))
        .at("/signing/keys", admin(get(signing::api_get_signing_keys).boxed()))
        .at(
            "/signing/rotate",
            admin(post(signing::api_rotate_signing_keys).boxed()),
        )
        .at(
            "/lockouts/:identifier",
            admin(
                get(lockouts::api_get_lockout)
                    .delete(lockouts::api_delete_lockout)
                    .boxed(),
            ),
        )
}
