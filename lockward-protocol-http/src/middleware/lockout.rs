use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use http::header::RETRY_AFTER;
use http::StatusCode;
use lockward_core::lockout::{LockoutInfo, LockoutService};
use poem::web::Json;
use poem::{Endpoint, IntoResponse, Middleware, Request, Response};
use serde::Serialize;
use tracing::debug;

use crate::common::client_ip;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LockedOutBody {
    error: &'static str,
    message: String,
    retry_after: u64,
    locked_until: Option<String>,
}

pub(crate) fn locked_out_response(info: &LockoutInfo, now: DateTime<Utc>) -> Response {
    let retry_after = info.retry_after_secs(now);
    Json(LockedOutBody {
        error: "too_many_attempts",
        message: format!("Too many failed attempts. Try again in {retry_after} seconds."),
        retry_after,
        locked_until: info
            .locked_until
            .map(|x| x.to_rfc3339_opts(SecondsFormat::Secs, true)),
    })
    .with_status(StatusCode::TOO_MANY_REQUESTS)
    .with_header(RETRY_AFTER, retry_after)
    .into_response()
}

/// Rejects requests from locked-out clients with `429 Too Many Requests`.
///
/// Allowed requests carry the client's [`LockoutInfo`] in their extensions.
/// With [`LockoutMiddleware::tracking_responses`], a `401` from the inner
/// endpoint counts as a failed attempt and a `2xx` clears the client's record.
#[derive(Clone)]
pub struct LockoutMiddleware {
    lockout: Arc<LockoutService>,
    trust_x_forwarded_headers: bool,
    track_responses: bool,
}

impl LockoutMiddleware {
    pub fn new(lockout: Arc<LockoutService>) -> Self {
        Self {
            lockout,
            trust_x_forwarded_headers: false,
            track_responses: false,
        }
    }

    pub fn trust_x_forwarded_headers(mut self, trust: bool) -> Self {
        self.trust_x_forwarded_headers = trust;
        self
    }

    pub fn tracking_responses(mut self) -> Self {
        self.track_responses = true;
        self
    }
}

pub struct LockoutMiddlewareEndpoint<E: Endpoint> {
    inner: E,
    config: LockoutMiddleware,
}

impl<E: Endpoint> Middleware<E> for LockoutMiddleware {
    type Output = LockoutMiddlewareEndpoint<E>;

    fn transform(&self, inner: E) -> Self::Output {
        LockoutMiddlewareEndpoint {
            inner,
            config: self.clone(),
        }
    }
}

impl<E: Endpoint> Endpoint for LockoutMiddlewareEndpoint<E> {
    type Output = Response;

    async fn call(&self, mut req: Request) -> poem::Result<Self::Output> {
        let lockout = &self.config.lockout;
        let Some(identifier) = client_ip(&req, self.config.trust_x_forwarded_headers) else {
            debug!("No client address, skipping lockout check");
            return Ok(self.inner.call(req).await?.into_response());
        };

        let info = lockout.lockout_info(&identifier).await;
        if info.is_locked {
            debug!(identifier = %identifier, "Rejecting request from locked-out client");
            return Ok(locked_out_response(&info, lockout.now()));
        }
        req.extensions_mut().insert(info);

        let result = self.inner.call(req).await.map(IntoResponse::into_response);
        if !self.config.track_responses {
            return result;
        }

        let status = match &result {
            Ok(response) => response.status(),
            Err(error) => error.status(),
        };
        if status == StatusCode::UNAUTHORIZED {
            let decision = lockout.record_failed_attempt(&identifier).await;
            if !decision.allowed {
                return Ok(locked_out_response(&decision.info, lockout.now()));
            }
        } else if status.is_success() {
            lockout.record_successful_auth(&identifier).await;
        }
        result
    }
}
