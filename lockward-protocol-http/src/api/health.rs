use lockward_core::lockout::BackendStatus;
use lockward_core::Services;
use poem::handler;
use poem::web::{Data, Json};
use serde::Serialize;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    status: &'static str,
    lockout_backend: BackendStatus,
}

#[handler]
pub async fn api_get_health(services: Data<&Services>) -> Json<HealthResponse> {
    let lockout_backend = services.lockout.backend_status();
    Json(HealthResponse {
        status: match lockout_backend {
            BackendStatus::Degraded => "degraded",
            BackendStatus::Local | BackendStatus::Distributed => "ok",
        },
        lockout_backend,
    })
}
