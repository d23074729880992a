use lockward_core::lockout::LockoutInfo;
use lockward_core::Services;
use poem::handler;
use poem::http::StatusCode;
use poem::web::{Data, Json, Path};
use tracing::info;

#[handler]
pub async fn api_get_lockout(
    services: Data<&Services>,
    Path(identifier): Path<String>,
) -> Json<LockoutInfo> {
    Json(services.lockout.lockout_info(&identifier).await)
}

#[handler]
pub async fn api_delete_lockout(
    services: Data<&Services>,
    Path(identifier): Path<String>,
) -> StatusCode {
    services.lockout.reset(&identifier).await;
    info!(identifier = %identifier, "Lockout cleared by admin");
    StatusCode::NO_CONTENT
}
