use lockward_core::cache_signing::KeyInfo;
use lockward_core::Services;
use poem::handler;
use poem::web::{Data, Json};
use tracing::info;

#[handler]
pub async fn api_get_signing_keys(services: Data<&Services>) -> Json<KeyInfo> {
    Json(services.cache_signing.key_info())
}

#[handler]
pub async fn api_rotate_signing_keys(services: Data<&Services>) -> Json<KeyInfo> {
    let key_id = services.cache_signing.rotate_keys();
    info!(key_id = %key_id, "Signing key rotated by admin");
    Json(services.cache_signing.key_info())
}
