use std::sync::Arc;

use axum::{extract::Extension, response::IntoResponse, routing::get, Json, Router};

use crate::app::services::AppServices;
use crate::authz::{action, Authorized};

pub fn router() -> Router {
    Router::new().route("/", get(list))
}

/// GET /admin/audit - retained security events, oldest first
pub async fn list(
    Extension(services): Extension<Arc<AppServices>>,
    _auth: Authorized<action::AuditRead>,
) -> impl IntoResponse {
    Json(serde_json::json!({ "events": services.audit.retained() }))
}
