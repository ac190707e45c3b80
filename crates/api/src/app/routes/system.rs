use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};

use pentrack_core::TenantContext;

use crate::context::PrincipalContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> impl IntoResponse {
    let principal = principal.principal();
    Json(serde_json::json!({
        "identity": principal.identity,
        "role": principal.role,
        "tenant_id": tenant.tenant_id(),
        "global": tenant.is_global(),
        "tenant_ids": principal.tenant_ids,
        "area_ids": principal.area_ids,
    }))
}
