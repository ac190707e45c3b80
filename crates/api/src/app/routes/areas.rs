use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use pentrack_infra::services::NewArea;

use crate::app::{errors::ApiError, services::AppServices};
use crate::authz::{action, Authorized};

pub fn router() -> Router {
    Router::new().route("/", get(list).post(create))
}

pub async fn list(
    Extension(services): Extension<Arc<AppServices>>,
    auth: Authorized<action::AreaRead>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(services.areas.list(&auth.principal).await?))
}

pub async fn create(
    Extension(services): Extension<Arc<AppServices>>,
    auth: Authorized<action::AreaWrite>,
    Json(body): Json<NewArea>,
) -> Result<impl IntoResponse, ApiError> {
    let area = services.areas.create(&auth.principal, body).await?;
    Ok((StatusCode::CREATED, Json(area)))
}
