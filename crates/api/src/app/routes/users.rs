use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;

use pentrack_auth::RegisterUser;
use pentrack_core::{AreaId, UserId};

use crate::app::{errors::ApiError, services::AppServices};
use crate::authz::{action, Authorized};

#[derive(Debug, Deserialize)]
pub struct AssignArea {
    pub area_id: AreaId,
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(list).post(register))
        .route("/:id/areas", post(assign_area))
        .route("/:id/areas/:area_id", delete(revoke_area))
}

pub async fn list(
    Extension(services): Extension<Arc<AppServices>>,
    auth: Authorized<action::UserRead>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(services.users.list(&auth.principal).await?))
}

/// POST /users - register an account; the role grant is checked first.
pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    auth: Authorized<action::UserCreate>,
    Json(body): Json<RegisterUser>,
) -> Result<impl IntoResponse, ApiError> {
    let account = services.users.register(&auth.principal, body).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

pub async fn assign_area(
    Extension(services): Extension<Arc<AppServices>>,
    auth: Authorized<action::AreaAssign>,
    Path(user_id): Path<UserId>,
    Json(body): Json<AssignArea>,
) -> Result<impl IntoResponse, ApiError> {
    let assignment = services
        .users
        .assign_area(&auth.principal, user_id, body.area_id)
        .await?;
    Ok((StatusCode::CREATED, Json(assignment)))
}

pub async fn revoke_area(
    Extension(services): Extension<Arc<AppServices>>,
    auth: Authorized<action::AreaRevoke>,
    Path((user_id, area_id)): Path<(UserId, AreaId)>,
) -> Result<impl IntoResponse, ApiError> {
    let assignment = services
        .users
        .revoke_area(&auth.principal, user_id, area_id)
        .await?;
    Ok(Json(assignment))
}
