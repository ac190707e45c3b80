use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use pentrack_core::RecordId;
use pentrack_infra::services::{FindingPatch, NewFinding};

use crate::app::{errors::ApiError, services::AppServices};
use crate::authz::{action, Authorized};

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub project_id: Option<RecordId>,
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(list).post(create))
        .route("/:id", get(read).patch(update).delete(purge))
}

pub async fn list(
    Extension(services): Extension<Arc<AppServices>>,
    auth: Authorized<action::FindingRead>,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let findings = services
        .findings
        .list(&auth.principal, params.project_id)
        .await?;
    Ok(Json(findings))
}

pub async fn create(
    Extension(services): Extension<Arc<AppServices>>,
    auth: Authorized<action::FindingWrite>,
    Json(body): Json<NewFinding>,
) -> Result<impl IntoResponse, ApiError> {
    let finding = services.findings.create(&auth.principal, body).await?;
    Ok((StatusCode::CREATED, Json(finding)))
}

pub async fn read(
    Extension(services): Extension<Arc<AppServices>>,
    auth: Authorized<action::FindingRead>,
    Path(id): Path<RecordId>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(services.findings.get(&auth.principal, id).await?))
}

pub async fn update(
    Extension(services): Extension<Arc<AppServices>>,
    auth: Authorized<action::FindingWrite>,
    Path(id): Path<RecordId>,
    Json(body): Json<FindingPatch>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(services.findings.update(&auth.principal, id, body).await?))
}

pub async fn purge(
    Extension(services): Extension<Arc<AppServices>>,
    auth: Authorized<action::FindingPurge>,
    Path(id): Path<RecordId>,
) -> Result<StatusCode, ApiError> {
    services.findings.purge(&auth.principal, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
