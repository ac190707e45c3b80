use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use pentrack_core::RecordId;
use pentrack_infra::services::{NewProject, ProjectPatch};

use crate::app::{errors::ApiError, services::AppServices};
use crate::authz::{action, Authorized};

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub include_archived: bool,
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(list).post(create))
        .route("/:id", get(read).patch(update).delete(purge))
        .route("/:id/archive", post(archive))
        .route("/:id/report", get(report))
}

pub async fn list(
    Extension(services): Extension<Arc<AppServices>>,
    auth: Authorized<action::ProjectRead>,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let projects = services
        .projects
        .list(&auth.principal, params.include_archived)
        .await?;
    Ok(Json(projects))
}

pub async fn create(
    Extension(services): Extension<Arc<AppServices>>,
    auth: Authorized<action::ProjectWrite>,
    Json(body): Json<NewProject>,
) -> Result<impl IntoResponse, ApiError> {
    let project = services.projects.create(&auth.principal, body).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

pub async fn read(
    Extension(services): Extension<Arc<AppServices>>,
    auth: Authorized<action::ProjectRead>,
    Path(id): Path<RecordId>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(services.projects.get(&auth.principal, id).await?))
}

pub async fn report(
    Extension(services): Extension<Arc<AppServices>>,
    auth: Authorized<action::ProjectRead>,
    Path(id): Path<RecordId>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(services.projects.report(&auth.principal, id).await?))
}

pub async fn update(
    Extension(services): Extension<Arc<AppServices>>,
    auth: Authorized<action::ProjectWrite>,
    Path(id): Path<RecordId>,
    Json(body): Json<ProjectPatch>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(services.projects.update(&auth.principal, id, body).await?))
}

pub async fn archive(
    Extension(services): Extension<Arc<AppServices>>,
    auth: Authorized<action::ProjectArchive>,
    Path(id): Path<RecordId>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(services.projects.archive(&auth.principal, id).await?))
}

pub async fn purge(
    Extension(services): Extension<Arc<AppServices>>,
    auth: Authorized<action::ProjectPurge>,
    Path(id): Path<RecordId>,
) -> Result<StatusCode, ApiError> {
    services.projects.purge(&auth.principal, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
