use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use pentrack_auth::AuthzError;
use pentrack_core::DomainError;
use pentrack_infra::services::ServiceError;
use pentrack_infra::{ScopeError, StoreError};

use crate::context::ContextError;

/// Every error a handler or middleware can surface.
///
/// Server-side failures collapse into `Internal`; their detail is logged where
/// they are converted and never sent to the client.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unauthenticated")]
    Unauthenticated,

    #[error("missing tenant context")]
    MissingTenantContext,

    #[error("invalid tenant header")]
    InvalidTenantHeader,

    #[error("{0}")]
    Forbidden(String),

    #[error("not found")]
    NotFound,

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("internal error")]
    Internal,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::Unauthenticated => (StatusCode::UNAUTHORIZED, "unauthenticated"),
            ApiError::MissingTenantContext => (StatusCode::BAD_REQUEST, "missing_tenant_context"),
            ApiError::InvalidTenantHeader => (StatusCode::BAD_REQUEST, "invalid_tenant_header"),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "not_found"),
            ApiError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            ApiError::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };
        json_error(status, code, self.to_string())
    }
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

impl From<AuthzError> for ApiError {
    fn from(value: AuthzError) -> Self {
        ApiError::Forbidden(value.to_string())
    }
}

impl From<ContextError> for ApiError {
    fn from(value: ContextError) -> Self {
        match value {
            ContextError::MissingTenant => ApiError::MissingTenantContext,
            ContextError::TenantNotPermitted { .. } => {
                ApiError::Forbidden(AuthzError::TenantNotPermitted.to_string())
            }
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => ApiError::Validation(msg),
            DomainError::Conflict(msg) => ApiError::Conflict(msg),
            DomainError::NotFound => ApiError::NotFound,
        }
    }
}

impl From<ScopeError> for ApiError {
    fn from(value: ScopeError) -> Self {
        match value {
            ScopeError::MissingTenantContext => ApiError::MissingTenantContext,
            ScopeError::CrossTenantWrite { .. } => {
                ApiError::Forbidden("cross-tenant write rejected".to_string())
            }
            ScopeError::ImmutableField(field) => ApiError::Validation(format!("{field} is immutable")),
            ScopeError::Store(StoreError::Conflict(msg)) => {
                tracing::debug!(%msg, "store conflict");
                ApiError::Conflict("conflict".to_string())
            }
            // Logged and published by the scoping layer.
            ScopeError::IsolationViolation(_) => ApiError::Internal,
            ScopeError::Configuration(msg) => {
                tracing::error!(%msg, "scoping configuration error");
                ApiError::Internal
            }
            ScopeError::Store(e) => {
                tracing::error!(error = %e, "store failure");
                ApiError::Internal
            }
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(value: ServiceError) -> Self {
        match value {
            ServiceError::Scope(e) => e.into(),
            ServiceError::Forbidden(e) => e.into(),
            ServiceError::NotFound => ApiError::NotFound,
            ServiceError::Domain(e) => e.into(),
        }
    }
}
