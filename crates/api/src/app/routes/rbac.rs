//! Read-only views of the RBAC policy for debugging denials.

use axum::{extract::Query, response::IntoResponse, routing::get, Json, Router};
use serde::Deserialize;

use pentrack_auth::{Action, Role, explain_authorization, policy_table};

use crate::app::errors::ApiError;
use crate::authz::{action, Authorized};

// ─────────────────────────────────────────────────────────────────────────────
// Query Parameters
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ExplainQuery {
    pub action: String,
    /// Defaults to the caller's role.
    pub role: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

pub fn router() -> Router {
    Router::new()
        .route("/policy", get(policy))
        .route("/explain", get(explain))
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// GET /admin/rbac/policy - the full action → roles table
pub async fn policy(_auth: Authorized<action::PolicyRead>) -> impl IntoResponse {
    Json(serde_json::json!({ "policy": policy_table() }))
}

/// GET /admin/rbac/explain?action=project.purge&role=ANALYST
pub async fn explain(
    auth: Authorized<action::PolicyRead>,
    Query(query): Query<ExplainQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let action: Action = query.action.parse().map_err(ApiError::Validation)?;
    let role = match query.role {
        Some(raw) => raw
            .parse::<Role>()
            .map_err(|e| ApiError::Validation(e.to_string()))?,
        None => auth.principal.role,
    };
    Ok(Json(explain_authorization(role, action)))
}
