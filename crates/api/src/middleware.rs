use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, HeaderName, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;

use pentrack_audit::{AuditSink, SecurityEvent};
use pentrack_auth::AuthnError;
use pentrack_core::{TenantContext, TenantId, context};

use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::context::{ContextError, PrincipalContext, establish};

#[derive(Clone)]
pub struct AuthState {
    pub services: Arc<AppServices>,
    pub tenant_header: HeaderName,
}

/// Resolve the bearer token into a [`PrincipalContext`].
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer(req.headers())?;

    let principal = state
        .services
        .resolver
        .resolve(token, Utc::now())
        .await
        .map_err(authn_error)?;

    req.extensions_mut().insert(PrincipalContext::new(principal));
    Ok(next.run(req).await)
}

/// Establish the tenant context and run the rest of the request inside it.
///
/// Must be layered inside [`auth_middleware`].
pub async fn tenant_context_middleware(
    State(state): State<AuthState>,
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(principal) = req.extensions().get::<PrincipalContext>().cloned() else {
        return Err(ApiError::Unauthenticated);
    };
    let principal = principal.principal();

    let requested = requested_tenant(req.headers(), &state.tenant_header)?;
    let ctx = establish(principal, requested).map_err(|e| {
        if let ContextError::TenantNotPermitted { requested } = &e {
            tracing::warn!(identity = %principal.identity, tenant_id = %requested, "tenant override rejected");
            let home = principal
                .default_tenant()
                .map(|t| TenantContext::for_tenant(principal.identity, t));
            let event = SecurityEvent::TenantOverrideRejected { requested_tenant: *requested };
            match home {
                Some(home) => context::sync_scope(home, || state.services.audit.record(event)),
                None => state.services.audit.record(event),
            }
        }
        ApiError::from(e)
    })?;

    req.extensions_mut().insert(ctx.clone());
    Ok(context::scope(ctx, next.run(req)).await.into_response())
}

fn authn_error(err: AuthnError) -> ApiError {
    match err {
        AuthnError::Directory(msg) => {
            tracing::error!(error = %msg, "identity directory unavailable");
            ApiError::Internal
        }
        other => {
            tracing::debug!(error = %other, "authentication failed");
            ApiError::Unauthenticated
        }
    }
}

fn requested_tenant(headers: &HeaderMap, name: &HeaderName) -> Result<Option<TenantId>, ApiError> {
    let Some(value) = headers.get(name) else {
        return Ok(None);
    };
    let value = value.to_str().map_err(|_| ApiError::InvalidTenantHeader)?.trim();
    if value.is_empty() {
        return Ok(None);
    }
    value.parse().map(Some).map_err(|_| ApiError::InvalidTenantHeader)
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, ApiError> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or(ApiError::Unauthenticated)?;

    let header = header.to_str().map_err(|_| ApiError::Unauthenticated)?;

    let header = header
        .strip_prefix("Bearer ")
        .ok_or(ApiError::Unauthenticated)?;

    let token = header.trim();
    if token.is_empty() {
        return Err(ApiError::Unauthenticated);
    }

    Ok(token)
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;
    use pentrack_auth::TokenValidationError;

    use super::*;

    fn header() -> HeaderName {
        HeaderName::from_static("x-tenant-id")
    }

    #[test]
    fn bearer_is_required() {
        let mut headers = HeaderMap::new();
        assert!(extract_bearer(&headers).is_err());
        headers.insert("authorization", HeaderValue::from_static("Basic abc"));
        assert!(extract_bearer(&headers).is_err());
        headers.insert("authorization", HeaderValue::from_static("Bearer   "));
        assert!(extract_bearer(&headers).is_err());
        headers.insert("authorization", HeaderValue::from_static("Bearer tok"));
        assert_eq!(extract_bearer(&headers).unwrap(), "tok");
    }

    #[test]
    fn directory_outage_is_not_a_credential_failure() {
        let outage = authn_error(AuthnError::Directory("pool timed out".into()));
        assert!(matches!(outage, ApiError::Internal));

        for err in [
            AuthnError::InvalidToken(TokenValidationError::Expired),
            AuthnError::UnknownIdentity,
            AuthnError::Suspended,
        ] {
            assert!(matches!(authn_error(err), ApiError::Unauthenticated));
        }
    }

    #[test]
    fn tenant_header_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(requested_tenant(&headers, &header()).unwrap(), None);

        headers.insert("x-tenant-id", HeaderValue::from_static("not-a-uuid"));
        assert!(matches!(
            requested_tenant(&headers, &header()),
            Err(ApiError::InvalidTenantHeader)
        ));

        let t = TenantId::new();
        headers.insert("x-tenant-id", HeaderValue::from_str(&t.to_string()).unwrap());
        assert_eq!(requested_tenant(&headers, &header()).unwrap(), Some(t));
    }
}
