//! Principal resolution: bearer credential → [`Principal`].

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use pentrack_core::{AreaId, TenantId, UserId};

use crate::{JwtValidator, Principal, Role, TokenValidationError};

/// Current stored state of an identity, as seen by the resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityRecord {
    pub identity: UserId,
    pub role: Role,
    pub home_tenant_id: Option<TenantId>,
    pub tenant_ids: Vec<TenantId>,
    pub suspended: bool,
}

/// Read-only lookup of identities and their active area assignments.
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn identity(&self, id: UserId) -> Result<Option<IdentityRecord>, Self::Error>;

    /// Area ids from assignments that are still active.
    async fn active_area_ids(&self, id: UserId) -> Result<BTreeSet<AreaId>, Self::Error>;
}

#[derive(Debug, Error)]
pub enum AuthnError {
    #[error("unauthenticated: {0}")]
    InvalidToken(#[from] TokenValidationError),

    #[error("unauthenticated: unknown identity")]
    UnknownIdentity,

    #[error("unauthenticated: identity suspended")]
    Suspended,

    #[error("identity directory unavailable: {0}")]
    Directory(String),
}

/// Validates credentials and loads the identity's current role, tenants and areas.
pub struct PrincipalResolver<D> {
    validator: Arc<dyn JwtValidator>,
    directory: D,
}

impl<D> PrincipalResolver<D>
where
    D: IdentityDirectory,
{
    pub fn new(validator: Arc<dyn JwtValidator>, directory: D) -> Self {
        Self { validator, directory }
    }

    /// Resolve a bearer token.
    ///
    /// Role and assignment data come from the directory at call time, so a
    /// demotion or revocation applies on the very next request.
    #[tracing::instrument(skip_all, err(level = "debug"))]
    pub async fn resolve(&self, token: &str, now: DateTime<Utc>) -> Result<Principal, AuthnError> {
        let claims = self.validator.validate(token, now)?;

        let record = self
            .directory
            .identity(claims.sub)
            .await
            .map_err(|e| AuthnError::Directory(e.to_string()))?
            .ok_or(AuthnError::UnknownIdentity)?;

        if record.suspended {
            return Err(AuthnError::Suspended);
        }

        let area_ids = self
            .directory
            .active_area_ids(record.identity)
            .await
            .map_err(|e| AuthnError::Directory(e.to_string()))?;

        Ok(Principal {
            identity: record.identity,
            role: record.role,
            home_tenant_id: record.home_tenant_id,
            tenant_ids: record.tenant_ids,
            area_ids,
        })
    }
}
