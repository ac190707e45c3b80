//! Entity services.
//!
//! Services take the resolved [`Principal`] for area decisions and rely on the
//! ambient tenant context (through [`ScopedStore`]) for tenant decisions.
//! RBAC is checked before a service is called.

pub mod areas;
pub mod findings;
pub mod projects;
pub mod users;

use std::collections::BTreeSet;

use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use pentrack_audit::SecurityEvent;
use pentrack_auth::{AuthzError, Principal, RegistrationError, ResourceAreas, check_area_access};
use pentrack_core::{AreaId, DomainError, RecordId, TenantContext, TenantId, context};

use crate::scoping::{ScopeError, ScopedStore};
use crate::store::{Document, Filter, StoreError};

pub use areas::{Area, AreaService, NewArea};
pub use findings::{Finding, FindingPatch, FindingService, FindingStatus, NewFinding, Severity};
pub use projects::{NewProject, Project, ProjectPatch, ProjectReport, ProjectService};
pub use users::{AssignmentRecord, UserService};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error(transparent)]
    Scope(#[from] ScopeError),

    #[error(transparent)]
    Forbidden(#[from] AuthzError),

    #[error("not found")]
    NotFound,

    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        ServiceError::Scope(ScopeError::Store(value))
    }
}

impl From<RegistrationError> for ServiceError {
    fn from(value: RegistrationError) -> Self {
        match value {
            RegistrationError::Forbidden(e) => ServiceError::Forbidden(e),
            RegistrationError::Invalid(e) => ServiceError::Domain(e),
            RegistrationError::MissingTenant => {
                ServiceError::Scope(ScopeError::MissingTenantContext)
            }
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Record id addressing an entity stored under a typed id.
pub(crate) fn record_id(id: impl Into<Uuid>) -> RecordId {
    RecordId::from_uuid(id.into())
}

pub(crate) fn active_context() -> ServiceResult<TenantContext> {
    context::current()
        .ok_or_else(|| ScopeError::Configuration("no tenant context".to_string()).into())
}

/// Tenant a new tenant-owned entity is created in: the context tenant (the
/// acting-as tenant for global contexts).
pub(crate) fn tenant_for_create() -> ServiceResult<TenantId> {
    active_context()?
        .tenant_id()
        .ok_or(ServiceError::Scope(ScopeError::MissingTenantContext))
}

/// Store predicate selecting resources that list any of `assigned`, through
/// either the legacy single reference or the multi-area list.
pub(crate) fn area_filter(assigned: &BTreeSet<AreaId>) -> Filter {
    let values: Vec<Value> = assigned.iter().map(|a| Value::String(a.to_string())).collect();
    Filter::Or(vec![
        Filter::In("area_id".to_string(), values.clone()),
        Filter::In("area_ids".to_string(), values),
    ])
}

/// Reject access to a loaded resource outside the principal's areas.
pub(crate) fn enforce_area(
    store: &ScopedStore,
    principal: &Principal,
    collection: &str,
    id: RecordId,
    areas: &ResourceAreas,
) -> ServiceResult<()> {
    check_area_access(principal, areas).map_err(|e| {
        tracing::warn!(
            identity = %principal.identity,
            role = %principal.role,
            collection,
            record_id = %id,
            "area access denied"
        );
        store.audit().record(SecurityEvent::AreaDenied {
            collection: collection.to_string(),
            record_id: id,
        });
        ServiceError::from(e)
    })
}

pub(crate) fn decode_all<T: serde::de::DeserializeOwned>(docs: &[Document]) -> ServiceResult<Vec<T>> {
    docs.iter()
        .map(Document::decode)
        .collect::<Result<Vec<T>, _>>()
        .map_err(Into::into)
}

pub(crate) fn non_empty(value: &str, what: &str) -> ServiceResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(format!("{what} cannot be empty")).into());
    }
    Ok(trimmed.to_string())
}
