//! Request context: the authenticated principal and the tenant context derived
//! from it.

use thiserror::Error;

use pentrack_auth::Principal;
use pentrack_core::{TenantContext, TenantId};

/// Principal attached to an authenticated request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal: Principal,
}

impl PrincipalContext {
    pub fn new(principal: Principal) -> Self {
        Self { principal }
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn into_principal(self) -> Principal {
        self.principal
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ContextError {
    #[error("missing tenant context")]
    MissingTenant,

    #[error("tenant {requested} is not permitted for this identity")]
    TenantNotPermitted { requested: TenantId },
}

/// Compute the tenant context for `principal`.
///
/// - Global roles get a global context; `requested` only sets the acting tenant.
/// - Other roles resolve the tenant from `requested` (which must be one of
///   their own), then the home tenant, then the first of their tenant set.
pub fn establish(principal: &Principal, requested: Option<TenantId>) -> Result<TenantContext, ContextError> {
    if principal.is_global() {
        return Ok(TenantContext::global(principal.identity, requested));
    }

    let tenant_id = match requested {
        Some(t) if principal.belongs_to(t) => t,
        Some(t) => return Err(ContextError::TenantNotPermitted { requested: t }),
        None => principal.default_tenant().ok_or(ContextError::MissingTenant)?,
    };

    Ok(TenantContext::for_tenant(principal.identity, tenant_id))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use pentrack_auth::Role;
    use pentrack_core::UserId;

    use super::*;

    fn principal(role: Role, home: Option<TenantId>, tenants: Vec<TenantId>) -> Principal {
        Principal {
            identity: UserId::new(),
            role,
            home_tenant_id: home,
            tenant_ids: tenants,
            area_ids: BTreeSet::new(),
        }
    }

    #[test]
    fn global_roles_are_global_with_optional_acting_tenant() {
        let owner = principal(Role::Owner, None, vec![]);
        let ctx = establish(&owner, None).unwrap();
        assert!(ctx.is_global());
        assert_eq!(ctx.tenant_id(), None);

        let b = TenantId::new();
        let ctx = establish(&owner, Some(b)).unwrap();
        assert!(ctx.is_global());
        assert_eq!(ctx.tenant_id(), Some(b));
    }

    #[test]
    fn non_global_resolution_order() {
        let (home, extra) = (TenantId::new(), TenantId::new());
        let p = principal(Role::Analyst, Some(home), vec![extra]);

        assert_eq!(establish(&p, None).unwrap().tenant_id(), Some(home));
        assert_eq!(establish(&p, Some(extra)).unwrap().tenant_id(), Some(extra));

        let only_set = principal(Role::Viewer, None, vec![extra]);
        assert_eq!(establish(&only_set, None).unwrap().tenant_id(), Some(extra));
    }

    #[test]
    fn non_global_without_tenant_fails_closed() {
        let p = principal(Role::ClientAdmin, None, vec![]);
        assert_eq!(establish(&p, None), Err(ContextError::MissingTenant));
    }

    #[test]
    fn non_global_cannot_select_foreign_tenant() {
        let p = principal(Role::ClientAdmin, Some(TenantId::new()), vec![]);
        let foreign = TenantId::new();
        assert_eq!(
            establish(&p, Some(foreign)),
            Err(ContextError::TenantNotPermitted { requested: foreign })
        );
    }
}
