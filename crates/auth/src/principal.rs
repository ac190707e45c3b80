use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use pentrack_core::{AreaId, TenantId, UserId};

use crate::Role;

/// A fully resolved, authenticated identity for one request.
///
/// Built by the [`PrincipalResolver`](crate::PrincipalResolver) from the stored
/// identity record, never from token claims. Immutable for the request lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub identity: UserId,
    pub role: Role,
    /// Absent for global roles.
    pub home_tenant_id: Option<TenantId>,
    /// Additional tenants the identity belongs to (may include the home tenant).
    pub tenant_ids: Vec<TenantId>,
    /// Active (non-revoked) area assignments.
    pub area_ids: BTreeSet<AreaId>,
}

impl Principal {
    pub fn is_global(&self) -> bool {
        self.role.is_global()
    }

    /// Whether the identity is a member of `tenant_id` (home tenant or tenant set).
    pub fn belongs_to(&self, tenant_id: TenantId) -> bool {
        self.home_tenant_id == Some(tenant_id) || self.tenant_ids.contains(&tenant_id)
    }

    /// Default tenant for a non-global identity: the home tenant, then the first
    /// entry of the tenant set.
    pub fn default_tenant(&self) -> Option<TenantId> {
        self.home_tenant_id.or_else(|| self.tenant_ids.first().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyst(home: Option<TenantId>, others: Vec<TenantId>) -> Principal {
        Principal {
            identity: UserId::new(),
            role: Role::Analyst,
            home_tenant_id: home,
            tenant_ids: others,
            area_ids: BTreeSet::new(),
        }
    }

    #[test]
    fn default_tenant_prefers_home() {
        let home = TenantId::new();
        let other = TenantId::new();
        assert_eq!(analyst(Some(home), vec![other]).default_tenant(), Some(home));
        assert_eq!(analyst(None, vec![other]).default_tenant(), Some(other));
        assert_eq!(analyst(None, vec![]).default_tenant(), None);
    }

    #[test]
    fn membership_covers_home_and_set() {
        let home = TenantId::new();
        let other = TenantId::new();
        let p = analyst(Some(home), vec![other]);
        assert!(p.belongs_to(home));
        assert!(p.belongs_to(other));
        assert!(!p.belongs_to(TenantId::new()));
    }
}
