//! Area isolation: the second, coarser access dimension inside a tenant.
//!
//! Unlike tenant scoping this is not applied by the store. Entity services call
//! [`check_area_access`] on id-based access and use [`area_restriction`] to narrow
//! list queries.

use std::collections::BTreeSet;

use pentrack_core::AreaId;

use crate::{AuthzError, Principal};

/// Areas a resource belongs to.
///
/// A resource may carry a legacy single-area reference, a multi-area list, or
/// both; membership is the union of the two.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceAreas {
    pub legacy: Option<AreaId>,
    pub list: Vec<AreaId>,
}

impl ResourceAreas {
    pub fn new(legacy: Option<AreaId>, list: Vec<AreaId>) -> Self {
        Self { legacy, list }
    }

    pub fn iter(&self) -> impl Iterator<Item = &AreaId> {
        self.legacy.iter().chain(self.list.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.legacy.is_none() && self.list.is_empty()
    }

    pub fn intersects(&self, assigned: &BTreeSet<AreaId>) -> bool {
        self.iter().any(|a| assigned.contains(a))
    }
}

/// Area restriction to apply when listing, if any.
///
/// `None` means the principal is unrestricted within its tenant scope.
/// `Some(set)` means only resources intersecting `set` are visible; an empty set
/// means nothing is visible.
pub fn area_restriction(principal: &Principal) -> Option<&BTreeSet<AreaId>> {
    principal
        .role
        .is_area_restricted()
        .then_some(&principal.area_ids)
}

/// Check id-based access to a resource with the given areas.
pub fn check_area_access(principal: &Principal, resource: &ResourceAreas) -> Result<(), AuthzError> {
    match area_restriction(principal) {
        None => Ok(()),
        Some(assigned) if resource.intersects(assigned) => Ok(()),
        Some(_) => Err(AuthzError::AreaDenied),
    }
}

#[cfg(test)]
mod tests {
    use pentrack_core::{TenantId, UserId};
    use proptest::prelude::*;

    use super::*;
    use crate::Role;

    fn principal(role: Role, areas: BTreeSet<AreaId>) -> Principal {
        Principal {
            identity: UserId::new(),
            role,
            home_tenant_id: Some(TenantId::new()),
            tenant_ids: vec![],
            area_ids: areas,
        }
    }

    /// Small fixed universe so random subsets overlap often.
    fn universe() -> Vec<AreaId> {
        (0..6).map(|_| AreaId::new()).collect()
    }

    #[test]
    fn analyst_outside_assigned_area_is_forbidden() {
        let u = universe();
        let p = principal(Role::Analyst, BTreeSet::from([u[0]]));
        let resource = ResourceAreas::new(None, vec![u[1], u[2]]);
        assert_eq!(check_area_access(&p, &resource), Err(AuthzError::AreaDenied));
    }

    #[test]
    fn legacy_single_area_is_honoured() {
        let u = universe();
        let p = principal(Role::Viewer, BTreeSet::from([u[3]]));
        let resource = ResourceAreas::new(Some(u[3]), vec![]);
        assert!(check_area_access(&p, &resource).is_ok());
    }

    #[test]
    fn client_admin_is_unrestricted() {
        let p = principal(Role::ClientAdmin, BTreeSet::new());
        let resource = ResourceAreas::new(None, vec![AreaId::new()]);
        assert!(check_area_access(&p, &resource).is_ok());
        assert!(area_restriction(&p).is_none());
    }

    #[test]
    fn empty_assignment_sees_nothing() {
        let p = principal(Role::AreaAdmin, BTreeSet::new());
        assert!(check_area_access(&p, &ResourceAreas::default()).is_err());
        assert_eq!(area_restriction(&p).map(BTreeSet::len), Some(0));
    }

    proptest! {
        #[test]
        fn access_iff_intersection_non_empty(
            assigned_mask in 0u8..64,
            legacy_idx in proptest::option::of(0usize..6),
            list_mask in 0u8..64,
            role in prop::sample::select(vec![Role::AreaAdmin, Role::Analyst, Role::Viewer]),
        ) {
            let u = universe();
            let pick = |mask: u8| -> Vec<AreaId> {
                u.iter().enumerate().filter(|(i, _)| mask & (1 << i) != 0).map(|(_, a)| *a).collect()
            };
            let assigned: BTreeSet<AreaId> = pick(assigned_mask).into_iter().collect();
            let resource = ResourceAreas::new(legacy_idx.map(|i| u[i]), pick(list_mask));

            let expected = resource.iter().any(|a| assigned.contains(a));
            let p = principal(role, assigned.clone());
            prop_assert_eq!(check_area_access(&p, &resource).is_ok(), expected);
            if assigned.is_empty() {
                prop_assert!(check_area_access(&p, &resource).is_err());
            }
        }
    }
}
