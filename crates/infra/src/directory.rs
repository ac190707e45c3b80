//! Identity directory backed by the document store.
//!
//! Credential resolution happens before any request context exists, so lookups
//! run under [`TenantContext::system`]: global, attributed to the nil identity.

use std::collections::BTreeSet;

use async_trait::async_trait;

use pentrack_auth::{IdentityDirectory, IdentityRecord, UserAccount, UserStatus};
use pentrack_core::{AreaId, TenantContext, UserId, context};

use crate::collections::{AREA_ASSIGNMENTS, USERS};
use crate::scoping::{ScopeError, ScopedStore};
use crate::services::AssignmentRecord;
use crate::services::users::active_assignments;
use crate::store::{Query, StoreError};

#[derive(Debug, Clone)]
pub struct StoreIdentityDirectory {
    store: ScopedStore,
}

impl StoreIdentityDirectory {
    pub fn new(store: ScopedStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl IdentityDirectory for StoreIdentityDirectory {
    type Error = ScopeError;

    async fn identity(&self, id: UserId) -> Result<Option<IdentityRecord>, ScopeError> {
        let doc = context::scope(
            TenantContext::system(),
            self.store.find_by_id(USERS, crate::services::record_id(id)),
        )
        .await?;

        let Some(doc) = doc else {
            return Ok(None);
        };
        let account: UserAccount = doc.decode().map_err(ScopeError::Store)?;

        Ok(Some(IdentityRecord {
            identity: account.id,
            role: account.role,
            home_tenant_id: account.tenant_id,
            tenant_ids: account.tenant_ids,
            suspended: account.status == UserStatus::Suspended,
        }))
    }

    async fn active_area_ids(&self, id: UserId) -> Result<BTreeSet<AreaId>, ScopeError> {
        let docs = context::scope(
            TenantContext::system(),
            self.store.find(AREA_ASSIGNMENTS, Query::new(active_assignments(id))),
        )
        .await?;

        docs.iter()
            .map(|d| {
                d.decode::<AssignmentRecord>()
                    .map(|r| r.assignment.area_id)
            })
            .collect::<Result<BTreeSet<_>, StoreError>>()
            .map_err(ScopeError::Store)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use pentrack_audit::InMemoryAuditBus;
    use pentrack_auth::Role;
    use pentrack_core::TenantId;

    use super::*;
    use crate::services::{AreaService, NewArea, UserService};
    use crate::store::InMemoryDocumentStore;

    #[tokio::test]
    async fn resolves_accounts_and_only_active_areas() {
        let store = ScopedStore::new(
            Arc::new(InMemoryDocumentStore::new()),
            Arc::new(InMemoryAuditBus::new()),
        );
        let users = UserService::new(store.clone());
        let areas = AreaService::new(store.clone());
        let directory = StoreIdentityDirectory::new(store);

        let t = TenantId::new();
        let account = users
            .bootstrap(UserAccount {
                id: UserId::new(),
                tenant_id: Some(t),
                email: "viewer@x.io".into(),
                display_name: "V".into(),
                role: Role::Viewer,
                status: UserStatus::Active,
                tenant_ids: vec![],
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        let owner = pentrack_auth::Principal {
            identity: UserId::new(),
            role: Role::Owner,
            home_tenant_id: None,
            tenant_ids: vec![],
            area_ids: BTreeSet::new(),
        };
        let (kept, dropped) = context::scope(TenantContext::global(owner.identity, Some(t)), async {
            let kept = areas.create(&owner, NewArea { name: "kept".into() }).await.unwrap().id;
            let dropped = areas.create(&owner, NewArea { name: "dropped".into() }).await.unwrap().id;
            users.assign_area(&owner, account.id, kept).await.unwrap();
            users.assign_area(&owner, account.id, dropped).await.unwrap();
            users.revoke_area(&owner, account.id, dropped).await.unwrap();
            (kept, dropped)
        })
        .await;

        // No request context here: the directory establishes its own.
        let record = directory.identity(account.id).await.unwrap().unwrap();
        assert_eq!(record.role, Role::Viewer);
        assert_eq!(record.home_tenant_id, Some(t));

        let active = directory.active_area_ids(account.id).await.unwrap();
        assert!(active.contains(&kept));
        assert!(!active.contains(&dropped));
        assert!(directory.identity(UserId::new()).await.unwrap().is_none());
    }
}
