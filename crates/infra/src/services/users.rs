use chrono::Utc;
use serde::{Deserialize, Serialize};

use pentrack_auth::{AreaAssignment, Principal, RegisterUser, UserAccount, plan_registration};
use pentrack_core::{AreaId, DomainError, RecordId, TenantContext, TenantId, UserId, context};

use super::{ServiceError, ServiceResult, active_context, decode_all, record_id};
use crate::collections::{AREA_ASSIGNMENTS, AREAS, USERS};
use crate::scoping::{ScopeError, ScopedStore};
use crate::services::Area;
use crate::store::{Document, Filter, Query, SortOrder, StoreError};

/// Stored form of an [`AreaAssignment`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentRecord {
    pub id: RecordId,
    pub tenant_id: Option<TenantId>,
    #[serde(flatten)]
    pub assignment: AreaAssignment,
}

/// Filter selecting the active assignments of `identity`.
pub(crate) fn active_assignments(identity: UserId) -> Filter {
    Filter::equals("identity", identity.to_string()).and(Filter::equals("state", "active"))
}

#[derive(Debug, Clone)]
pub struct UserService {
    store: ScopedStore,
}

impl UserService {
    pub fn new(store: ScopedStore) -> Self {
        Self { store }
    }

    /// Register an account on behalf of `actor`.
    ///
    /// The role grant is checked before anything is read or written.
    pub async fn register(&self, actor: &Principal, request: RegisterUser) -> ServiceResult<UserAccount> {
        let ctx = active_context()?;
        let account = plan_registration(actor, &ctx, request, Utc::now())?;
        self.ensure_email_free(&account.email).await?;

        // The store's unique index closes the gap between check and insert.
        match self.store.insert(USERS, Document::encode(&account)?).await {
            Err(ScopeError::Store(StoreError::Conflict(_))) => {
                return Err(DomainError::conflict("email already registered").into());
            }
            other => other?,
        };
        tracing::info!(
            actor = %actor.identity,
            user_id = %account.id,
            role = %account.role,
            tenant_id = ?account.tenant_id,
            "user registered"
        );
        Ok(account)
    }

    /// Insert an account outside any request, e.g. the first OWNER.
    ///
    /// Runs under the system context. Existing accounts with the same email are
    /// left untouched and returned.
    pub async fn bootstrap(&self, account: UserAccount) -> ServiceResult<UserAccount> {
        let store = self.store.clone();
        context::scope(TenantContext::system(), async move {
            let existing = store
                .find_one(USERS, Filter::equals("email", account.email.clone()))
                .await?;
            if let Some(doc) = existing {
                return Ok(doc.decode()?);
            }
            store.insert(USERS, Document::encode(&account)?).await?;
            Ok(account)
        })
        .await
    }

    pub async fn list(&self, _actor: &Principal) -> ServiceResult<Vec<UserAccount>> {
        let docs = self
            .store
            .find(USERS, Query::default().sort_by("email", SortOrder::Asc))
            .await?;
        decode_all(&docs)
    }

    /// Grant `user_id` access to `area_id`. Both must be visible in the current
    /// scope and belong to the same tenant.
    pub async fn assign_area(
        &self,
        actor: &Principal,
        user_id: UserId,
        area_id: AreaId,
    ) -> ServiceResult<AreaAssignment> {
        let account: UserAccount = self
            .store
            .find_by_id(USERS, record_id(user_id))
            .await?
            .ok_or(ServiceError::NotFound)?
            .decode()?;
        let area: Area = self
            .store
            .find_by_id(AREAS, record_id(area_id))
            .await?
            .ok_or(ServiceError::NotFound)?
            .decode()?;

        if account.role.is_global() {
            return Err(DomainError::validation("global accounts are not area-restricted").into());
        }
        if area.tenant_id != account.tenant_id {
            return Err(DomainError::validation("area belongs to a different tenant than the user").into());
        }

        let current = active_assignments(user_id).and(Filter::equals("area_id", area_id.to_string()));
        if self.store.count(AREA_ASSIGNMENTS, current).await? > 0 {
            return Err(DomainError::conflict("area already assigned").into());
        }

        let record = AssignmentRecord {
            id: RecordId::new(),
            tenant_id: area.tenant_id,
            assignment: AreaAssignment::grant(user_id, area_id, actor.identity, Utc::now()),
        };
        self.store.insert(AREA_ASSIGNMENTS, Document::encode(&record)?).await?;

        tracing::info!(granted_by = %actor.identity, %user_id, %area_id, "area assigned");
        Ok(record.assignment)
    }

    /// Revoke an active assignment. The record is kept in revoked state.
    pub async fn revoke_area(
        &self,
        actor: &Principal,
        user_id: UserId,
        area_id: AreaId,
    ) -> ServiceResult<AreaAssignment> {
        let current = active_assignments(user_id).and(Filter::equals("area_id", area_id.to_string()));
        let mut record: AssignmentRecord = self
            .store
            .find_one(AREA_ASSIGNMENTS, current)
            .await?
            .ok_or(ServiceError::NotFound)?
            .decode()?;

        record.assignment.revoke(actor.identity, Utc::now())?;
        let patch = Document::encode(&record)?.body;
        self.store.update_by_id(AREA_ASSIGNMENTS, record.id, patch).await?;

        tracing::info!(revoked_by = %actor.identity, %user_id, %area_id, "area revoked");
        Ok(record.assignment)
    }

    async fn ensure_email_free(&self, email: &str) -> ServiceResult<()> {
        // Emails are unique across tenants, so the lookup runs unscoped.
        let taken = context::scope(
            TenantContext::system(),
            self.store.count(USERS, Filter::equals("email", email.to_string())),
        )
        .await?;
        if taken > 0 {
            return Err(DomainError::conflict("email already registered").into());
        }
        Ok(())
    }
}
