//! User accounts and area assignments.
//!
//! This module holds the pure rules for account registration (privilege
//! escalation prevention, tenant stamping) and the area-assignment lifecycle.
//! Persistence lives in the infra layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use pentrack_core::{AreaId, DomainError, TenantContext, TenantId, UserId};

use crate::{AuthzError, Principal, Role, authorize_role_grant};

// ─────────────────────────────────────────────────────────────────────────────
// User Account
// ─────────────────────────────────────────────────────────────────────────────

/// User account status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    /// User is active and can authenticate.
    #[default]
    Active,
    /// User is suspended and cannot authenticate.
    Suspended,
}

/// Stored user account.
///
/// # Invariants
/// - Global roles (OWNER, PLATFORM_ADMIN) have no tenant.
/// - Every other role has exactly one home tenant, fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: UserId,
    pub tenant_id: Option<TenantId>,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub status: UserStatus,
    #[serde(default)]
    pub tenant_ids: Vec<TenantId>,
    pub created_at: DateTime<Utc>,
}

/// Registration request as submitted by an administrator.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterUser {
    pub email: String,
    pub display_name: String,
    pub role: Role,
    /// Honoured only for global actors; non-global actors always stamp their own
    /// tenant.
    #[serde(default)]
    pub tenant_id: Option<TenantId>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    #[error(transparent)]
    Forbidden(#[from] AuthzError),

    #[error(transparent)]
    Invalid(#[from] DomainError),

    #[error("missing tenant context")]
    MissingTenant,
}

/// Turn a registration request into the account to persist.
///
/// Checks run before anything is built, so a rejected request has no effect.
pub fn plan_registration(
    actor: &Principal,
    ctx: &TenantContext,
    request: RegisterUser,
    now: DateTime<Utc>,
) -> Result<UserAccount, RegistrationError> {
    authorize_role_grant(actor.role, request.role)?;

    let email = request.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(DomainError::validation("invalid email format").into());
    }
    let display_name = request.display_name.trim().to_string();
    if display_name.is_empty() {
        return Err(DomainError::validation("display name cannot be empty").into());
    }

    let tenant_id = if request.role.is_global() {
        None
    } else if ctx.is_global() {
        Some(
            request
                .tenant_id
                .or(ctx.tenant_id())
                .ok_or(RegistrationError::MissingTenant)?,
        )
    } else {
        if let Some(requested) = request.tenant_id.filter(|t| Some(*t) != ctx.tenant_id()) {
            tracing::warn!(
                actor = %actor.identity,
                requested_tenant = %requested,
                "registration body named a foreign tenant; stamping actor tenant"
            );
        }
        Some(ctx.tenant_id().ok_or(RegistrationError::MissingTenant)?)
    };

    Ok(UserAccount {
        id: UserId::new(),
        tenant_id,
        email,
        display_name,
        role: request.role,
        status: UserStatus::Active,
        tenant_ids: Vec::new(),
        created_at: now,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Area Assignment
// ─────────────────────────────────────────────────────────────────────────────

/// Lifecycle state of an area assignment. Revocation never deletes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AssignmentState {
    Active,
    Revoked {
        revoked_by: UserId,
        revoked_at: DateTime<Utc>,
    },
}

/// One identity ↔ area grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaAssignment {
    pub identity: UserId,
    pub area_id: AreaId,
    pub granted_by: UserId,
    pub granted_at: DateTime<Utc>,
    #[serde(flatten)]
    pub state: AssignmentState,
}

impl AreaAssignment {
    pub fn grant(identity: UserId, area_id: AreaId, granted_by: UserId, now: DateTime<Utc>) -> Self {
        Self {
            identity,
            area_id,
            granted_by,
            granted_at: now,
            state: AssignmentState::Active,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state == AssignmentState::Active
    }

    /// Mark the assignment revoked. Revoking twice is a conflict so the original
    /// revocation record is preserved.
    pub fn revoke(&mut self, revoked_by: UserId, now: DateTime<Utc>) -> Result<(), DomainError> {
        if !self.is_active() {
            return Err(DomainError::conflict("assignment already revoked"));
        }
        self.state = AssignmentState::Revoked {
            revoked_by,
            revoked_at: now,
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    fn actor(role: Role, tenant: Option<TenantId>) -> Principal {
        Principal {
            identity: UserId::new(),
            role,
            home_tenant_id: tenant,
            tenant_ids: vec![],
            area_ids: BTreeSet::new(),
        }
    }

    fn request(role: Role, tenant_id: Option<TenantId>) -> RegisterUser {
        RegisterUser {
            email: " New.User@Example.com ".to_string(),
            display_name: "New User".to_string(),
            role,
            tenant_id,
        }
    }

    #[test]
    fn client_admin_registration_forces_own_tenant() {
        let tenant_a = TenantId::new();
        let tenant_b = TenantId::new();
        let admin = actor(Role::ClientAdmin, Some(tenant_a));
        let ctx = TenantContext::for_tenant(admin.identity, tenant_a);

        let account =
            plan_registration(&admin, &ctx, request(Role::Analyst, Some(tenant_b)), now()).unwrap();

        assert_eq!(account.tenant_id, Some(tenant_a));
        assert_eq!(account.email, "new.user@example.com");
        assert_eq!(account.role, Role::Analyst);
    }

    #[test]
    fn client_admin_cannot_register_admin_tier() {
        let tenant = TenantId::new();
        let admin = actor(Role::ClientAdmin, Some(tenant));
        let ctx = TenantContext::for_tenant(admin.identity, tenant);

        for role in [Role::ClientAdmin, Role::AreaAdmin, Role::Owner, Role::PlatformAdmin] {
            let err = plan_registration(&admin, &ctx, request(role, None), now()).unwrap_err();
            assert!(matches!(err, RegistrationError::Forbidden(AuthzError::RoleGrantDenied { .. })));
        }
    }

    #[test]
    fn global_actor_uses_body_then_override_tenant() {
        let owner = actor(Role::Owner, None);
        let body_tenant = TenantId::new();
        let override_tenant = TenantId::new();

        let ctx = TenantContext::global(owner.identity, Some(override_tenant));
        let with_body =
            plan_registration(&owner, &ctx, request(Role::ClientAdmin, Some(body_tenant)), now())
                .unwrap();
        assert_eq!(with_body.tenant_id, Some(body_tenant));

        let without_body =
            plan_registration(&owner, &ctx, request(Role::ClientAdmin, None), now()).unwrap();
        assert_eq!(without_body.tenant_id, Some(override_tenant));
    }

    #[test]
    fn global_actor_without_any_tenant_fails_for_tenant_role() {
        let owner = actor(Role::Owner, None);
        let ctx = TenantContext::global(owner.identity, None);
        let err = plan_registration(&owner, &ctx, request(Role::Viewer, None), now()).unwrap_err();
        assert_eq!(err, RegistrationError::MissingTenant);
    }

    #[test]
    fn global_roles_are_created_without_tenant() {
        let owner = actor(Role::Owner, None);
        let ctx = TenantContext::global(owner.identity, Some(TenantId::new()));
        let account =
            plan_registration(&owner, &ctx, request(Role::PlatformAdmin, None), now()).unwrap();
        assert_eq!(account.tenant_id, None);
    }

    #[test]
    fn invalid_email_rejected() {
        let owner = actor(Role::Owner, None);
        let ctx = TenantContext::global(owner.identity, None);
        let mut req = request(Role::Owner, None);
        req.email = "nope".to_string();
        assert!(matches!(
            plan_registration(&owner, &ctx, req, now()),
            Err(RegistrationError::Invalid(DomainError::Validation(_)))
        ));
    }

    #[test]
    fn revocation_is_a_state_change_and_keeps_history() {
        let owner = UserId::new();
        let mut a = AreaAssignment::grant(UserId::new(), AreaId::new(), owner, now());
        assert!(a.is_active());

        a.revoke(owner, now()).unwrap();
        assert!(!a.is_active());
        assert_eq!(a.granted_by, owner);
        assert!(matches!(a.state, AssignmentState::Revoked { revoked_by, .. } if revoked_by == owner));

        assert!(matches!(a.revoke(owner, now()), Err(DomainError::Conflict(_))));
    }

    #[test]
    fn assignment_serializes_flat_state() {
        let a = AreaAssignment::grant(UserId::new(), AreaId::new(), UserId::new(), now());
        let json = serde_json::to_value(&a).unwrap();
        assert_eq!(json["state"], "active");
    }
}
