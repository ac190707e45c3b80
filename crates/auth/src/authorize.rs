use serde::Serialize;
use thiserror::Error;

use crate::{Action, Principal, Role};

use Role::{Analyst, AreaAdmin, ClientAdmin, Owner, PlatformAdmin, Viewer};

const EVERYONE: &[Role] = &[Owner, PlatformAdmin, ClientAdmin, AreaAdmin, Analyst, Viewer];
const TENANT_ADMINS: &[Role] = &[Owner, PlatformAdmin, ClientAdmin];
const GLOBAL_ADMINS: &[Role] = &[Owner, PlatformAdmin];
const OWNER_ONLY: &[Role] = &[Owner];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: role {role} may not perform '{action}'")]
    Forbidden { role: Role, action: Action },

    #[error("forbidden: role {actor} may not grant role {requested}")]
    RoleGrantDenied { actor: Role, requested: Role },

    #[error("forbidden: no assigned area covers this resource")]
    AreaDenied,

    #[error("forbidden: tenant not permitted for this identity")]
    TenantNotPermitted,
}

/// The static RBAC table: minimal set of roles permitted to perform `action`.
///
/// The match is exhaustive so adding an [`Action`] forces a policy decision.
pub fn allowed_roles(action: Action) -> &'static [Role] {
    match action {
        Action::ProjectRead | Action::FindingRead | Action::AreaRead => EVERYONE,
        Action::ProjectWrite => &[Owner, PlatformAdmin, ClientAdmin, AreaAdmin],
        Action::ProjectArchive => TENANT_ADMINS,
        Action::ProjectPurge | Action::FindingPurge => OWNER_ONLY,
        Action::FindingWrite => &[Owner, PlatformAdmin, ClientAdmin, AreaAdmin, Analyst],
        Action::AreaWrite => TENANT_ADMINS,
        Action::AreaAssign | Action::AreaRevoke => GLOBAL_ADMINS,
        Action::UserCreate => TENANT_ADMINS,
        Action::UserRead => &[Owner, PlatformAdmin, ClientAdmin, AreaAdmin],
        Action::PolicyRead => TENANT_ADMINS,
        Action::AuditRead => GLOBAL_ADMINS,
    }
}

/// Authorize a principal for an action.
///
/// - No IO
/// - No panics
/// - Pure policy check, deterministic
pub fn authorize(principal: &Principal, action: Action) -> Result<(), AuthzError> {
    if allowed_roles(action).contains(&principal.role) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden {
            role: principal.role,
            action,
        })
    }
}

/// Roles an actor may assign when creating or promoting an account.
pub fn grantable_roles(actor: Role) -> &'static [Role] {
    match actor {
        Owner => EVERYONE,
        PlatformAdmin => &[PlatformAdmin, ClientAdmin, AreaAdmin, Analyst, Viewer],
        ClientAdmin => &[Analyst, Viewer],
        AreaAdmin | Analyst | Viewer => &[],
    }
}

/// Reject (never downgrade) a role grant the actor is not entitled to make.
pub fn authorize_role_grant(actor: Role, requested: Role) -> Result<(), AuthzError> {
    if grantable_roles(actor).contains(&requested) {
        Ok(())
    } else {
        Err(AuthzError::RoleGrantDenied { actor, requested })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Authorization Explanation (Audit Trail)
// ─────────────────────────────────────────────────────────────────────────────

/// Detailed explanation of an authorization decision.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationExplanation {
    pub action: Action,
    pub role: Role,
    pub granted: bool,
    pub reason: String,
    pub allowed_roles: Vec<Role>,
}

/// Explain why `role` is (or is not) allowed to perform `action`.
pub fn explain_authorization(role: Role, action: Action) -> AuthorizationExplanation {
    let allowed = allowed_roles(action);
    let granted = allowed.contains(&role);
    let reason = if granted {
        format!("role {role} is in the allow-list for '{action}'")
    } else if action.is_irreversible() {
        format!("'{action}' is irreversible and reserved for OWNER")
    } else {
        format!("role {role} is not in the allow-list for '{action}'")
    };

    AuthorizationExplanation {
        action,
        role,
        granted,
        reason,
        allowed_roles: allowed.to_vec(),
    }
}

/// One row of the policy table, for display.
#[derive(Debug, Clone, Serialize)]
pub struct PolicyEntry {
    pub action: Action,
    pub allowed_roles: Vec<Role>,
}

/// Full policy table, in [`Action::ALL`] order.
pub fn policy_table() -> Vec<PolicyEntry> {
    Action::ALL
        .into_iter()
        .map(|action| PolicyEntry {
            action,
            allowed_roles: allowed_roles(action).to_vec(),
        })
        .collect()
}
