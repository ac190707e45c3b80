use serde::{Deserialize, Serialize};

use pentrack_core::{RecordId, TenantId};

/// How loudly an event must be treated.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Critical,
}

/// A security-relevant failure observed by the tenancy core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SecurityEvent {
    /// A read returned a record whose tenant differs from the active context.
    /// Always a bug in scoping upstream.
    TenantIsolationViolation {
        collection: String,
        record_id: RecordId,
        expected_tenant: Option<TenantId>,
        found_tenant: TenantId,
    },

    /// RBAC allow-list denial (including forbidden role grants).
    RbacDenied {
        role: String,
        action: String,
        reason: String,
    },

    /// Area intersection was empty.
    AreaDenied { collection: String, record_id: RecordId },

    /// A non-global identity asked to act as a tenant it does not belong to.
    TenantOverrideRejected { requested_tenant: TenantId },

    /// A tenant-scoped operation ran without the context it requires.
    ScopingFailure { collection: String, reason: String },
}

impl SecurityEvent {
    pub fn severity(&self) -> Severity {
        match self {
            SecurityEvent::TenantIsolationViolation { .. } => Severity::Critical,
            SecurityEvent::RbacDenied { .. }
            | SecurityEvent::AreaDenied { .. }
            | SecurityEvent::TenantOverrideRejected { .. }
            | SecurityEvent::ScopingFailure { .. } => Severity::Warning,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SecurityEvent::TenantIsolationViolation { .. } => "tenant_isolation_violation",
            SecurityEvent::RbacDenied { .. } => "rbac_denied",
            SecurityEvent::AreaDenied { .. } => "area_denied",
            SecurityEvent::TenantOverrideRejected { .. } => "tenant_override_rejected",
            SecurityEvent::ScopingFailure { .. } => "scoping_failure",
        }
    }
}
