use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use pentrack_core::{TenantId, UserId, context};

use crate::SecurityEvent;

/// Envelope for a security event, carrying who/where metadata.
///
/// `identity` and `tenant_id` are taken from the active tenant context at the
/// moment the event is observed; both are `None` when no context is active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEnvelope {
    event_id: Uuid,
    occurred_at: DateTime<Utc>,
    identity: Option<UserId>,
    tenant_id: Option<TenantId>,
    global_scope: bool,
    event: SecurityEvent,
}

impl AuditEnvelope {
    /// Wrap `event` with the metadata of the currently active context.
    pub fn observe(event: SecurityEvent) -> Self {
        let ctx = context::current();
        Self {
            event_id: Uuid::now_v7(),
            occurred_at: Utc::now(),
            identity: ctx.as_ref().map(|c| c.requesting_identity()),
            tenant_id: ctx.as_ref().and_then(|c| c.tenant_id()),
            global_scope: ctx.as_ref().is_some_and(|c| c.is_global()),
            event,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn identity(&self) -> Option<UserId> {
        self.identity
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn is_global_scope(&self) -> bool {
        self.global_scope
    }

    pub fn event(&self) -> &SecurityEvent {
        &self.event
    }
}

#[cfg(test)]
mod tests {
    use pentrack_core::{RecordId, TenantContext};

    use super::*;

    #[test]
    fn observe_captures_active_context() {
        let tenant = TenantId::new();
        let identity = UserId::new();
        let event = SecurityEvent::AreaDenied {
            collection: "projects".to_string(),
            record_id: RecordId::new(),
        };

        let env = context::sync_scope(TenantContext::for_tenant(identity, tenant), || {
            AuditEnvelope::observe(event.clone())
        });

        assert_eq!(env.identity(), Some(identity));
        assert_eq!(env.tenant_id(), Some(tenant));
        assert!(!env.is_global_scope());
        assert_eq!(env.event(), &event);
    }

    #[test]
    fn observe_outside_context_has_no_identity() {
        let env = AuditEnvelope::observe(SecurityEvent::ScopingFailure {
            collection: "findings".to_string(),
            reason: "no tenant context".to_string(),
        });
        assert!(env.identity().is_none());
        assert!(env.tenant_id().is_none());
    }

    #[test]
    fn serializes_event_kind_tag() {
        let env = AuditEnvelope::observe(SecurityEvent::TenantOverrideRejected {
            requested_tenant: TenantId::new(),
        });
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["event"]["kind"], "tenant_override_rejected");
    }
}
