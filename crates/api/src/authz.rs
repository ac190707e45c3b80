//! Route-level authorization.
//!
//! Handlers take an [`Authorized<A>`] argument naming the action they perform;
//! extraction fails with 403 before the handler body runs.

use std::marker::PhantomData;
use std::sync::Arc;

use axum::{extract::FromRequestParts, http::request::Parts};

use pentrack_audit::{AuditSink, SecurityEvent};
use pentrack_auth::{Action, Principal, authorize};

use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

/// Marker type binding a route to one [`Action`].
pub trait GuardedAction: Send + Sync + 'static {
    const ACTION: Action;
}

macro_rules! guarded_actions {
    ($($name:ident),* $(,)?) => {
        $(
            pub struct $name;

            impl GuardedAction for $name {
                const ACTION: Action = Action::$name;
            }
        )*
    };
}

pub mod action {
    use super::{Action, GuardedAction};

    guarded_actions!(
        ProjectRead,
        ProjectWrite,
        ProjectArchive,
        ProjectPurge,
        FindingRead,
        FindingWrite,
        FindingPurge,
        AreaRead,
        AreaWrite,
        AreaAssign,
        AreaRevoke,
        UserCreate,
        UserRead,
        PolicyRead,
        AuditRead,
    );
}

/// The request principal, proven to be allowed to perform `A`.
pub struct Authorized<A> {
    pub principal: Principal,
    _action: PhantomData<fn() -> A>,
}

#[axum::async_trait]
impl<S, A> FromRequestParts<S> for Authorized<A>
where
    S: Send + Sync,
    A: GuardedAction,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let principal = parts
            .extensions
            .get::<PrincipalContext>()
            .map(|p| p.principal().clone())
            .ok_or(ApiError::Unauthenticated)?;

        if let Err(e) = authorize(&principal, A::ACTION) {
            tracing::warn!(
                identity = %principal.identity,
                role = %principal.role,
                action = A::ACTION.as_str(),
                "rbac denied"
            );
            if let Some(services) = parts.extensions.get::<Arc<AppServices>>() {
                services.audit.record(SecurityEvent::RbacDenied {
                    role: principal.role.to_string(),
                    action: A::ACTION.as_str().to_string(),
                    reason: e.to_string(),
                });
            }
            return Err(e.into());
        }

        Ok(Self {
            principal,
            _action: PhantomData,
        })
    }
}
