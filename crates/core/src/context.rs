//! Request-scoped tenant context and the store that carries it.
//!
//! A [`TenantContext`] is bound to a *logical request* (a future and everything it
//! awaits), never to a thread or a process-wide variable. The binding is a tokio
//! task-local, so it survives every suspension point of the request future and is
//! invisible to any other concurrently running request.
//!
//! ```ignore
//! let ctx = TenantContext::for_tenant(identity, tenant_id);
//! context::scope(ctx, async {
//!     // every scoped store call in here sees `tenant_id`
//!     projects.list(&principal).await
//! })
//! .await;
//! ```
//!
//! Spawned tasks do **not** inherit the context implicitly. Use [`spawn`] (or
//! [`bind`] for a future that is executed elsewhere later) to carry it over; a task
//! spawned with plain `tokio::spawn` has no context and scoped calls inside it
//! fail closed.

use std::future::Future;

use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::id::{TenantId, UserId};

tokio::task_local! {
    static ACTIVE: TenantContext;
}

/// Active tenant context for one logical request.
///
/// Immutable once constructed. A non-global context always names a tenant; the
/// constructors make the "non-global without tenant" state unrepresentable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    tenant_id: Option<TenantId>,
    global: bool,
    requesting_identity: UserId,
}

impl TenantContext {
    /// Context for an identity acting inside exactly one tenant.
    pub fn for_tenant(requesting_identity: UserId, tenant_id: TenantId) -> Self {
        Self {
            tenant_id: Some(tenant_id),
            global: false,
            requesting_identity,
        }
    }

    /// Global-scope context, optionally acting as a specific tenant.
    ///
    /// Automatic tenant filtering stays inert for global contexts even when
    /// `acting_as` is set; `acting_as` only stamps records created without a tenant.
    pub fn global(requesting_identity: UserId, acting_as: Option<TenantId>) -> Self {
        Self {
            tenant_id: acting_as,
            global: true,
            requesting_identity,
        }
    }

    /// Global context for internal lookups that run before any request context
    /// exists (credential resolution).
    pub fn system() -> Self {
        Self::global(Self::system_identity(), None)
    }

    /// Identity recorded on system-originated operations.
    pub fn system_identity() -> UserId {
        UserId::from_uuid(Uuid::nil())
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn is_global(&self) -> bool {
        self.global
    }

    pub fn requesting_identity(&self) -> UserId {
        self.requesting_identity
    }
}

/// Run `fut` with `ctx` as the active context.
///
/// Scopes nest: an inner scope shadows the outer one until the inner future
/// completes, then the outer context is visible again.
pub fn scope<F>(ctx: TenantContext, fut: F) -> impl Future<Output = F::Output>
where
    F: Future,
{
    ACTIVE.scope(ctx, fut)
}

/// Run a synchronous closure with `ctx` as the active context.
pub fn sync_scope<R>(ctx: TenantContext, f: impl FnOnce() -> R) -> R {
    ACTIVE.sync_scope(ctx, f)
}

/// Snapshot of the active context, `None` outside any scope.
pub fn current() -> Option<TenantContext> {
    ACTIVE.try_with(Clone::clone).ok()
}

/// Capture the context active *now* and re-establish it when `fut` is polled.
///
/// Use for callbacks and deferred work that will be driven outside the current
/// scope (timers, emitted events, queued jobs).
pub fn bind<F>(fut: F) -> impl Future<Output = F::Output>
where
    F: Future,
{
    let captured = current();
    async move {
        match captured {
            Some(ctx) => ACTIVE.scope(ctx, fut).await,
            None => fut.await,
        }
    }
}

/// `tokio::spawn` that carries the current context into the new task.
pub fn spawn<F>(fut: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::spawn(bind(fut))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn tenant_ctx() -> (TenantId, TenantContext) {
        let tenant = TenantId::new();
        (tenant, TenantContext::for_tenant(UserId::new(), tenant))
    }

    #[tokio::test]
    async fn no_context_outside_scope() {
        assert!(current().is_none());
    }

    #[tokio::test]
    async fn context_survives_suspension_points() {
        let (tenant, ctx) = tenant_ctx();

        scope(ctx, async move {
            tokio::task::yield_now().await;
            tokio::time::sleep(Duration::from_millis(2)).await;
            assert_eq!(current().and_then(|c| c.tenant_id()), Some(tenant));
        })
        .await;

        assert!(current().is_none(), "context must not outlive its scope");
    }

    #[tokio::test]
    async fn nested_scope_shadows_then_restores() {
        let (outer_tenant, outer) = tenant_ctx();
        let (inner_tenant, inner) = tenant_ctx();

        scope(outer, async move {
            scope(inner, async move {
                assert_eq!(current().and_then(|c| c.tenant_id()), Some(inner_tenant));
            })
            .await;
            assert_eq!(current().and_then(|c| c.tenant_id()), Some(outer_tenant));
        })
        .await;
    }

    #[tokio::test]
    async fn join_fan_out_observes_same_context() {
        let (tenant, ctx) = tenant_ctx();

        scope(ctx, async move {
            let probe = || async {
                tokio::task::yield_now().await;
                current().and_then(|c| c.tenant_id())
            };
            let (a, b, c) = tokio::join!(probe(), probe(), probe());
            assert_eq!([a, b, c], [Some(tenant); 3]);
        })
        .await;
    }

    #[tokio::test]
    async fn plain_tokio_spawn_does_not_inherit() {
        let (_, ctx) = tenant_ctx();

        let seen = scope(ctx, async {
            tokio::spawn(async { current() }).await.unwrap()
        })
        .await;

        assert!(seen.is_none());
    }

    #[tokio::test]
    async fn context_spawn_carries_context() {
        let (tenant, ctx) = tenant_ctx();

        let seen = scope(ctx, async { spawn(async { current() }).await.unwrap() }).await;

        assert_eq!(seen.and_then(|c| c.tenant_id()), Some(tenant));
    }

    #[tokio::test]
    async fn bind_captures_at_call_time() {
        let (tenant, ctx) = tenant_ctx();

        let deferred = scope(ctx, async { bind(async { current() }) }).await;
        // Polled after the originating scope has ended.
        let seen = deferred.await;

        assert_eq!(seen.and_then(|c| c.tenant_id()), Some(tenant));
    }

    #[test]
    fn sync_scope_is_visible_inside_closure_only() {
        let (tenant, ctx) = tenant_ctx();
        let inside = sync_scope(ctx, || current().and_then(|c| c.tenant_id()));
        assert_eq!(inside, Some(tenant));
        assert!(current().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_requests_never_observe_each_other() {
        let mut handles = Vec::new();
        for i in 0..64u64 {
            let (tenant, ctx) = tenant_ctx();
            handles.push(tokio::spawn(scope(ctx, async move {
                for round in 0..20u64 {
                    if (i + round) % 3 == 0 {
                        tokio::time::sleep(Duration::from_micros(50)).await;
                    } else {
                        tokio::task::yield_now().await;
                    }
                    assert_eq!(current().and_then(|c| c.tenant_id()), Some(tenant));
                }
            })));
        }
        for h in handles {
            h.await.unwrap();
        }
    }

    #[test]
    fn system_context_is_global_without_tenant() {
        let ctx = TenantContext::system();
        assert!(ctx.is_global());
        assert!(ctx.tenant_id().is_none());
        assert_eq!(ctx.requesting_identity(), TenantContext::system_identity());
    }
}
