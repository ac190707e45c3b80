//! Tenant isolation under concurrency, through the public infra API.
//!
//! Many logical requests run at once on a multi-threaded runtime, each bound
//! to its own tenant, against a store that sleeps on every call so requests
//! interleave at every suspension point.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use pentrack_audit::InMemoryAuditBus;
use pentrack_auth::{Principal, Role};
use pentrack_core::{RecordId, TenantContext, TenantId, UserId, context};
use pentrack_infra::services::{
    FindingService, NewFinding, NewProject, ProjectService, ServiceError, Severity,
};
use pentrack_infra::{InMemoryDocumentStore, Query, ScopeError, ScopedStore};

const TENANTS: usize = 32;
const PROJECTS_PER_TENANT: usize = 3;

struct World {
    store: ScopedStore,
    projects: ProjectService,
    findings: FindingService,
}

fn world(latency: Duration) -> World {
    let store = ScopedStore::new(
        Arc::new(InMemoryDocumentStore::with_latency(latency)),
        Arc::new(InMemoryAuditBus::new()),
    );
    let projects = ProjectService::new(store.clone());
    let findings = FindingService::new(store.clone(), projects.clone());
    World {
        store,
        projects,
        findings,
    }
}

fn admin(tenant: TenantId) -> Principal {
    Principal {
        identity: UserId::new(),
        role: Role::ClientAdmin,
        home_tenant_id: Some(tenant),
        tenant_ids: vec![],
        area_ids: BTreeSet::new(),
    }
}

fn request_ctx(p: &Principal) -> TenantContext {
    match p.home_tenant_id {
        Some(t) => TenantContext::for_tenant(p.identity, t),
        None => TenantContext::global(p.identity, None),
    }
}

async fn seed(w: &World, p: &Principal) -> Vec<RecordId> {
    let mut ids = Vec::new();
    context::scope(request_ctx(p), async {
        for i in 0..PROJECTS_PER_TENANT {
            let project = w
                .projects
                .create(p, NewProject { name: format!("project-{i}"), area_ids: vec![] })
                .await
                .unwrap();
            w.findings
                .create(
                    p,
                    NewFinding { project_id: project.id, title: format!("finding-{i}"), severity: Severity::Medium },
                )
                .await
                .unwrap();
            ids.push(project.id);
        }
    })
    .await;
    ids
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_requests_stay_in_their_own_tenant() {
    let w = Arc::new(world(Duration::from_millis(1)));
    let principals: Vec<Principal> = (0..TENANTS).map(|_| admin(TenantId::new())).collect();
    for p in &principals {
        seed(&w, p).await;
    }

    let mut handles = Vec::new();
    for p in principals.iter().cloned() {
        let w = w.clone();
        let ctx = request_ctx(&p);
        handles.push(tokio::spawn(context::scope(ctx, async move {
            let tenant = p.home_tenant_id.unwrap();
            for _ in 0..5 {
                // Fan out inside the request; both branches share its context.
                let (projects, findings) = tokio::join!(w.projects.list(&p, true), w.findings.list(&p, None));
                let projects = projects.unwrap();
                let findings = findings.unwrap();
                assert_eq!(projects.len(), PROJECTS_PER_TENANT);
                assert_eq!(findings.len(), PROJECTS_PER_TENANT);
                assert!(projects.iter().all(|x| x.tenant_id == Some(tenant)));
                assert!(findings.iter().all(|x| x.tenant_id == Some(tenant)));

                // Work handed to a new task keeps the request's tenant.
                let w2 = w.clone();
                let seen = context::spawn(async move { context::current().and_then(|c| c.tenant_id()) })
                    .await
                    .unwrap();
                assert_eq!(seen, Some(tenant));
                let raw = context::spawn(async move { w2.store.find("projects", Query::default()).await })
                    .await
                    .unwrap()
                    .unwrap();
                assert!(raw.iter().all(|d| d.tenant_id == Some(tenant)));

                tokio::task::yield_now().await;
            }
        })));
    }

    for h in handles {
        h.await.unwrap();
    }
}

#[tokio::test]
async fn records_of_one_tenant_are_unreachable_from_another() {
    let w = world(Duration::ZERO);
    let t1 = admin(TenantId::new());
    let t2 = admin(TenantId::new());
    let ids = seed(&w, &t1).await;

    context::scope(request_ctx(&t2), async {
        assert!(w.projects.list(&t2, true).await.unwrap().is_empty());
        assert!(w.findings.list(&t2, None).await.unwrap().is_empty());
        for id in &ids {
            assert_eq!(w.projects.get(&t2, *id).await.unwrap_err(), ServiceError::NotFound);
            assert_eq!(w.projects.archive(&t2, *id).await.unwrap_err(), ServiceError::NotFound);
            assert_eq!(w.projects.purge(&t2, *id).await.unwrap_err(), ServiceError::NotFound);
        }
    })
    .await;

    // Still intact for the owner tenant.
    let remaining = context::scope(request_ctx(&t1), w.projects.list(&t1, false)).await.unwrap();
    assert_eq!(remaining.len(), PROJECTS_PER_TENANT);
}

#[tokio::test]
async fn plain_spawn_fails_closed() {
    let w = Arc::new(world(Duration::ZERO));
    let p = admin(TenantId::new());
    seed(&w, &p).await;

    let w2 = w.clone();
    let leaked = context::scope(request_ctx(&p), async move {
        tokio::spawn(async move { w2.store.find("projects", Query::default()).await })
            .await
            .unwrap()
    })
    .await;
    assert_eq!(leaked.unwrap_err(), ScopeError::Configuration("no tenant context".into()));
}

#[tokio::test]
async fn global_sees_everything_and_override_stamps_writes() {
    let w = world(Duration::ZERO);
    let (a, b) = (admin(TenantId::new()), admin(TenantId::new()));
    seed(&w, &a).await;
    seed(&w, &b).await;

    let owner = Principal {
        identity: UserId::new(),
        role: Role::Owner,
        home_tenant_id: None,
        tenant_ids: vec![],
        area_ids: BTreeSet::new(),
    };

    let all = context::scope(TenantContext::global(owner.identity, None), w.projects.list(&owner, true))
        .await
        .unwrap();
    assert_eq!(all.len(), 2 * PROJECTS_PER_TENANT);

    let target = b.home_tenant_id.unwrap();
    let created = context::scope(
        TenantContext::global(owner.identity, Some(target)),
        w.projects.create(&owner, NewProject { name: "by-owner".into(), area_ids: vec![] }),
    )
    .await
    .unwrap();
    assert_eq!(created.tenant_id, Some(target));

    // Unfiltered reads stay global even with the override set.
    let all = context::scope(TenantContext::global(owner.identity, Some(target)), w.projects.list(&owner, true))
        .await
        .unwrap();
    assert_eq!(all.len(), 2 * PROJECTS_PER_TENANT + 1);
}
