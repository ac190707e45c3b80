//! Query Scoping Interceptor.
//!
//! [`ScopedStore`] is the only persistence handle entity services get. Every call
//! against a tenant-scoped collection reads the active [`TenantContext`] from the
//! task-local context store and rewrites the operation before it reaches the
//! raw [`DocumentStore`]:
//!
//! | Context | Reads / updates / deletes | Inserts |
//! |---------|---------------------------|---------|
//! | none | fail closed (`Configuration`) | fail closed |
//! | global | untouched | stamped with the acting-as tenant, if any |
//! | tenant `T` | `tenant_id = T` conjoined | stamped with `T`; foreign tenant rejected |
//!
//! Reads are then re-checked by the post-fetch invariant
//! ([`crate::invariant::check_documents`]).

use std::sync::Arc;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{Span, instrument};

use pentrack_audit::{AuditSink, SecurityEvent};
use pentrack_core::{RecordId, TenantContext, TenantId, context};

use crate::collections::CollectionRegistry;
use crate::invariant::{IsolationViolation, check_documents};
use crate::pipeline::{Pipeline, Row, Stage, apply_local, attach, join_keys};
use crate::store::{
    Document, DocumentStore, Filter, ID_FIELD, Query, StoreError, TENANT_FIELD, tenant_value,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScopeError {
    /// Scoped operation attempted with no context in the store.
    #[error("scoping configuration error: {0}")]
    Configuration(String),

    #[error("missing tenant context")]
    MissingTenantContext,

    #[error(transparent)]
    IsolationViolation(#[from] IsolationViolation),

    #[error("cross-tenant write rejected (record names tenant {requested})")]
    CrossTenantWrite { requested: TenantId },

    #[error("field '{0}' is immutable")]
    ImmutableField(&'static str),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// How a single operation is scoped.
enum Scope {
    Unscoped,
    Global(TenantContext),
    Tenant(TenantContext, TenantId),
}

/// Tenant-scoping façade over a [`DocumentStore`].
///
/// Cheap to clone; clones share the underlying store and audit sink.
#[derive(Clone)]
pub struct ScopedStore {
    inner: Arc<dyn DocumentStore>,
    registry: Arc<CollectionRegistry>,
    audit: Arc<dyn AuditSink>,
}

impl ScopedStore {
    pub fn new(inner: Arc<dyn DocumentStore>, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            inner,
            registry: Arc::new(CollectionRegistry::default()),
            audit,
        }
    }

    pub fn with_registry(mut self, registry: CollectionRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    pub fn audit(&self) -> &Arc<dyn AuditSink> {
        &self.audit
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────────

    #[instrument(
        skip_all,
        fields(collection = %collection, tenant_id = tracing::field::Empty, global = tracing::field::Empty),
        err(level = "debug")
    )]
    pub async fn find(&self, collection: &str, query: Query) -> Result<Vec<Document>, ScopeError> {
        let scope = self.resolve(collection)?;
        let filter = self.scope_filter(&scope, collection, query.filter.clone());
        let docs = self.inner.find(collection, &query.with_filter(filter)).await?;
        self.check(&scope, collection, &docs)?;
        Ok(docs)
    }

    pub async fn find_one(
        &self,
        collection: &str,
        filter: Filter,
    ) -> Result<Option<Document>, ScopeError> {
        let mut docs = self.find(collection, Query::new(filter).limit(1)).await?;
        Ok(docs.pop())
    }

    pub async fn find_by_id(
        &self,
        collection: &str,
        id: RecordId,
    ) -> Result<Option<Document>, ScopeError> {
        self.find_one(collection, Filter::id(id)).await
    }

    #[instrument(
        skip_all,
        fields(collection = %collection, tenant_id = tracing::field::Empty, global = tracing::field::Empty),
        err(level = "debug")
    )]
    pub async fn count(&self, collection: &str, filter: Filter) -> Result<u64, ScopeError> {
        let scope = self.resolve(collection)?;
        let filter = self.scope_filter(&scope, collection, filter);
        Ok(self.inner.count(collection, &filter).await?)
    }

    /// Run `pipeline` over `collection`.
    ///
    /// The tenant filter is part of the source scan and of every join into a
    /// tenant-scoped collection.
    #[instrument(
        skip_all,
        fields(collection = %collection, tenant_id = tracing::field::Empty, global = tracing::field::Empty),
        err(level = "debug")
    )]
    pub async fn aggregate(
        &self,
        collection: &str,
        pipeline: &Pipeline,
    ) -> Result<Vec<Row>, ScopeError> {
        let scope = self.resolve(collection)?;
        let (source, start) = pipeline.source_filter();
        let filter = self.scope_filter(&scope, collection, source);
        let docs = self.inner.find(collection, &Query::new(filter)).await?;
        self.check(&scope, collection, &docs)?;

        let mut rows: Vec<Row> = docs.iter().map(Document::to_map).collect();
        for stage in &pipeline.stages[start..] {
            rows = match stage {
                Stage::Lookup {
                    from,
                    local_field,
                    foreign_field,
                    as_field,
                } => {
                    let keys = join_keys(&rows, local_field);
                    let foreign: Vec<Row> = if keys.is_empty() {
                        Vec::new()
                    } else {
                        let join_scope = self.resolve(from)?;
                        let filter = self.scope_filter(
                            &join_scope,
                            from,
                            Filter::In(foreign_field.clone(), keys),
                        );
                        let docs = self.inner.find(from, &Query::new(filter)).await?;
                        self.check(&join_scope, from, &docs)?;
                        docs.iter().map(Document::to_map).collect()
                    };
                    attach(rows, local_field, foreign_field, as_field, &foreign)
                }
                other => apply_local(other, rows).unwrap_or_default(),
            };
        }
        Ok(rows)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Writes
    // ─────────────────────────────────────────────────────────────────────────

    #[instrument(
        skip_all,
        fields(collection = %collection, id = %document.id, tenant_id = tracing::field::Empty, global = tracing::field::Empty),
        err(level = "debug")
    )]
    pub async fn insert(
        &self,
        collection: &str,
        mut document: Document,
    ) -> Result<Document, ScopeError> {
        match self.resolve(collection)? {
            Scope::Unscoped => {}
            Scope::Global(ctx) => {
                if document.tenant_id.is_none() {
                    document.tenant_id = ctx.tenant_id();
                }
                if document.tenant_id.is_none() {
                    tracing::warn!(
                        collection,
                        id = %document.id,
                        identity = %ctx.requesting_identity(),
                        "global write created a record without tenant"
                    );
                }
            }
            Scope::Tenant(_, tenant) => match document.tenant_id {
                None => document.tenant_id = Some(tenant),
                Some(t) if t == tenant => {}
                Some(requested) => {
                    tracing::warn!(collection, %requested, "rejected insert naming a foreign tenant");
                    self.audit.record(SecurityEvent::ScopingFailure {
                        collection: collection.to_string(),
                        reason: "cross-tenant write".to_string(),
                    });
                    return Err(ScopeError::CrossTenantWrite { requested });
                }
            },
        }

        Ok(self.inner.insert(collection, document).await?)
    }

    #[instrument(
        skip_all,
        fields(collection = %collection, tenant_id = tracing::field::Empty, global = tracing::field::Empty),
        err(level = "debug")
    )]
    pub async fn update(
        &self,
        collection: &str,
        filter: Filter,
        patch: Map<String, Value>,
    ) -> Result<u64, ScopeError> {
        let scope = self.resolve(collection)?;
        if patch.contains_key(ID_FIELD) {
            return Err(ScopeError::ImmutableField(ID_FIELD));
        }
        if matches!(scope, Scope::Tenant(..)) && patch.contains_key(TENANT_FIELD) {
            return Err(ScopeError::ImmutableField(TENANT_FIELD));
        }

        let filter = self.scope_filter(&scope, collection, filter);
        Ok(self.inner.update(collection, &filter, &patch).await?)
    }

    pub async fn update_by_id(
        &self,
        collection: &str,
        id: RecordId,
        patch: Map<String, Value>,
    ) -> Result<u64, ScopeError> {
        self.update(collection, Filter::id(id), patch).await
    }

    #[instrument(
        skip_all,
        fields(collection = %collection, tenant_id = tracing::field::Empty, global = tracing::field::Empty),
        err(level = "debug")
    )]
    pub async fn delete(&self, collection: &str, filter: Filter) -> Result<u64, ScopeError> {
        let scope = self.resolve(collection)?;
        let filter = self.scope_filter(&scope, collection, filter);
        Ok(self.inner.delete(collection, &filter).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Scoping
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve(&self, collection: &str) -> Result<Scope, ScopeError> {
        if !self.registry.is_tenant_scoped(collection) {
            return Ok(Scope::Unscoped);
        }

        let Some(ctx) = context::current() else {
            tracing::error!(collection, "tenant-scoped operation attempted without tenant context");
            self.audit.record(SecurityEvent::ScopingFailure {
                collection: collection.to_string(),
                reason: "no tenant context".to_string(),
            });
            return Err(ScopeError::Configuration("no tenant context".to_string()));
        };

        let span = Span::current();
        span.record("global", ctx.is_global());
        if let Some(t) = ctx.tenant_id() {
            span.record("tenant_id", tracing::field::display(t));
        }

        if ctx.is_global() {
            return Ok(Scope::Global(ctx));
        }
        let Some(tenant) = ctx.tenant_id() else {
            self.audit.record(SecurityEvent::ScopingFailure {
                collection: collection.to_string(),
                reason: "missing tenant context".to_string(),
            });
            return Err(ScopeError::MissingTenantContext);
        };
        Ok(Scope::Tenant(ctx, tenant))
    }

    fn scope_filter(&self, scope: &Scope, collection: &str, filter: Filter) -> Filter {
        let Scope::Tenant(ctx, tenant) = scope else {
            return filter;
        };

        if filter.pins(TENANT_FIELD, &tenant_value(*tenant)) {
            return filter;
        }
        if filter.mentions(TENANT_FIELD) {
            tracing::warn!(
                collection,
                identity = %ctx.requesting_identity(),
                "explicit tenant filter does not pin the active tenant; narrowing"
            );
        }
        filter.and(Filter::tenant(*tenant))
    }

    fn check(&self, scope: &Scope, collection: &str, docs: &[Document]) -> Result<(), ScopeError> {
        let Scope::Tenant(ctx, _) = scope else {
            return Ok(());
        };

        check_documents(ctx, collection, docs).map_err(|v| {
            tracing::error!(
                collection = %v.collection,
                record_id = %v.record_id,
                expected_tenant = ?v.expected,
                found_tenant = %v.found,
                identity = %ctx.requesting_identity(),
                "TENANT ISOLATION VIOLATION: read returned a record of another tenant"
            );
            self.audit.record(SecurityEvent::TenantIsolationViolation {
                collection: v.collection.clone(),
                record_id: v.record_id,
                expected_tenant: v.expected,
                found_tenant: v.found,
            });
            ScopeError::IsolationViolation(v)
        })
    }
}

impl core::fmt::Debug for ScopedStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ScopedStore")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
