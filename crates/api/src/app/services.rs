//! Service wiring: document store, audit bus, resolver and entity services.

use std::sync::Arc;

use chrono::Utc;

use pentrack_audit::InMemoryAuditBus;
use pentrack_auth::{Hs256JwtValidator, PrincipalResolver, Role, UserAccount, UserStatus};
use pentrack_core::UserId;
use pentrack_infra::services::{
    AreaService, FindingService, ProjectService, ServiceError, UserService,
};
use pentrack_infra::{
    DocumentStore, InMemoryDocumentStore, PostgresDocumentStore, ScopedStore, StoreError,
    StoreIdentityDirectory,
};

use crate::config::ApiConfig;

pub type Resolver = PrincipalResolver<StoreIdentityDirectory>;

/// Everything handlers need, shared behind one `Arc`.
pub struct AppServices {
    pub store: ScopedStore,
    pub audit: Arc<InMemoryAuditBus>,
    pub resolver: Arc<Resolver>,
    pub projects: ProjectService,
    pub findings: FindingService,
    pub areas: AreaService,
    pub users: UserService,
}

impl AppServices {
    pub fn new(config: &ApiConfig, documents: Arc<dyn DocumentStore>) -> Self {
        let audit = Arc::new(InMemoryAuditBus::with_capacity(config.audit_retention));
        let store = ScopedStore::new(documents, audit.clone());

        let validator = Arc::new(Hs256JwtValidator::new(config.jwt_secret.as_bytes()));
        let resolver = Arc::new(PrincipalResolver::new(
            validator,
            StoreIdentityDirectory::new(store.clone()),
        ));

        let projects = ProjectService::new(store.clone());
        Self {
            findings: FindingService::new(store.clone(), projects.clone()),
            areas: AreaService::new(store.clone()),
            users: UserService::new(store.clone()),
            projects,
            resolver,
            audit,
            store,
        }
    }

    pub fn in_memory(config: &ApiConfig) -> Self {
        Self::new(config, Arc::new(InMemoryDocumentStore::new()))
    }

    /// Postgres when a database url is configured, in-memory otherwise.
    pub async fn from_config(config: &ApiConfig) -> Result<Self, StoreError> {
        match &config.database_url {
            Some(url) => {
                let documents = PostgresDocumentStore::connect(url).await?;
                tracing::info!("using postgres document store");
                Ok(Self::new(config, Arc::new(documents)))
            }
            None => {
                tracing::warn!("DATABASE_URL not set; using in-memory document store");
                Ok(Self::in_memory(config))
            }
        }
    }

    /// Create the OWNER account for `email` if it does not exist yet.
    pub async fn bootstrap_owner(&self, email: &str) -> Result<UserAccount, ServiceError> {
        let account = self
            .users
            .bootstrap(UserAccount {
                id: UserId::new(),
                tenant_id: None,
                email: email.trim().to_lowercase(),
                display_name: "Owner".to_string(),
                role: Role::Owner,
                status: UserStatus::Active,
                tenant_ids: Vec::new(),
                created_at: Utc::now(),
            })
            .await?;
        tracing::info!(user_id = %account.id, "owner account ready");
        Ok(account)
    }
}
