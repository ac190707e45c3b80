//! Infrastructure layer: document storage, tenant scoping and entity services.
//!
//! Entity services only ever talk to [`ScopedStore`]; the raw
//! [`DocumentStore`] implementations know nothing about tenants beyond storing
//! the `tenant_id` column.

pub mod collections;
pub mod directory;
pub mod invariant;
pub mod pipeline;
pub mod scoping;
pub mod services;
pub mod store;

pub use collections::CollectionRegistry;
pub use directory::StoreIdentityDirectory;
pub use invariant::IsolationViolation;
pub use pipeline::{Pipeline, Stage};
pub use scoping::{ScopeError, ScopedStore};
pub use store::{
    Document, DocumentStore, Filter, InMemoryDocumentStore, PostgresDocumentStore, Query,
    SortOrder, StoreError,
};
