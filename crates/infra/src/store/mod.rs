//! Raw document store boundary.
//!
//! Stores persist documents per collection and evaluate [`Filter`]s. They are
//! tenant-unaware: scoping is applied one layer up, in
//! [`crate::scoping::ScopedStore`].

pub mod document;
pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use document::{Document, Filter, ID_FIELD, Query, SortOrder, TENANT_FIELD, tenant_value};
pub use in_memory::InMemoryDocumentStore;
pub use postgres::PostgresDocumentStore;
pub use r#trait::{DocumentStore, StoreError};
