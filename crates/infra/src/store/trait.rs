use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use super::{Document, Filter, Query};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid operation: {0}")]
    Invalid(String),

    #[error("corrupt document: {0}")]
    Corrupt(String),

    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn corrupt(err: impl core::fmt::Display) -> Self {
        StoreError::Corrupt(err.to_string())
    }
}

/// Persistence boundary for documents.
///
/// Implementations must be `Send + Sync` and safe to share across request tasks.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find(&self, collection: &str, query: &Query) -> Result<Vec<Document>, StoreError>;

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError>;

    /// Insert a new document. Fails with [`StoreError::Conflict`] if the id exists.
    async fn insert(&self, collection: &str, document: Document) -> Result<Document, StoreError>;

    /// Merge `patch` into every matching document. Returns the number updated.
    async fn update(
        &self,
        collection: &str,
        filter: &Filter,
        patch: &Map<String, Value>,
    ) -> Result<u64, StoreError>;

    /// Delete every matching document. Returns the number deleted.
    async fn delete(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError>;
}

#[async_trait]
impl<S> DocumentStore for Arc<S>
where
    S: DocumentStore + ?Sized,
{
    async fn find(&self, collection: &str, query: &Query) -> Result<Vec<Document>, StoreError> {
        (**self).find(collection, query).await
    }

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        (**self).count(collection, filter).await
    }

    async fn insert(&self, collection: &str, document: Document) -> Result<Document, StoreError> {
        (**self).insert(collection, document).await
    }

    async fn update(
        &self,
        collection: &str,
        filter: &Filter,
        patch: &Map<String, Value>,
    ) -> Result<u64, StoreError> {
        (**self).update(collection, filter, patch).await
    }

    async fn delete(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        (**self).delete(collection, filter).await
    }
}
