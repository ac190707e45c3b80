use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::document::sort_rows;
use super::{Document, DocumentStore, Filter, Query, StoreError};
use crate::collections::UNIQUE_FIELDS;

/// In-memory document store.
///
/// Intended for tests/dev. Not optimized for performance. An optional latency
/// is slept before every operation so callers hit a real suspension point.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
    latency: Option<Duration>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    async fn pause(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn poisoned() -> StoreError {
        StoreError::Backend("lock poisoned".to_string())
    }
}

/// Reject `candidate` if it repeats a unique field value held by another
/// document. Must be called under the write lock.
fn check_unique(collection: &str, docs: &[Document], candidate: &Document) -> Result<(), StoreError> {
    for (_, field) in UNIQUE_FIELDS.iter().filter(|(c, _)| *c == collection) {
        let Some(value) = candidate.body.get(*field).filter(|v| !v.is_null()) else {
            continue;
        };
        let clash = docs
            .iter()
            .any(|d| d.id != candidate.id && d.body.get(*field) == Some(value));
        if clash {
            return Err(StoreError::Conflict(format!(
                "duplicate value for unique field '{field}' in '{collection}'"
            )));
        }
    }
    Ok(())
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn find(&self, collection: &str, query: &Query) -> Result<Vec<Document>, StoreError> {
        self.pause().await;

        let mut rows: Vec<Document> = {
            let guard = self.collections.read().map_err(|_| Self::poisoned())?;
            guard
                .get(collection)
                .map(|docs| docs.iter().filter(|d| d.matches(&query.filter)).cloned().collect())
                .unwrap_or_default()
        };

        sort_rows(&mut rows, &query.sort, |d, f| d.field(f));

        let skip = query.skip.unwrap_or(0) as usize;
        let limit = query.limit.map(|l| l as usize).unwrap_or(usize::MAX);
        Ok(rows.into_iter().skip(skip).take(limit).collect())
    }

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        self.pause().await;

        let guard = self.collections.read().map_err(|_| Self::poisoned())?;
        let n = guard
            .get(collection)
            .map(|docs| docs.iter().filter(|d| d.matches(filter)).count())
            .unwrap_or(0);
        Ok(n as u64)
    }

    async fn insert(&self, collection: &str, document: Document) -> Result<Document, StoreError> {
        self.pause().await;

        let mut guard = self.collections.write().map_err(|_| Self::poisoned())?;
        let docs = guard.entry(collection.to_string()).or_default();
        if docs.iter().any(|d| d.id == document.id) {
            return Err(StoreError::Conflict(format!(
                "document {} already exists in '{collection}'",
                document.id
            )));
        }
        check_unique(collection, docs, &document)?;
        docs.push(document.clone());
        Ok(document)
    }

    async fn update(
        &self,
        collection: &str,
        filter: &Filter,
        patch: &Map<String, Value>,
    ) -> Result<u64, StoreError> {
        self.pause().await;

        let mut guard = self.collections.write().map_err(|_| Self::poisoned())?;
        let Some(docs) = guard.get_mut(collection) else {
            return Ok(0);
        };

        // Validate against copies first so a bad patch leaves nothing half-applied.
        let mut updated = Vec::new();
        for (idx, doc) in docs.iter().enumerate() {
            if doc.matches(filter) {
                let mut next = doc.clone();
                next.apply_patch(patch)?;
                updated.push((idx, next));
            }
        }
        let mut after = docs.clone();
        for (idx, next) in &updated {
            after[*idx] = next.clone();
        }
        for (_, next) in &updated {
            check_unique(collection, &after, next)?;
        }

        let n = updated.len();
        for (idx, next) in updated {
            docs[idx] = next;
        }
        Ok(n as u64)
    }

    async fn delete(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        self.pause().await;

        let mut guard = self.collections.write().map_err(|_| Self::poisoned())?;
        let Some(docs) = guard.get_mut(collection) else {
            return Ok(0);
        };
        let before = docs.len();
        docs.retain(|d| !d.matches(filter));
        Ok((before - docs.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use pentrack_core::TenantId;
    use serde_json::json;

    use super::*;
    use crate::store::SortOrder;

    fn body(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => Map::new(),
        }
    }

    #[tokio::test]
    async fn find_filters_sorts_and_pages() {
        let store = InMemoryDocumentStore::new();
        let t = TenantId::new();
        for (name, sev) in [("b", 2), ("a", 3), ("c", 1)] {
            store
                .insert("findings", Document::new(Some(t), body(json!({"title": name, "sev": sev}))))
                .await
                .unwrap();
        }

        let q = Query::new(Filter::tenant(t)).sort_by("sev", SortOrder::Desc).skip(1).limit(1);
        let rows = store.find("findings", &q).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].body["title"], "b");
    }

    #[tokio::test]
    async fn duplicate_insert_conflicts() {
        let store = InMemoryDocumentStore::new();
        let d = Document::new(None, Map::new());
        store.insert("areas", d.clone()).await.unwrap();
        assert!(matches!(store.insert("areas", d).await, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn update_and_delete_report_counts() {
        let store = InMemoryDocumentStore::new();
        let t = TenantId::new();
        for _ in 0..3 {
            store.insert("projects", Document::new(Some(t), body(json!({"archived": false})))).await.unwrap();
        }
        store.insert("projects", Document::new(None, body(json!({"archived": false})))).await.unwrap();

        let patch = body(json!({"archived": true}));
        assert_eq!(store.update("projects", &Filter::tenant(t), &patch).await.unwrap(), 3);
        assert_eq!(store.count("projects", &Filter::equals("archived", true)).await.unwrap(), 3);
        assert_eq!(store.delete("projects", &Filter::tenant(t)).await.unwrap(), 3);
        assert_eq!(store.count("projects", &Filter::All).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn unique_email_is_enforced_on_insert_and_update() {
        let store = InMemoryDocumentStore::new();
        let (t1, t2) = (TenantId::new(), TenantId::new());
        let first = store
            .insert("users", Document::new(Some(t1), body(json!({"email": "a@x.io"}))))
            .await
            .unwrap();
        let other = store
            .insert("users", Document::new(Some(t2), body(json!({"email": "b@x.io"}))))
            .await
            .unwrap();

        let dup = Document::new(Some(t2), body(json!({"email": "a@x.io"})));
        assert!(matches!(store.insert("users", dup).await, Err(StoreError::Conflict(_))));

        // Same value elsewhere is fine.
        store
            .insert("areas", Document::new(Some(t1), body(json!({"email": "a@x.io"}))))
            .await
            .unwrap();

        let steal = body(json!({"email": "a@x.io"}));
        assert!(matches!(
            store.update("users", &Filter::id(other.id), &steal).await,
            Err(StoreError::Conflict(_))
        ));
        // Rewriting a document's own value is not a clash.
        let same = body(json!({"email": "a@x.io", "display_name": "A"}));
        assert_eq!(store.update("users", &Filter::id(first.id), &same).await.unwrap(), 1);
        assert_eq!(store.count("users", &Filter::All).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn failed_patch_leaves_documents_untouched() {
        let store = InMemoryDocumentStore::new();
        let d = store.insert("areas", Document::new(None, body(json!({"name": "x"})))).await.unwrap();
        let patch = body(json!({"name": "y", "id": "00000000-0000-0000-0000-000000000000"}));
        assert!(store.update("areas", &Filter::All, &patch).await.is_err());
        let rows = store.find("areas", &Query::new(Filter::id(d.id))).await.unwrap();
        assert_eq!(rows[0].body["name"], "x");
    }
}
