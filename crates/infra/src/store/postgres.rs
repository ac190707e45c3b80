//! Postgres-backed document store.
//!
//! All collections share one table:
//!
//! ```sql
//! documents(collection TEXT, id UUID, tenant_id UUID NULL, body JSONB)
//! ```
//!
//! `id` and `tenant_id` are real columns (indexed); every other field lives in
//! `body`. [`Filter`]s compile to SQL with [`sqlx::QueryBuilder`], every value
//! bound as a parameter. The fields in
//! [`UNIQUE_FIELDS`](crate::collections::UNIQUE_FIELDS) are backed by partial
//! unique indexes.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (other) | Any other | `Backend` |
//! | PoolClosed / other | N/A | `Backend` |

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use tracing::instrument;
use uuid::Uuid;

use pentrack_core::{RecordId, TenantId};

use super::{Document, DocumentStore, Filter, ID_FIELD, Query, SortOrder, StoreError, TENANT_FIELD};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    collection TEXT NOT NULL,
    id UUID NOT NULL,
    tenant_id UUID NULL,
    body JSONB NOT NULL DEFAULT '{}'::jsonb,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    PRIMARY KEY (collection, id)
);
CREATE INDEX IF NOT EXISTS documents_tenant_idx ON documents (collection, tenant_id);
CREATE UNIQUE INDEX IF NOT EXISTS documents_users_email_key
    ON documents ((body ->> 'email'))
    WHERE collection = 'users';
"#;

#[derive(Debug, Clone)]
pub struct PostgresDocumentStore {
    pool: Arc<PgPool>,
}

impl PostgresDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Connect and make sure the `documents` table exists.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        let store = Self::new(pool);
        store.ensure_schema().await?;
        Ok(store)
    }

    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    #[instrument(skip(self, query), fields(collection = %collection), err)]
    async fn find(&self, collection: &str, query: &Query) -> Result<Vec<Document>, StoreError> {
        let mut qb = QueryBuilder::<Postgres>::new(
            "SELECT id, tenant_id, body FROM documents WHERE collection = ",
        );
        qb.push_bind(collection.to_string());
        qb.push(" AND ");
        push_filter(&mut qb, &query.filter);

        qb.push(" ORDER BY ");
        for (field, order) in &query.sort {
            push_field(&mut qb, field);
            qb.push(match order {
                SortOrder::Asc => " ASC, ",
                SortOrder::Desc => " DESC, ",
            });
        }
        qb.push("id ASC");

        if let Some(limit) = query.limit {
            qb.push(" LIMIT ").push_bind(to_i64(limit));
        }
        if let Some(skip) = query.skip {
            qb.push(" OFFSET ").push_bind(to_i64(skip));
        }

        let rows = qb
            .build()
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find", e))?;

        let mut docs = Vec::with_capacity(rows.len());
        for row in rows {
            let id: Uuid = row.try_get("id").map_err(StoreError::corrupt)?;
            let tenant_id: Option<Uuid> = row.try_get("tenant_id").map_err(StoreError::corrupt)?;
            let Json(body): Json<Map<String, Value>> =
                row.try_get("body").map_err(StoreError::corrupt)?;
            docs.push(Document {
                id: RecordId::from_uuid(id),
                tenant_id: tenant_id.map(TenantId::from_uuid),
                body,
            });
        }
        Ok(docs)
    }

    #[instrument(skip(self, filter), fields(collection = %collection), err)]
    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        let mut qb =
            QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM documents WHERE collection = ");
        qb.push_bind(collection.to_string());
        qb.push(" AND ");
        push_filter(&mut qb, filter);

        let n: i64 = qb
            .build_query_scalar()
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("count", e))?;
        Ok(n.max(0) as u64)
    }

    #[instrument(skip(self, document), fields(collection = %collection, id = %document.id), err)]
    async fn insert(&self, collection: &str, document: Document) -> Result<Document, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, tenant_id, body)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(collection)
        .bind(*document.id.as_uuid())
        .bind(document.tenant_id.map(|t| *t.as_uuid()))
        .bind(Json(&document.body))
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert", e))?;

        Ok(document)
    }

    #[instrument(skip(self, filter, patch), fields(collection = %collection), err)]
    async fn update(
        &self,
        collection: &str,
        filter: &Filter,
        patch: &Map<String, Value>,
    ) -> Result<u64, StoreError> {
        if patch.contains_key(ID_FIELD) {
            return Err(StoreError::Invalid("id is immutable".to_string()));
        }

        let mut body_patch = patch.clone();
        let tenant_patch = match body_patch.remove(TENANT_FIELD) {
            Some(v) => Some(
                serde_json::from_value::<Option<TenantId>>(v).map_err(StoreError::corrupt)?,
            ),
            None => None,
        };

        let mut qb = QueryBuilder::<Postgres>::new("UPDATE documents SET body = body || ");
        qb.push_bind(Json(body_patch));
        if let Some(tenant) = tenant_patch {
            qb.push(", tenant_id = ").push_bind(tenant.map(|t| *t.as_uuid()));
        }
        qb.push(" WHERE collection = ").push_bind(collection.to_string());
        qb.push(" AND ");
        push_filter(&mut qb, filter);

        let result = qb
            .build()
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("update", e))?;
        Ok(result.rows_affected())
    }

    #[instrument(skip(self, filter), fields(collection = %collection), err)]
    async fn delete(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        let mut qb = QueryBuilder::<Postgres>::new("DELETE FROM documents WHERE collection = ");
        qb.push_bind(collection.to_string());
        qb.push(" AND ");
        push_filter(&mut qb, filter);

        let result = qb
            .build()
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete", e))?;
        Ok(result.rows_affected())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Filter compilation
// ─────────────────────────────────────────────────────────────────────────────

fn push_field(qb: &mut QueryBuilder<'_, Postgres>, field: &str) {
    match field {
        ID_FIELD => {
            qb.push("id");
        }
        TENANT_FIELD => {
            qb.push("tenant_id");
        }
        other => {
            qb.push("(body -> ").push_bind(other.to_string()).push(")");
        }
    }
}

fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &Filter) {
    match filter {
        Filter::All => {
            qb.push("TRUE");
        }
        Filter::Eq(field, value) => push_eq(qb, field, value),
        Filter::In(_, values) if values.is_empty() => {
            qb.push("FALSE");
        }
        Filter::In(field, values) => {
            qb.push("(");
            for (i, value) in values.iter().enumerate() {
                if i > 0 {
                    qb.push(" OR ");
                }
                push_eq(qb, field, value);
            }
            qb.push(")");
        }
        Filter::And(parts) => push_junction(qb, parts, " AND ", "TRUE"),
        Filter::Or(parts) => push_junction(qb, parts, " OR ", "FALSE"),
    }
}

fn push_junction(qb: &mut QueryBuilder<'_, Postgres>, parts: &[Filter], op: &str, empty: &str) {
    if parts.is_empty() {
        qb.push(empty);
        return;
    }
    qb.push("(");
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            qb.push(op);
        }
        push_filter(qb, part);
    }
    qb.push(")");
}

fn push_eq(qb: &mut QueryBuilder<'_, Postgres>, field: &str, value: &Value) {
    match field {
        ID_FIELD | TENANT_FIELD => {
            let column = if field == ID_FIELD { "id" } else { "tenant_id" };
            match value {
                Value::Null => {
                    qb.push(column).push(" IS NULL");
                }
                Value::String(s) => match Uuid::parse_str(s) {
                    Ok(uuid) => {
                        qb.push(column).push(" = ").push_bind(uuid);
                    }
                    // Not a uuid, so no row can match.
                    Err(_) => {
                        qb.push("FALSE");
                    }
                },
                _ => {
                    qb.push("FALSE");
                }
            }
        }
        other => match value {
            Value::Null => {
                qb.push("(body -> ")
                    .push_bind(other.to_string())
                    .push(" IS NULL OR body -> ")
                    .push_bind(other.to_string())
                    .push(" = 'null'::jsonb)");
            }
            // Scalar: equality, or membership when the field holds an array.
            v @ (Value::Bool(_) | Value::Number(_) | Value::String(_)) => {
                qb.push("(body -> ")
                    .push_bind(other.to_string())
                    .push(" @> ")
                    .push_bind(Json(v.clone()))
                    .push(")");
            }
            v => {
                qb.push("(body -> ")
                    .push_bind(other.to_string())
                    .push(" = ")
                    .push_bind(Json(v.clone()))
                    .push(")");
            }
        },
    }
}

fn to_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {}", operation))
        }
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}
