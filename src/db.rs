//! # Postgres Document Store
//!
//! Stores list documents as JSONB rows keyed by collection and id, and
//! translates [`Filter`] trees into SQL.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgPool, Postgres};
use sqlx::types::Json;
use sqlx::QueryBuilder;
use tracing::{debug, info};

use crate::list_errors::{ListError, ListResult};
use crate::store::{document_body, with_id, DocumentStore, Filter};

/// Initialize the database schema
pub async fn init_database_schema(pool: &PgPool) -> Result<()> {
    info!("Initializing database schema...");

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY DEFAULT gen_random_uuid()::text,
            collection TEXT NOT NULL,
            data JSONB NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create documents table")?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection)")
        .execute(pool)
        .await
        .context("Failed to create collection index")?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_data ON documents USING GIN (data)")
        .execute(pool)
        .await
        .context("Failed to create document data index")?;

    info!("Database schema initialized successfully");
    Ok(())
}

/// Append the SQL for one filter to the query
fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &Filter) {
    match filter {
        Filter::Eq(field, value) => {
            qb.push("(data -> ");
            qb.push_bind(field.clone());
            qb.push(") = ");
            qb.push_bind(Json(value.clone()));
        }
        Filter::Contains(field, value) => {
            qb.push("((jsonb_typeof(data -> ");
            qb.push_bind(field.clone());
            qb.push(") = 'array' AND (data -> ");
            qb.push_bind(field.clone());
            qb.push(") @> jsonb_build_array(");
            qb.push_bind(Json(value.clone()));
            qb.push(")) OR (jsonb_typeof(data -> ");
            qb.push_bind(field.clone());
            qb.push(") = 'string' AND strpos(lower(data ->> ");
            qb.push_bind(field.clone());
            qb.push("), lower(");
            qb.push_bind(Json(value.clone()));
            qb.push(" #>> '{}')) > 0))");
        }
        Filter::Or(filters) if filters.is_empty() => {
            qb.push("FALSE");
        }
        Filter::Or(filters) => {
            qb.push("(");
            for (i, nested) in filters.iter().enumerate() {
                if i > 0 {
                    qb.push(" OR ");
                }
                push_filter(qb, nested);
            }
            qb.push(")");
        }
    }
}

/// Document store backed by a Postgres pool
#[derive(Debug, Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and make sure the schema exists
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        init_database_schema(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn create_document(&self, collection: &str, data: Value) -> ListResult<String> {
        let id = sqlx::query_scalar::<_, String>("INSERT INTO documents (collection, data) VALUES ($1, $2) RETURNING id")
            .bind(collection)
            .bind(Json(document_body(data)))
            .fetch_one(&self.pool)
            .await
            .context("Failed to insert document")?;

        debug!("Document created with ID: {}", id);
        Ok(id)
    }

    async fn get_document(&self, collection: &str, id: &str) -> ListResult<Option<Value>> {
        let row =
            sqlx::query_as::<_, (String, Json<Value>)>("SELECT id, data FROM documents WHERE collection = $1 AND id = $2")
                .bind(collection)
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .context("Failed to read document")?;

        Ok(row.map(|(id, Json(data))| with_id(data, &id)))
    }

    async fn update_document(&self, collection: &str, id: &str, data: Value) -> ListResult<()> {
        let rows_affected = sqlx::query(
            "UPDATE documents SET data = data || $3, updated_at = NOW() WHERE collection = $1 AND id = $2",
        )
        .bind(collection)
        .bind(id)
        .bind(Json(document_body(data)))
        .execute(&self.pool)
        .await
        .context("Failed to update document")?
        .rows_affected();

        if rows_affected == 0 {
            return Err(ListError::NotFound(format!("{collection}/{id}")));
        }
        debug!("Document updated with ID: {}", id);
        Ok(())
    }

    async fn delete_document(&self, collection: &str, id: &str) -> ListResult<()> {
        let rows_affected = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete document")?
            .rows_affected();

        if rows_affected == 0 {
            return Err(ListError::NotFound(format!("{collection}/{id}")));
        }
        debug!("Document deleted with ID: {}", id);
        Ok(())
    }

    async fn fetch_all_documents(&self, collection: &str, filters: &[Filter]) -> ListResult<Vec<Value>> {
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new("SELECT id, data FROM documents WHERE collection = ");
        qb.push_bind(collection.to_string());
        for filter in filters {
            qb.push(" AND ");
            push_filter(&mut qb, filter);
        }
        qb.push(" ORDER BY created_at, id");

        let rows = qb
            .build_query_as::<(String, Json<Value>)>()
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch documents")?;

        debug!("Fetched {} documents from {}", rows.len(), collection);
        Ok(rows.into_iter().map(|(id, Json(data))| with_id(data, &id)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_sql_shape() {
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new("SELECT id FROM documents WHERE ");
        push_filter(
            &mut qb,
            &Filter::Or(vec![
                Filter::eq("type", "inventory"),
                Filter::contains("name", json!("rice")),
            ]),
        );
        let sql = qb.sql();
        assert!(sql.starts_with("SELECT id FROM documents WHERE ((data -> $1) = $2 OR "));
        assert!(sql.contains("@> jsonb_build_array($5)"));
        assert!(sql.ends_with(" #>> '{}')) > 0)))"));
    }

    #[test]
    fn test_empty_or_matches_nothing() {
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new("");
        push_filter(&mut qb, &Filter::Or(vec![]));
        assert_eq!(qb.sql(), "FALSE");
    }
}
