//! Durable record store.
//!
//! The pipeline needs only a narrow surface from its store: insert, update
//! and delete by id, a point read, and a full scan (used to rebuild the
//! in-memory index at startup). [`DocumentStore`] captures that surface;
//! [`SqliteStore`] is the production backend. Store-level failures propagate
//! to the caller of sync/search — nothing is retried here.

use anyhow::{bail, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::embedding::{blob_to_vec, vec_to_blob};
use crate::models::{Document, NewDocument};

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a document and return it with its assigned identity.
    async fn insert(&self, doc: &NewDocument) -> Result<Document>;

    /// Overwrite an existing document in place.
    async fn update(&self, id: i64, doc: &NewDocument) -> Result<()>;

    /// Delete by id. Deleting an absent id is a no-op.
    async fn delete(&self, id: i64) -> Result<()>;

    async fn get(&self, id: i64) -> Result<Option<Document>>;

    /// Full scan, ordered by id.
    async fn list_all(&self) -> Result<Vec<Document>>;
}

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn insert(&self, doc: &NewDocument) -> Result<Document> {
        let now = chrono::Utc::now().timestamp();
        let blob = vec_to_blob(&doc.embedding);

        let result = sqlx::query(
            "INSERT INTO documents (title, body, embedding, dims, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&doc.title)
        .bind(&doc.body)
        .bind(&blob)
        .bind(doc.embedding.len() as i64)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(Document {
            id: result.last_insert_rowid(),
            title: doc.title.clone(),
            body: doc.body.clone(),
            embedding: doc.embedding.clone(),
            created_at: now,
            updated_at: now,
        })
    }

    async fn update(&self, id: i64, doc: &NewDocument) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let blob = vec_to_blob(&doc.embedding);

        let result = sqlx::query(
            "UPDATE documents SET title = ?, body = ?, embedding = ?, dims = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&doc.title)
        .bind(&doc.body)
        .bind(&blob)
        .bind(doc.embedding.len() as i64)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            bail!("document not found: {}", id);
        }
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get(&self, id: i64) -> Result<Option<Document>> {
        let row = sqlx::query(
            "SELECT id, title, body, embedding, created_at, updated_at FROM documents WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| row_to_document(&r)))
    }

    async fn list_all(&self) -> Result<Vec<Document>> {
        let rows = sqlx::query(
            "SELECT id, title, body, embedding, created_at, updated_at FROM documents ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_document).collect())
    }
}

fn row_to_document(row: &sqlx::sqlite::SqliteRow) -> Document {
    let blob: Vec<u8> = row.get("embedding");
    Document {
        id: row.get("id"),
        title: row.get("title"),
        body: row.get("body"),
        embedding: blob_to_vec(&blob),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
