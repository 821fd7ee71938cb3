//! SQLite-backed [`VectorStore`].
//!
//! Chunks live in a single `chunks` table keyed by content id. Inserts use
//! `ON CONFLICT(id) DO NOTHING`, so duplicate detection is a property of
//! the store rather than a check-then-act race: two workers racing on the
//! same content both succeed and exactly one row lands.
//!
//! Search fetches rows in rowid (insertion) order and computes cosine
//! similarity in Rust over the decoded BLOB vectors; the stable descending
//! sort preserves insertion order between equal similarities.

use anyhow::{bail, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::models::{ChunkKind, ChunkRecord, ScoredChunk};
use crate::store::{rank_candidates, InsertOutcome, VectorStore};

pub struct SqliteStore {
    pool: SqlitePool,
    dims: usize,
}

impl SqliteStore {
    /// Wrap a connected pool. `dims` fixes the embedding dimension for the
    /// lifetime of this store instance.
    pub fn new(pool: SqlitePool, dims: usize) -> Self {
        Self { pool, dims }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn record_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<ChunkRecord> {
    let chunk_type: String = row.get("chunk_type");
    let parent_id: Option<String> = row.get("parent_id");
    let kind = match (chunk_type.as_str(), parent_id) {
        ("parent", _) => ChunkKind::Parent,
        ("child", Some(parent_id)) => ChunkKind::Child { parent_id },
        ("child", None) => bail!("child chunk row without parent_id"),
        (other, _) => bail!("unknown chunk_type in store: {}", other),
    };
    Ok(ChunkRecord {
        id: row.get("id"),
        content: row.get("content"),
        kind,
        file_path: row.get("file_path"),
        chunk_index: row.get("chunk_index"),
    })
}

#[async_trait]
impl VectorStore for SqliteStore {
    async fn exists(&self, id: &str) -> Result<bool> {
        let found: Option<String> = sqlx::query_scalar("SELECT id FROM chunks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }

    async fn insert(&self, record: &ChunkRecord, embedding: &[f32]) -> Result<InsertOutcome> {
        if embedding.len() != self.dims {
            bail!(
                "embedding dimension {} does not match store dimension {}",
                embedding.len(),
                self.dims
            );
        }

        let blob = vec_to_blob(embedding);
        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            INSERT INTO chunks (id, content, chunk_type, file_path, chunk_index, parent_id, embedding, dims, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(&record.id)
        .bind(&record.content)
        .bind(record.kind.type_name())
        .bind(&record.file_path)
        .bind(record.chunk_index)
        .bind(record.kind.parent_id())
        .bind(&blob)
        .bind(self.dims as i64)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            Ok(InsertOutcome::AlreadyPresent)
        } else {
            Ok(InsertOutcome::Inserted)
        }
    }

    async fn search(
        &self,
        query: &[f32],
        top_k: usize,
        similarity_threshold: f32,
    ) -> Result<Vec<ScoredChunk>> {
        let rows = sqlx::query(
            r#"
            SELECT id, content, chunk_type, file_path, chunk_index, parent_id, embedding
            FROM chunks
            ORDER BY rowid
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut candidates = Vec::with_capacity(rows.len());
        for row in &rows {
            let blob: Vec<u8> = row.get("embedding");
            let vector = blob_to_vec(&blob);
            candidates.push(ScoredChunk {
                chunk: record_from_row(row)?,
                similarity: cosine_similarity(query, &vector),
            });
        }

        Ok(rank_candidates(candidates, top_k, similarity_threshold))
    }

    async fn get_parent(&self, id: &str) -> Result<Option<ChunkRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, content, chunk_type, file_path, chunk_index, parent_id, embedding
            FROM chunks
            WHERE id = ? AND chunk_type = 'parent'
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(record_from_row(&row)?)),
            None => Ok(None),
        }
    }
}
