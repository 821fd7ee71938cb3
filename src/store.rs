//! Storage abstraction for chunkvault.
//!
//! The [`VectorStore`] trait defines the operations the ingestion and
//! query pipelines need, enabling pluggable backends (SQLite, in-memory).
//!
//! Contract highlights:
//! - `insert` is atomic insert-if-absent: a colliding id is a no-op
//!   reported as [`InsertOutcome::AlreadyPresent`], never an overwrite.
//!   The `exists` pre-check only short-circuits embedding cost; the
//!   insert itself is the authority under concurrency.
//! - `search` filters to `similarity > similarity_threshold`, orders by
//!   descending similarity with ties broken by insertion order, and
//!   truncates to `top_k`.
//! - Embedding dimension is fixed per store instance; vectors of any other
//!   dimension are rejected before storage.

use std::sync::RwLock;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::{ChunkRecord, ScoredChunk};

/// Result of an insert-if-absent operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    AlreadyPresent,
}

/// Abstract vector-indexed chunk store.
///
/// All operations are async (via `async-trait`); in-memory implementations
/// return immediately-ready futures.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Check whether a chunk with this content id is already stored.
    async fn exists(&self, id: &str) -> Result<bool>;

    /// Insert a chunk and its embedding, unless the id already exists.
    ///
    /// Never mutates an existing row.
    async fn insert(&self, record: &ChunkRecord, embedding: &[f32]) -> Result<InsertOutcome>;

    /// Nearest-neighbor search by cosine similarity.
    async fn search(
        &self,
        query: &[f32],
        top_k: usize,
        similarity_threshold: f32,
    ) -> Result<Vec<ScoredChunk>>;

    /// Fetch a chunk by id, only if it is stored as a parent.
    ///
    /// Used to resolve a child result's extended context.
    async fn get_parent(&self, id: &str) -> Result<Option<ChunkRecord>>;
}

/// Rank candidates: threshold filter, similarity descending, stable
/// tie-break by the order the candidates were produced in, `top_k` cap.
pub(crate) fn rank_candidates(
    mut candidates: Vec<ScoredChunk>,
    top_k: usize,
    similarity_threshold: f32,
) -> Vec<ScoredChunk> {
    candidates.retain(|c| c.similarity > similarity_threshold);
    // sort_by is stable, so insertion order survives equal similarities.
    candidates.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    candidates.truncate(top_k);
    candidates
}

// ============ In-memory store ============

struct StoredRow {
    record: ChunkRecord,
    vector: Vec<f32>,
}

/// In-memory [`VectorStore`] for tests.
///
/// Rows live in a `Vec` behind an `RwLock`; insertion order doubles as the
/// search tie-break order. Vector search is brute-force cosine similarity.
pub struct MemoryStore {
    dims: usize,
    rows: RwLock<Vec<StoredRow>>,
}

impl MemoryStore {
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            rows: RwLock::new(Vec::new()),
        }
    }

    /// Number of stored chunks.
    pub fn len(&self) -> usize {
        self.rows.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of stored records in insertion order, for assertions.
    #[cfg(test)]
    pub(crate) fn records(&self) -> Vec<ChunkRecord> {
        self.rows
            .read()
            .unwrap()
            .iter()
            .map(|r| r.record.clone())
            .collect()
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn exists(&self, id: &str) -> Result<bool> {
        let rows = self.rows.read().unwrap();
        Ok(rows.iter().any(|r| r.record.id == id))
    }

    async fn insert(&self, record: &ChunkRecord, embedding: &[f32]) -> Result<InsertOutcome> {
        if embedding.len() != self.dims {
            bail!(
                "embedding dimension {} does not match store dimension {}",
                embedding.len(),
                self.dims
            );
        }
        // Check-and-insert under one write lock, so the check cannot race.
        let mut rows = self.rows.write().unwrap();
        if rows.iter().any(|r| r.record.id == record.id) {
            return Ok(InsertOutcome::AlreadyPresent);
        }
        rows.push(StoredRow {
            record: record.clone(),
            vector: embedding.to_vec(),
        });
        Ok(InsertOutcome::Inserted)
    }

    async fn search(
        &self,
        query: &[f32],
        top_k: usize,
        similarity_threshold: f32,
    ) -> Result<Vec<ScoredChunk>> {
        let rows = self.rows.read().unwrap();
        let candidates: Vec<ScoredChunk> = rows
            .iter()
            .map(|r| ScoredChunk {
                chunk: r.record.clone(),
                similarity: cosine_similarity(query, &r.vector),
            })
            .collect();
        Ok(rank_candidates(candidates, top_k, similarity_threshold))
    }

    async fn get_parent(&self, id: &str) -> Result<Option<ChunkRecord>> {
        let rows = self.rows.read().unwrap();
        Ok(rows
            .iter()
            .find(|r| r.record.id == id && !r.record.kind.is_child())
            .map(|r| r.record.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content_id::content_id;
    use crate::models::ChunkKind;

    fn record(content: &str, kind: ChunkKind, index: i64) -> ChunkRecord {
        ChunkRecord {
            id: content_id(content),
            content: content.to_string(),
            kind,
            file_path: "docs/test.md".to_string(),
            chunk_index: index,
        }
    }

    #[tokio::test]
    async fn test_insert_then_exists() {
        let store = MemoryStore::new(2);
        let rec = record("alpha", ChunkKind::Parent, 0);
        assert!(!store.exists(&rec.id).await.unwrap());
        assert_eq!(
            store.insert(&rec, &[1.0, 0.0]).await.unwrap(),
            InsertOutcome::Inserted
        );
        assert!(store.exists(&rec.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_noop() {
        let store = MemoryStore::new(2);
        let rec = record("alpha", ChunkKind::Parent, 0);
        store.insert(&rec, &[1.0, 0.0]).await.unwrap();
        let outcome = store.insert(&rec, &[0.0, 1.0]).await.unwrap();
        assert_eq!(outcome, InsertOutcome::AlreadyPresent);
        assert_eq!(store.len(), 1);

        // The original vector survives; the second insert never overwrote it.
        let hits = store.search(&[1.0, 0.0], 5, 0.5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!((hits[0].similarity - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_wrong_dimension_rejected() {
        let store = MemoryStore::new(3);
        let rec = record("alpha", ChunkKind::Parent, 0);
        assert!(store.insert(&rec, &[1.0, 0.0]).await.is_err());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_search_threshold_order_and_topk() {
        let store = MemoryStore::new(2);
        // Similarities vs query [1, 0]: a=1.0, b≈0.707, c=0.0
        store
            .insert(&record("a", ChunkKind::Parent, 0), &[1.0, 0.0])
            .await
            .unwrap();
        store
            .insert(&record("b", ChunkKind::Parent, 1), &[1.0, 1.0])
            .await
            .unwrap();
        store
            .insert(&record("c", ChunkKind::Parent, 2), &[0.0, 1.0])
            .await
            .unwrap();

        let hits = store.search(&[1.0, 0.0], 5, 0.3).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk.content, "a");
        assert_eq!(hits[1].chunk.content, "b");
        assert!(hits[0].similarity >= hits[1].similarity);
        for hit in &hits {
            assert!(hit.similarity > 0.3);
        }

        let limited = store.search(&[1.0, 0.0], 1, 0.3).await.unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].chunk.content, "a");
    }

    #[tokio::test]
    async fn test_search_tie_break_is_insertion_order() {
        let store = MemoryStore::new(2);
        // Identical vectors: equal similarity, insertion order must hold.
        store
            .insert(&record("first", ChunkKind::Parent, 0), &[1.0, 0.0])
            .await
            .unwrap();
        store
            .insert(&record("second", ChunkKind::Parent, 1), &[1.0, 0.0])
            .await
            .unwrap();
        let hits = store.search(&[1.0, 0.0], 5, 0.0).await.unwrap();
        assert_eq!(hits[0].chunk.content, "first");
        assert_eq!(hits[1].chunk.content, "second");
    }

    #[tokio::test]
    async fn test_get_parent_filters_children() {
        let store = MemoryStore::new(2);
        let parent = record("parent text", ChunkKind::Parent, 0);
        let child = record(
            "child text",
            ChunkKind::Child {
                parent_id: parent.id.clone(),
            },
            1,
        );
        store.insert(&parent, &[1.0, 0.0]).await.unwrap();
        store.insert(&child, &[0.0, 1.0]).await.unwrap();

        let found = store.get_parent(&parent.id).await.unwrap();
        assert_eq!(found.map(|r| r.content), Some("parent text".to_string()));

        // A child id is not a valid parent lookup.
        assert!(store.get_parent(&child.id).await.unwrap().is_none());
        assert!(store.get_parent("missing").await.unwrap().is_none());
    }
}
