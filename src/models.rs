//! Core data models used throughout chunkvault.
//!
//! These types represent the chunks and search results that flow through
//! the ingestion and retrieval pipelines.

use serde::Serialize;

/// Role of a chunk in the parent/child hierarchy.
///
/// A `Parent` is a self-contained unit eligible to serve as extended
/// context; a `Child` is a sub-split of a larger unit and carries a
/// back-reference to its parent's content id. The reference is a lookup
/// key only — the query path tolerates a missing parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkKind {
    Parent,
    Child { parent_id: String },
}

impl ChunkKind {
    /// Stable string tag used in storage and result payloads.
    pub fn type_name(&self) -> &'static str {
        match self {
            ChunkKind::Parent => "parent",
            ChunkKind::Child { .. } => "child",
        }
    }

    pub fn parent_id(&self) -> Option<&str> {
        match self {
            ChunkKind::Parent => None,
            ChunkKind::Child { parent_id } => Some(parent_id),
        }
    }

    pub fn is_child(&self) -> bool {
        matches!(self, ChunkKind::Child { .. })
    }
}

/// An immutable, content-addressed unit of text produced by ingestion.
///
/// `id` is a pure function of `content` (MD5 hex), so byte-identical
/// content always maps to the same record. Records are never mutated
/// after insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkRecord {
    pub id: String,
    pub content: String,
    pub kind: ChunkKind,
    /// Originating document location, informational only.
    pub file_path: String,
    /// 0-based position within the source document's ingestion pass.
    pub chunk_index: i64,
}

/// A stored chunk paired with its similarity to a query vector.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: ChunkRecord,
    /// `1 − cosine_distance(query, stored)`, in `[-1.0, 1.0]`.
    pub similarity: f32,
}

/// Enriched result returned by the query pipeline.
///
/// For `child` chunks with a resolvable parent, `parent_content` carries
/// the parent's full text; otherwise it is `None`.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub content: String,
    pub chunk_type: String,
    pub file_path: String,
    pub chunk_index: i64,
    pub parent_id: Option<String>,
    pub similarity: f32,
    pub parent_content: Option<String>,
}

impl SearchHit {
    pub fn from_scored(scored: ScoredChunk, parent_content: Option<String>) -> Self {
        let ScoredChunk { chunk, similarity } = scored;
        SearchHit {
            id: chunk.id,
            content: chunk.content,
            chunk_type: chunk.kind.type_name().to_string(),
            file_path: chunk.file_path,
            chunk_index: chunk.chunk_index,
            parent_id: chunk.kind.parent_id().map(str::to_string),
            similarity,
            parent_content,
        }
    }
}
