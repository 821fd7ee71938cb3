//! chunkvault — content-addressed document chunking, embedding, and retrieval.
//!
//! Documents are split into deterministic overlapping chunks, addressed by
//! an MD5 digest of their content, embedded through a pluggable provider,
//! and stored in SQLite alongside their vectors. Retrieval embeds a query,
//! ranks stored chunks by cosine similarity, and stitches parent context
//! onto child results.
//!
//! Module map:
//! - [`chunk`] — sliding-window chunker with boundary snapping
//! - [`config`] — TOML configuration loading and validation
//! - [`content_id`] — content addressing (MD5 hex digests)
//! - [`db`] — SQLite pool setup
//! - [`embedding`] — provider trait, Ollama client, vector utilities
//! - [`ingest`] — scan → chunk → embed → store pipeline
//! - [`migrate`] — schema creation
//! - [`models`] — chunk records and search results
//! - [`query`] — embed → search → parent-stitch pipeline
//! - [`scan`] — filesystem document source
//! - [`sqlite_store`] — SQLite-backed vector store
//! - [`store`] — the `VectorStore` trait and in-memory implementation

pub mod chunk;
pub mod config;
pub mod content_id;
pub mod db;
pub mod embedding;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod query;
pub mod scan;
pub mod sqlite_store;
pub mod store;
