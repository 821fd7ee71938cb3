//! Query pipeline.
//!
//! Embeds the query text, runs vector search, then stitches extended
//! context onto child results: each child hit's `parent_id` is resolved
//! against the store and the parent's full text rides along when found. A
//! dangling parent reference degrades that single hit to context-free
//! rather than failing the query. A query embedding failure aborts the
//! whole query; there is no meaningful search without a vector.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::warn;

use crate::config::Config;
use crate::embedding::{self, embed_checked, EmbeddingProvider};
use crate::models::SearchHit;
use crate::sqlite_store::SqliteStore;
use crate::store::VectorStore;
use crate::{db, migrate};

pub struct QueryPipeline {
    store: Arc<dyn VectorStore>,
    provider: Arc<dyn EmbeddingProvider>,
    top_k: usize,
    similarity_threshold: f32,
}

impl QueryPipeline {
    pub fn new(
        store: Arc<dyn VectorStore>,
        provider: Arc<dyn EmbeddingProvider>,
        top_k: usize,
        similarity_threshold: f32,
    ) -> Self {
        Self {
            store,
            provider,
            top_k,
            similarity_threshold,
        }
    }

    /// Run one retrieval, preserving the store's ranking order.
    pub async fn query(&self, text: &str, top_k: Option<usize>) -> Result<Vec<SearchHit>> {
        let vector = embed_checked(self.provider.as_ref(), text)
            .await
            .context("query embedding failed")?;

        let top_k = top_k.unwrap_or(self.top_k);
        let scored = self
            .store
            .search(&vector, top_k, self.similarity_threshold)
            .await?;

        let mut hits = Vec::with_capacity(scored.len());
        for candidate in scored {
            let parent_content = match candidate.chunk.kind.parent_id() {
                Some(parent_id) => match self.store.get_parent(parent_id).await? {
                    Some(parent) => Some(parent.content),
                    None => {
                        warn!(
                            chunk = %candidate.chunk.id,
                            parent = %parent_id,
                            "child references a missing parent"
                        );
                        None
                    }
                },
                None => None,
            };
            hits.push(SearchHit::from_scored(candidate, parent_content));
        }

        Ok(hits)
    }
}

/// CLI entry point for `ckv query`.
pub async fn run_query(
    config: &Config,
    text: &str,
    top_k: Option<usize>,
    json: bool,
) -> Result<()> {
    let provider: Arc<dyn EmbeddingProvider> =
        Arc::from(embedding::create_provider(&config.embedding)?);
    let pool = db::connect(&config.db.path).await?;
    migrate::run_migrations(&pool).await?;
    let store = Arc::new(SqliteStore::new(pool.clone(), config.embedding.dims));

    let pipeline = QueryPipeline::new(
        store,
        provider,
        config.retrieval.top_k,
        config.retrieval.similarity_threshold,
    );

    let hits = pipeline.query(text, top_k).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
    } else if hits.is_empty() {
        println!("No results above the similarity threshold.");
    } else {
        for (i, hit) in hits.iter().enumerate() {
            println!(
                "{}. [{:.4}] {} (chunk {} of {})",
                i + 1,
                hit.similarity,
                hit.file_path,
                hit.chunk_index,
                hit.chunk_type
            );
            println!("   {}", preview(&hit.content, 200));
            if let Some(parent) = &hit.parent_content {
                println!("   context: {}", preview(parent, 200));
            }
        }
    }

    pool.close().await;
    Ok(())
}

fn preview(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let cut: String = flat.chars().take(max_chars).collect();
    format!("{}...", cut)
}
