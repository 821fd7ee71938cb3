//! Ingestion pipeline.
//!
//! Coordinates the flow from document source to store: scan → chunk →
//! content-id dedup check → embed → insert-if-absent. Each chunk is an
//! independent, idempotent unit of work: a duplicate id short-circuits
//! before any embedding cost is paid, a provider failure skips only that
//! chunk, and a store failure fails the document while other documents
//! continue. Nothing is ever rolled back — re-ingesting a partially
//! processed document is safe and cheap by construction.
//!
//! Chunks within a document are embedded with bounded concurrency;
//! `chunk_index` is assigned when a window is produced, so completion
//! order never perturbs recorded order.

use std::sync::Arc;

use anyhow::Result;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::chunk::{ChunkIter, ChunkerOptions};
use crate::config::Config;
use crate::content_id::content_id;
use crate::embedding::{self, embed_checked, EmbeddingProvider};
use crate::models::{ChunkKind, ChunkRecord};
use crate::scan::{self, SourceDocument};
use crate::sqlite_store::SqliteStore;
use crate::store::{InsertOutcome, VectorStore};
use crate::{db, migrate};

/// How chunks of one document relate to each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkingStrategy {
    /// Every chunk is a self-contained parent.
    Flat,
    /// The whole document is stored as a parent; its sub-splits are
    /// stored as children referencing it.
    Hierarchical,
}

impl ChunkingStrategy {
    pub fn from_config(value: &str) -> Result<Self> {
        match value {
            "flat" => Ok(ChunkingStrategy::Flat),
            "hierarchical" => Ok(ChunkingStrategy::Hierarchical),
            other => anyhow::bail!("Unknown chunking strategy: {}", other),
        }
    }
}

/// Per-document ingestion outcome.
#[derive(Debug, Clone, Default)]
pub struct DocumentReport {
    pub file_path: String,
    pub chunks_total: u64,
    pub stored: u64,
    pub already_present: u64,
    pub failed: u64,
}

impl DocumentReport {
    /// A document succeeds when at least one chunk ended up stored or was
    /// already present. Zero-chunk (empty) documents do not succeed.
    pub fn succeeded(&self) -> bool {
        self.stored + self.already_present > 0
    }
}

/// Aggregated outcome for a batch of documents.
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    pub documents_total: u64,
    pub documents_succeeded: u64,
    pub chunks_total: u64,
    pub chunks_stored: u64,
    pub chunks_already_present: u64,
    pub chunks_failed: u64,
}

impl IngestReport {
    /// A batch succeeds when at least one document succeeded.
    pub fn succeeded(&self) -> bool {
        self.documents_succeeded > 0
    }

    fn absorb(&mut self, doc: &DocumentReport) {
        self.documents_total += 1;
        if doc.succeeded() {
            self.documents_succeeded += 1;
        }
        self.chunks_total += doc.chunks_total;
        self.chunks_stored += doc.stored;
        self.chunks_already_present += doc.already_present;
        self.chunks_failed += doc.failed;
    }
}

enum ChunkOutcome {
    Stored,
    AlreadyPresent,
    Failed,
}

/// Drives chunking, deduplication, embedding, and storage.
pub struct IngestPipeline {
    store: Arc<dyn VectorStore>,
    provider: Arc<dyn EmbeddingProvider>,
    chunker: ChunkerOptions,
    strategy: ChunkingStrategy,
    concurrency: usize,
}

impl IngestPipeline {
    pub fn new(
        store: Arc<dyn VectorStore>,
        provider: Arc<dyn EmbeddingProvider>,
        chunker: ChunkerOptions,
        strategy: ChunkingStrategy,
        concurrency: usize,
    ) -> Self {
        Self {
            store,
            provider,
            chunker,
            strategy,
            concurrency: concurrency.max(1),
        }
    }

    /// Ingest one document, returning per-chunk counts.
    ///
    /// Provider failures are absorbed as per-chunk skips; store failures
    /// abort the document and surface to the caller.
    pub async fn ingest_document(&self, doc: &SourceDocument) -> Result<DocumentReport> {
        let mut report = DocumentReport {
            file_path: doc.file_path.clone(),
            ..DocumentReport::default()
        };

        let body = doc.body.trim();
        if body.is_empty() {
            return Ok(report);
        }

        let mut next_index: i64 = 0;
        let mut child_parent_id: Option<String> = None;

        if self.strategy == ChunkingStrategy::Hierarchical {
            let parent = ChunkRecord {
                id: content_id(body),
                content: body.to_string(),
                kind: ChunkKind::Parent,
                file_path: doc.file_path.clone(),
                chunk_index: 0,
            };
            report.chunks_total += 1;
            let outcome =
                process_chunk(Arc::clone(&self.store), Arc::clone(&self.provider), parent.clone())
                    .await?;
            apply_outcome(&mut report, outcome);

            // A document that fits one window has no distinct sub-splits;
            // storing them would collide with the parent's content id.
            if body.chars().count() <= self.chunker.chunk_size {
                return Ok(report);
            }

            child_parent_id = Some(parent.id);
            next_index = 1;
        }

        let mut tasks: JoinSet<Result<ChunkOutcome>> = JoinSet::new();

        for piece in ChunkIter::new(&doc.body, &self.chunker) {
            let kind = match &child_parent_id {
                Some(parent_id) => ChunkKind::Child {
                    parent_id: parent_id.clone(),
                },
                None => ChunkKind::Parent,
            };
            let record = ChunkRecord {
                id: content_id(&piece.text),
                content: piece.text,
                kind,
                file_path: doc.file_path.clone(),
                chunk_index: next_index,
            };
            next_index += 1;
            report.chunks_total += 1;

            if tasks.len() >= self.concurrency {
                if let Some(joined) = tasks.join_next().await {
                    apply_outcome(&mut report, joined??);
                }
            }

            let store = Arc::clone(&self.store);
            let provider = Arc::clone(&self.provider);
            tasks.spawn(async move { process_chunk(store, provider, record).await });
        }

        while let Some(joined) = tasks.join_next().await {
            apply_outcome(&mut report, joined??);
        }

        Ok(report)
    }

    /// Ingest a batch of documents, isolating per-document failures.
    pub async fn ingest_all(&self, docs: &[SourceDocument]) -> IngestReport {
        let mut report = IngestReport::default();

        for doc in docs {
            match self.ingest_document(doc).await {
                Ok(doc_report) => {
                    info!(
                        file = %doc_report.file_path,
                        chunks = doc_report.chunks_total,
                        stored = doc_report.stored,
                        already_present = doc_report.already_present,
                        failed = doc_report.failed,
                        "processed document"
                    );
                    report.absorb(&doc_report);
                }
                Err(e) => {
                    warn!(file = %doc.file_path, error = %e, "document ingestion failed");
                    report.absorb(&DocumentReport {
                        file_path: doc.file_path.clone(),
                        ..DocumentReport::default()
                    });
                }
            }
        }

        report
    }
}

fn apply_outcome(report: &mut DocumentReport, outcome: ChunkOutcome) {
    match outcome {
        ChunkOutcome::Stored => report.stored += 1,
        ChunkOutcome::AlreadyPresent => report.already_present += 1,
        ChunkOutcome::Failed => report.failed += 1,
    }
}

/// Process one chunk end to end.
///
/// The `exists` check only saves the embedding call; correctness under
/// concurrent ingestion comes from the store's atomic insert-if-absent.
async fn process_chunk(
    store: Arc<dyn VectorStore>,
    provider: Arc<dyn EmbeddingProvider>,
    record: ChunkRecord,
) -> Result<ChunkOutcome> {
    if store.exists(&record.id).await? {
        return Ok(ChunkOutcome::AlreadyPresent);
    }

    let vector = match embed_checked(provider.as_ref(), &record.content).await {
        Ok(vector) => vector,
        Err(e) => {
            warn!(
                id = %record.id,
                file = %record.file_path,
                chunk_index = record.chunk_index,
                error = %e,
                "embedding failed, skipping chunk"
            );
            return Ok(ChunkOutcome::Failed);
        }
    };

    match store.insert(&record, &vector).await? {
        InsertOutcome::Inserted => Ok(ChunkOutcome::Stored),
        InsertOutcome::AlreadyPresent => Ok(ChunkOutcome::AlreadyPresent),
    }
}

/// CLI entry point for `ckv ingest`.
pub async fn run_ingest(config: &Config, dry_run: bool) -> Result<()> {
    let docs = scan::scan_documents(&config.docs)?;

    if dry_run {
        let total_chunks: usize = docs
            .iter()
            .map(|doc| ChunkIter::new(&doc.body, &config.chunking.chunker_options()).count())
            .sum();
        println!("ingest (dry-run)");
        println!("  documents found: {}", docs.len());
        println!("  estimated chunks: {}", total_chunks);
        return Ok(());
    }

    if docs.is_empty() {
        anyhow::bail!("No documents found under {}", config.docs.root.display());
    }

    let provider: Arc<dyn EmbeddingProvider> =
        Arc::from(embedding::create_provider(&config.embedding)?);
    let pool = db::connect(&config.db.path).await?;
    migrate::run_migrations(&pool).await?;
    let store = Arc::new(SqliteStore::new(pool.clone(), config.embedding.dims));

    let pipeline = IngestPipeline::new(
        store,
        provider,
        config.chunking.chunker_options(),
        ChunkingStrategy::from_config(&config.chunking.strategy)?,
        config.ingest.concurrency,
    );

    let report = pipeline.ingest_all(&docs).await;

    println!("ingest");
    println!(
        "  documents: {}/{} succeeded",
        report.documents_succeeded, report.documents_total
    );
    println!("  chunks total: {}", report.chunks_total);
    println!("  newly stored: {}", report.chunks_stored);
    println!("  already present: {}", report.chunks_already_present);
    println!("  failed: {}", report.chunks_failed);

    pool.close().await;

    if !report.succeeded() {
        anyhow::bail!("No documents were ingested successfully");
    }
    println!("ok");
    Ok(())
}
