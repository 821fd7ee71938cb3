//! Embedding provider abstraction and implementations.
//!
//! Defines the [`EmbeddingProvider`] trait and concrete implementations:
//! - **[`DisabledProvider`]** — returns errors; used when embeddings are not configured.
//! - **[`OllamaProvider`]** — calls the Ollama embeddings API with retry and backoff.
//!
//! The pipelines never call a provider's `embed` directly; they go through
//! [`embed_checked`], which rejects any vector whose dimension differs from
//! the one the provider is configured for. A wrong-dimension response is a
//! provider failure and is never stored.
//!
//! Also provides vector utilities:
//! - [`cosine_similarity`] — compute similarity between two embedding vectors
//! - [`vec_to_blob`] — encode a `Vec<f32>` as little-endian bytes for BLOB storage
//! - [`blob_to_vec`] — decode a BLOB back into a `Vec<f32>`
//!
//! # Retry Strategy
//!
//! The Ollama provider uses exponential backoff for transient errors:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors and timeouts → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::config::EmbeddingConfig;

/// Trait for embedding providers.
///
/// `embed` converts text to a float vector; the transport, model loading,
/// and retry policy are implementation details. Callers own the dimension
/// check (see [`embed_checked`]) and the per-chunk retry/skip decision.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"nomic-embed-text"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `1536`).
    fn dims(&self) -> usize;
    /// Embed a single text into a float vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Embed `text` and enforce the provider's configured dimension.
///
/// Any other dimension (including an empty vector) is treated as a
/// provider failure, not stored.
pub async fn embed_checked(provider: &dyn EmbeddingProvider, text: &str) -> Result<Vec<f32>> {
    let vector = provider.embed(text).await?;
    if vector.len() != provider.dims() {
        bail!(
            "embedding dimension {} does not match expected {}",
            vector.len(),
            provider.dims()
        );
    }
    Ok(vector)
}

// ============ Disabled Provider ============

/// A no-op embedding provider that always returns errors.
///
/// Used when `embedding.provider = "disabled"` in the configuration.
pub struct DisabledProvider;

#[async_trait]
impl EmbeddingProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        bail!("Embedding provider is disabled")
    }
}

// ============ Ollama Provider ============

/// Embedding provider backed by an Ollama server.
///
/// Calls `POST {ollama_url}/api/embeddings` with `{"model", "prompt"}` and
/// reads the `embedding` field from the response. Each request carries the
/// configured timeout; transient failures are retried with exponential
/// backoff up to `max_retries` times.
pub struct OllamaProvider {
    model: String,
    dims: usize,
    endpoint: String,
    max_retries: u32,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct OllamaEmbeddingResponse {
    embedding: Option<Vec<f32>>,
}

impl OllamaProvider {
    /// Create a new Ollama provider from configuration.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for Ollama provider"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model,
            dims: config.dims,
            endpoint: format!("{}/api/embeddings", config.ollama_url.trim_end_matches('/')),
            max_retries: config.max_retries,
            client,
        })
    }

    async fn request_embedding(&self, text: &str) -> Result<Vec<f32>> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": text,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, 8s, ...
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self.client.post(&self.endpoint).json(&body).send().await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let parsed: OllamaEmbeddingResponse = response.json().await?;
                        return match parsed.embedding {
                            Some(vector) if !vector.is_empty() => Ok(vector),
                            _ => bail!("Ollama response missing embedding"),
                        };
                    }

                    // Rate limited or server error — retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err =
                            Some(anyhow::anyhow!("Ollama API error {}: {}", status, body_text));
                        continue;
                    }

                    // Client error (not 429) — don't retry
                    let body_text = response.text().await.unwrap_or_default();
                    bail!("Ollama API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Embedding failed after retries")))
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.request_embedding(text).await
    }
}

/// Create the appropriate [`EmbeddingProvider`] based on configuration.
pub fn create_provider(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledProvider)),
        "ollama" => Ok(Box::new(OllamaProvider::new(config)?)),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

// ============ Vector utilities ============

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// Each `f32` is stored as 4 bytes in little-endian order, producing
/// a BLOB of `vec.len() × 4` bytes.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
///
/// Reverses [`vec_to_blob`]: reads 4-byte little-endian `f32` values
/// from the byte slice.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Equal to `1 − cosine_distance`, in `[-1.0, 1.0]`:
/// - `1.0` = identical direction
/// - `0.0` = orthogonal (unrelated)
/// - `-1.0` = opposite direction
///
/// Returns `0.0` for empty vectors or vectors of different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

// ============ Test doubles ============

#[cfg(test)]
pub mod testing {
    use super::*;
    use md5::{Digest, Md5};
    use std::collections::HashMap;

    /// Deterministic in-process provider for pipeline tests.
    ///
    /// Texts with a registered override return that vector; everything else
    /// gets a pseudo-vector derived from the text's digest. Texts listed in
    /// `fail_on` fail, exercising per-chunk skip behavior.
    pub struct StubProvider {
        dims: usize,
        overrides: HashMap<String, Vec<f32>>,
        fail_on: Vec<String>,
    }

    impl StubProvider {
        pub fn new(dims: usize) -> Self {
            Self {
                dims,
                overrides: HashMap::new(),
                fail_on: Vec::new(),
            }
        }

        pub fn with_vector(mut self, text: &str, vector: Vec<f32>) -> Self {
            self.overrides.insert(text.to_string(), vector);
            self
        }

        pub fn failing_on(mut self, text: &str) -> Self {
            self.fail_on.push(text.to_string());
            self
        }

        fn derive_vector(&self, text: &str) -> Vec<f32> {
            let mut hasher = Md5::new();
            hasher.update(text.as_bytes());
            let digest = hasher.finalize();
            (0..self.dims)
                .map(|i| digest[i % digest.len()] as f32 / 255.0)
                .collect()
        }
    }

    #[async_trait]
    impl EmbeddingProvider for StubProvider {
        fn model_name(&self) -> &str {
            "stub"
        }
        fn dims(&self) -> usize {
            self.dims
        }
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            if self.fail_on.iter().any(|t| t == text) {
                bail!("stub embedding failure");
            }
            match self.overrides.get(text) {
                Some(vector) => Ok(vector.clone()),
                None => Ok(self.derive_vector(text)),
            }
        }
    }
}
