//! Content addressing for chunks.
//!
//! A chunk's identifier is the MD5 digest of its UTF-8 bytes, rendered as
//! lowercase hex. Identical content always yields the same id, which is
//! what makes re-ingestion idempotent: the id doubles as the dedup key,
//! tested against the store before any embedding cost is paid.

use md5::{Digest, Md5};

/// Derive the deterministic content id for a chunk's text.
pub fn content_id(content: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
