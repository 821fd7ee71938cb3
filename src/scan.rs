//! Filesystem document source.
//!
//! Walks the configured docs root and yields `(file_path, raw_text)`
//! pairs for every file matching the include globs. Paths are relative to
//! the root and sorted, so scan order is deterministic across runs.
//! Unreadable files are logged and skipped; empty files are passed
//! through and yield zero chunks downstream.

use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::warn;
use walkdir::WalkDir;

use crate::config::DocsConfig;

/// A decoded document handed to the ingestion pipeline.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub file_path: String,
    pub body: String,
}

pub fn scan_documents(config: &DocsConfig) -> Result<Vec<SourceDocument>> {
    let root = &config.root;
    if !root.exists() {
        bail!("Docs root does not exist: {}", root.display());
    }

    let include_set = build_globset(&config.include_globs)?;

    let mut default_excludes = vec![
        "**/.git/**".to_string(),
        "**/target/**".to_string(),
        "**/node_modules/**".to_string(),
    ];
    default_excludes.extend(config.exclude_globs.clone());
    let exclude_set = build_globset(&default_excludes)?;

    let mut documents = Vec::new();

    let walker = WalkDir::new(root).follow_links(config.follow_symlinks);
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().to_string();

        if exclude_set.is_match(&rel_str) {
            continue;
        }
        if !include_set.is_match(&rel_str) {
            continue;
        }

        let body = match std::fs::read_to_string(path) {
            Ok(body) => body,
            Err(e) => {
                warn!(file = %rel_str, error = %e, "skipping unreadable file");
                continue;
            }
        };

        documents.push(SourceDocument {
            file_path: rel_str,
            body,
        });
    }

    // Sort for deterministic ordering
    documents.sort_by(|a, b| a.file_path.cmp(&b.file_path));

    Ok(documents)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn docs_config(root: &std::path::Path) -> DocsConfig {
        DocsConfig {
            root: root.to_path_buf(),
            ..DocsConfig::default()
        }
    }

    #[test]
    fn test_scan_filters_by_extension() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.md"), "alpha").unwrap();
        fs::write(tmp.path().join("b.py"), "print('beta')").unwrap();
        fs::write(tmp.path().join("c.bin"), "skip me").unwrap();

        let docs = scan_documents(&docs_config(tmp.path())).unwrap();
        let paths: Vec<&str> = docs.iter().map(|d| d.file_path.as_str()).collect();
        assert_eq!(paths, vec!["a.md", "b.py"]);
    }

    #[test]
    fn test_scan_recurses_and_sorts() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("sub")).unwrap();
        fs::write(tmp.path().join("sub/z.txt"), "z").unwrap();
        fs::write(tmp.path().join("a.txt"), "a").unwrap();

        let docs = scan_documents(&docs_config(tmp.path())).unwrap();
        let paths: Vec<&str> = docs.iter().map(|d| d.file_path.as_str()).collect();
        assert_eq!(paths, vec!["a.txt", "sub/z.txt"]);
    }

    #[test]
    fn test_scan_keeps_empty_files() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("empty.md"), "").unwrap();

        let docs = scan_documents(&docs_config(tmp.path())).unwrap();
        assert_eq!(docs.len(), 1);
        assert!(docs[0].body.is_empty());
    }

    #[test]
    fn test_missing_root_errors() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("nope");
        assert!(scan_documents(&docs_config(&missing)).is_err());
    }
}
