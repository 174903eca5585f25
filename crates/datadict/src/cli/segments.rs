//! Segment discovery and document loading.
//!
//! A "segment" is the unit the pipeline works in: one description document,
//! optionally one schema document, one review CSV. Discovery is directory
//! driven so batch commands pick up whatever the earlier phases produced.

use crate::cli::config::WorkspacePaths;
use crate::cli::error::HelpfulError;
use anyhow::{Context, Result};
use datadict_schema::{DescriptionDocument, SchemaDocument};
use std::fs;
use std::path::Path;

const DESCRIPTION_SUFFIX: &str = "-descriptions.json";

/// Discover segments from `descriptions/*-descriptions.json`.
pub fn discover_description_segments(paths: &WorkspacePaths) -> Result<Vec<String>> {
    list_with_suffix(&paths.descriptions_dir(), DESCRIPTION_SUFFIX)
}

/// Discover segments from `reviews/*.csv`, skipping generated error logs.
pub fn discover_review_segments(input_dir: &Path) -> Result<Vec<String>> {
    let mut segments = list_with_suffix(input_dir, ".csv")?;
    segments.retain(|s| !s.ends_with("-errors"));
    Ok(segments)
}

fn list_with_suffix(dir: &Path, suffix: &str) -> Result<Vec<String>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut segments = Vec::new();
    let entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory {}", dir.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("Failed to read directory {}", dir.display()))?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if let Some(stem) = name.strip_suffix(suffix) {
            if !stem.is_empty() {
                segments.push(stem.to_string());
            }
        }
    }
    segments.sort();
    Ok(segments)
}

/// Load a segment's description document, with a helpful error when the
/// generation phase has not produced it.
pub fn load_description(paths: &WorkspacePaths, segment: &str) -> Result<DescriptionDocument> {
    let path = paths.description_path(segment);
    if !path.exists() {
        return Err(HelpfulError::description_not_found(segment, &path).into());
    }
    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse description document {}", path.display()))
}

/// Load a segment's schema document if the extract phase produced one.
pub fn load_schema(paths: &WorkspacePaths, segment: &str) -> Result<Option<SchemaDocument>> {
    let path = paths.schema_path(segment);
    if !path.exists() {
        tracing::debug!(segment, "No schema document, type lookup and PII samples unavailable");
        return Ok(None);
    }
    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let schema = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse schema document {}", path.display()))?;
    Ok(Some(schema))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_discover_description_segments_sorted() {
        let dir = TempDir::new().expect("tempdir");
        let paths = WorkspacePaths::new(dir.path());
        fs::create_dir_all(paths.descriptions_dir()).expect("mkdir");
        for name in [
            "Orders-descriptions.json",
            "Customer-descriptions.json",
            "notes.txt",
            "stale.json",
        ] {
            fs::write(paths.descriptions_dir().join(name), "{}").expect("write");
        }

        let segments = discover_description_segments(&paths).expect("discover");
        assert_eq!(segments, vec!["Customer", "Orders"]);
    }

    #[test]
    fn test_discover_review_segments_skips_error_logs() {
        let dir = TempDir::new().expect("tempdir");
        for name in ["Customer.csv", "Customer-errors.csv", "Orders.csv"] {
            fs::write(dir.path().join(name), "").expect("write");
        }

        let segments = discover_review_segments(dir.path()).expect("discover");
        assert_eq!(segments, vec!["Customer", "Orders"]);
    }

    #[test]
    fn test_missing_directories_yield_empty() {
        let dir = TempDir::new().expect("tempdir");
        let paths = WorkspacePaths::new(dir.path().join("nope"));
        assert!(discover_description_segments(&paths).expect("discover").is_empty());
    }

    #[test]
    fn test_load_description_missing_is_helpful() {
        let dir = TempDir::new().expect("tempdir");
        let paths = WorkspacePaths::new(dir.path());
        let err = load_description(&paths, "Customer").expect_err("must fail");
        assert!(err.to_string().contains("Customer"));
        assert!(err.downcast_ref::<HelpfulError>().is_some());
    }
}
