//! Schema Snapshots
//!
//! Append-only before/after records of table schemas, one JSON file per
//! creation, to support rollback after a write-back. `create` is the only
//! mutator; a snapshot file is never edited once written.
//!
//! Identifiers embed a fixed-width UTC timestamp so lexicographic identifier
//! order equals chronological order, but retrieval orders by the explicit
//! `timestamp` field inside the document — the filename only mirrors it.

use crate::document::ColumnTriple;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from snapshot operations. "Never wrote back" and "wrote back but
/// this direction was never captured" are distinct so callers can tell them
/// apart.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode snapshot: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("No snapshots found for segment: {segment}")]
    NoSnapshots { segment: String },

    #[error(
        "No {kind} snapshot found for segment: {segment} \
         ({available} snapshot(s) exist but none match)"
    )]
    NoMatchingKind {
        segment: String,
        kind: SnapshotKind,
        available: usize,
    },
}

/// Whether a snapshot was taken before or after a remote mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotKind {
    Before,
    After,
}

impl SnapshotKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotKind::Before => "before",
            SnapshotKind::After => "after",
        }
    }
}

impl fmt::Display for SnapshotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One table's recorded schema, in the triple form a reader would see —
/// not the 4-tuple the write API expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotTable {
    pub database: String,
    pub name: String,
    pub schema: Vec<ColumnTriple>,
}

/// A complete snapshot document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub segment: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: SnapshotKind,
    pub tables: Vec<SnapshotTable>,
}

/// Opaque snapshot identifier. Sorts chronologically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SnapshotId(String);

impl SnapshotId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Listing view of one snapshot: metadata only, schemas stay on disk.
#[derive(Debug, Clone)]
pub struct SnapshotSummary {
    pub id: SnapshotId,
    pub timestamp: DateTime<Utc>,
    pub kind: SnapshotKind,
    pub table_count: usize,
}

/// File-backed snapshot store rooted at one directory.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist a new snapshot and return its identifier.
    pub fn create(
        &self,
        segment: &str,
        tables: Vec<SnapshotTable>,
        kind: SnapshotKind,
    ) -> Result<SnapshotId, SnapshotError> {
        self.create_at(segment, tables, kind, Utc::now())
    }

    fn create_at(
        &self,
        segment: &str,
        tables: Vec<SnapshotTable>,
        kind: SnapshotKind,
        timestamp: DateTime<Utc>,
    ) -> Result<SnapshotId, SnapshotError> {
        fs::create_dir_all(&self.dir).map_err(|source| SnapshotError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let snapshot = Snapshot {
            segment: segment.to_string(),
            timestamp,
            kind,
            tables,
        };

        // Nanosecond-resolution fixed-width identifier: lexicographic order
        // equals chronological order.
        let base = format!(
            "{}-{}",
            sanitize_segment(segment),
            timestamp.format("%Y%m%dT%H%M%S%fZ")
        );
        let body = serde_json::to_string_pretty(&snapshot)?;

        // `create_new` keeps the store append-only: two creations landing on
        // the same nanosecond get distinct identifiers instead of the second
        // overwriting the first. The suffix still sorts after the unsuffixed
        // identifier.
        let mut attempt = 0u32;
        loop {
            let id = if attempt == 0 {
                SnapshotId(base.clone())
            } else {
                SnapshotId(format!("{base}-{attempt}"))
            };
            let path = self.snapshot_path(&id);
            match fs::OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(body.as_bytes())
                        .map_err(|source| SnapshotError::Io { path, source })?;
                    return Ok(id);
                }
                Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => attempt += 1,
                Err(source) => return Err(SnapshotError::Io { path, source }),
            }
        }
    }

    /// Load the most recent snapshot of the requested kind for a segment.
    pub fn load_most_recent(
        &self,
        segment: &str,
        kind: SnapshotKind,
    ) -> Result<Snapshot, SnapshotError> {
        let mut snapshots = self.scan(segment)?;
        if snapshots.is_empty() {
            return Err(SnapshotError::NoSnapshots {
                segment: segment.to_string(),
            });
        }

        let available = snapshots.len();
        // Newest first; identifier breaks timestamp ties.
        snapshots.sort_by(|a, b| (&b.1.timestamp, &b.0).cmp(&(&a.1.timestamp, &a.0)));
        snapshots
            .into_iter()
            .map(|(_, snapshot)| snapshot)
            .find(|s| s.kind == kind)
            .ok_or(SnapshotError::NoMatchingKind {
                segment: segment.to_string(),
                kind,
                available,
            })
    }

    /// List all snapshots for a segment, newest first, as metadata only.
    pub fn list(&self, segment: &str) -> Result<Vec<SnapshotSummary>, SnapshotError> {
        let mut snapshots = self.scan(segment)?;
        snapshots.sort_by(|a, b| (&b.1.timestamp, &b.0).cmp(&(&a.1.timestamp, &a.0)));
        Ok(snapshots
            .into_iter()
            .map(|(id, snapshot)| SnapshotSummary {
                id,
                timestamp: snapshot.timestamp,
                kind: snapshot.kind,
                table_count: snapshot.tables.len(),
            })
            .collect())
    }

    /// Absolute path of a snapshot file.
    pub fn snapshot_path(&self, id: &SnapshotId) -> PathBuf {
        self.dir.join(format!("{}.json", id.as_str()))
    }

    /// Read every snapshot belonging to a segment. The segment is matched on
    /// the field inside the document, not the filename, so segment names with
    /// filesystem-hostile characters stay unambiguous.
    fn scan(&self, segment: &str) -> Result<Vec<(SnapshotId, Snapshot)>, SnapshotError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.dir).map_err(|source| SnapshotError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let mut snapshots = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| SnapshotError::Io {
                path: self.dir.clone(),
                source,
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            let body = fs::read_to_string(&path).map_err(|source| SnapshotError::Io {
                path: path.clone(),
                source,
            })?;
            let snapshot: Snapshot = match serde_json::from_str(&body) {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "Skipping unreadable snapshot file");
                    continue;
                }
            };
            if snapshot.segment != segment {
                continue;
            }

            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            snapshots.push((SnapshotId(stem), snapshot));
        }

        Ok(snapshots)
    }
}

/// Replace filesystem-hostile characters for use in an identifier.
fn sanitize_segment(segment: &str) -> String {
    segment
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn table(name: &str, description: &str) -> SnapshotTable {
        SnapshotTable {
            database: "prod_db".to_string(),
            name: name.to_string(),
            schema: vec![ColumnTriple(
                "customer_id".to_string(),
                "string".to_string(),
                description.to_string(),
            )],
        }
    }

    #[test]
    fn test_create_then_load_most_recent() {
        let dir = TempDir::new().expect("tempdir");
        let store = SnapshotStore::new(dir.path());

        store
            .create("Customer", vec![table("customers", "v1")], SnapshotKind::Before)
            .expect("first create");
        store
            .create("Customer", vec![table("customers", "v2")], SnapshotKind::Before)
            .expect("second create");

        let snapshot = store
            .load_most_recent("Customer", SnapshotKind::Before)
            .expect("load");
        assert_eq!(snapshot.kind, SnapshotKind::Before);
        assert_eq!(snapshot.tables[0].schema[0].description(), "v2");
    }

    #[test]
    fn test_identifiers_sort_chronologically() {
        let dir = TempDir::new().expect("tempdir");
        let store = SnapshotStore::new(dir.path());

        let ids: Vec<SnapshotId> = (0..5)
            .map(|i| {
                store
                    .create("Customer", vec![table("customers", &format!("v{i}"))], SnapshotKind::Before)
                    .expect("create")
            })
            .collect();

        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted, "creation order must equal identifier order");

        let latest = store
            .load_most_recent("Customer", SnapshotKind::Before)
            .expect("load");
        assert_eq!(latest.tables[0].schema[0].description(), "v4");
    }

    #[test]
    fn test_same_timestamp_creations_never_overwrite() {
        let dir = TempDir::new().expect("tempdir");
        let store = SnapshotStore::new(dir.path());
        let now = Utc::now();

        let first = store
            .create_at("Customer", vec![table("customers", "v1")], SnapshotKind::Before, now)
            .expect("first create");
        let second = store
            .create_at("Customer", vec![table("customers", "v2")], SnapshotKind::Before, now)
            .expect("second create");

        assert_ne!(first, second);
        assert!(second > first, "collision suffix must sort after the original");
        assert_eq!(store.list("Customer").expect("list").len(), 2);

        let latest = store
            .load_most_recent("Customer", SnapshotKind::Before)
            .expect("load");
        assert_eq!(latest.tables[0].schema[0].description(), "v2");
    }

    #[test]
    fn test_missing_segment_vs_missing_kind_are_distinct() {
        let dir = TempDir::new().expect("tempdir");
        let store = SnapshotStore::new(dir.path());

        let err = store
            .load_most_recent("Customer", SnapshotKind::Before)
            .expect_err("empty store");
        assert!(matches!(err, SnapshotError::NoSnapshots { .. }));

        store
            .create("Customer", vec![table("customers", "v1")], SnapshotKind::Before)
            .expect("create");
        let err = store
            .load_most_recent("Customer", SnapshotKind::After)
            .expect_err("no after snapshot");
        assert!(matches!(
            err,
            SnapshotError::NoMatchingKind {
                kind: SnapshotKind::After,
                available: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_list_is_newest_first_metadata_only() {
        let dir = TempDir::new().expect("tempdir");
        let store = SnapshotStore::new(dir.path());

        store
            .create("Customer", vec![table("customers", "v1")], SnapshotKind::Before)
            .expect("create before");
        store
            .create(
                "Customer",
                vec![table("customers", "v2"), table("orders", "v2")],
                SnapshotKind::After,
            )
            .expect("create after");
        store
            .create("Other", vec![table("misc", "x")], SnapshotKind::Before)
            .expect("create other segment");

        let listed = store.list("Customer").expect("list");
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].kind, SnapshotKind::After);
        assert_eq!(listed[0].table_count, 2);
        assert_eq!(listed[1].kind, SnapshotKind::Before);
        assert!(listed[0].timestamp >= listed[1].timestamp);
    }

    #[test]
    fn test_segment_match_survives_hostile_names() {
        let dir = TempDir::new().expect("tempdir");
        let store = SnapshotStore::new(dir.path());

        let id = store
            .create("Contacts: Demo", vec![table("contacts", "v1")], SnapshotKind::Before)
            .expect("create");
        assert!(!id.as_str().contains(':'), "identifier must be filesystem safe");

        let snapshot = store
            .load_most_recent("Contacts: Demo", SnapshotKind::Before)
            .expect("load by true segment name");
        assert_eq!(snapshot.segment, "Contacts: Demo");
        assert!(store.list("Contacts_ Demo").expect("list").is_empty());
    }

    #[test]
    fn test_snapshot_json_shape() {
        let dir = TempDir::new().expect("tempdir");
        let store = SnapshotStore::new(dir.path());
        let id = store
            .create("Customer", vec![table("customers", "desc")], SnapshotKind::Before)
            .expect("create");

        let body = std::fs::read_to_string(store.snapshot_path(&id)).expect("read file");
        let value: serde_json::Value = serde_json::from_str(&body).expect("parse");
        assert_eq!(value["segment"], "Customer");
        assert_eq!(value["type"], "before");
        assert_eq!(
            value["tables"][0]["schema"][0],
            serde_json::json!(["customer_id", "string", "desc"])
        );
    }
}
