//! Workspace path resolution.
//!
//! Everything lives under one root directory (`--root` / `DATADICT_ROOT`):
//! `descriptions/` and `schemas/` are read-only pipeline inputs, `reviews/`
//! holds the editable CSVs and error logs, `snapshots/` the rollback
//! records, `logs/` the append log.

use std::path::{Path, PathBuf};

/// Resolved directory layout for one workspace root.
#[derive(Debug, Clone)]
pub struct WorkspacePaths {
    root: PathBuf,
}

impl WorkspacePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn descriptions_dir(&self) -> PathBuf {
        self.root.join("descriptions")
    }

    pub fn schemas_dir(&self) -> PathBuf {
        self.root.join("schemas")
    }

    pub fn reviews_dir(&self) -> PathBuf {
        self.root.join("reviews")
    }

    pub fn snapshots_dir(&self) -> PathBuf {
        self.root.join("snapshots")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    /// Generated description document for a segment.
    pub fn description_path(&self, segment: &str) -> PathBuf {
        self.descriptions_dir()
            .join(format!("{segment}-descriptions.json"))
    }

    /// Extracted schema document for a segment, if the extract phase ran.
    pub fn schema_path(&self, segment: &str) -> PathBuf {
        self.schemas_dir().join(format!("{segment}.json"))
    }

    /// Editable review CSV for a segment.
    pub fn review_csv_path(&self, segment: &str) -> PathBuf {
        self.reviews_dir().join(format!("{segment}.csv"))
    }

    /// Machine-readable write-back failure log for a segment.
    pub fn writeback_error_log_path(&self, segment: &str) -> PathBuf {
        self.reviews_dir()
            .join(format!("{segment}-writeback-errors.json"))
    }
}
