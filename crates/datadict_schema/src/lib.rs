//! Data Dictionary Core
//!
//! # Philosophy: the CSV is a review gate, not a data format
//!
//! The description workflow in datadict:
//!
//! 1. **Extraction**: segment schemas are pulled from the warehouse (SchemaDocument)
//! 2. **Generation**: column descriptions are produced (DescriptionDocument)
//! 3. **Review**: descriptions are exported to CSV for a human editor
//! 4. **Validation**: the edited CSV is diffed against the original document,
//!    collecting every violation in one pass
//! 5. **Write-back**: approved rows are replayed to the warehouse, bracketed
//!    by before/after snapshots for rollback
//!
//! The remote schema-replace API has no merge semantics: a missing column in
//! the submitted set is a deleted column. The validator therefore treats row
//! removal and immutable-field edits as hard errors, never silent overrides.
//!
//! # Modules
//!
//! - [`document`]: Source-of-truth document types (SchemaDocument, DescriptionDocument)
//! - [`codec`]: CSV export/import for the human review round-trip
//! - [`pii`]: Column-name and sample-content PII detection
//! - [`validate`]: Collect-all-errors row validation against the original document
//! - [`snapshot`]: Append-only before/after schema snapshots

pub mod codec;
pub mod document;
pub mod pii;
pub mod snapshot;
pub mod validate;

pub use codec::{CodecError, ExportMeta, PiiCell, RawRow, TabularDocument, TabularRow};
pub use document::{
    Classification, ColumnQuad, ColumnTriple, DescriptionColumn, DescriptionDocument,
    DescriptionTable, SchemaColumn, SchemaDocument, SchemaTable, TableType,
};
pub use snapshot::{
    Snapshot, SnapshotError, SnapshotId, SnapshotKind, SnapshotStore, SnapshotSummary,
    SnapshotTable,
};
pub use validate::{RowIssue, ValidationResult, ValidationSummary, REQUIRED_COLUMNS};
