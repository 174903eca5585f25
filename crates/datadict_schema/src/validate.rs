//! Row Validation
//!
//! Validates an edited review CSV against the original description document.
//! Lazy, collect-all validation: every row is visited exactly once and every
//! violation is recorded, because the review workflow is a single round-trip
//! through a human editor — failing fast would force one edit cycle per
//! error instead of one for all of them.

use crate::codec::{PiiCell, RawRow, TabularDocument, TabularRow};
use crate::document::DescriptionDocument;
use serde::Serialize;

/// The exact header set a review CSV must carry.
pub const REQUIRED_COLUMNS: [&str; 6] = ["table", "column", "type", "source", "description", "is_pii"];

/// One validation finding. `row` is 1-indexed; structural findings use row 0.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowIssue {
    pub row: usize,
    pub column: String,
    pub issue: String,
}

/// Counts for the whole validation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ValidationSummary {
    pub total: usize,
    pub valid_count: usize,
    pub error_count: usize,
}

/// The complete result of one validation pass. Never partial: rows with
/// errors contribute all of them to `errors` and are excluded from `valid`.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub valid: Vec<TabularRow>,
    pub errors: Vec<RowIssue>,
    pub summary: ValidationSummary,
}

impl ValidationResult {
    pub fn passed(&self) -> bool {
        self.errors.is_empty()
    }
}

/// The original state of a column, resolved for immutability checks.
struct OriginalColumn<'a> {
    col_type: &'a str,
    source: &'a str,
}

/// Find a column in the original document by `(table_type, column_name)`.
///
/// All tables sharing the type tag are searched; the first match wins, the
/// same resolution the write-back path uses.
fn find_original_column<'a>(
    doc: &'a DescriptionDocument,
    table_type: &str,
    column: &str,
) -> Option<OriginalColumn<'a>> {
    doc.tables
        .iter()
        .filter(|t| t.table_type.as_str() == table_type)
        .find_map(|t| {
            t.columns
                .iter()
                .find(|c| c.column_name == column)
                .map(|c| OriginalColumn {
                    col_type: c.col_type.as_deref().unwrap_or(""),
                    source: t.source(),
                })
        })
}

/// Validate parsed review rows, optionally against the original document.
///
/// Checks, in order: header structure, per-row required fields and `is_pii`
/// typing, immutable-field edits and schema drift against the original, and
/// finally whole-document column removal. All findings accumulate; nothing
/// stops at the first error.
pub fn validate(doc: &TabularDocument, original: Option<&DescriptionDocument>) -> ValidationResult {
    // Empty input is a distinct base case, not an error.
    if doc.rows.is_empty() {
        return ValidationResult {
            valid: Vec::new(),
            errors: Vec::new(),
            summary: ValidationSummary {
                total: 0,
                valid_count: 0,
                error_count: 0,
            },
        };
    }

    let mut errors = Vec::new();
    let mut valid = Vec::new();

    // Header structure. Recorded but never blocks the row-level checks.
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|required| !doc.headers.iter().any(|h| h == required))
        .collect();
    if !missing.is_empty() {
        errors.push(RowIssue {
            row: 0,
            column: "structure".to_string(),
            issue: format!("Missing required columns: {}", missing.join(", ")),
        });
    }
    let extra: Vec<&str> = doc
        .headers
        .iter()
        .map(String::as_str)
        .filter(|h| !REQUIRED_COLUMNS.contains(h))
        .collect();
    if !extra.is_empty() {
        errors.push(RowIssue {
            row: 0,
            column: "structure".to_string(),
            issue: format!("Unexpected columns: {}", extra.join(", ")),
        });
    }

    // Row-level checks, 1-indexed for error reporting.
    for (index, row) in doc.rows.iter().enumerate() {
        let row_number = index + 1;
        let mut row_errors = Vec::new();

        check_required_fields(row, row_number, &mut row_errors);
        check_pii_flag(row, row_number, &mut row_errors);
        if let Some(original) = original {
            check_against_original(row, row_number, original, &mut row_errors);
        }

        if row_errors.is_empty() {
            if let PiiCell::Parsed(is_pii) = row.is_pii {
                valid.push(TabularRow {
                    table: row.table.clone(),
                    column: row.column.clone(),
                    col_type: row.col_type.clone(),
                    source: row.source.clone(),
                    description: row.description.clone(),
                    is_pii,
                });
            }
        } else {
            errors.extend(row_errors);
        }
    }

    // Removed-column check: a row deleted from the CSV would silently drop a
    // column on the next whole-schema replace, so absence is a hard error.
    if let Some(original) = original {
        let present: std::collections::HashSet<(String, String)> = doc
            .rows
            .iter()
            .map(|r| (r.table.clone(), r.column.clone()))
            .collect();
        for table in &original.tables {
            for column in &table.columns {
                let key = (table.table_type.as_str().to_string(), column.column_name.clone());
                if !present.contains(&key) {
                    errors.push(RowIssue {
                        row: 0,
                        column: "structure".to_string(),
                        issue: format!(
                            "Column '{}.{}' removed from CSV (exists in original schema)",
                            key.0, key.1
                        ),
                    });
                }
            }
        }
    }

    let summary = ValidationSummary {
        total: doc.rows.len(),
        valid_count: valid.len(),
        error_count: errors.len(),
    };
    ValidationResult { valid, errors, summary }
}

fn check_required_fields(row: &RawRow, row_number: usize, errors: &mut Vec<RowIssue>) {
    let mut missing = Vec::new();
    if row.table.is_empty() {
        missing.push("table");
    }
    if row.column.is_empty() {
        missing.push("column");
    }
    if row.source.is_empty() {
        missing.push("source");
    }
    if !missing.is_empty() {
        errors.push(RowIssue {
            row: row_number,
            column: "required_fields".to_string(),
            issue: format!("Missing required field(s): {}", missing.join(", ")),
        });
    }
}

fn check_pii_flag(row: &RawRow, row_number: usize, errors: &mut Vec<RowIssue>) {
    if let PiiCell::Unparsed(value) = &row.is_pii {
        errors.push(RowIssue {
            row: row_number,
            column: "is_pii".to_string(),
            issue: format!("Expected boolean, got string (value: {value})"),
        });
    }
}

fn check_against_original(
    row: &RawRow,
    row_number: usize,
    original: &DescriptionDocument,
    errors: &mut Vec<RowIssue>,
) {
    if row.table.is_empty() || row.column.is_empty() {
        return;
    }

    match find_original_column(original, &row.table, &row.column) {
        Some(original_column) => {
            // type compares case-insensitively: the export uppercases while
            // extraction records lowercase warehouse types.
            if !row.col_type.eq_ignore_ascii_case(original_column.col_type) {
                errors.push(RowIssue {
                    row: row_number,
                    column: "type".to_string(),
                    issue: format!(
                        "Type changed from '{}' to '{}' (immutable field)",
                        original_column.col_type, row.col_type
                    ),
                });
            }
            if row.source != original_column.source {
                errors.push(RowIssue {
                    row: row_number,
                    column: "source".to_string(),
                    issue: format!(
                        "Source changed from '{}' to '{}' (immutable field)",
                        original_column.source, row.source
                    ),
                });
            }
        }
        None => {
            errors.push(RowIssue {
                row: row_number,
                column: "structure".to_string(),
                issue: format!(
                    "Column '{}.{}' not found in original schema (schema drift detected)",
                    row.table, row.column
                ),
            });
        }
    }
}
