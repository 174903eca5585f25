//! CSV Codec
//!
//! Lossless, human-editable serialization of a DescriptionDocument into flat
//! rows and back. The export side targets spreadsheet tools: UTF-8 with a
//! leading BOM, comma separated, `\n` line endings, quoting only where a
//! field demands it. The import side is deliberately forgiving — cells are
//! trimmed and bad `is_pii` values are carried through unparsed so the
//! validator can report them with row context instead of failing the parse.

use crate::document::{DescriptionDocument, SchemaDocument};
use crate::pii::detect_pii_column;
use crate::validate::RowIssue;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from CSV export/import. Input-shape problems are caller
/// configuration errors and fail the whole operation; there are no partial
/// results at this layer.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Invalid description document: missing segment_name")]
    MissingSegmentName,

    #[error("Invalid description document: tables array is empty")]
    EmptyTables,

    #[error("Invalid description document: table {database}.{table} has no columns")]
    NoColumns { database: String, table: String },

    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// One row of the review CSV. `table` is the table-type tag, not the physical
/// table name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabularRow {
    pub table: String,
    pub column: String,
    #[serde(rename = "type")]
    pub col_type: String,
    pub source: String,
    pub description: String,
    pub is_pii: bool,
}

/// An `is_pii` cell as it came off disk. Only the literal strings `true` and
/// `false` parse; everything else is kept verbatim for the validator.
#[derive(Debug, Clone, PartialEq)]
pub enum PiiCell {
    Parsed(bool),
    Unparsed(String),
}

impl PiiCell {
    fn from_cell(cell: &str) -> Self {
        match cell {
            "true" => PiiCell::Parsed(true),
            "false" => PiiCell::Parsed(false),
            other => PiiCell::Unparsed(other.to_string()),
        }
    }
}

/// A parsed review row before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    pub table: String,
    pub column: String,
    pub col_type: String,
    pub source: String,
    pub description: String,
    pub is_pii: PiiCell,
}

/// A parsed review CSV: the header set (needed for structural validation)
/// plus every data row.
#[derive(Debug, Clone, Default)]
pub struct TabularDocument {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

/// Metadata about a completed export.
#[derive(Debug, Clone)]
pub struct ExportMeta {
    pub path: PathBuf,
    pub row_count: usize,
    pub pii_count: usize,
}

/// Flatten a DescriptionDocument into review rows, one per column across all
/// tables, in document order.
///
/// Column types come from the description column when present, otherwise from
/// the extracted schema, otherwise stay empty; they are uppercased for the
/// reviewer. `source` falls back to the "TD" sentinel for empty databases.
/// PII flags combine name heuristics with sample-content inspection when the
/// schema document carries samples.
pub fn export(
    doc: &DescriptionDocument,
    schema: Option<&SchemaDocument>,
) -> Result<Vec<TabularRow>, CodecError> {
    if doc.segment_name.trim().is_empty() {
        return Err(CodecError::MissingSegmentName);
    }
    if doc.tables.is_empty() {
        return Err(CodecError::EmptyTables);
    }

    let mut rows = Vec::with_capacity(doc.column_count());
    for table in &doc.tables {
        if table.columns.is_empty() {
            return Err(CodecError::NoColumns {
                database: table.database.clone(),
                table: table.table.clone(),
            });
        }

        for column in &table.columns {
            let col_type = column
                .col_type
                .clone()
                .filter(|t| !t.is_empty())
                .or_else(|| {
                    schema
                        .and_then(|s| s.column_type(table.table_type, &column.column_name))
                        .map(str::to_string)
                })
                .unwrap_or_default();

            let samples = schema
                .map(|s| s.sample_values(table.table_type, &column.column_name))
                .unwrap_or_default();

            rows.push(TabularRow {
                table: table.table_type.as_str().to_string(),
                column: column.column_name.clone(),
                col_type: col_type.to_uppercase(),
                source: table.source().to_string(),
                description: column.description.clone(),
                is_pii: detect_pii_column(&column.column_name, &samples),
            });
        }
    }

    Ok(rows)
}

/// Write review rows to disk in the spreadsheet-compatible form.
pub fn write_csv(path: &Path, rows: &[TabularRow]) -> Result<ExportMeta, CodecError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|source| CodecError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }

    let mut file = fs::File::create(path).map_err(|source| CodecError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    // UTF-8 BOM so Excel opens the file with the right encoding.
    file.write_all(b"\xEF\xBB\xBF").map_err(|source| CodecError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Necessary)
        .from_writer(file);
    for row in rows {
        writer.serialize(row).map_err(|source| CodecError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
    }
    writer.flush().map_err(|source| CodecError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(ExportMeta {
        path: path.to_path_buf(),
        row_count: rows.len(),
        pii_count: rows.iter().filter(|r| r.is_pii).count(),
    })
}

/// Parse a review CSV back into raw rows.
///
/// Strips a UTF-8 BOM if present, treats the first row as the header, trims
/// cell whitespace, and casts `is_pii` from the literal strings
/// `true`/`false` — any other value is kept as-is for the validator to flag.
pub fn import(path: &Path) -> Result<TabularDocument, CodecError> {
    let content = fs::read_to_string(path).map_err(|source| CodecError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let content = content.strip_prefix('\u{FEFF}').unwrap_or(&content);

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|source| CodecError::Csv {
            path: path.to_path_buf(),
            source,
        })?
        .iter()
        .map(str::to_string)
        .collect();

    let index_of = |name: &str| headers.iter().position(|h| h == name);
    let idx_table = index_of("table");
    let idx_column = index_of("column");
    let idx_type = index_of("type");
    let idx_source = index_of("source");
    let idx_description = index_of("description");
    let idx_is_pii = index_of("is_pii");

    let cell = |record: &csv::StringRecord, idx: Option<usize>| -> String {
        idx.and_then(|i| record.get(i)).unwrap_or("").to_string()
    };

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|source| CodecError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        let is_pii = PiiCell::from_cell(&cell(&record, idx_is_pii));
        rows.push(RawRow {
            table: cell(&record, idx_table),
            column: cell(&record, idx_column),
            col_type: cell(&record, idx_type),
            source: cell(&record, idx_source),
            description: cell(&record, idx_description),
            is_pii,
        });
    }

    Ok(TabularDocument { headers, rows })
}

/// Write the validation error log beside a reviewed CSV as
/// `{stem}-errors.csv`. The suffix keeps it from ever being mistaken for an
/// editable review file.
pub fn write_error_log(csv_path: &Path, errors: &[RowIssue]) -> Result<PathBuf, CodecError> {
    let stem = csv_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "review".to_string());
    let log_path = csv_path.with_file_name(format!("{stem}-errors.csv"));

    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Necessary)
        .from_path(&log_path)
        .map_err(|source| CodecError::Csv {
            path: log_path.clone(),
            source,
        })?;
    writer
        .write_record(["row", "column", "issue"])
        .map_err(|source| CodecError::Csv {
            path: log_path.clone(),
            source,
        })?;
    for error in errors {
        writer
            .write_record([error.row.to_string(), error.column.clone(), error.issue.clone()])
            .map_err(|source| CodecError::Csv {
                path: log_path.clone(),
                source,
            })?;
    }
    writer.flush().map_err(|source| CodecError::Io {
        path: log_path.clone(),
        source,
    })?;

    Ok(log_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{
        Classification, DescriptionColumn, DescriptionTable, TableType,
    };
    use chrono::Utc;
    use tempfile::TempDir;

    fn column(name: &str, description: &str) -> DescriptionColumn {
        DescriptionColumn {
            column_name: name.to_string(),
            description: description.to_string(),
            classification: Classification::Attribute,
            usage_hint: None,
            col_type: Some("string".to_string()),
        }
    }

    fn doc() -> DescriptionDocument {
        DescriptionDocument {
            segment_name: "Customer".to_string(),
            generated_at: Utc::now(),
            tables: vec![DescriptionTable {
                table_type: TableType::Master,
                database: "prod_db".to_string(),
                table: "customers".to_string(),
                columns: vec![
                    column("email", "Customer email address"),
                    column("notes", "Free text, sometimes with, commas"),
                ],
            }],
        }
    }

    #[test]
    fn test_export_flattens_and_flags_pii() {
        let rows = export(&doc(), None).expect("export should succeed");
        assert_eq!(rows.len(), 2);

        assert_eq!(rows[0].table, "master");
        assert_eq!(rows[0].column, "email");
        assert_eq!(rows[0].col_type, "STRING");
        assert_eq!(rows[0].source, "prod_db");
        assert!(rows[0].is_pii);

        assert!(!rows[1].is_pii);
    }

    #[test]
    fn test_export_rejects_bad_documents() {
        let mut no_segment = doc();
        no_segment.segment_name = "  ".to_string();
        assert!(matches!(export(&no_segment, None), Err(CodecError::MissingSegmentName)));

        let mut no_tables = doc();
        no_tables.tables.clear();
        assert!(matches!(export(&no_tables, None), Err(CodecError::EmptyTables)));

        let mut no_columns = doc();
        no_columns.tables[0].columns.clear();
        assert!(matches!(export(&no_columns, None), Err(CodecError::NoColumns { .. })));
    }

    #[test]
    fn test_write_csv_bom_header_and_quoting() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("Customer.csv");
        let rows = export(&doc(), None).expect("export");

        let meta = write_csv(&path, &rows).expect("write_csv");
        assert_eq!(meta.row_count, 2);
        assert_eq!(meta.pii_count, 1);

        let bytes = fs::read(&path).expect("read back");
        assert_eq!(&bytes[..3], b"\xEF\xBB\xBF");

        let text = String::from_utf8(bytes[3..].to_vec()).expect("utf8");
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("table,column,type,source,description,is_pii"));
        let first = lines.next().expect("data row");
        assert!(first.ends_with(",true"), "boolean must render lowercase: {first}");
        let second = lines.next().expect("second row");
        assert!(
            second.contains("\"Free text, sometimes with, commas\""),
            "comma field must be quoted: {second}"
        );
        assert!(!text.contains('\r'), "line endings must be bare \\n");
    }

    #[test]
    fn test_import_round_trips_export() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("Customer.csv");
        let rows = export(&doc(), None).expect("export");
        write_csv(&path, &rows).expect("write_csv");

        let parsed = import(&path).expect("import");
        assert_eq!(parsed.headers, vec!["table", "column", "type", "source", "description", "is_pii"]);
        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.rows[0].column, "email");
        assert_eq!(parsed.rows[0].is_pii, PiiCell::Parsed(true));
        assert_eq!(parsed.rows[1].description, "Free text, sometimes with, commas");
    }

    #[test]
    fn test_import_keeps_bad_pii_values_unparsed() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("edited.csv");
        fs::write(
            &path,
            "table,column,type,source,description,is_pii\nmaster, email ,STRING,prod_db,hi,maybe\n",
        )
        .expect("write fixture");

        let parsed = import(&path).expect("import");
        assert_eq!(parsed.rows[0].column, "email", "cells must be trimmed");
        assert_eq!(parsed.rows[0].is_pii, PiiCell::Unparsed("maybe".to_string()));
    }

    #[test]
    fn test_error_log_path_and_contents() {
        let dir = TempDir::new().expect("tempdir");
        let csv_path = dir.path().join("Customer.csv");
        let errors = vec![RowIssue {
            row: 3,
            column: "type".to_string(),
            issue: "Type changed from 'string' to 'int' (immutable field)".to_string(),
        }];

        let log_path = write_error_log(&csv_path, &errors).expect("error log");
        assert!(log_path.ends_with("Customer-errors.csv"));

        let text = fs::read_to_string(&log_path).expect("read log");
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("row,column,issue"));
        assert!(lines.next().expect("entry").starts_with("3,type,"));
    }
}
