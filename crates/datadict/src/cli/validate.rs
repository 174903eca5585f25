//! Validate command: check edited review CSVs against the originals.
//!
//! Collect-all validation per segment. Failures produce a
//! `{segment}-errors.csv` log beside the review file so the reviewer can fix
//! every finding in one pass. Exit code 1 when any segment fails.

use crate::cli::config::WorkspacePaths;
use crate::cli::error::HelpfulError;
use crate::cli::output;
use crate::cli::segments;
use anyhow::{Context, Result};
use datadict_schema::{codec, validate, DescriptionDocument, ValidationResult};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Debug, clap::Args)]
pub struct ValidateArgs {
    /// Segments to validate (all review CSVs when omitted)
    pub segments: Vec<String>,

    /// Directory holding the review CSVs (default: {root}/reviews)
    #[arg(long)]
    pub input: Option<PathBuf>,
}

/// Import one review CSV and validate it against the segment's original
/// description document (with schema types merged in when available).
/// Shared with write-back, which refuses to send unvalidated rows.
pub fn import_and_validate(
    paths: &WorkspacePaths,
    segment: &str,
    csv_path: &Path,
) -> Result<(ValidationResult, Option<DescriptionDocument>)> {
    if !csv_path.exists() {
        return Err(HelpfulError::review_not_found(segment, csv_path).into());
    }

    let doc = codec::import(csv_path)
        .with_context(|| format!("Failed to import {}", csv_path.display()))?;

    let original = match segments::load_description(paths, segment) {
        Ok(description) => match segments::load_schema(paths, segment)? {
            Some(schema) => Some(description.with_schema_types(&schema)),
            None => Some(description),
        },
        Err(err) if err.downcast_ref::<HelpfulError>().is_some() => {
            tracing::warn!(segment, "No description document, immutability checks skipped");
            None
        }
        Err(err) => return Err(err),
    };

    Ok((validate::validate(&doc, original.as_ref()), original))
}

pub fn run(args: ValidateArgs, paths: &WorkspacePaths) -> Result<ExitCode> {
    let input_dir = args.input.clone().unwrap_or_else(|| paths.reviews_dir());

    let segments = if args.segments.is_empty() {
        let discovered = segments::discover_review_segments(&input_dir)?;
        if discovered.is_empty() {
            return Err(HelpfulError::no_segments(&input_dir, "review CSV files")
                .with_suggestion("TRY: datadict review --batch to export them first")
                .into());
        }
        discovered
    } else {
        args.segments.clone()
    };

    output::section("VALIDATING REVIEW FILES");
    let mut table_rows = Vec::new();
    let mut any_failed = false;

    for segment in &segments {
        let csv_path = input_dir.join(format!("{segment}.csv"));
        let (result, _) = import_and_validate(paths, segment, &csv_path)?;

        let status = if result.passed() {
            println!("✓ {segment}: {} rows valid", result.summary.valid_count);
            "PASS".to_string()
        } else {
            any_failed = true;
            let log_path = codec::write_error_log(&csv_path, &result.errors)
                .with_context(|| format!("Failed to write error log for {segment}"))?;
            println!(
                "✗ {segment}: {} error(s) across {} row(s)",
                result.summary.error_count, result.summary.total
            );
            for issue in result.errors.iter().take(5) {
                println!("    row {}: [{}] {}", issue.row, issue.column, issue.issue);
            }
            if result.errors.len() > 5 {
                println!("    ... {} more, see error log", result.errors.len() - 5);
            }
            println!("  Error log: {}", log_path.display());
            "FAIL".to_string()
        };

        table_rows.push(vec![
            segment.clone(),
            result.summary.total.to_string(),
            result.summary.valid_count.to_string(),
            result.summary.error_count.to_string(),
            status,
        ]);
    }

    output::print_table(&["Segment", "Rows", "Valid", "Errors", "Status"], table_rows);

    if any_failed {
        println!("\nFix the reported issues and re-run: datadict validate");
        Ok(ExitCode::from(1))
    } else {
        println!("\nAll segments valid. Next: datadict writeback");
        Ok(ExitCode::SUCCESS)
    }
}
