//! Review command: export descriptions to editable CSV files.
//!
//! One CSV per segment lands in `reviews/` (or `--output`). When a schema
//! document exists for the segment it contributes column types and sample
//! values for PII detection. After exporting, the command holds an edit gate
//! so the workflow naturally pauses while a human reviews the file.

use crate::cli::config::WorkspacePaths;
use crate::cli::error::HelpfulError;
use crate::cli::output;
use crate::cli::segments;
use anyhow::{Context, Result};
use datadict_schema::codec;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, clap::Args)]
pub struct ReviewArgs {
    /// Segments to export (discovered with --batch when omitted)
    pub segments: Vec<String>,

    /// Directory for the exported CSVs (default: {root}/reviews)
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Export every segment found under descriptions/
    #[arg(long)]
    pub batch: bool,

    /// Skip the edit gate after exporting
    #[arg(short = 'y', long)]
    pub yes: bool,
}

pub fn run(args: ReviewArgs, paths: &WorkspacePaths) -> Result<ExitCode> {
    let segments = if args.segments.is_empty() || args.batch {
        let discovered = segments::discover_description_segments(paths)?;
        if discovered.is_empty() {
            return Err(HelpfulError::no_segments(
                &paths.descriptions_dir(),
                "description documents",
            )
            .with_suggestion("TRY: datadict review <SEGMENT> to name one explicitly")
            .into());
        }
        discovered
    } else {
        args.segments.clone()
    };

    let output_dir = args.output.clone().unwrap_or_else(|| paths.reviews_dir());

    output::section("EXPORTING REVIEW FILES");
    let mut rows = Vec::new();
    for segment in &segments {
        let description = segments::load_description(paths, segment)?;
        let schema = segments::load_schema(paths, segment)?;
        tracing::info!(segment, tables = description.tables.len(), "Exporting segment");

        let export_rows = codec::export(&description, schema.as_ref())
            .with_context(|| format!("Failed to export segment {segment}"))?;
        let csv_path = output_dir.join(format!("{segment}.csv"));
        let meta = codec::write_csv(&csv_path, &export_rows)
            .with_context(|| format!("Failed to write {}", csv_path.display()))?;

        println!("✓ {segment}: {} rows ({} flagged PII)", meta.row_count, meta.pii_count);
        println!("  {}", meta.path.display());
        rows.push(vec![
            segment.clone(),
            meta.row_count.to_string(),
            meta.pii_count.to_string(),
            meta.path.display().to_string(),
        ]);
    }

    output::print_table(&["Segment", "Rows", "PII", "File"], rows);

    println!("\nEdit the CSV file(s), then run: datadict validate");
    println!("Editable column: description. Do not change type or source.");
    output::wait_for_enter("Press Enter when your review is complete... ", args.yes)?;

    Ok(ExitCode::SUCCESS)
}
