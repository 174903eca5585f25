//! Writeback command: push approved descriptions to Treasure Data.
//!
//! The remote endpoint replaces a table's whole schema, so every update is
//! built by fetching the current schema and substituting descriptions for
//! the reviewed columns; everything else passes through untouched. The run
//! is bracketed by snapshots in strict phases: every segment's `before`
//! snapshot (the fetched pre-mutation state, the rollback source) is written
//! first and any failure there aborts before the first remote mutation;
//! `after` snapshots are written only when the whole run had zero failures,
//! so their presence certifies a fully-applied run.
//!
//! Failures never cascade: a segment that fails to load or validate, or a
//! table that fails to apply, is reported and the run continues with the
//! rest.

use crate::cli::apply::{self, ApplyOutcome, TableFailure, TablePayload};
use crate::cli::config::WorkspacePaths;
use crate::cli::output;
use crate::cli::segments;
use crate::cli::validate::import_and_validate;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use datadict_remote::{SchemaApi, TdApiClient};
use datadict_schema::{
    ColumnQuad, ColumnTriple, DescriptionDocument, SnapshotKind, SnapshotStore, SnapshotTable,
    TabularRow,
};
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, clap::Args)]
pub struct WritebackArgs {
    /// Segments to write back (all review CSVs when omitted)
    pub segments: Vec<String>,

    /// Directory holding the review CSVs (default: {root}/reviews)
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Print the per-table payloads and exit without writing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,
}

/// One table's planned update: the fetched current schema plus the merged
/// replacement payload.
#[derive(Debug, Clone)]
pub struct TablePlan {
    pub database: String,
    pub table: String,
    pub current: Vec<ColumnTriple>,
    pub merged: Vec<ColumnQuad>,
}

/// Everything needed to apply one segment.
pub struct SegmentPlan {
    pub segment: String,
    pub plans: Vec<TablePlan>,
    /// Tables that could not be planned (fetch failed). Reported as
    /// failures without ever being applied.
    pub planning_failures: Vec<TableFailure>,
}

/// Machine-readable failure log, written beside the review CSV.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WritebackErrorLog {
    segment: String,
    timestamp: DateTime<Utc>,
    total_failures: usize,
    errors: Vec<WritebackErrorEntry>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WritebackErrorEntry {
    table: String,
    error: String,
    status_code: Option<u16>,
    retryable: bool,
}

impl From<&TableFailure> for WritebackErrorEntry {
    fn from(failure: &TableFailure) -> Self {
        Self {
            table: format!("{}.{}", failure.database, failure.table),
            error: failure.error.clone(),
            status_code: failure.status_code,
            retryable: failure.retryable,
        }
    }
}

/// Build the `(table_type, column) -> (database, table)` lookup from the
/// original document. First match wins; duplicates are logged because rows
/// that hit them may be attributed to the wrong physical table.
fn build_table_lookup(doc: &DescriptionDocument) -> HashMap<(String, String), (String, String)> {
    let mut lookup = HashMap::new();
    for table in &doc.tables {
        for column in &table.columns {
            let key = (table.table_type.as_str().to_string(), column.column_name.clone());
            if let Some((database, name)) = lookup.get(&key) {
                if *database != table.database || *name != table.table {
                    tracing::warn!(
                        table_type = %key.0,
                        column = %key.1,
                        kept = %format!("{database}.{name}"),
                        ignored = %format!("{}.{}", table.database, table.table),
                        "Ambiguous column mapping, keeping first match"
                    );
                }
                continue;
            }
            lookup.insert(key, (table.database.clone(), table.table.clone()));
        }
    }
    lookup
}

/// Rows grouped by physical table, in first-appearance order.
struct TableRows {
    database: String,
    table: String,
    rows: Vec<TabularRow>,
}

fn group_rows(
    valid: &[TabularRow],
    lookup: &HashMap<(String, String), (String, String)>,
) -> Vec<TableRows> {
    let mut groups: Vec<TableRows> = Vec::new();
    for row in valid {
        let key = (row.table.clone(), row.column.clone());
        let (database, table) = match lookup.get(&key) {
            Some(target) => target.clone(),
            None => {
                // Degraded fallback: trust the row's own source/table values.
                tracing::warn!(
                    table_type = %row.table,
                    column = %row.column,
                    "Column not in original document, using row values for routing"
                );
                (row.source.clone(), row.table.clone())
            }
        };

        match groups.iter_mut().find(|g| g.database == database && g.table == table) {
            Some(group) => group.rows.push(row.clone()),
            None => groups.push(TableRows {
                database,
                table,
                rows: vec![row.clone()],
            }),
        }
    }
    groups
}

/// Merge reviewed descriptions into a fetched schema.
///
/// Every current column is kept; columns named in the edits get the new
/// description, the rest keep theirs. Edits naming columns the remote does
/// not have are dropped with a warning — the replace API would otherwise
/// invent columns. An empty fetched schema falls back to building the
/// payload from the rows themselves.
fn merge_schema(current: &[ColumnTriple], rows: &[TabularRow]) -> Vec<ColumnQuad> {
    if current.is_empty() {
        return rows
            .iter()
            .map(|row| {
                ColumnQuad(
                    row.column.clone(),
                    row.col_type.to_lowercase(),
                    None,
                    row.description.clone(),
                )
            })
            .collect();
    }

    let edits: HashMap<&str, &str> = rows
        .iter()
        .map(|row| (row.column.as_str(), row.description.as_str()))
        .collect();
    for row in rows {
        if !current.iter().any(|c| c.name() == row.column) {
            tracing::warn!(column = %row.column, "Column missing from remote schema, description dropped");
        }
    }

    current
        .iter()
        .map(|triple| ColumnQuad::from_triple(triple, edits.get(triple.name()).copied()))
        .collect()
}

/// Plan one segment: validate the CSV, route rows to physical tables, fetch
/// each table's current schema, and merge. Returns `None` when the segment
/// is excluded (validation failed or no description document, both already
/// reported) so the run can continue with other segments.
async fn plan_segment(
    api: &dyn SchemaApi,
    paths: &WorkspacePaths,
    segment: &str,
    input_dir: &std::path::Path,
) -> Result<Option<SegmentPlan>> {
    let csv_path = input_dir.join(format!("{segment}.csv"));
    let (result, original) = import_and_validate(paths, segment, &csv_path)?;

    // Validation can run degraded without the description document, but
    // write-back cannot: rows would be routed blind. Exclude the segment.
    let Some(original) = original else {
        println!(
            "✗ {segment}: no description document at {}, segment skipped",
            paths.description_path(segment).display()
        );
        return Ok(None);
    };

    if !result.passed() {
        let log_path = datadict_schema::codec::write_error_log(&csv_path, &result.errors)
            .with_context(|| format!("Failed to write error log for {segment}"))?;
        println!(
            "✗ {segment}: validation failed ({} error(s)), segment skipped",
            result.summary.error_count
        );
        println!("  Error log: {}", log_path.display());
        return Ok(None);
    }
    if result.valid.is_empty() {
        println!("- {segment}: review CSV is empty, nothing to send");
        return Ok(Some(SegmentPlan {
            segment: segment.to_string(),
            plans: Vec::new(),
            planning_failures: Vec::new(),
        }));
    }

    let lookup = build_table_lookup(&original);
    let groups = group_rows(&result.valid, &lookup);

    let mut plans = Vec::new();
    let mut planning_failures = Vec::new();
    for group in groups {
        match api.fetch_schema(&group.database, &group.table).await {
            Ok(current) => {
                let merged = merge_schema(&current, &group.rows);
                plans.push(TablePlan {
                    database: group.database,
                    table: group.table,
                    current,
                    merged,
                });
            }
            Err(err) => {
                tracing::error!(
                    table = %format!("{}.{}", group.database, group.table),
                    error = %err,
                    "Failed to fetch current schema"
                );
                planning_failures.push(TableFailure {
                    database: group.database,
                    table: group.table,
                    error: err.to_string(),
                    status_code: err.status_code(),
                    retryable: err.is_retryable(),
                });
            }
        }
    }

    Ok(Some(SegmentPlan {
        segment: segment.to_string(),
        plans,
        planning_failures,
    }))
}

/// Plan every segment. A segment that cannot be loaded or fails validation
/// is excluded and counted, never fatal; the rest of the run continues.
async fn plan_all(
    api: &dyn SchemaApi,
    paths: &WorkspacePaths,
    segment_names: &[String],
    input_dir: &std::path::Path,
) -> (Vec<SegmentPlan>, usize) {
    let mut segment_plans = Vec::new();
    let mut skipped = 0usize;
    for segment in segment_names {
        match plan_segment(api, paths, segment, input_dir).await {
            Ok(Some(plan)) => {
                let columns: usize = plan.plans.iter().map(|p| p.merged.len()).sum();
                println!(
                    "✓ {}: {} table(s), {} column(s)",
                    plan.segment,
                    plan.plans.len(),
                    columns
                );
                segment_plans.push(plan);
            }
            Ok(None) => skipped += 1,
            Err(err) => {
                tracing::error!(segment = %segment, error = %err, "Segment planning failed");
                println!("✗ {segment}: planning failed, segment skipped");
                println!("{err:#}");
                skipped += 1;
            }
        }
    }
    (segment_plans, skipped)
}

/// One segment's apply result, planning failures folded in.
#[derive(Debug)]
pub struct SegmentOutcome {
    pub segment: String,
    pub outcome: ApplyOutcome,
}

fn before_tables(plan: &SegmentPlan) -> Vec<SnapshotTable> {
    plan.plans
        .iter()
        .map(|p| SnapshotTable {
            database: p.database.clone(),
            name: p.table.clone(),
            schema: p.current.clone(),
        })
        .collect()
}

fn after_tables(plan: &SegmentPlan) -> Vec<SnapshotTable> {
    plan.plans
        .iter()
        .map(|p| SnapshotTable {
            database: p.database.clone(),
            name: p.table.clone(),
            schema: p.merged.iter().map(ColumnQuad::to_triple).collect(),
        })
        .collect()
}

/// Execute the planned run with snapshot bracketing.
///
/// Phases run in strict order. First, every segment with at least one table
/// to apply gets a `before` snapshot of the fetched pre-mutation schemas;
/// any failure here aborts the whole run before the first remote change.
/// Segments with nothing to apply are not snapshotted, so their previous
/// rollback point stays the most recent. Then every table is applied,
/// continue-on-error. Finally, `after` snapshots of the merged results are
/// written only when the entire run had zero failures.
pub async fn execute_run(
    api: &dyn SchemaApi,
    store: &SnapshotStore,
    plans: &[SegmentPlan],
) -> Result<Vec<SegmentOutcome>> {
    for plan in plans {
        if plan.plans.is_empty() {
            continue;
        }
        let id = store
            .create(&plan.segment, before_tables(plan), SnapshotKind::Before)
            .with_context(|| {
                format!(
                    "Failed to write before snapshot for {}, aborting before any remote change",
                    plan.segment
                )
            })?;
        tracing::info!(segment = %plan.segment, snapshot = %id, "Before snapshot written");
    }

    let mut outcomes = Vec::new();
    for plan in plans {
        println!("\nSegment: {}", plan.segment);
        let payloads: Vec<TablePayload> = plan
            .plans
            .iter()
            .map(|p| TablePayload {
                database: p.database.clone(),
                table: p.table.clone(),
                schema: p.merged.clone(),
            })
            .collect();
        let mut outcome = apply::apply_tables(api, &payloads).await;
        outcome.failures.extend(plan.planning_failures.iter().cloned());
        outcomes.push(SegmentOutcome {
            segment: plan.segment.clone(),
            outcome,
        });
    }

    let run_failures: usize = outcomes.iter().map(|s| s.outcome.failures.len()).sum();
    if run_failures == 0 {
        for plan in plans {
            if plan.plans.is_empty() {
                continue;
            }
            match store.create(&plan.segment, after_tables(plan), SnapshotKind::After) {
                Ok(id) => {
                    tracing::info!(segment = %plan.segment, snapshot = %id, "After snapshot written");
                }
                Err(err) => {
                    tracing::warn!(segment = %plan.segment, error = %err, "After snapshot failed");
                    println!("  Warning: after snapshot could not be written: {err}");
                }
            }
        }
    } else {
        println!("\nAfter snapshots skipped: {run_failures} table(s) failed in this run");
    }

    Ok(outcomes)
}

fn write_failure_log(
    paths: &WorkspacePaths,
    segment: &str,
    failures: &[TableFailure],
) -> Result<PathBuf> {
    let log = WritebackErrorLog {
        segment: segment.to_string(),
        timestamp: Utc::now(),
        total_failures: failures.len(),
        errors: failures.iter().map(WritebackErrorEntry::from).collect(),
    };
    let path = paths.writeback_error_log_path(segment);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let body = serde_json::to_string_pretty(&log).context("Failed to encode failure log")?;
    std::fs::write(&path, body).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

pub async fn run(args: WritebackArgs, paths: &WorkspacePaths) -> Result<ExitCode> {
    let input_dir = args.input.clone().unwrap_or_else(|| paths.reviews_dir());

    let segment_names = if args.segments.is_empty() {
        segments::discover_review_segments(&input_dir)?
    } else {
        args.segments.clone()
    };
    if segment_names.is_empty() {
        println!("Nothing to write back: no review CSVs under {}", input_dir.display());
        return Ok(ExitCode::SUCCESS);
    }

    let client = TdApiClient::from_env()?;
    client
        .test_connection()
        .await
        .context("TD API connection test failed")?;
    tracing::info!(endpoint = client.endpoint(), "TD API connection OK");

    output::section("PLANNING WRITE-BACK");
    let (segment_plans, skipped_segments) =
        plan_all(&client, paths, &segment_names, &input_dir).await;

    let total_tables: usize = segment_plans.iter().map(|p| p.plans.len()).sum();
    if total_tables == 0 && segment_plans.iter().all(|p| p.planning_failures.is_empty()) {
        if skipped_segments > 0 {
            println!("\nEvery segment was skipped; nothing was sent.");
            return Ok(ExitCode::from(1));
        }
        println!("\nNothing to write back: no rows to send.");
        return Ok(ExitCode::SUCCESS);
    }

    if args.dry_run {
        output::section("DRY RUN — PAYLOADS");
        for plan in &segment_plans {
            for table in &plan.plans {
                println!("\n# {}.{} ({} columns)", table.database, table.table, table.merged.len());
                println!(
                    "{}",
                    serde_json::to_string_pretty(&table.merged).context("Failed to encode payload")?
                );
            }
        }
        println!("\nDry run: no snapshots written, no schemas changed.");
        return Ok(ExitCode::SUCCESS);
    }

    let total_columns: usize = segment_plans
        .iter()
        .flat_map(|p| p.plans.iter())
        .map(|t| t.merged.len())
        .sum();
    println!(
        "\nAbout to update {} table(s) across {} segment(s) ({} columns total).",
        total_tables,
        segment_plans.len(),
        total_columns
    );
    println!("Each table's schema is fully replaced; a before snapshot is kept for rollback.");
    if !output::confirm("Proceed with write-back?", args.yes)? {
        println!("Write-back cancelled.");
        return Ok(ExitCode::SUCCESS);
    }

    let store = SnapshotStore::new(paths.snapshots_dir());
    output::section("EXECUTING WRITE-BACK");
    let outcomes = execute_run(&client, &store, &segment_plans).await?;

    let mut any_failures = skipped_segments > 0;
    let mut report_rows = Vec::new();
    for seg in &outcomes {
        if !seg.outcome.failures.is_empty() {
            any_failures = true;
            let log_path = write_failure_log(paths, &seg.segment, &seg.outcome.failures)?;
            println!("Failure log for {}: {}", seg.segment, log_path.display());
        }
        report_rows.push(vec![
            seg.segment.clone(),
            seg.outcome.successes.len().to_string(),
            seg.outcome.failures.len().to_string(),
            if seg.outcome.all_succeeded() { "OK" } else { "PARTIAL" }.to_string(),
        ]);
    }

    output::section("WRITE-BACK SUMMARY");
    output::print_table(&["Segment", "Updated", "Failed", "Status"], report_rows);

    if any_failures {
        println!("\nWrite-back completed with errors. Failed tables were not retried;");
        println!("fix the cause and re-run, or restore with: datadict rollback <SEGMENT>");
        Ok(ExitCode::from(1))
    } else {
        println!("\n✓ Write-back completed successfully");
        Ok(ExitCode::SUCCESS)
    }
}
