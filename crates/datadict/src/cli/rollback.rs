//! Rollback command: restore table schemas from a before snapshot.
//!
//! Restores the most recent `before` snapshot of a segment, either for every
//! recorded table or a `--tables` subset. Unknown table names are a hard
//! error listing what the snapshot actually holds, so a typo can never turn
//! into a partial restore of the wrong scope.

use crate::cli::apply::{self, TablePayload};
use crate::cli::config::WorkspacePaths;
use crate::cli::error::HelpfulError;
use crate::cli::output;
use anyhow::{Context, Result};
use datadict_remote::TdApiClient;
use datadict_schema::{
    ColumnQuad, Snapshot, SnapshotError, SnapshotKind, SnapshotStore, SnapshotTable,
};
use std::process::ExitCode;

#[derive(Debug, clap::Args)]
pub struct RollbackArgs {
    /// Segment to roll back
    pub segment: String,

    /// Restore only these tables (repeatable; default: all tables)
    #[arg(long = "tables", value_name = "NAME")]
    pub tables: Vec<String>,

    /// List available snapshots for the segment and exit
    #[arg(long)]
    pub list: bool,

    /// Skip the confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,
}

fn list_snapshots(store: &SnapshotStore, segment: &str) -> Result<ExitCode> {
    let snapshots = store
        .list(segment)
        .with_context(|| format!("Failed to list snapshots for {segment}"))?;

    if snapshots.is_empty() {
        println!("No snapshots found for segment: {segment}");
        println!("Snapshots are created automatically during write-back.");
        return Ok(ExitCode::SUCCESS);
    }

    output::section(&format!("SNAPSHOTS FOR {segment}"));
    output::print_table(
        &["Kind", "Timestamp", "Tables", "Id"],
        snapshots
            .iter()
            .map(|s| {
                vec![
                    s.kind.as_str().to_uppercase(),
                    s.timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
                    s.table_count.to_string(),
                    s.id.to_string(),
                ]
            })
            .collect(),
    );
    println!("Run rollback without --list to restore from the most recent before snapshot.");
    Ok(ExitCode::SUCCESS)
}

/// Select the tables to restore, validating any `--tables` filter against
/// the snapshot's contents.
fn select_tables(snapshot: &Snapshot, filter: &[String]) -> Result<Vec<SnapshotTable>> {
    if filter.is_empty() {
        return Ok(snapshot.tables.clone());
    }

    let known: Vec<&str> = snapshot.tables.iter().map(|t| t.name.as_str()).collect();
    let unknown: Vec<&String> = filter.iter().filter(|name| !known.contains(&name.as_str())).collect();
    if !unknown.is_empty() {
        let mut err = HelpfulError::new(format!(
            "Invalid table name(s): {}",
            unknown.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
        ))
        .with_context("These tables are not in the snapshot");
        for name in &known {
            err = err.with_suggestion(format!("  - {name}"));
        }
        return Err(err.into());
    }

    Ok(snapshot
        .tables
        .iter()
        .filter(|t| filter.iter().any(|name| name == &t.name))
        .cloned()
        .collect())
}

/// Snapshot tables as replace payloads. The alias slot is passed through as
/// null so a restore never clears unrelated metadata.
fn restore_payloads(tables: &[SnapshotTable]) -> Vec<TablePayload> {
    tables
        .iter()
        .map(|table| TablePayload {
            database: table.database.clone(),
            table: table.name.clone(),
            schema: table
                .schema
                .iter()
                .map(|triple| ColumnQuad::from_triple(triple, None))
                .collect(),
        })
        .collect()
}

pub async fn run(args: RollbackArgs, paths: &WorkspacePaths) -> Result<ExitCode> {
    let store = SnapshotStore::new(paths.snapshots_dir());

    if args.list {
        return list_snapshots(&store, &args.segment);
    }

    let snapshot = match store.load_most_recent(&args.segment, SnapshotKind::Before) {
        Ok(snapshot) => snapshot,
        Err(err @ (SnapshotError::NoSnapshots { .. } | SnapshotError::NoMatchingKind { .. })) => {
            return Err(HelpfulError::new(format!(
                "No rollback available for segment: {}",
                args.segment
            ))
            .with_context(format!("{err} — write-back may never have run for this segment"))
            .with_suggestions([
                format!("TRY: datadict rollback {} --list", args.segment),
                "TRY: Before snapshots are created automatically during write-back".to_string(),
            ])
            .into());
        }
        Err(err) => return Err(err).context("Failed to load before snapshot"),
    };

    println!("✓ Before snapshot loaded");
    println!("  Timestamp: {}", snapshot.timestamp.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("  Total tables: {}", snapshot.tables.len());

    let tables = select_tables(&snapshot, &args.tables)?;
    if args.tables.is_empty() {
        println!("\nFull segment rollback: all tables");
    } else {
        println!("\nGranular rollback: {} table(s) selected", tables.len());
    }

    println!("\nSegment: {}", args.segment);
    for table in &tables {
        println!("  - {}.{} ({} columns)", table.database, table.name, table.schema.len());
    }
    println!("\nWARNING: this will OVERWRITE current descriptions in Treasure Data");
    println!("with the values recorded in the snapshot.");
    if !output::confirm("Proceed with rollback?", args.yes)? {
        println!("Rollback cancelled.");
        return Ok(ExitCode::SUCCESS);
    }

    let client = TdApiClient::from_env()?;
    client
        .test_connection()
        .await
        .context("TD API connection test failed")?;

    output::section("EXECUTING ROLLBACK");
    let payloads = restore_payloads(&tables);
    let outcome = apply::apply_tables(&client, &payloads).await;

    output::section("ROLLBACK SUMMARY");
    println!("Total tables: {}", tables.len());
    println!("  Restored: {}", outcome.successes.len());
    println!("  Failed:   {}", outcome.failures.len());

    if !outcome.all_succeeded() {
        println!("\nRollback completed with errors. You may retry specific tables:");
        for failure in &outcome.failures {
            println!("  datadict rollback {} --tables {}", args.segment, failure.table);
        }
        return Ok(ExitCode::from(1));
    }

    println!("\n✓ Rollback completed successfully");
    Ok(ExitCode::SUCCESS)
}
