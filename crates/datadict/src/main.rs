//! datadict — data-dictionary review and write-back CLI
//!
//! Bridges two JSON artifacts (an extracted schema and a generated
//! description document) and the warehouse catalog:
//! - `review`    exports descriptions to an editable CSV
//! - `validate`  checks the edited CSV against the original document
//! - `writeback` pushes approved descriptions to Treasure Data with
//!   before/after snapshots
//! - `rollback`  restores schemas from a before snapshot

use clap::{Parser, Subcommand};
use datadict_logging::LogConfig;
use std::path::PathBuf;
use std::process::ExitCode;

mod cli;

#[derive(Parser, Debug)]
#[command(name = "datadict", about = "Warehouse data-dictionary review and write-back")]
struct Cli {
    /// Enable verbose logging (debug to stderr)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Workspace root holding descriptions/, schemas/, reviews/, snapshots/
    #[arg(long, global = true, env = "DATADICT_ROOT", default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Export segment descriptions to reviewer-editable CSV files
    Review(cli::review::ReviewArgs),

    /// Validate edited review CSVs against the original descriptions
    Validate(cli::validate::ValidateArgs),

    /// Write approved descriptions back to Treasure Data
    Writeback(cli::writeback::WritebackArgs),

    /// Restore table schemas from a before snapshot
    Rollback(cli::rollback::RollbackArgs),
}

fn main() -> ExitCode {
    let args = Cli::parse();
    let paths = cli::config::WorkspacePaths::new(&args.root);

    if let Err(err) = datadict_logging::init_logging(LogConfig {
        app_name: "datadict",
        verbose: args.verbose,
        log_dir: Some(&paths.logs_dir()),
    }) {
        eprintln!("Warning: failed to initialize file logging: {err:#}");
    }

    // All remote calls are awaited sequentially; one thread is plenty.
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("ERROR: failed to start async runtime: {err}");
            return ExitCode::from(1);
        }
    };

    let result = match args.command {
        Commands::Review(review_args) => cli::review::run(review_args, &paths),
        Commands::Validate(validate_args) => cli::validate::run(validate_args, &paths),
        Commands::Writeback(writeback_args) => {
            runtime.block_on(cli::writeback::run(writeback_args, &paths))
        }
        Commands::Rollback(rollback_args) => {
            runtime.block_on(cli::rollback::run(rollback_args, &paths))
        }
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:?}");
            ExitCode::from(1)
        }
    }
}
