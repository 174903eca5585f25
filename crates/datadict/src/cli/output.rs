//! Output formatting utilities for CLI commands
//!
//! Tables, section banners, and the confirmation gates. Human-facing output
//! goes to stdout via println; progress and diagnostics go through tracing
//! to stderr.

use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, Color, ContentArrangement, Table};
use std::io::{BufRead, IsTerminal, Write};

/// Print a table with headers and rows
pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic);

    let header_cells: Vec<Cell> = headers.iter().map(|h| Cell::new(h).fg(Color::Cyan)).collect();
    table.set_header(header_cells);

    for row in rows {
        table.add_row(row);
    }

    println!("{}", table);
}

/// Print a section banner
pub fn section(title: &str) {
    println!("\n{}", "=".repeat(70));
    println!("{title}");
    println!("{}", "=".repeat(70));
}

/// True when stdin is attached to a terminal.
pub fn is_interactive() -> bool {
    std::io::stdin().is_terminal()
}

/// Ask a yes/no question, default no.
///
/// `--yes` and non-interactive invocations (CI, pipes) both skip the prompt
/// and answer yes; the caller has already printed what will happen.
pub fn confirm(question: &str, assume_yes: bool) -> std::io::Result<bool> {
    if assume_yes {
        return Ok(true);
    }
    if !is_interactive() {
        tracing::info!("Non-interactive session, proceeding without prompt");
        return Ok(true);
    }

    print!("{question} [y/N] ");
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

/// Hold until the reviewer presses Enter. Skipped when not a terminal or
/// `assume_yes` is set.
pub fn wait_for_enter(message: &str, assume_yes: bool) -> std::io::Result<()> {
    if assume_yes || !is_interactive() {
        return Ok(());
    }
    print!("{message}");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(())
}
