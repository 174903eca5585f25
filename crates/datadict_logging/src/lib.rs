//! Shared logging utilities for datadict binaries.
//!
//! Console output goes to stderr so it never mixes with tables and prompts on
//! stdout. When a log directory is supplied, a second layer appends the same
//! events to `{app_name}.log`, rotating old files at startup so a single run
//! always lands in one file.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "datadict=info,datadict_schema=info,datadict_remote=info";
const MAX_ROTATED_FILES: usize = 4;
const ROTATE_THRESHOLD: u64 = 5 * 1024 * 1024;

/// Logging configuration for one binary invocation.
pub struct LogConfig<'a> {
    pub app_name: &'a str,
    pub verbose: bool,
    /// Directory for the append log. `None` disables file logging.
    pub log_dir: Option<&'a Path>,
}

/// Initialize tracing with a stderr layer and an optional file layer.
///
/// `RUST_LOG` overrides the default filter for both layers; `verbose` widens
/// the console filter to debug.
pub fn init_logging(config: LogConfig<'_>) -> Result<()> {
    let base_filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
    };
    let console_filter = if config.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        base_filter()
    };

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(console_filter);

    let file_layer = match config.log_dir {
        Some(dir) => {
            let writer = AppendLogWriter::open(dir, config.app_name)
                .with_context(|| format!("Failed to open log file in {}", dir.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_filter(base_filter()),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .init();

    Ok(())
}

/// Append-only log file, rotated once at open when it has grown past the
/// threshold. `{name}.log` is current, `{name}.log.1` is previous, up to
/// [`MAX_ROTATED_FILES`].
#[derive(Clone)]
struct AppendLogWriter {
    file: Arc<Mutex<File>>,
}

impl AppendLogWriter {
    fn open(dir: &Path, app_name: &str) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let base = sanitize_name(app_name);
        let current = dir.join(format!("{base}.log"));

        if fs::metadata(&current).map(|m| m.len() > ROTATE_THRESHOLD).unwrap_or(false) {
            rotate(dir, &base)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(&current)?;
        Ok(Self {
            file: Arc::new(Mutex::new(file)),
        })
    }
}

fn rotate(dir: &Path, base: &str) -> io::Result<()> {
    let rotated = |index: usize| dir.join(format!("{base}.log.{index}"));

    let oldest = rotated(MAX_ROTATED_FILES);
    if oldest.exists() {
        fs::remove_file(&oldest)?;
    }
    for index in (1..MAX_ROTATED_FILES).rev() {
        let src = rotated(index);
        if src.exists() {
            fs::rename(&src, rotated(index + 1))?;
        }
    }
    fs::rename(dir.join(format!("{base}.log")), rotated(1))
}

struct AppendLogGuard {
    file: Arc<Mutex<File>>,
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for AppendLogWriter {
    type Writer = AppendLogGuard;

    fn make_writer(&'a self) -> Self::Writer {
        AppendLogGuard {
            file: Arc::clone(&self.file),
        }
    }
}

impl Write for AppendLogGuard {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log writer lock poisoned"))?
            .write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log writer lock poisoned"))?
            .flush()
    }
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect()
}
