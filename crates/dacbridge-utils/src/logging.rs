//! # Logging Utilities
//!
//! Logging setup for bridge frontends and tests, built on `tracing`.
//!
//! The bridge library itself only emits `tracing` events; whoever embeds it
//! decides where they go. This module covers the usual choices:
//! - Console output, pretty for development or JSON for collection
//! - An additional rolling log file
//! - File-only output, for hosts whose console belongs to the debugger
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dacbridge_utils::init_logging;
//!
//! // Initialize with default settings (reads from RUST_LOG env var)
//! init_logging().expect("Failed to initialize logging");
//!
//! tracing::info!("Bridge loaded");
//! ```
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Log level filter (e.g., `RUST_LOG=debug`, `RUST_LOG=dacbridge_core=trace`)
//! - `DACBRIDGE_LOG_FORMAT`: Output format (`json` or `pretty`, default: `pretty`)
//! - `DACBRIDGE_LOG_FILE`: Optional path of an additional daily-rolling log file
//!
//! ## Examples
//!
//! ```rust,no_run
//! use dacbridge_utils::{LogFormat, LogLevel, init_logging_to_file, init_logging_with_level};
//!
//! // Explicit level and format
//! init_logging_with_level(LogLevel::Debug, LogFormat::Pretty).expect("Failed to initialize logging");
//!
//! // Or, inside a debugger whose console must stay clean
//! let log_file = init_logging_to_file(Some(LogLevel::Debug)).expect("Failed to initialize logging");
//! println!("logging to {}", log_file.display());
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;
use std::{env, io};

use chrono::Utc;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Directory below `$HOME` that holds file-only logs.
pub const LOG_DIRECTORY: &str = ".dacbridge";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Keeps the non-blocking file writer flushing for the life of the process.
static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat
{
    /// Pretty-printed, human-readable format (default)
    Pretty,
    /// One JSON object per event
    Json,
}

impl FromStr for LogFormat
{
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "pretty" | "dev" | "development" => Ok(LogFormat::Pretty),
            "json" | "prod" | "production" => Ok(LogFormat::Json),
            _ => Err(format!("Unknown log format: {s}. Use 'pretty' or 'json'")),
        }
    }
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel
{
    /// Error level
    Error,
    /// Warning level
    Warn,
    /// Info level (default)
    Info,
    /// Debug level
    Debug,
    /// Trace level (most verbose)
    Trace,
}

impl From<LogLevel> for Level
{
    fn from(level: LogLevel) -> Self
    {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

impl FromStr for LogLevel
{
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "error" | "err" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" | "dbg" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(format!(
                "Unknown log level: {s}. Use 'error', 'warn', 'info', 'debug', or 'trace'"
            )),
        }
    }
}

/// Initialize logging with default settings
///
/// Reads configuration from environment variables:
/// - `RUST_LOG`: Log level filter (e.g., `debug`, `dacbridge_core=debug`)
/// - `DACBRIDGE_LOG_FORMAT`: Output format (`json` or `pretty`, default: `pretty`)
/// - `DACBRIDGE_LOG_FILE`: Optional path to an additional log file
///
/// ## Errors
///
/// Returns an error if:
/// - Logging is already initialized
/// - `DACBRIDGE_LOG_FORMAT` holds an unknown format
pub fn init_logging() -> Result<(), LoggingError>
{
    let format = match env::var("DACBRIDGE_LOG_FORMAT") {
        Ok(value) => LogFormat::from_str(&value).map_err(LoggingError::InvalidFormat)?,
        Err(_) => LogFormat::Pretty,
    };
    let log_file = env::var_os("DACBRIDGE_LOG_FILE").map(PathBuf::from);

    init_with_console(format, default_filter(None), log_file.as_deref())
}

/// Initialize logging with explicit level and format
///
/// `RUST_LOG` is ignored; `DACBRIDGE_LOG_FILE` is still honored.
///
/// ## Errors
///
/// Returns an error if logging is already initialized.
pub fn init_logging_with_level(level: LogLevel, format: LogFormat) -> Result<(), LoggingError>
{
    let log_file = env::var_os("DACBRIDGE_LOG_FILE").map(PathBuf::from);
    init_with_console(format, EnvFilter::new(Level::from(level).to_string()), log_file.as_deref())
}

/// Initialize file-only logging (nothing on stdout/stderr)
///
/// The log file is `~/.dacbridge/YYYY-MM-DD-dacbridge.log`, or the same name
/// in the OS temp directory when there is no home directory.
///
/// ## Arguments
///
/// * `level` - Optional log level. If `None`, uses `RUST_LOG` or defaults to `INFO`.
///
/// ## Errors
///
/// Returns an error if logging is already initialized or the log directory
/// cannot be created.
pub fn init_logging_to_file(level: Option<LogLevel>) -> Result<PathBuf, LoggingError>
{
    let log_file = log_file_path(env::var_os("HOME").map(PathBuf::from))?;

    let (writer, guard) = file_writer(&log_file, false);
    let layer = build_layer(LogFormat::Pretty, writer, false, default_filter(level));
    Registry::default()
        .with(layer)
        .try_init()
        .map_err(|err| LoggingError::InitializationFailed(err.to_string()))?;
    let _ = FILE_GUARD.set(guard);

    Ok(log_file)
}

/// Where [`init_logging_to_file`] writes, creating the directory if needed.
fn log_file_path(home: Option<PathBuf>) -> Result<PathBuf, LoggingError>
{
    let today = Utc::now().format("%Y-%m-%d");
    let file_name = format!("{today}-dacbridge.log");

    match home {
        Some(home) => {
            let dir = home.join(LOG_DIRECTORY);
            std::fs::create_dir_all(&dir)?;
            Ok(dir.join(file_name))
        }
        None => Ok(env::temp_dir().join(file_name)),
    }
}

/// Filter priority: explicit level, then `RUST_LOG`, then `INFO`.
fn default_filter(explicit: Option<LogLevel>) -> EnvFilter
{
    if let Some(level) = explicit {
        return EnvFilter::new(Level::from(level).to_string());
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string()))
}

fn init_with_console(format: LogFormat, filter: EnvFilter, log_file: Option<&Path>) -> Result<(), LoggingError>
{
    let mut layers: Vec<BoxedLayer> = vec![build_layer(format, io::stdout, true, filter.clone())];

    let guard = log_file.map(|path| {
        let (writer, guard) = file_writer(path, true);
        layers.push(build_layer(format, writer, false, filter));
        guard
    });

    Registry::default()
        .with(layers)
        .try_init()
        .map_err(|err| LoggingError::InitializationFailed(err.to_string()))?;

    if let Some(guard) = guard {
        let _ = FILE_GUARD.set(guard);
    }
    Ok(())
}

fn file_writer(path: &Path, rolling: bool) -> (tracing_appender::non_blocking::NonBlocking, WorkerGuard)
{
    let directory = path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = path.file_name().unwrap_or_default();
    if rolling {
        tracing_appender::non_blocking(tracing_appender::rolling::daily(directory, file_name))
    } else {
        // The date is already part of the file name
        tracing_appender::non_blocking(tracing_appender::rolling::never(directory, file_name))
    }
}

fn build_layer<W>(format: LogFormat, writer: W, ansi: bool, filter: EnvFilter) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = fmt::layer()
        .with_writer(writer)
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_timer(ChronoUtc::rfc_3339());

    match format {
        LogFormat::Pretty => layer.with_ansi(ansi).with_filter(filter).boxed(),
        LogFormat::Json => layer
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_filter(filter)
            .boxed(),
    }
}

/// Logging initialization error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError
{
    /// Invalid log format
    #[error("Invalid log format: {0}")]
    InvalidFormat(String),

    /// Failed to initialize logging
    #[error("Failed to initialize logging: {0}")]
    InitializationFailed(String),

    /// File logging error
    #[error("File logging error: {0}")]
    FileError(#[from] io::Error),
}
