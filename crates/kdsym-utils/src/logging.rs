//! # Logging Utilities
//!
//! `tracing` subscriber setup shared by the kdsym binaries.
//!
//! Console output always goes to stderr: stdout is reserved for resolved
//! symbols, so `kdsym nearest 0x1025 | ...` stays machine-readable.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use kdsym_utils::init_logging;
//!
//! let _guard = init_logging().expect("Failed to initialize logging");
//! tracing::info!("Symbol store ready");
//! ```
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Filter directives (e.g. `debug`, `kdsym_core=trace`). Overrides the level in [`LogSettings`]
//! - `KDSYM_LOG_FORMAT`: `pretty` (default) or `json`
//! - `KDSYM_LOG_FILE`: Also write to this file, rotated daily

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::{env, io};

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

const FORMAT_ENV: &str = "KDSYM_LOG_FORMAT";
const FILE_ENV: &str = "KDSYM_LOG_FILE";

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat
{
    /// Human-readable lines
    #[default]
    Pretty,
    /// One JSON object per event, with span context
    Json,
}

impl FromStr for LogFormat
{
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(LoggingError::InvalidFormat(s.to_string())),
        }
    }
}

/// What to log, how, and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings
{
    pub format: LogFormat,
    /// Level used when `RUST_LOG` is unset or invalid.
    pub level: Level,
    /// Optional daily-rolling log file, in addition to stderr.
    pub file: Option<PathBuf>,
}

impl Default for LogSettings
{
    fn default() -> Self
    {
        Self {
            format: LogFormat::Pretty,
            level: Level::INFO,
            file: None,
        }
    }
}

impl LogSettings
{
    /// Settings from `KDSYM_LOG_FORMAT` and `KDSYM_LOG_FILE`.
    ///
    /// ## Errors
    ///
    /// Returns [`LoggingError::InvalidFormat`] for an unknown `KDSYM_LOG_FORMAT`.
    pub fn from_env() -> Result<Self, LoggingError>
    {
        let format = match env::var(FORMAT_ENV) {
            Ok(value) => value.parse()?,
            Err(_) => LogFormat::default(),
        };
        Ok(Self {
            format,
            file: env::var_os(FILE_ENV).map(PathBuf::from),
            ..Self::default()
        })
    }

    /// Replace the default level.
    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self
    {
        self.level = level;
        self
    }
}

/// Level for a `-v` count: none is INFO, one is DEBUG, more is TRACE.
pub fn verbosity_level(count: u8) -> Level
{
    match count {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Keeps the background file writer alive.
///
/// Dropping the guard flushes and stops the non-blocking file appender, so hold
/// it for as long as the process logs.
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard
{
    _file: Option<WorkerGuard>,
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Initialize logging from the environment.
///
/// ## Errors
///
/// See [`LogSettings::from_env`] and [`init_logging_with`].
pub fn init_logging() -> Result<LoggingGuard, LoggingError>
{
    init_logging_with(LogSettings::from_env()?)
}

/// Initialize logging with explicit settings.
///
/// ```rust,no_run
/// use kdsym_utils::{init_logging_with, verbosity_level, LogSettings};
///
/// let settings = LogSettings::from_env()?.with_level(verbosity_level(2));
/// let _guard = init_logging_with(settings)?;
/// # Ok::<(), kdsym_utils::LoggingError>(())
/// ```
///
/// ## Errors
///
/// Returns an error if a global subscriber is already installed or the log
/// file directory cannot be created.
pub fn init_logging_with(settings: LogSettings) -> Result<LoggingGuard, LoggingError>
{
    let mut layers = vec![fmt_layer(settings.format, io::stderr, true, env_filter(settings.level))];
    let mut guard = None;

    if let Some(path) = &settings.file {
        let (writer, worker) = rolling_writer(path)?;
        layers.push(fmt_layer(settings.format, writer, false, env_filter(settings.level)));
        guard = Some(worker);
    }

    Registry::default()
        .with(layers)
        .try_init()
        .map_err(|err| LoggingError::InitializationFailed(err.to_string()))?;

    Ok(LoggingGuard { _file: guard })
}

fn env_filter(level: Level) -> EnvFilter
{
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()))
}

fn fmt_layer<W>(format: LogFormat, writer: W, ansi: bool, filter: EnvFilter) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = fmt::layer()
        .with_writer(writer)
        .with_target(true)
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

fn rolling_writer(path: &Path) -> Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard), LoggingError>
{
    let directory = path.parent().filter(|dir| !dir.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let file_name = path
        .file_name()
        .ok_or_else(|| LoggingError::InitializationFailed(format!("{} is not a file path", path.display())))?;
    std::fs::create_dir_all(directory)?;

    Ok(tracing_appender::non_blocking(tracing_appender::rolling::daily(directory, file_name)))
}

/// Logging initialization error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError
{
    /// `KDSYM_LOG_FORMAT` names no known format
    #[error("Unknown log format '{0}' (use 'pretty' or 'json')")]
    InvalidFormat(String),

    /// A global subscriber is already set, or the file path is unusable
    #[error("Failed to initialize logging: {0}")]
    InitializationFailed(String),

    /// The log directory could not be created
    #[error("Log file error: {0}")]
    FileError(#[from] io::Error),
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_log_format_parse()
    {
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert_eq!("TEXT".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert_eq!(" json ".parse::<LogFormat>().unwrap(), LogFormat::Json);

        let err = "xml".parse::<LogFormat>().unwrap_err();
        assert!(matches!(err, LoggingError::InvalidFormat(ref value) if value == "xml"));
        assert!(err.to_string().contains("'xml'"));
    }

    #[test]
    fn test_verbosity_level()
    {
        assert_eq!(verbosity_level(0), Level::INFO);
        assert_eq!(verbosity_level(1), Level::DEBUG);
        assert_eq!(verbosity_level(2), Level::TRACE);
        assert_eq!(verbosity_level(9), Level::TRACE);
    }

    #[test]
    fn test_settings_builder()
    {
        let settings = LogSettings::default().with_level(Level::WARN);
        assert_eq!(settings.level, Level::WARN);
        assert_eq!(settings.format, LogFormat::Pretty);
        assert!(settings.file.is_none());
    }
}
