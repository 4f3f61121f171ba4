//! Logging setup for scans and the test harness.
//!
//! Three destinations:
//! - the terminal, when stdout is a TTY
//! - the terminal (info and above) plus a daily rotating file under `~/.soda/logs` otherwise
//! - libtest's captured writer, for test binaries
//!
//! `SODA_LOG` overrides `RUST_LOG`; both override the build-type default.
//! Every entry point uses `try_init`, so a second call keeps the first subscriber.

use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

/// Environment variable with the highest-priority filter directives.
pub const SODA_LOG_ENV: &str = "SODA_LOG";

/// Prefix of rotated log files, e.g. `soda.2026-10-18.log`.
const LOG_FILE_PREFIX: &str = "soda";

/// Where log output goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutput {
    /// Terminal only
    Console,
    /// Terminal plus rotating files in the given directory
    ConsoleAndFile(PathBuf),
    /// libtest's captured output
    Test,
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Destination
    pub output: LogOutput,
    /// Filter directives overriding the environment
    pub filter: Option<String>,
}

impl LogConfig {
    /// Console when stdout is a terminal, otherwise console plus files in `log_dir`.
    pub fn new(log_dir: PathBuf) -> Self {
        let output = if atty::is(atty::Stream::Stdout) {
            LogOutput::Console
        } else {
            LogOutput::ConsoleAndFile(log_dir)
        };
        Self { output, filter: None }
    }

    /// Configuration for test binaries.
    pub fn for_tests() -> Self {
        Self { output: LogOutput::Test, filter: None }
    }

    /// Use `filter` instead of the environment.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }
}

/// Keeps the file writer alive; dropping it flushes buffered entries.
#[must_use = "dropping the guard stops file logging"]
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

/// Install the global subscriber described by `config`.
///
/// A file destination that cannot be set up degrades to the console.
pub fn init_logging(config: LogConfig) -> LogGuard {
    let filter = config.filter.as_deref();
    match &config.output {
        LogOutput::Console => init_console(filter),
        LogOutput::Test => {
            init_test_writer(filter);
            LogGuard { _file: None }
        }
        LogOutput::ConsoleAndFile(dir) => match init_console_and_file(dir, filter) {
            Ok(guard) => LogGuard { _file: Some(guard) },
            Err(e) => {
                eprintln!("Couldn't log to {}: {e}. Logging to the console only.", dir.display());
                init_console(filter)
            }
        },
    }
}

/// [`init_logging`] with the default log directory.
pub fn init_logging_default() -> LogGuard {
    init_logging(LogConfig::new(log_dir()))
}

/// Route logs through libtest's capture. Safe to call from every test.
pub fn init_test_logging() {
    init_test_writer(None);
}

fn init_test_writer(filter: Option<&str>) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(build_env_filter(filter))
        .with_test_writer()
        .with_target(false)
        .try_init();
}

fn init_console(filter: Option<&str>) -> LogGuard {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(build_env_filter(filter))
        .with_target(false)
        .try_init();
    LogGuard { _file: None }
}

fn init_console_and_file(
    dir: &std::path::Path,
    filter: Option<&str>,
) -> Result<WorkerGuard, Box<dyn std::error::Error + Send + Sync>> {
    std::fs::create_dir_all(dir)?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("log")
        .build(dir)?;
    let (file, guard) = tracing_appender::non_blocking(appender);
    let writer = std::io::stdout.with_max_level(tracing::Level::INFO).and(file);

    tracing_subscriber::fmt()
        .with_writer(writer)
        .with_env_filter(build_env_filter(filter))
        .with_ansi(false)
        .try_init()?;

    Ok(guard)
}

fn build_env_filter(explicit: Option<&str>) -> EnvFilter {
    if let Some(directives) = explicit {
        return EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new(default_log_filter()));
    }
    EnvFilter::try_from_env(SODA_LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_log_filter()))
}

/// Filter used when neither an explicit filter nor the environment sets one.
pub fn default_log_filter() -> &'static str {
    if cfg!(debug_assertions) {
        "info,soda_core=debug,soda_test=debug,tokio_postgres=warn,deadpool=warn"
    } else {
        "warn,soda_core=info,soda_test=info"
    }
}

/// `~/.soda/logs`, or `./soda_logs` without a home directory.
pub fn log_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".soda").join("logs"))
        .unwrap_or_else(|| PathBuf::from("./soda_logs"))
}
