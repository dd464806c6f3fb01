//! Tracing subscriber setup.
//!
//! Development builds log human-readable output to stdout. Production adds a
//! daily JSON log file next to a plain stdout stream for the service manager.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::Context;
use bleunlock_core::LoggingConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Env var that overrides `logging.level` when `RUST_LOG` is unset.
const LEVEL_ENV: &str = "BLEUNLOCK_LOG_LEVEL";

/// Number of daily log files kept.
const RETAINED_LOG_FILES: usize = 14;

// Dropping a guard stops its writer thread, so both live for the process.
static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();
static STDOUT_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Install the global subscriber described by `config`.
///
/// The filter comes from `RUST_LOG`, then `BLEUNLOCK_LOG_LEVEL`, then
/// `config.level`.
///
/// # Errors
///
/// Returns an error if the filter does not parse or, in production, if the
/// log directory cannot be created or written.
pub fn init(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = env_filter(config)?;

    if config.production {
        let appender = file_appender(&log_directory())?;
        init_production(filter, appender);
    } else {
        init_development(filter);
    }

    Ok(())
}

fn env_filter(config: &LoggingConfig) -> anyhow::Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    let level = std::env::var(LEVEL_ENV).unwrap_or_else(|_| config.level.clone());
    EnvFilter::try_new(&level).with_context(|| format!("invalid log filter '{level}'"))
}

/// Daily `bleunlock.<date>.log` files under `dir`, created if needed.
fn file_appender(dir: &Path) -> anyhow::Result<RollingFileAppender> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("bleunlock")
        .filename_suffix("log")
        .max_log_files(RETAINED_LOG_FILES)
        .build(dir)
        .with_context(|| format!("cannot write logs to {}", dir.display()))
}

fn init_production(filter: EnvFilter, appender: RollingFileAppender) {
    let (file_writer, file_guard) = tracing_appender::non_blocking(appender);
    let (stdout_writer, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(file_writer)
                .with_current_span(true)
                .with_file(true)
                .with_line_number(true),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(stdout_writer)
                .with_ansi(false),
        )
        .init();

    let _ = FILE_GUARD.set(file_guard);
    let _ = STDOUT_GUARD.set(stdout_guard);
}

fn init_development(filter: EnvFilter) {
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .pretty()
                .with_file(true)
                .with_line_number(true)
                .with_span_events(FmtSpan::CLOSE),
        )
        .init();
}

fn log_directory() -> PathBuf {
    if cfg!(target_os = "linux") {
        PathBuf::from("/var/log/bleunlock")
    } else {
        directories::ProjectDirs::from("", "", "bleunlock")
            .map_or_else(|| PathBuf::from("logs"), |dirs| dirs.data_dir().join("logs"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_log_directory_is_absolute_on_linux() {
        let dir = log_directory();
        assert!(!dir.as_os_str().is_empty());
        if cfg!(target_os = "linux") {
            assert!(dir.is_absolute());
        }
    }

    #[test]
    fn test_default_level_parses_as_filter() {
        let config = LoggingConfig::default();
        assert!(EnvFilter::try_new(&config.level).is_ok());
    }

    #[test]
    fn test_file_appender_creates_missing_directory() {
        let dir = TempDir::new().unwrap();
        let logs = dir.path().join("nested").join("logs");

        assert!(file_appender(&logs).is_ok());
        assert!(logs.is_dir());
    }

    #[test]
    fn test_file_appender_reports_unwritable_directory() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"").unwrap();

        let err = file_appender(&blocker.join("logs")).unwrap_err();
        assert!(err.to_string().contains("cannot write logs to"));
    }
}
