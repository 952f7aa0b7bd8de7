//! Subscriber setup
//!
//! Console output always goes to stderr so it never mixes with command
//! output on stdout. When a log file is configured, a second layer writes
//! plain (no ANSI) lines to it through a non-blocking appender.

use std::fs;
use std::io;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Keeps the file appender flushing; drop it only at process exit.
pub type LogGuard = WorkerGuard;

/// Build the level filter. `RUST_LOG` wins over the configured level.
pub fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::try_new(level.to_lowercase()).unwrap_or_else(|_| EnvFilter::new("info"))
    })
}

/// Install the global subscriber.
///
/// Returns the appender guard when a log file is in use. Calling this
/// twice is harmless; the second subscriber is ignored.
pub fn init_logging(level: &str, log_file: Option<&Path>) -> io::Result<Option<LogGuard>> {
    let console = fmt::layer().with_writer(io::stderr).with_target(false);

    let Some(path) = log_file else {
        let _ = tracing_subscriber::registry()
            .with(console)
            .with(build_filter(level))
            .try_init();
        return Ok(None);
    };

    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "log_file has no file name"))?;
    fs::create_dir_all(dir)?;

    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let _ = tracing_subscriber::registry()
        .with(console)
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .with(build_filter(level))
        .try_init();

    Ok(Some(guard))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_accepts_levels() {
        for level in ["trace", "DEBUG", "info", "warn", "error"] {
            let filter = build_filter(level);
            assert!(!filter.to_string().is_empty());
        }
    }

    #[test]
    fn test_log_file_directory_is_created() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("logs").join("digitooldb.log");
        let guard = init_logging("info", Some(&path)).unwrap();
        assert!(guard.is_some());
        assert!(dir.path().join("logs").is_dir());
    }
}
