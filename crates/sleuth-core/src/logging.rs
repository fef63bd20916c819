//! Logging for Spend Sleuth.
//!
//! Analysis warnings (skipped months, months with cost but no budget entry,
//! unreadable exports) are emitted as `tracing` events and also returned to
//! the caller. Events go to a JSON lines file for later inspection and to
//! stderr so they never mix with report output on stdout.
//!
//! ```no_run
//! use sleuth_core::logging;
//!
//! let _guard = logging::init_logging(None, 1).expect("logging init");
//! tracing::debug!(group = "Production Oracle", "resolving filters");
//! ```

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::{Result, SleuthError};

/// Daily-rolled log file prefix inside the log directory.
pub const LOG_FILE_NAME: &str = "sleuth.log";

/// Flushes the file writer when dropped. Hold it until the process exits.
pub struct LogGuard {
    _file_guard: WorkerGuard,
}

/// `EnvFilter` directive for a `-v` count: 0 is info, 1 debug, 2+ trace.
pub fn level_directive(verbosity: u8) -> String {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    format!("sleuth={level}")
}

/// Install the global subscriber.
///
/// Writes JSON lines to `<log_dir>/sleuth.log` (default `~/.sleuth/logs/`)
/// and compact text to stderr. `RUST_LOG` overrides `verbosity`. Event
/// targets and source locations are only shown on the console when
/// `verbosity > 0`.
pub fn init_logging(log_dir: Option<PathBuf>, verbosity: u8) -> Result<LogGuard> {
    let log_dir = match log_dir {
        Some(dir) => dir,
        None => default_log_dir()?,
    };

    std::fs::create_dir_all(&log_dir).map_err(|e| SleuthError::DirectoryCreation {
        path: log_dir.clone(),
        source: e,
    })?;

    let (file_writer, file_guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(&log_dir, LOG_FILE_NAME));

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_directive(verbosity)));

    let detailed = verbosity > 0;
    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .json()
        .flatten_event(true);
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(detailed)
        .with_file(detailed)
        .with_line_number(detailed)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .init();

    tracing::debug!(log_dir = %log_dir.display(), verbosity, "logging initialized");

    Ok(LogGuard {
        _file_guard: file_guard,
    })
}

/// Console-only debug logging through the test harness writer.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}

/// `~/.sleuth/logs/`
pub fn default_log_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME")
        .map_err(|_| SleuthError::internal("HOME environment variable not set"))?;
    Ok(PathBuf::from(home).join(".sleuth").join("logs"))
}

/// Log a per-group analysis event under the `sleuth::group` target.
///
/// ```ignore
/// log_group_event!("Production Oracle", "resolved", records = 42);
/// ```
#[macro_export]
macro_rules! log_group_event {
    ($group:expr, $event:expr) => {
        tracing::info!(
            target: "sleuth::group",
            group = $group,
            event = $event,
            "group event"
        )
    };
    ($group:expr, $event:expr, $($field:tt)*) => {
        tracing::info!(
            target: "sleuth::group",
            group = $group,
            event = $event,
            $($field)*,
            "group event"
        )
    };
}
