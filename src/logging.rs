//! File-based logging.
//!
//! The terminal belongs to the UI, so logs only ever go to
//! `<state dir>/tombola.log`. `TOMBOLA_LOG` takes an `EnvFilter` directive
//! (default `info`).

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const LOG_ENV: &str = "TOMBOLA_LOG";
pub const LOG_FILE: &str = "tombola.log";

/// Install the global subscriber. The returned guard must live until exit so
/// buffered lines are flushed. Returns `None` when the directory cannot be
/// created; logging is then disabled.
pub fn init(dir: &Path) -> Option<WorkerGuard> {
    if let Err(e) = std::fs::create_dir_all(dir) {
        eprintln!("Failed to create log directory {:?}: {}, logging disabled", dir, e);
        return None;
    }

    let appender = tracing_appender::rolling::never(dir, LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true);

    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

    if tracing_subscriber::registry()
        .with(file_layer)
        .with(filter)
        .try_init()
        .is_err()
    {
        return None;
    }

    tracing::info!(log_file = ?dir.join(LOG_FILE), "logging initialized");
    Some(guard)
}
