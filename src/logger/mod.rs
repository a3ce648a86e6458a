//! Logger module
//!
//! Installs the `tracing` subscriber and provides the logging helpers used
//! across the server:
//! - Server lifecycle logging
//! - Access logging with multiple formats (target `access`)
//! - Error and warning logging
//! - Optional non-blocking file output

mod format;

pub use format::AccessLogEntry;

use std::fs::OpenOptions;
use std::io;
use std::net::SocketAddr;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Initialize the global subscriber.
///
/// Should be called once at application startup. `RUST_LOG` overrides the
/// configured level. When logging to a file the returned guard must be kept
/// alive until exit so buffered lines are flushed.
pub fn init(config: &LoggingConfig) -> io::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    let (writer, guard) = match &config.file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            (BoxMakeWriter::new(non_blocking), Some(guard))
        }
        None => (BoxMakeWriter::new(io::stdout), None),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(config.file.is_none());

    let installed = if config.format.eq_ignore_ascii_case("json") {
        builder.json().flatten_event(true).try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(io::Error::other)?;

    Ok(guard)
}

pub fn log_server_start(addr: &SocketAddr, scheme: &str, root: &std::path::Path, features: &[&str]) {
    tracing::info!("======================================");
    tracing::info!("qserv {} started", env!("CARGO_PKG_VERSION"));
    tracing::info!("Listening on: {scheme}://{addr}");
    tracing::info!("Serving: {}", root.display());
    if features.is_empty() {
        tracing::info!("Features: none");
    } else {
        tracing::info!("Features: {}", features.join(", "));
    }
    tracing::info!("======================================");
}

pub fn log_shutdown_started(timeout_secs: u64) {
    tracing::info!("Shutdown signal received, draining connections (timeout {timeout_secs}s)");
}

pub fn log_shutdown_complete(graceful: bool) {
    if graceful {
        tracing::info!("All connections closed, server stopped");
    } else {
        tracing::warn!("Shutdown timeout reached, dropping remaining connections");
    }
}

pub fn log_connection_error(err: &impl std::fmt::Display) {
    tracing::debug!("Connection closed with error: {err}");
}

pub fn log_error(message: &str) {
    tracing::error!("{message}");
}

pub fn log_warning(message: &str) {
    tracing::warn!("{message}");
}

pub fn log_info(message: &str) {
    tracing::info!("{message}");
}

pub fn log_debug(message: &str) {
    tracing::debug!("{message}");
}

/// Log formatted access log entry
pub fn log_access(entry: &AccessLogEntry, format: &str) {
    tracing::info!(target: "access", "{}", entry.format(format));
}
