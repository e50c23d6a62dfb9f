//! WHMCS panel daily check-in
//!
//! Logs into one or more WHMCS-style customer panels, locates the daily
//! check-in action on the client area dashboard and triggers it, then
//! reports a consolidated summary (console + optional Telegram).
//!
//! The target panels expose no stable API; everything here works off
//! heuristic signals extracted from HTML/JSON responses.

pub mod auth;
pub mod checkin;
pub mod config;
pub mod heuristics;
pub mod html;
pub mod http;
pub mod notify;
pub mod outcome;
pub mod runner;

use std::path::PathBuf;

/// Get log directory path (shared across modules)
pub fn log_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("whmcs-checkin").join("logs"))
}

/// Initialize logging: console layer plus a daily rolling file when a
/// config directory is available.
pub fn init_logging() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::INFO.into());

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false);

    if let Some(log_dir) = log_dir() {
        let _ = std::fs::create_dir_all(&log_dir);
        let file_appender = tracing_appender::rolling::daily(&log_dir, "whmcs-checkin.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_target(true)
            .with_writer(non_blocking);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .with(file_layer)
            .init();

        Some(guard)
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .init();

        None
    }
}
