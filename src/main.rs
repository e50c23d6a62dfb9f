//! whmcs-checkin — unattended daily check-in runner
//!
//! Environment variables:
//! - `ACCOUNTS` - JSON array of panel accounts (email/password/base_url)
//! - `CHECKIN_BASE_URL` - default panel URL for accounts without one
//! - `TG_BOT_TOKEN` / `TG_CHAT_ID` - optional Telegram summary target
//! - `CHECKIN_PROBE_FALLBACK` - set to 0/false to disable endpoint probing
//! - `RUST_LOG` - log filter (default info)
//!
//! Exit code is 0 unless every processed account hard-failed (2FA
//! challenges don't count as hard failures), or the configuration was
//! malformed.

use tracing::{error, info};

use whmcs_checkin::config::Config;
use whmcs_checkin::runner;

#[tokio::main]
async fn main() {
    let guard = whmcs_checkin::init_logging();

    info!("Starting whmcs-checkin");
    if let Some(dir) = whmcs_checkin::log_dir() {
        info!("Log files saved to: {}", dir.display());
    }

    let code = match Config::from_env() {
        Ok(None) => {
            info!("No accounts provided, exiting.");
            0
        }
        Err(e) => {
            error!("{}", e);
            1
        }
        Ok(Some(config)) => {
            info!("Processing {} account(s)", config.accounts.len());
            let report = runner::run(&config).await;
            if report.all_hard_failed() {
                1
            } else {
                0
            }
        }
    };

    // Flush the file appender before exiting
    drop(guard);
    std::process::exit(code);
}
