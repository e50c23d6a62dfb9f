//! Run configuration
//!
//! Accounts and notification credentials come from the environment
//! (`ACCOUNTS` JSON array plus Telegram variables). Everything is parsed
//! once at process entry into an explicit [`Config`] that the runner
//! borrows; nothing reads the environment after startup.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default panel when an account carries no `base_url` of its own.
pub const DEFAULT_BASE_URL: &str = "https://panel.freecloud.ltd";

/// Configuration errors abort the whole run before any account is touched.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid ACCOUNTS JSON: {0}")]
    InvalidAccounts(String),
}

/// One panel account as supplied in the `ACCOUNTS` JSON array.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub tg_chat_id: Option<String>,
}

impl Account {
    /// Label for logs and the summary; never leaks the full email.
    pub fn display_label(&self) -> String {
        if let Some(label) = self.label.as_deref() {
            let label = label.trim();
            if !label.is_empty() {
                return label.to_string();
            }
        }
        let email = self.email.trim();
        if email.is_empty() {
            "(no-label)".to_string()
        } else {
            mask_email(email)
        }
    }

    /// Panel base URL for this account, trailing slash trimmed.
    pub fn resolved_base_url(&self, default_base_url: &str) -> String {
        self.base_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .unwrap_or(default_base_url)
            .trim_end_matches('/')
            .to_string()
    }

    pub fn has_credentials(&self) -> bool {
        !self.email.trim().is_empty() && !self.password.trim().is_empty()
    }
}

/// Mask the local part of an email address for display.
pub fn mask_email(email: &str) -> String {
    let Some((local, domain)) = email.split_once('@') else {
        return "***".to_string();
    };
    let chars: Vec<char> = local.chars().collect();
    let masked = match chars.len() {
        0 => String::new(),
        1 => chars[0].to_string(),
        2 => format!("{}*", chars[0]),
        n => format!("{}{}{}", chars[0], "*".repeat(n - 2), chars[n - 1]),
    };
    format!("{}@{}", masked, domain)
}

/// Telegram bot credentials for the summary message.
#[derive(Debug, Clone)]
pub struct TelegramTarget {
    pub bot_token: String,
    pub chat_id: String,
}

/// Delays between network activity, all in milliseconds. Randomized delays
/// keep many-account runs from looking like a synchronized burst.
#[derive(Debug, Clone)]
pub struct Pacing {
    /// Random delay before the run starts, `0..=max`.
    pub initial_delay_max_ms: u64,
    /// Random delay before each account's login.
    pub min_account_delay_ms: u64,
    pub max_account_delay_ms: u64,
    /// Random delay after each account completes.
    pub min_settle_delay_ms: u64,
    pub max_settle_delay_ms: u64,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            initial_delay_max_ms: 15_000,
            min_account_delay_ms: 1_500,
            max_account_delay_ms: 4_500,
            min_settle_delay_ms: 1_000,
            max_settle_delay_ms: 3_000,
        }
    }
}

impl Pacing {
    /// No delays at all. Used by tests driving a local mock panel.
    pub fn none() -> Self {
        Self {
            initial_delay_max_ms: 0,
            min_account_delay_ms: 0,
            max_account_delay_ms: 0,
            min_settle_delay_ms: 0,
            max_settle_delay_ms: 0,
        }
    }
}

/// Full run configuration, built once at process entry.
#[derive(Debug, Clone)]
pub struct Config {
    pub accounts: Vec<Account>,
    pub default_base_url: String,
    pub telegram: Option<TelegramTarget>,
    /// Probe conventional check-in endpoints when the dashboard markup
    /// yields nothing. The least reliable discovery step, so it can be
    /// switched off.
    pub probe_fallback: bool,
    pub pacing: Pacing,
}

impl Config {
    /// Build a config from the environment. Returns `Ok(None)` when no
    /// accounts are configured (a no-op run, not an error).
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        let raw = match std::env::var("ACCOUNTS") {
            Ok(v) if !v.trim().is_empty() => v,
            _ => return Ok(None),
        };

        let accounts = parse_accounts(&raw)?;
        if accounts.is_empty() {
            return Ok(None);
        }

        let default_base_url = std::env::var("CHECKIN_BASE_URL")
            .ok()
            .map(|u| u.trim().trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let bot_token = first_env(&["TG_BOT_TOKEN", "TELEGRAM_BOT_TOKEN"]);
        let chat_id = first_env(&["TG_CHAT_ID", "TELEGRAM_CHAT_ID"]);
        let telegram = match (bot_token, chat_id) {
            (Some(bot_token), Some(chat_id)) => Some(TelegramTarget { bot_token, chat_id }),
            _ => None,
        };

        let probe_fallback = std::env::var("CHECKIN_PROBE_FALLBACK")
            .map(|v| !matches!(v.trim(), "0" | "false" | "off" | "no"))
            .unwrap_or(true);

        Ok(Some(Self {
            accounts,
            default_base_url,
            telegram,
            probe_fallback,
            pacing: Pacing::default(),
        }))
    }
}

/// Parse the `ACCOUNTS` JSON array.
pub fn parse_accounts(raw: &str) -> Result<Vec<Account>, ConfigError> {
    serde_json::from_str::<Vec<Account>>(raw)
        .map_err(|e| ConfigError::InvalidAccounts(e.to_string()))
}

fn first_env(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|n| std::env::var(n).ok())
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}
