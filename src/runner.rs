//! Run orchestration
//!
//! Processes accounts strictly in input order, one session each, with
//! randomized pacing between them. Any per-account error is downgraded to
//! a `Failed` outcome so the remaining accounts still execute; only
//! configuration problems abort a run, and those never reach this module.

use rand::Rng;
use tokio::time::{sleep, Duration};
use tracing::{info, warn};
use url::Url;

use crate::auth;
use crate::checkin;
use crate::config::{Account, Config};
use crate::http::PanelClient;
use crate::notify::TelegramNotifier;
use crate::outcome::{Outcome, Status};

/// One account's classified result, in input order.
#[derive(Debug, Clone)]
pub struct AccountOutcome {
    pub label: String,
    pub outcome: Outcome,
}

/// Everything the run produced, for the summary and the exit code.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub results: Vec<AccountOutcome>,
}

impl RunReport {
    fn push(&mut self, label: &str, outcome: Outcome) {
        self.results.push(AccountOutcome { label: label.to_string(), outcome });
    }

    /// Localized summary grouping accounts by outcome.
    pub fn summary(&self) -> String {
        let mut lines = Vec::with_capacity(self.results.len() + 1);
        lines.push(format!(
            "{} 每日签到结果",
            chrono::Local::now().format("%Y-%m-%d")
        ));

        let mut challenge_count = 0usize;
        for result in &self.results {
            let line = match result.outcome.status {
                Status::Success => format!("- 成功: {}", result.label),
                Status::AlreadyDone => format!("- 已签到: {}", result.label),
                Status::ChallengeRequired => {
                    challenge_count += 1;
                    format!("- 需2FA: {}", result.label)
                }
                Status::Failed => format!("- 失败: {}", result.label),
            };
            lines.push(line);
        }

        let mut summary = lines.join("\n");
        if challenge_count > 0 {
            summary.push_str("\n\n提示: 有账号需要 2FA/人机验证，需人工介入处理。");
        }
        summary
    }

    /// True when every processed account hard-failed. Challenge outcomes
    /// are expected terminal states, not failures, and don't count.
    pub fn all_hard_failed(&self) -> bool {
        !self.results.is_empty()
            && self.results.iter().all(|r| r.outcome.status == Status::Failed)
    }
}

/// Process every configured account in order and deliver the summary.
pub async fn run(config: &Config) -> RunReport {
    let mut report = RunReport::default();

    // Stagger scheduled runs so many deployments don't hit the panel at
    // the same second
    random_sleep(0, config.pacing.initial_delay_max_ms).await;

    for account in &config.accounts {
        let label = account.display_label();

        if !account.has_credentials() {
            warn!("[{}] missing email/password, skipping", label);
            report.push(&label, Outcome::failed("missing credentials"));
            continue;
        }

        random_sleep(
            config.pacing.min_account_delay_ms,
            config.pacing.max_account_delay_ms,
        )
        .await;

        let outcome = process_account(account, config).await;
        match outcome.status {
            Status::Success => info!("[{}] check-in success", label),
            Status::AlreadyDone => info!("[{}] already checked in today", label),
            Status::ChallengeRequired => info!("[{}] 2FA/human verification required", label),
            Status::Failed => warn!("[{}] failed: {}", label, outcome.detail),
        }
        report.push(&label, outcome);

        random_sleep(
            config.pacing.min_settle_delay_ms,
            config.pacing.max_settle_delay_ms,
        )
        .await;
    }

    let summary = report.summary();
    info!("{}", summary);

    if let Some(telegram) = &config.telegram {
        let notifier = TelegramNotifier::new(&telegram.bot_token, &telegram.chat_id);
        if let Err(e) = notifier.send(&summary).await {
            warn!("telegram summary delivery failed: {}", e);
        }
    }

    report
}

/// Login then check-in for a single account, with its own session.
/// Transport errors surface here and become `Failed` outcomes.
async fn process_account(account: &Account, config: &Config) -> Outcome {
    let label = account.display_label();
    let base = account.resolved_base_url(&config.default_base_url);

    let base_url = match Url::parse(&base) {
        Ok(url) => url,
        Err(e) => return Outcome::failed(format!("invalid base URL {}: {}", base, e)),
    };

    let client = match PanelClient::new(&base_url) {
        Ok(client) => client,
        Err(e) => return Outcome::failed(format!("client setup error: {}", e)),
    };

    info!("[{}] logging in at {}", label, base);
    let login_outcome = match auth::login(&client, &base_url, account.email.trim(), account.password.trim()).await
    {
        Ok(outcome) => outcome,
        Err(e) => return Outcome::failed(format!("login error: {}", e)),
    };

    // Never proceed to check-in without a confirmed login
    if login_outcome.status != Status::Success {
        return login_outcome;
    }

    match checkin::perform_checkin(&client, &base_url, config.probe_fallback).await {
        Ok(outcome) => outcome,
        Err(e) => Outcome::failed(format!("check-in error: {}", e)),
    }
}

async fn random_sleep(min_ms: u64, max_ms: u64) {
    if max_ms == 0 {
        return;
    }
    let ms = if min_ms >= max_ms {
        min_ms
    } else {
        rand::thread_rng().gen_range(min_ms..=max_ms)
    };
    if ms > 0 {
        sleep(Duration::from_millis(ms)).await;
    }
}
