//! Classified result of an authentication or check-in attempt.

use serde::{Deserialize, Serialize};

/// Terminal status for one account step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Status {
    /// Login confirmed or check-in accepted.
    Success,
    /// The panel reports today's check-in was already claimed.
    AlreadyDone,
    /// A 2FA or human-verification interstitial blocks the flow.
    ChallengeRequired,
    /// Hard failure (bad credentials, missing entry point, ambiguous result).
    Failed,
}

/// Status plus a human-readable detail line for the summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outcome {
    pub status: Status,
    pub detail: String,
}

impl Outcome {
    pub fn success(detail: impl Into<String>) -> Self {
        Self { status: Status::Success, detail: detail.into() }
    }

    pub fn already_done(detail: impl Into<String>) -> Self {
        Self { status: Status::AlreadyDone, detail: detail.into() }
    }

    pub fn challenge(detail: impl Into<String>) -> Self {
        Self { status: Status::ChallengeRequired, detail: detail.into() }
    }

    pub fn failed(detail: impl Into<String>) -> Self {
        Self { status: Status::Failed, detail: detail.into() }
    }
}
