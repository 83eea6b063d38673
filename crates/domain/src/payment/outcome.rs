use serde::{Deserialize, Serialize};

/// Normalized tri-state result of a payment signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentOutcome {
    Success,
    Failure,
    Pending,
}

const SUCCESS_TOKENS: &[&str] = &["success", "txn_success", "successful", "completed", "paid"];

const FAILURE_TOKENS: &[&str] = &[
    "failure",
    "failed",
    "fail",
    "txn_failure",
    "txn_failed",
    "cancelled",
    "canceled",
    "declined",
    "rejected",
    "expired",
];

impl PaymentOutcome {
    /// Maps a provider status token onto an outcome.
    ///
    /// Matching ignores case, surrounding whitespace and `-`/space vs `_`.
    /// Anything unrecognised is `Pending`: an unknown word must never move
    /// money-bearing state.
    pub fn from_token(token: &str) -> Self {
        let normalized = token.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        if SUCCESS_TOKENS.contains(&normalized.as_str()) {
            PaymentOutcome::Success
        } else if FAILURE_TOKENS.contains(&normalized.as_str()) {
            PaymentOutcome::Failure
        } else {
            PaymentOutcome::Pending
        }
    }

    /// Returns true for success or failure.
    pub fn is_definitive(&self) -> bool {
        !matches!(self, PaymentOutcome::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentOutcome::Success => "success",
            PaymentOutcome::Failure => "failure",
            PaymentOutcome::Pending => "pending",
        }
    }
}

impl std::fmt::Display for PaymentOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
