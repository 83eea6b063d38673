//! Order state machine.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// The state of an order in its lifecycle.
///
/// State transitions:
/// ```text
/// Pending ──┬──► Success
///           ├──► Failed
///           └──► FailedNoStock
/// ```
///
/// Every state other than `Pending` is absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderState {
    /// Created at checkout, waiting for a definitive payment signal.
    #[default]
    Pending,

    /// Paid and a license key was delivered (terminal state).
    Success,

    /// The gateway reported the payment as failed (terminal state).
    Failed,

    /// Paid, but no key was left to deliver (terminal state).
    ///
    /// The buyer was charged; this needs manual reconciliation.
    FailedNoStock,
}

impl OrderState {
    /// Returns true if a payment signal may still move this order.
    pub fn can_resolve(&self) -> bool {
        matches!(self, OrderState::Pending)
    }

    /// Returns true if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        !self.can_resolve()
    }

    /// Returns the persisted/wire name of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderState::Pending => "PENDING",
            OrderState::Success => "SUCCESS",
            OrderState::Failed => "FAILED",
            OrderState::FailedNoStock => "FAILED_NO_STOCK",
        }
    }

    /// Parses a persisted state name.
    pub fn parse(value: &str) -> Result<Self, DomainError> {
        match value {
            "PENDING" => Ok(OrderState::Pending),
            "SUCCESS" => Ok(OrderState::Success),
            "FAILED" => Ok(OrderState::Failed),
            "FAILED_NO_STOCK" => Ok(OrderState::FailedNoStock),
            other => Err(DomainError::UnknownState {
                kind: "order",
                value: other.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for OrderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
