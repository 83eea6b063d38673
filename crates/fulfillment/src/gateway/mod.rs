//! Payment gateway trait and implementations.

mod pay0;
mod scripted;

pub use pay0::{Pay0Config, Pay0Gateway};
pub use scripted::ScriptedGateway;

use async_trait::async_trait;
use common::ExternalOrderId;
use domain::{GatewayCallback, Money, PaymentOutcome};
use thiserror::Error;

/// Errors talking to the payment provider.
///
/// None of these say anything about whether the buyer paid.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Gateway returned HTTP {0}")]
    Status(u16),

    #[error("Gateway rejected the request: {0}")]
    Rejected(String),

    #[error("Invalid response from gateway: {0}")]
    InvalidResponse(String),

    #[error("Gateway unavailable: {0}")]
    Unavailable(String),
}

/// Parameters of a provider-side order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatePaymentRequest {
    pub order_id: ExternalOrderId,
    pub customer_mobile: String,
    pub amount: Money,
    /// Where the provider sends the buyer after paying.
    pub redirect_url: String,
    pub remark1: String,
    pub remark2: String,
}

/// A provider-side order the buyer can pay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedPayment {
    pub payment_url: String,
    pub provider_order_ref: Option<String>,
}

/// Answer of a status check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub outcome: PaymentOutcome,
    pub provider_txn_ref: Option<String>,
}

impl StatusReport {
    /// Attributes the report to the order it was requested for.
    pub fn into_callback(self, order_id: ExternalOrderId) -> GatewayCallback {
        GatewayCallback {
            order_id,
            outcome: self.outcome,
            provider_txn_ref: self.provider_txn_ref,
        }
    }
}

/// Outbound calls to a payment provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Registers an order with the provider and returns where to pay it.
    async fn create_order(
        &self,
        request: &CreatePaymentRequest,
    ) -> Result<CreatedPayment, GatewayError>;

    /// Asks the provider what happened to an order.
    async fn check_status(&self, order_id: &ExternalOrderId) -> Result<StatusReport, GatewayError>;
}
