//! The fulfillment coordinator: turns a payment signal into an order outcome.

use common::ProductId;
use domain::{GatewayCallback, Order, OrderState, OrderView, PaymentOutcome};
use store::{Completion, Ledger, LedgerTransaction};

use crate::error::{FulfillmentError, Result};

/// What a resolution did to an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FulfillmentResult {
    pub order: Order,
    /// The order was already terminal; nothing was written.
    pub already_terminal: bool,
}

impl FulfillmentResult {
    pub fn state(&self) -> OrderState {
        self.order.state
    }

    pub fn view(&self) -> OrderView {
        self.order.view()
    }
}

/// Applies payment outcomes to orders.
///
/// Each resolution is one ledger transaction: the order row is locked, at
/// most one key is claimed and the order moves to its terminal state, or
/// nothing happens at all.
#[derive(Clone)]
pub struct FulfillmentCoordinator<L: Ledger> {
    ledger: L,
}

impl<L: Ledger> FulfillmentCoordinator<L> {
    pub fn new(ledger: L) -> Self {
        Self { ledger }
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Resolves an order against a normalized payment signal.
    ///
    /// Terminal orders are returned unchanged, so webhook retries and
    /// concurrent polls are harmless. A pending outcome writes nothing.
    #[tracing::instrument(
        skip(self, callback),
        fields(order_id = %callback.order_id, outcome = %callback.outcome)
    )]
    pub async fn resolve(&self, callback: &GatewayCallback) -> Result<FulfillmentResult> {
        let started = std::time::Instant::now();

        let mut tx = self.ledger.begin().await?;
        let order = tx
            .lock_order(&callback.order_id)
            .await?
            .ok_or_else(|| FulfillmentError::OrderNotFound(callback.order_id.clone()))?;

        if order.is_terminal() {
            metrics::counter!("fulfillment_idempotent_replays_total").increment(1);
            tracing::debug!(state = %order.state, "order already resolved");
            return Ok(FulfillmentResult {
                order,
                already_terminal: true,
            });
        }

        let utr = callback.provider_txn_ref.clone();
        let completion = match callback.outcome {
            PaymentOutcome::Pending => {
                return Ok(FulfillmentResult {
                    order,
                    already_terminal: false,
                });
            }
            PaymentOutcome::Failure => Completion::without_key(OrderState::Failed, utr),
            PaymentOutcome::Success => match order.product_id {
                None => {
                    let balance = tx.credit_wallet(order.buyer_id, order.amount).await?;
                    tracing::info!(buyer_id = %order.buyer_id, %balance, "wallet credited");
                    Completion::without_key(OrderState::Success, utr)
                }
                Some(product_id) => match tx.claim_key(product_id, order.id).await? {
                    Some(key) => Completion::delivered(&key, utr),
                    None => {
                        metrics::counter!("fulfillment_out_of_stock_total").increment(1);
                        tracing::warn!(%product_id, "paid order found no license key");
                        Completion::without_key(OrderState::FailedNoStock, utr)
                    }
                },
            },
        };

        let resolved = tx.complete_order(order.id, completion).await?;
        tx.commit().await?;

        metrics::counter!("fulfillment_resolutions_total", "outcome" => resolved.state.as_str())
            .increment(1);
        metrics::histogram!("fulfillment_resolve_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        tracing::info!(state = %resolved.state, "order resolved");

        if callback.outcome == PaymentOutcome::Success
            && let Some(product_id) = resolved.product_id
        {
            self.refresh_stock(product_id).await;
        }

        Ok(FulfillmentResult {
            order: resolved,
            already_terminal: false,
        })
    }

    /// Brings the cached stock counter back in line after a claim.
    async fn refresh_stock(&self, product_id: ProductId) {
        match self.ledger.refresh_stock(product_id).await {
            Ok(stock) => tracing::debug!(%product_id, stock, "stock refreshed"),
            Err(e) => tracing::warn!(%product_id, error = %e, "stock refresh failed"),
        }
    }
}
