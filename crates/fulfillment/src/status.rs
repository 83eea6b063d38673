//! Status query path used by the buyer's poller.

use common::ExternalOrderId;
use domain::OrderView;
use store::Ledger;

use crate::coordinator::FulfillmentCoordinator;
use crate::error::{FulfillmentError, Result};
use crate::gateway::PaymentGateway;

/// Answers "what happened to my order?" and reconciles with the gateway when
/// the webhook has not arrived yet.
#[derive(Clone)]
pub struct StatusQueryService<L: Ledger, G: PaymentGateway> {
    coordinator: FulfillmentCoordinator<L>,
    gateway: G,
}

impl<L: Ledger, G: PaymentGateway> StatusQueryService<L, G> {
    pub fn new(coordinator: FulfillmentCoordinator<L>, gateway: G) -> Self {
        Self {
            coordinator,
            gateway,
        }
    }

    /// Returns the buyer-facing view of an order.
    ///
    /// A terminal order is answered from the ledger alone. A pending one is
    /// checked with the gateway and resolved if the gateway has a definitive
    /// answer. Gateway trouble is logged and reported as PENDING.
    #[tracing::instrument(skip(self))]
    pub async fn query(&self, order_id: &ExternalOrderId) -> Result<OrderView> {
        let order = self
            .coordinator
            .ledger()
            .find_order(order_id)
            .await?
            .ok_or_else(|| FulfillmentError::OrderNotFound(order_id.clone()))?;

        if order.is_terminal() {
            return Ok(order.view());
        }

        let report = match self.gateway.check_status(order_id).await {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!(error = %e, "status check failed, reporting pending");
                return Ok(order.view());
            }
        };

        if !report.outcome.is_definitive() {
            return Ok(order.view());
        }

        let result = self
            .coordinator
            .resolve(&report.into_callback(order_id.clone()))
            .await?;
        Ok(result.view())
    }
}

#[cfg(test)]
mod tests {
    use common::ProductId;
    use domain::{
        ContactNumber, Money, NewOrder, NewProduct, Order, OrderState, PaymentOutcome,
    };
    use store::{BuyerDirectory, Catalog, InMemoryLedger};

    use super::*;
    use crate::gateway::ScriptedGateway;

    struct Harness {
        service: StatusQueryService<InMemoryLedger, ScriptedGateway>,
        ledger: InMemoryLedger,
        gateway: ScriptedGateway,
        product_id: ProductId,
    }

    async fn harness(keys: &[&str]) -> Harness {
        let ledger = InMemoryLedger::new();
        let gateway = ScriptedGateway::new();
        let product = ledger
            .create_product(NewProduct::new("VPN 1y", Money::from_major(199)))
            .await
            .unwrap();
        let secrets: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        ledger.add_keys(product.id, &secrets).await.unwrap();

        Harness {
            service: StatusQueryService::new(
                FulfillmentCoordinator::new(ledger.clone()),
                gateway.clone(),
            ),
            ledger,
            gateway,
            product_id: product.id,
        }
    }

    async fn place_order(h: &Harness) -> Order {
        let buyer = h
            .ledger
            .find_or_create_buyer(&ContactNumber::parse("9000012345").unwrap(), "Kiran")
            .await
            .unwrap();
        h.ledger
            .create_order(NewOrder {
                order_id: ExternalOrderId::generate(),
                product_id: Some(h.product_id),
                buyer_id: buyer.id,
                amount: Money::from_major(199),
                remark: None,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_pending_order_stays_pending() {
        let h = harness(&["K1"]).await;
        let order = place_order(&h).await;

        let view = h.service.query(&order.order_id).await.unwrap();
        assert_eq!(view.state, OrderState::Pending);
        assert_eq!(view.license_key, None);
        assert_eq!(h.gateway.status_calls(), 1);
    }

    #[tokio::test]
    async fn test_poll_resolves_success_before_webhook() {
        let h = harness(&["K1"]).await;
        let order = place_order(&h).await;
        h.gateway
            .set_status(&order.order_id, PaymentOutcome::Success, Some("UTR7"));

        let view = h.service.query(&order.order_id).await.unwrap();
        assert_eq!(view.state, OrderState::Success);
        assert_eq!(view.license_key.as_deref(), Some("K1"));

        let stored = h.ledger.find_order(&order.order_id).await.unwrap().unwrap();
        assert_eq!(stored.utr.as_deref(), Some("UTR7"));
    }

    #[tokio::test]
    async fn test_terminal_order_skips_gateway() {
        let h = harness(&["K1"]).await;
        let order = place_order(&h).await;
        h.gateway
            .set_status(&order.order_id, PaymentOutcome::Failure, None);

        let first = h.service.query(&order.order_id).await.unwrap();
        let second = h.service.query(&order.order_id).await.unwrap();

        assert_eq!(first.state, OrderState::Failed);
        assert_eq!(second, first);
        assert_eq!(h.gateway.status_calls(), 1);
    }

    #[tokio::test]
    async fn test_gateway_outage_reports_pending() {
        let h = harness(&["K1"]).await;
        let order = place_order(&h).await;
        h.gateway.set_fail_on_status(true);

        let view = h.service.query(&order.order_id).await.unwrap();
        assert_eq!(view.state, OrderState::Pending);
        assert_eq!(h.ledger.count_unassigned(h.product_id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unknown_order_is_not_found() {
        let h = harness(&[]).await;
        let result = h.service.query(&ExternalOrderId::new("OID0")).await;
        assert!(matches!(result, Err(FulfillmentError::OrderNotFound(_))));
        assert_eq!(h.gateway.status_calls(), 0);
    }
}
