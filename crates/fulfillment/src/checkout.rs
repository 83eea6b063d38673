//! Checkout: opens a PENDING order and asks the gateway where to pay it.

use common::ExternalOrderId;
use domain::{CheckoutRequest, CheckoutTarget, NewOrder};
use store::Ledger;

use crate::error::{FulfillmentError, Result};
use crate::gateway::{CreatePaymentRequest, PaymentGateway};

/// `remark1` sent for wallet recharges, which have no product id.
const RECHARGE_REMARK: &str = "wallet_recharge";

/// Returned to the storefront after a successful checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutReceipt {
    pub order_id: ExternalOrderId,
    pub payment_url: String,
}

#[derive(Clone)]
pub struct CheckoutService<L: Ledger, G: PaymentGateway> {
    ledger: L,
    gateway: G,
    public_base_url: String,
}

impl<L: Ledger, G: PaymentGateway> CheckoutService<L, G> {
    /// `public_base_url` is where buyers reach this store; the gateway
    /// redirects them to `{public_base_url}/order-success/{orderId}`.
    pub fn new(ledger: L, gateway: G, public_base_url: impl Into<String>) -> Self {
        Self {
            ledger,
            gateway,
            public_base_url: public_base_url.into(),
        }
    }

    #[tracing::instrument(skip(self, request))]
    pub async fn checkout(&self, request: CheckoutRequest) -> Result<CheckoutReceipt> {
        let checkout = request.validate()?;

        let (product_id, amount) = match checkout.target {
            CheckoutTarget::Product(id) => {
                let product = self
                    .ledger
                    .get_product(id)
                    .await?
                    .ok_or(FulfillmentError::ProductNotFound(id))?;
                if !product.active {
                    return Err(FulfillmentError::ProductUnavailable(id));
                }
                if product.available_stock <= 0 {
                    return Err(FulfillmentError::OutOfStock(id));
                }
                (Some(id), product.price)
            }
            CheckoutTarget::Recharge(amount) => (None, amount),
        };

        let buyer = self
            .ledger
            .find_or_create_buyer(&checkout.contact, &checkout.customer_name)
            .await?;

        let order = self
            .ledger
            .create_order(NewOrder {
                order_id: ExternalOrderId::generate(),
                product_id,
                buyer_id: buyer.id,
                amount,
                remark: checkout.remark,
            })
            .await?;
        tracing::info!(order_id = %order.order_id, %amount, "order opened");

        let payment = CreatePaymentRequest {
            order_id: order.order_id.clone(),
            customer_mobile: checkout.contact.to_string(),
            amount,
            redirect_url: format!(
                "{}/order-success/{}",
                self.public_base_url.trim_end_matches('/'),
                order.order_id
            ),
            remark1: product_id.map_or_else(|| RECHARGE_REMARK.to_string(), |p| p.to_string()),
            remark2: order.id.to_string(),
        };

        // The order stays PENDING either way; a later poll or webhook can
        // still settle it if the provider did register it.
        let created = self.gateway.create_order(&payment).await.map_err(|e| {
            tracing::warn!(order_id = %order.order_id, error = %e, "gateway refused checkout");
            e
        })?;

        if let Some(provider_ref) = &created.provider_order_ref
            && let Err(e) = self.ledger.record_provider_ref(order.id, provider_ref).await
        {
            tracing::warn!(order_id = %order.order_id, error = %e, "could not store provider ref");
        }

        Ok(CheckoutReceipt {
            order_id: order.order_id,
            payment_url: created.payment_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use common::ProductId;
    use domain::{Money, NewProduct, OrderState, ValidationError};
    use store::{Catalog, InMemoryLedger};

    use super::*;
    use crate::gateway::ScriptedGateway;

    async fn setup() -> (
        CheckoutService<InMemoryLedger, ScriptedGateway>,
        InMemoryLedger,
        ScriptedGateway,
    ) {
        let ledger = InMemoryLedger::new();
        let gateway = ScriptedGateway::new();
        let service = CheckoutService::new(ledger.clone(), gateway.clone(), "https://shop.test/");
        (service, ledger, gateway)
    }

    async fn stocked_product(ledger: &InMemoryLedger, active: bool) -> ProductId {
        let product = ledger
            .create_product(NewProduct {
                name: "Office 2024".to_string(),
                price: Money::from_major(999),
                active,
            })
            .await
            .unwrap();
        ledger
            .add_keys(product.id, &["K1".to_string()])
            .await
            .unwrap();
        product.id
    }

    fn request(product_id: Option<ProductId>, amount: Option<i64>) -> CheckoutRequest {
        CheckoutRequest {
            product_id,
            amount,
            customer_name: "Dev".to_string(),
            customer_mobile: "9811122233".to_string(),
            remark: Some("gift".to_string()),
        }
    }

    #[tokio::test]
    async fn test_product_checkout_opens_pending_order() {
        let (service, ledger, gateway) = setup().await;
        let product_id = stocked_product(&ledger, true).await;

        let receipt = service
            .checkout(request(Some(product_id), None))
            .await
            .unwrap();

        assert!(receipt.order_id.as_str().starts_with(ExternalOrderId::PREFIX));
        let order = ledger.find_order(&receipt.order_id).await.unwrap().unwrap();
        assert_eq!(order.state, OrderState::Pending);
        assert_eq!(order.amount, Money::from_major(999));
        assert_eq!(order.remark.as_deref(), Some("gift"));
        assert_eq!(order.provider_order_ref.as_deref(), Some("SCRIPTED-0001"));

        let sent = &gateway.created_orders()[0];
        assert_eq!(
            sent.redirect_url,
            format!("https://shop.test/order-success/{}", receipt.order_id)
        );
        assert_eq!(sent.remark1, product_id.to_string());
        assert_eq!(sent.remark2, order.id.to_string());
        assert_eq!(sent.customer_mobile, "9811122233");
    }

    #[tokio::test]
    async fn test_recharge_checkout_has_no_product() {
        let (service, ledger, gateway) = setup().await;

        let receipt = service.checkout(request(None, Some(25000))).await.unwrap();

        let order = ledger.find_order(&receipt.order_id).await.unwrap().unwrap();
        assert!(order.is_recharge());
        assert_eq!(order.amount, Money::from_cents(25000));
        assert_eq!(gateway.created_orders()[0].remark1, RECHARGE_REMARK);
    }

    #[tokio::test]
    async fn test_inactive_product_is_refused() {
        let (service, ledger, gateway) = setup().await;
        let product_id = stocked_product(&ledger, false).await;

        let result = service.checkout(request(Some(product_id), None)).await;
        assert!(matches!(result, Err(FulfillmentError::ProductUnavailable(_))));
        assert!(gateway.created_orders().is_empty());
    }

    #[tokio::test]
    async fn test_sold_out_product_is_refused() {
        let (service, ledger, _) = setup().await;
        let product = ledger
            .create_product(NewProduct::new("Empty", Money::from_major(5)))
            .await
            .unwrap();

        let result = service.checkout(request(Some(product.id), None)).await;
        assert!(matches!(result, Err(FulfillmentError::OutOfStock(_))));
        assert!(ledger.recent_orders(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_product_is_not_found() {
        let (service, _, _) = setup().await;
        let result = service
            .checkout(request(Some(ProductId::new(77)), None))
            .await;
        assert!(matches!(result, Err(FulfillmentError::ProductNotFound(_))));
    }

    #[tokio::test]
    async fn test_invalid_request_writes_nothing() {
        let (service, ledger, _) = setup().await;
        let mut bad = request(None, None);
        bad.customer_mobile = "123".to_string();

        let result = service.checkout(bad).await;
        assert!(matches!(
            result,
            Err(FulfillmentError::Validation(ValidationError::InvalidContact(_)))
        ));
        assert!(ledger.recent_orders(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_gateway_outage_leaves_order_pending() {
        let (service, ledger, gateway) = setup().await;
        let product_id = stocked_product(&ledger, true).await;
        gateway.set_fail_on_create(true);

        let result = service.checkout(request(Some(product_id), None)).await;
        assert!(matches!(result, Err(FulfillmentError::GatewayUnavailable(_))));

        let orders = ledger.recent_orders(10).await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].state, OrderState::Pending);
    }
}
