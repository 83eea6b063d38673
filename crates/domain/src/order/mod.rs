//! Order entity, state machine and read view.

mod state;

pub use state::OrderState;

use chrono::{DateTime, Utc};
use common::{BuyerId, ExternalOrderId, LicenseKeyId, OrderRowId, ProductId};
use serde::{Deserialize, Serialize};

use crate::money::Money;

/// A purchase attempt as recorded in the order ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderRowId,
    pub order_id: ExternalOrderId,
    /// `None` for a manual-amount wallet recharge.
    pub product_id: Option<ProductId>,
    pub buyer_id: BuyerId,
    pub amount: Money,
    pub state: OrderState,
    pub license_key_id: Option<LicenseKeyId>,
    /// Secret of the delivered key, copied for cheap reads by the poller.
    pub license_key: Option<String>,
    /// Gateway transaction reference (UTR).
    pub utr: Option<String>,
    pub provider_order_ref: Option<String>,
    pub remark: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Returns true once the order can no longer change state.
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Returns true if this order is a wallet recharge rather than a key purchase.
    pub fn is_recharge(&self) -> bool {
        self.product_id.is_none()
    }

    /// Projects the buyer-facing view of this order.
    pub fn view(&self) -> OrderView {
        OrderView {
            order_id: self.order_id.clone(),
            state: self.state,
            license_key: self.license_key.clone(),
        }
    }
}

/// Data needed to open a new PENDING order.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_id: ExternalOrderId,
    pub product_id: Option<ProductId>,
    pub buyer_id: BuyerId,
    pub amount: Money,
    pub remark: Option<String>,
}

/// What the buyer's poller sees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    pub order_id: ExternalOrderId,
    #[serde(rename = "status")]
    pub state: OrderState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license_key: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(state: OrderState, license_key: Option<&str>) -> Order {
        let now = Utc::now();
        Order {
            id: OrderRowId::new(1),
            order_id: ExternalOrderId::new("OID1"),
            product_id: Some(ProductId::new(3)),
            buyer_id: BuyerId::new(),
            amount: Money::from_cents(49900),
            state,
            license_key_id: license_key.map(|_| LicenseKeyId::new(9)),
            license_key: license_key.map(String::from),
            utr: None,
            provider_order_ref: None,
            remark: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_view_serializes_status_and_key() {
        let view = order(OrderState::Success, Some("AAAA-BBBB")).view();
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["orderId"], "OID1");
        assert_eq!(json["status"], "SUCCESS");
        assert_eq!(json["licenseKey"], "AAAA-BBBB");
    }

    #[test]
    fn test_pending_view_omits_key() {
        let json = serde_json::to_value(order(OrderState::Pending, None).view()).unwrap();
        assert_eq!(json["status"], "PENDING");
        assert!(json.get("licenseKey").is_none());
    }

    #[test]
    fn test_recharge_has_no_product() {
        let mut o = order(OrderState::Pending, None);
        assert!(!o.is_recharge());
        o.product_id = None;
        assert!(o.is_recharge());
    }
}
