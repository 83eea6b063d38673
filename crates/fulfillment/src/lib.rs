//! Payment reconciliation and license-key fulfillment.
//!
//! A payment signal reaches the [`FulfillmentCoordinator`] from two sides:
//! the gateway's webhook and the buyer's poller (through the
//! [`StatusQueryService`]). Both are normalized to the same
//! [`domain::GatewayCallback`] first, and the coordinator makes sure the
//! order is resolved once no matter how many signals arrive.

pub mod checkout;
pub mod coordinator;
pub mod error;
pub mod gateway;
pub mod inventory;
pub mod status;

pub use checkout::{CheckoutReceipt, CheckoutService};
pub use coordinator::{FulfillmentCoordinator, FulfillmentResult};
pub use error::{FulfillmentError, Result};
pub use gateway::{
    CreatePaymentRequest, CreatedPayment, GatewayError, Pay0Config, Pay0Gateway, PaymentGateway,
    ScriptedGateway, StatusReport,
};
pub use inventory::InventoryService;
pub use status::StatusQueryService;
