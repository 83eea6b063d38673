//! Domain layer for the license-key fulfillment engine.
//!
//! This crate provides the pure, storage-agnostic pieces of the system:
//! - Order and license-key state machines
//! - Payment outcome normalization for webhook and status-check payloads
//! - Checkout request validation
//! - Entity structs shared by the store and the services

pub mod catalog;
pub mod checkout;
pub mod error;
pub mod license;
pub mod money;
pub mod order;
pub mod payment;

pub use catalog::{Buyer, NewProduct, Product};
pub use checkout::{CheckoutRequest, CheckoutTarget, ContactNumber, ValidatedCheckout};
pub use error::{DomainError, ValidationError};
pub use license::{LicenseKey, LicenseKeyState, normalize_secrets, split_secret_lines};
pub use money::Money;
pub use order::{NewOrder, Order, OrderState, OrderView};
pub use payment::{CallbackFields, GatewayCallback, PaymentOutcome};
