//! Fulfillment error types.

use common::{ExternalOrderId, LicenseKeyId, ProductId};
use domain::ValidationError;
use store::StoreError;
use thiserror::Error;

use crate::gateway::GatewayError;

/// Errors surfaced by the fulfillment services.
#[derive(Debug, Error)]
pub enum FulfillmentError {
    #[error("Order not found: {0}")]
    OrderNotFound(ExternalOrderId),

    /// The payment gateway could not be reached or refused the call.
    /// Never advances any order.
    #[error("Payment gateway unavailable: {0}")]
    GatewayUnavailable(#[from] GatewayError),

    /// Checkout refused because the product has no keys left.
    #[error("Product {0} is out of stock")]
    OutOfStock(ProductId),

    #[error("Product {0} is not available for sale")]
    ProductUnavailable(ProductId),

    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    #[error("License key not found: {0}")]
    KeyNotFound(LicenseKeyId),

    #[error("License key {0} is assigned and cannot be deleted")]
    KeyAssigned(LicenseKeyId),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for FulfillmentError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ProductNotFound(id) => FulfillmentError::ProductNotFound(id),
            StoreError::KeyNotFound(id) => FulfillmentError::KeyNotFound(id),
            StoreError::KeyAssigned(id) => FulfillmentError::KeyAssigned(id),
            StoreError::Rejected(e) => FulfillmentError::Validation(e),
            other => FulfillmentError::Store(other),
        }
    }
}

/// Convenience type alias for fulfillment results.
pub type Result<T> = std::result::Result<T, FulfillmentError>;
