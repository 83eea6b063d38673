use common::{BuyerId, ExternalOrderId, LicenseKeyId, OrderRowId, ProductId};
use domain::{DomainError, ValidationError};
use thiserror::Error;

/// Errors that can occur when reading or writing the ledger.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    #[error("Buyer not found: {0}")]
    BuyerNotFound(BuyerId),

    #[error("Order not found: {0}")]
    OrderNotFound(OrderRowId),

    /// An order with this external id already exists.
    #[error("Duplicate order id: {0}")]
    DuplicateOrderId(ExternalOrderId),

    /// The order already left PENDING; terminal orders are never rewritten.
    #[error("Order {0} is no longer pending")]
    OrderNotPending(OrderRowId),

    #[error("License key not found: {0}")]
    KeyNotFound(LicenseKeyId),

    /// Assigned keys are part of a completed sale and cannot be removed.
    #[error("License key {0} is assigned to an order")]
    KeyAssigned(LicenseKeyId),

    /// Crediting the wallet would exceed the largest representable balance.
    #[error("Wallet balance of buyer {0} would overflow")]
    WalletOverflow(BuyerId),

    /// The input was rejected before anything was written.
    #[error("Rejected: {0}")]
    Rejected(#[from] ValidationError),

    /// A stored row could not be mapped back to a domain value.
    #[error("Corrupt record: {0}")]
    Corrupt(#[from] DomainError),

    /// The backend refused the operation.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, StoreError>;
