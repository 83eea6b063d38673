//! Domain error types.

use thiserror::Error;

use crate::money::Money;

/// A request or payload that was rejected before any transaction began.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field was absent or blank.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// The buyer contact is not a usable phone number.
    #[error("Invalid contact number: {0}")]
    InvalidContact(String),

    /// A checkout amount outside `1..=Money::MAX_CHECKOUT_CENTS`.
    #[error("Invalid amount: {0} (must be between 1 and {max})", max = Money::MAX_CHECKOUT_CENTS)]
    InvalidAmount(i64),

    /// Catalog prices must be strictly positive.
    #[error("Invalid price: {0} (must be greater than 0)")]
    InvalidPrice(i64),

    /// Checkout named both a product and a manual amount, or neither.
    #[error("Checkout must name exactly one of productId or amount")]
    AmbiguousTarget,

    /// A key import contained no usable secrets.
    #[error("No license keys provided")]
    EmptyKeyBatch,

    /// A gateway payload could not be interpreted.
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),
}

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Input validation failed.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A persisted state string did not match any known state.
    #[error("Unknown {kind} state: {value}")]
    UnknownState { kind: &'static str, value: String },
}
