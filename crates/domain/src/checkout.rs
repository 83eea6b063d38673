//! Checkout request validation.

use common::ProductId;
use serde::Deserialize;

use crate::error::ValidationError;
use crate::money::Money;

/// A buyer contact number, normalized to digits with an optional leading `+`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContactNumber(String);

impl ContactNumber {
    const MIN_DIGITS: usize = 10;
    const MAX_DIGITS: usize = 15;

    /// Parses a contact number, ignoring spaces and dashes.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let compact: String = raw
            .trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | '-'))
            .collect();
        let digits = compact.strip_prefix('+').unwrap_or(compact.as_str());

        let valid = digits.chars().all(|c| c.is_ascii_digit())
            && (Self::MIN_DIGITS..=Self::MAX_DIGITS).contains(&digits.len());
        if !valid {
            return Err(ValidationError::InvalidContact(raw.trim().to_string()));
        }
        Ok(Self(compact))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContactNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a checkout buys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutTarget {
    /// One license key of a catalog product, at the catalog price.
    Product(ProductId),
    /// A wallet top-up of a buyer-chosen amount.
    Recharge(Money),
}

/// Raw checkout request as received from the storefront.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub product_id: Option<ProductId>,
    /// Manual amount in minor units, for wallet recharges.
    pub amount: Option<i64>,
    #[serde(default)]
    pub customer_name: String,
    #[serde(default)]
    pub customer_mobile: String,
    pub remark: Option<String>,
}

/// A checkout request that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedCheckout {
    pub target: CheckoutTarget,
    pub customer_name: String,
    pub contact: ContactNumber,
    pub remark: Option<String>,
}

impl CheckoutRequest {
    pub fn validate(self) -> Result<ValidatedCheckout, ValidationError> {
        let customer_name = self.customer_name.trim().to_string();
        if customer_name.is_empty() {
            return Err(ValidationError::MissingField("customerName"));
        }
        if self.customer_mobile.trim().is_empty() {
            return Err(ValidationError::MissingField("customerMobile"));
        }
        let contact = ContactNumber::parse(&self.customer_mobile)?;

        let target = match (self.product_id, self.amount) {
            (Some(product_id), None) => CheckoutTarget::Product(product_id),
            (None, Some(cents)) if (1..=Money::MAX_CHECKOUT_CENTS).contains(&cents) => {
                CheckoutTarget::Recharge(Money::from_cents(cents))
            }
            (None, Some(cents)) => return Err(ValidationError::InvalidAmount(cents)),
            _ => return Err(ValidationError::AmbiguousTarget),
        };

        let remark = self
            .remark
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());

        Ok(ValidatedCheckout {
            target,
            customer_name,
            contact,
            remark,
        })
    }
}
