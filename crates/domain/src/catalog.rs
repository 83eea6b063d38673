//! Catalog and buyer records consumed by the fulfillment core.

use chrono::{DateTime, Utc};
use common::{BuyerId, ProductId};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::money::Money;

/// A sellable product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    pub active: bool,
    /// Cached count of UNASSIGNED keys. Never used for allocation decisions.
    pub available_stock: i64,
}

impl Product {
    /// Whether checkout should offer this product at all.
    pub fn is_purchasable(&self) -> bool {
        self.active && self.available_stock > 0
    }
}

/// A buyer, keyed by contact number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Buyer {
    pub id: BuyerId,
    pub contact: String,
    pub name: String,
    pub wallet_balance: Money,
    pub created_at: DateTime<Utc>,
}

/// Data needed to add a product to the catalog.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub price: Money,
    pub active: bool,
}

impl NewProduct {
    pub fn new(name: impl Into<String>, price: Money) -> Self {
        Self {
            name: name.into(),
            price,
            active: true,
        }
    }

    /// Rejects blank names and non-positive prices.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingField("name"));
        }
        if !self.price.is_positive() {
            return Err(ValidationError::InvalidPrice(self.price.cents()));
        }
        Ok(())
    }
}
