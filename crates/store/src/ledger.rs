use async_trait::async_trait;
use common::{BuyerId, ExternalOrderId, LicenseKeyId, OrderRowId, ProductId};
use domain::{
    Buyer, ContactNumber, LicenseKey, Money, NewOrder, NewProduct, Order, OrderState, Product,
};

use crate::Result;

/// Read and seed access to the product catalog.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>>;

    /// Adds a product; names must be non-blank and prices positive.
    async fn create_product(&self, product: NewProduct) -> Result<Product>;
}

/// Buyers are keyed by contact number and created on first checkout.
#[async_trait]
pub trait BuyerDirectory: Send + Sync {
    /// Returns the buyer owning `contact`, creating it with `name` if absent.
    ///
    /// An existing buyer keeps its stored name.
    async fn find_or_create_buyer(&self, contact: &ContactNumber, name: &str) -> Result<Buyer>;

    async fn get_buyer(&self, id: BuyerId) -> Result<Option<Buyer>>;
}

/// Result of a key import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyImport {
    /// Keys actually inserted; duplicates of existing keys are skipped.
    pub added: usize,
    /// Unassigned keys of the product after the import.
    pub stock: i64,
}

/// Final write applied to a PENDING order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub state: OrderState,
    pub license_key: Option<(LicenseKeyId, String)>,
    /// Gateway transaction reference; `None` keeps whatever is stored.
    pub utr: Option<String>,
}

impl Completion {
    pub fn delivered(key: &LicenseKey, utr: Option<String>) -> Self {
        Self {
            state: OrderState::Success,
            license_key: Some((key.id, key.secret.clone())),
            utr,
        }
    }

    pub fn without_key(state: OrderState, utr: Option<String>) -> Self {
        Self {
            state,
            license_key: None,
            utr,
        }
    }
}

/// The order ledger and license-key inventory.
///
/// Plain methods run in their own short transaction. Anything that must
/// decide an order's outcome goes through [`Ledger::begin`], which hands out a
/// [`LedgerTransaction`] holding the order's row lock until commit.
#[async_trait]
pub trait Ledger: Catalog + BuyerDirectory + Send + Sync {
    type Tx: LedgerTransaction;

    async fn begin(&self) -> Result<Self::Tx>;

    /// Opens a PENDING order. Fails with `DuplicateOrderId` on id reuse.
    async fn create_order(&self, order: NewOrder) -> Result<Order>;

    async fn find_order(&self, order_id: &ExternalOrderId) -> Result<Option<Order>>;

    /// Stores the gateway's own reference for an order.
    async fn record_provider_ref(&self, id: OrderRowId, provider_ref: &str) -> Result<()>;

    /// Most recent orders first.
    async fn recent_orders(&self, limit: usize) -> Result<Vec<Order>>;

    /// Recomputes the cached stock counter from the key table.
    async fn refresh_stock(&self, product: ProductId) -> Result<i64>;

    /// Inserts new UNASSIGNED keys, skipping secrets the product already has,
    /// and refreshes the stock counter in the same transaction.
    async fn add_keys(&self, product: ProductId, secrets: &[String]) -> Result<KeyImport>;

    /// Removes an UNASSIGNED key and refreshes the stock counter.
    async fn delete_key(&self, id: LicenseKeyId) -> Result<LicenseKey>;

    /// Keys newest first, optionally restricted to one product.
    async fn list_keys(&self, product: Option<ProductId>, limit: usize)
    -> Result<Vec<LicenseKey>>;

    async fn count_unassigned(&self, product: ProductId) -> Result<i64>;
}

/// A unit of work over one order. Dropping it without [`commit`] rolls back.
///
/// [`commit`]: LedgerTransaction::commit
#[async_trait]
pub trait LedgerTransaction: Send {
    /// Loads an order and locks it against concurrent resolution.
    async fn lock_order(&mut self, order_id: &ExternalOrderId) -> Result<Option<Order>>;

    /// Moves one UNASSIGNED key of `product` to ASSIGNED for `order`.
    ///
    /// No two transactions can claim the same key. Returns `None` when the
    /// product has no unassigned key left.
    async fn claim_key(&mut self, product: ProductId, order: OrderRowId)
    -> Result<Option<LicenseKey>>;

    /// Adds `amount` to a buyer's wallet, returning the new balance.
    /// Fails with [`StoreError::WalletOverflow`] instead of wrapping the balance.
    async fn credit_wallet(&mut self, buyer: BuyerId, amount: Money) -> Result<Money>;

    /// Moves a PENDING order to its terminal state.
    ///
    /// Fails with `OrderNotPending` if the order already left PENDING.
    async fn complete_order(&mut self, order: OrderRowId, completion: Completion)
    -> Result<Order>;

    async fn commit(self) -> Result<()>;
}
