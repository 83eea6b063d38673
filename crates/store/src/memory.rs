use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use common::{BuyerId, ExternalOrderId, LicenseKeyId, OrderRowId, ProductId};
use domain::{
    Buyer, ContactNumber, LicenseKey, LicenseKeyState, Money, NewOrder, NewProduct, Order,
    OrderState, Product,
};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    Result, StoreError,
    ledger::{BuyerDirectory, Catalog, Completion, KeyImport, Ledger, LedgerTransaction},
};

#[derive(Debug, Clone, Default)]
struct LedgerState {
    products: BTreeMap<ProductId, Product>,
    buyers: HashMap<BuyerId, Buyer>,
    orders: BTreeMap<OrderRowId, Order>,
    keys: BTreeMap<LicenseKeyId, LicenseKey>,
    last_product_id: i64,
    last_order_id: i64,
    last_key_id: i64,
}

impl LedgerState {
    fn unassigned_count(&self, product: ProductId) -> i64 {
        self.keys
            .values()
            .filter(|k| k.product_id == product && k.state == LicenseKeyState::Unassigned)
            .count() as i64
    }

    fn recompute_stock(&mut self, product: ProductId) -> Result<i64> {
        let count = self.unassigned_count(product);
        let entry = self
            .products
            .get_mut(&product)
            .ok_or(StoreError::ProductNotFound(product))?;
        entry.available_stock = count;
        Ok(count)
    }

    fn order_by_external_id(&self, order_id: &ExternalOrderId) -> Option<&Order> {
        self.orders.values().find(|o| &o.order_id == order_id)
    }
}

/// In-memory ledger for tests and database-less runs.
///
/// Transactions take the single state lock for their whole lifetime and work
/// on a staged copy, so they are fully serialized and a dropped transaction
/// leaves no trace.
#[derive(Clone, Default)]
pub struct InMemoryLedger {
    state: Arc<Mutex<LedgerState>>,
    fail_on_complete: Arc<AtomicBool>,
}

impl InMemoryLedger {
    /// Creates a new empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `complete_order` fail, to exercise rollback.
    pub fn set_fail_on_complete(&self, fail: bool) {
        self.fail_on_complete.store(fail, Ordering::SeqCst);
    }

    /// Returns all keys of a product in import order.
    pub async fn keys_of(&self, product: ProductId) -> Vec<LicenseKey> {
        self.state
            .lock()
            .await
            .keys
            .values()
            .filter(|k| k.product_id == product)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Catalog for InMemoryLedger {
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.state.lock().await.products.get(&id).cloned())
    }

    async fn create_product(&self, product: NewProduct) -> Result<Product> {
        product.validate()?;
        let mut state = self.state.lock().await;
        state.last_product_id += 1;
        let id = ProductId::new(state.last_product_id);
        let created = Product {
            id,
            name: product.name,
            price: product.price,
            active: product.active,
            available_stock: 0,
        };
        state.products.insert(id, created.clone());
        Ok(created)
    }
}

#[async_trait]
impl BuyerDirectory for InMemoryLedger {
    async fn find_or_create_buyer(&self, contact: &ContactNumber, name: &str) -> Result<Buyer> {
        let mut state = self.state.lock().await;
        if let Some(existing) = state.buyers.values().find(|b| b.contact == contact.as_str()) {
            return Ok(existing.clone());
        }

        let buyer = Buyer {
            id: BuyerId::new(),
            contact: contact.as_str().to_string(),
            name: name.to_string(),
            wallet_balance: Money::zero(),
            created_at: Utc::now(),
        };
        state.buyers.insert(buyer.id, buyer.clone());
        Ok(buyer)
    }

    async fn get_buyer(&self, id: BuyerId) -> Result<Option<Buyer>> {
        Ok(self.state.lock().await.buyers.get(&id).cloned())
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    type Tx = InMemoryTransaction;

    async fn begin(&self) -> Result<Self::Tx> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let staged = guard.clone();
        Ok(InMemoryTransaction {
            guard,
            staged,
            fail_on_complete: self.fail_on_complete.load(Ordering::SeqCst),
        })
    }

    async fn create_order(&self, order: NewOrder) -> Result<Order> {
        let mut state = self.state.lock().await;
        if state.order_by_external_id(&order.order_id).is_some() {
            return Err(StoreError::DuplicateOrderId(order.order_id));
        }
        if !state.buyers.contains_key(&order.buyer_id) {
            return Err(StoreError::BuyerNotFound(order.buyer_id));
        }
        if let Some(product) = order.product_id
            && !state.products.contains_key(&product)
        {
            return Err(StoreError::ProductNotFound(product));
        }

        state.last_order_id += 1;
        let id = OrderRowId::new(state.last_order_id);
        let now = Utc::now();
        let created = Order {
            id,
            order_id: order.order_id,
            product_id: order.product_id,
            buyer_id: order.buyer_id,
            amount: order.amount,
            state: OrderState::Pending,
            license_key_id: None,
            license_key: None,
            utr: None,
            provider_order_ref: None,
            remark: order.remark,
            created_at: now,
            updated_at: now,
        };
        state.orders.insert(id, created.clone());
        Ok(created)
    }

    async fn find_order(&self, order_id: &ExternalOrderId) -> Result<Option<Order>> {
        Ok(self
            .state
            .lock()
            .await
            .order_by_external_id(order_id)
            .cloned())
    }

    async fn record_provider_ref(&self, id: OrderRowId, provider_ref: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        let order = state
            .orders
            .get_mut(&id)
            .ok_or(StoreError::OrderNotFound(id))?;
        order.provider_order_ref = Some(provider_ref.to_string());
        order.updated_at = Utc::now();
        Ok(())
    }

    async fn recent_orders(&self, limit: usize) -> Result<Vec<Order>> {
        Ok(self
            .state
            .lock()
            .await
            .orders
            .values()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }

    async fn refresh_stock(&self, product: ProductId) -> Result<i64> {
        self.state.lock().await.recompute_stock(product)
    }

    async fn add_keys(&self, product: ProductId, secrets: &[String]) -> Result<KeyImport> {
        let mut state = self.state.lock().await;
        if !state.products.contains_key(&product) {
            return Err(StoreError::ProductNotFound(product));
        }

        let mut known: HashSet<String> = state
            .keys
            .values()
            .filter(|k| k.product_id == product)
            .map(|k| k.secret.clone())
            .collect();

        let mut added = 0;
        for secret in secrets {
            if !known.insert(secret.clone()) {
                continue;
            }
            state.last_key_id += 1;
            let id = LicenseKeyId::new(state.last_key_id);
            state.keys.insert(
                id,
                LicenseKey {
                    id,
                    product_id: product,
                    secret: secret.clone(),
                    state: LicenseKeyState::Unassigned,
                    order_id: None,
                    created_at: Utc::now(),
                },
            );
            added += 1;
        }

        let stock = state.recompute_stock(product)?;
        Ok(KeyImport { added, stock })
    }

    async fn delete_key(&self, id: LicenseKeyId) -> Result<LicenseKey> {
        let mut state = self.state.lock().await;
        let key = state.keys.get(&id).ok_or(StoreError::KeyNotFound(id))?;
        if key.is_assigned() {
            return Err(StoreError::KeyAssigned(id));
        }
        let product = key.product_id;
        let removed = state.keys.remove(&id).ok_or(StoreError::KeyNotFound(id))?;
        state.recompute_stock(product)?;
        Ok(removed)
    }

    async fn list_keys(
        &self,
        product: Option<ProductId>,
        limit: usize,
    ) -> Result<Vec<LicenseKey>> {
        Ok(self
            .state
            .lock()
            .await
            .keys
            .values()
            .rev()
            .filter(|k| product.is_none_or(|p| k.product_id == p))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn count_unassigned(&self, product: ProductId) -> Result<i64> {
        Ok(self.state.lock().await.unassigned_count(product))
    }
}

/// Transaction over an [`InMemoryLedger`].
pub struct InMemoryTransaction {
    guard: OwnedMutexGuard<LedgerState>,
    staged: LedgerState,
    fail_on_complete: bool,
}

#[async_trait]
impl LedgerTransaction for InMemoryTransaction {
    async fn lock_order(&mut self, order_id: &ExternalOrderId) -> Result<Option<Order>> {
        Ok(self.staged.order_by_external_id(order_id).cloned())
    }

    async fn claim_key(
        &mut self,
        product: ProductId,
        order: OrderRowId,
    ) -> Result<Option<LicenseKey>> {
        let Some(key) = self
            .staged
            .keys
            .values_mut()
            .find(|k| k.product_id == product && k.state == LicenseKeyState::Unassigned)
        else {
            return Ok(None);
        };

        key.state = LicenseKeyState::Assigned;
        key.order_id = Some(order);
        Ok(Some(key.clone()))
    }

    async fn credit_wallet(&mut self, buyer: BuyerId, amount: Money) -> Result<Money> {
        let entry = self
            .staged
            .buyers
            .get_mut(&buyer)
            .ok_or(StoreError::BuyerNotFound(buyer))?;
        entry.wallet_balance = entry
            .wallet_balance
            .checked_add(amount)
            .ok_or(StoreError::WalletOverflow(buyer))?;
        Ok(entry.wallet_balance)
    }

    async fn complete_order(&mut self, id: OrderRowId, completion: Completion) -> Result<Order> {
        if self.fail_on_complete {
            return Err(StoreError::Unavailable("order write rejected".to_string()));
        }

        let order = self
            .staged
            .orders
            .get_mut(&id)
            .ok_or(StoreError::OrderNotFound(id))?;
        if order.state != OrderState::Pending {
            return Err(StoreError::OrderNotPending(id));
        }

        order.state = completion.state;
        if let Some((key_id, secret)) = completion.license_key {
            order.license_key_id = Some(key_id);
            order.license_key = Some(secret);
        }
        if let Some(utr) = completion.utr {
            order.utr = Some(utr);
        }
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    async fn commit(self) -> Result<()> {
        let Self {
            mut guard, staged, ..
        } = self;
        *guard = staged;
        Ok(())
    }
}
