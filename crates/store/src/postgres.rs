use async_trait::async_trait;
use common::{BuyerId, ExternalOrderId, LicenseKeyId, OrderRowId, ProductId};
use domain::{
    Buyer, ContactNumber, LicenseKey, LicenseKeyState, Money, NewOrder, NewProduct, Order,
    OrderState, Product,
};
use sqlx::{
    PgPool, Postgres, Row, Transaction,
    postgres::{PgConnection, PgRow},
};
use uuid::Uuid;

use crate::{
    Result, StoreError,
    ledger::{BuyerDirectory, Catalog, Completion, KeyImport, Ledger, LedgerTransaction},
};

const ORDER_COLUMNS: &str = "id, order_id, product_id, buyer_id, amount_cents, state, \
     license_key_id, license_key, utr, provider_order_ref, remark, created_at, updated_at";

const KEY_COLUMNS: &str = "id, product_id, secret, state, order_id, created_at";

const PRODUCT_COLUMNS: &str = "id, name, price_cents, active, stock";

const BUYER_COLUMNS: &str = "id, contact, name, wallet_balance_cents, created_at";

/// PostgreSQL-backed ledger.
#[derive(Clone)]
pub struct PostgresLedger {
    pool: PgPool,
}

impl PostgresLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn row_to_order(row: &PgRow) -> Result<Order> {
    let state: String = row.try_get("state")?;
    Ok(Order {
        id: OrderRowId::new(row.try_get("id")?),
        order_id: ExternalOrderId::new(row.try_get::<String, _>("order_id")?),
        product_id: row.try_get::<Option<i64>, _>("product_id")?.map(ProductId::new),
        buyer_id: BuyerId::from_uuid(row.try_get::<Uuid, _>("buyer_id")?),
        amount: Money::from_cents(row.try_get("amount_cents")?),
        state: OrderState::parse(&state)?,
        license_key_id: row
            .try_get::<Option<i64>, _>("license_key_id")?
            .map(LicenseKeyId::new),
        license_key: row.try_get("license_key")?,
        utr: row.try_get("utr")?,
        provider_order_ref: row.try_get("provider_order_ref")?,
        remark: row.try_get("remark")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_key(row: &PgRow) -> Result<LicenseKey> {
    let state: String = row.try_get("state")?;
    Ok(LicenseKey {
        id: LicenseKeyId::new(row.try_get("id")?),
        product_id: ProductId::new(row.try_get("product_id")?),
        secret: row.try_get("secret")?,
        state: LicenseKeyState::parse(&state)?,
        order_id: row.try_get::<Option<i64>, _>("order_id")?.map(OrderRowId::new),
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_product(row: &PgRow) -> Result<Product> {
    Ok(Product {
        id: ProductId::new(row.try_get("id")?),
        name: row.try_get("name")?,
        price: Money::from_cents(row.try_get("price_cents")?),
        active: row.try_get("active")?,
        available_stock: row.try_get("stock")?,
    })
}

fn row_to_buyer(row: &PgRow) -> Result<Buyer> {
    Ok(Buyer {
        id: BuyerId::from_uuid(row.try_get::<Uuid, _>("id")?),
        contact: row.try_get("contact")?,
        name: row.try_get("name")?,
        wallet_balance: Money::from_cents(row.try_get("wallet_balance_cents")?),
        created_at: row.try_get("created_at")?,
    })
}

/// Locks the product row, then rewrites its stock from the key table.
///
/// The count runs as a separate statement after the lock is held, so it sees
/// every claim committed before this refresh started waiting.
async fn recompute_stock(conn: &mut PgConnection, product: ProductId) -> Result<i64> {
    let locked: Option<i64> = sqlx::query_scalar("SELECT id FROM products WHERE id = $1 FOR UPDATE")
        .bind(product.as_i64())
        .fetch_optional(&mut *conn)
        .await?;
    if locked.is_none() {
        return Err(StoreError::ProductNotFound(product));
    }

    let stock: i64 = sqlx::query_scalar(
        r#"
        UPDATE products
        SET stock = (
            SELECT COUNT(*) FROM license_keys
            WHERE product_id = $1 AND state = 'UNASSIGNED'
        )
        WHERE id = $1
        RETURNING stock
        "#,
    )
    .bind(product.as_i64())
    .fetch_one(&mut *conn)
    .await?;

    Ok(stock)
}

#[async_trait]
impl Catalog for PostgresLedger {
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_product).transpose()
    }

    async fn create_product(&self, product: NewProduct) -> Result<Product> {
        product.validate()?;
        let sql = format!(
            "INSERT INTO products (name, price_cents, active) VALUES ($1, $2, $3) \
             RETURNING {PRODUCT_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(&product.name)
            .bind(product.price.cents())
            .bind(product.active)
            .fetch_one(&self.pool)
            .await?;
        row_to_product(&row)
    }
}

#[async_trait]
impl BuyerDirectory for PostgresLedger {
    async fn find_or_create_buyer(&self, contact: &ContactNumber, name: &str) -> Result<Buyer> {
        // The no-op update makes RETURNING yield the existing row on conflict.
        let sql = format!(
            "INSERT INTO buyers (id, contact, name) VALUES ($1, $2, $3) \
             ON CONFLICT (contact) DO UPDATE SET contact = EXCLUDED.contact \
             RETURNING {BUYER_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(Uuid::new_v4())
            .bind(contact.as_str())
            .bind(name)
            .fetch_one(&self.pool)
            .await?;
        row_to_buyer(&row)
    }

    async fn get_buyer(&self, id: BuyerId) -> Result<Option<Buyer>> {
        let sql = format!("SELECT {BUYER_COLUMNS} FROM buyers WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_buyer).transpose()
    }
}

#[async_trait]
impl Ledger for PostgresLedger {
    type Tx = PostgresTransaction;

    async fn begin(&self) -> Result<Self::Tx> {
        Ok(PostgresTransaction {
            tx: self.pool.begin().await?,
        })
    }

    #[tracing::instrument(skip(self, order), fields(order_id = %order.order_id))]
    async fn create_order(&self, order: NewOrder) -> Result<Order> {
        let sql = format!(
            "INSERT INTO orders (order_id, product_id, buyer_id, amount_cents, remark) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {ORDER_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(order.order_id.as_str())
            .bind(order.product_id.map(|p| p.as_i64()))
            .bind(order.buyer_id.as_uuid())
            .bind(order.amount.cents())
            .bind(&order.remark)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.constraint() == Some("unique_external_order_id")
                {
                    return StoreError::DuplicateOrderId(order.order_id.clone());
                }
                StoreError::Database(e)
            })?;
        row_to_order(&row)
    }

    async fn find_order(&self, order_id: &ExternalOrderId) -> Result<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE order_id = $1");
        let row = sqlx::query(&sql)
            .bind(order_id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_order).transpose()
    }

    async fn record_provider_ref(&self, id: OrderRowId, provider_ref: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE orders SET provider_order_ref = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id.as_i64())
        .bind(provider_ref)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::OrderNotFound(id));
        }
        Ok(())
    }

    async fn recent_orders(&self, limit: usize) -> Result<Vec<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC, id DESC LIMIT $1");
        let rows = sqlx::query(&sql)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_order).collect()
    }

    async fn refresh_stock(&self, product: ProductId) -> Result<i64> {
        let mut tx = self.pool.begin().await?;
        let stock = recompute_stock(&mut *tx, product).await?;
        tx.commit().await?;
        Ok(stock)
    }

    #[tracing::instrument(skip(self, secrets), fields(count = secrets.len()))]
    async fn add_keys(&self, product: ProductId, secrets: &[String]) -> Result<KeyImport> {
        let mut tx = self.pool.begin().await?;

        let exists: Option<i64> =
            sqlx::query_scalar("SELECT id FROM products WHERE id = $1 FOR UPDATE")
                .bind(product.as_i64())
                .fetch_optional(&mut *tx)
                .await?;
        if exists.is_none() {
            return Err(StoreError::ProductNotFound(product));
        }

        let inserted = sqlx::query(
            r#"
            INSERT INTO license_keys (product_id, secret)
            SELECT $1, secret FROM UNNEST($2::text[]) AS batch(secret)
            ON CONFLICT (product_id, secret) DO NOTHING
            "#,
        )
        .bind(product.as_i64())
        .bind(secrets)
        .execute(&mut *tx)
        .await?;

        let stock = recompute_stock(&mut *tx, product).await?;
        tx.commit().await?;

        Ok(KeyImport {
            added: inserted.rows_affected() as usize,
            stock,
        })
    }

    async fn delete_key(&self, id: LicenseKeyId) -> Result<LicenseKey> {
        let mut tx = self.pool.begin().await?;

        // Product first, then key: the same order add_keys and the stock
        // refresh take their locks in.
        let product: Option<i64> =
            sqlx::query_scalar("SELECT product_id FROM license_keys WHERE id = $1")
                .bind(id.as_i64())
                .fetch_optional(&mut *tx)
                .await?;
        let product = ProductId::new(product.ok_or(StoreError::KeyNotFound(id))?);
        sqlx::query("SELECT id FROM products WHERE id = $1 FOR UPDATE")
            .bind(product.as_i64())
            .execute(&mut *tx)
            .await?;

        let sql = format!("SELECT {KEY_COLUMNS} FROM license_keys WHERE id = $1 FOR UPDATE");
        let row = sqlx::query(&sql)
            .bind(id.as_i64())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StoreError::KeyNotFound(id))?;
        let key = row_to_key(&row)?;
        if key.is_assigned() {
            return Err(StoreError::KeyAssigned(id));
        }

        sqlx::query("DELETE FROM license_keys WHERE id = $1")
            .bind(id.as_i64())
            .execute(&mut *tx)
            .await?;
        recompute_stock(&mut *tx, product).await?;
        tx.commit().await?;

        Ok(key)
    }

    async fn list_keys(
        &self,
        product: Option<ProductId>,
        limit: usize,
    ) -> Result<Vec<LicenseKey>> {
        let sql = format!(
            "SELECT {KEY_COLUMNS} FROM license_keys \
             WHERE ($1::BIGINT IS NULL OR product_id = $1) \
             ORDER BY id DESC LIMIT $2"
        );
        let rows = sqlx::query(&sql)
            .bind(product.map(|p| p.as_i64()))
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_key).collect()
    }

    async fn count_unassigned(&self, product: ProductId) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM license_keys WHERE product_id = $1 AND state = 'UNASSIGNED'",
        )
        .bind(product.as_i64())
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}

/// Transaction over a [`PostgresLedger`].
pub struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerTransaction for PostgresTransaction {
    async fn lock_order(&mut self, order_id: &ExternalOrderId) -> Result<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE order_id = $1 FOR UPDATE");
        let row = sqlx::query(&sql)
            .bind(order_id.as_str())
            .fetch_optional(&mut *self.tx)
            .await?;
        row.as_ref().map(row_to_order).transpose()
    }

    async fn claim_key(
        &mut self,
        product: ProductId,
        order: OrderRowId,
    ) -> Result<Option<LicenseKey>> {
        let sql = format!(
            "UPDATE license_keys \
             SET state = 'ASSIGNED', order_id = $2, assigned_at = NOW() \
             WHERE id = ( \
                 SELECT id FROM license_keys \
                 WHERE product_id = $1 AND state = 'UNASSIGNED' \
                 ORDER BY id LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {KEY_COLUMNS}"
        );
        let claimed = sqlx::query(&sql)
            .bind(product.as_i64())
            .bind(order.as_i64())
            .fetch_optional(&mut *self.tx)
            .await?;
        if let Some(row) = claimed {
            return row_to_key(&row).map(Some);
        }

        // Every remaining candidate is held by an in-flight claim. Wait for the
        // oldest one and take it only if that claim rolled back.
        let waited: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM license_keys \
             WHERE product_id = $1 AND state = 'UNASSIGNED' \
             ORDER BY id LIMIT 1 FOR UPDATE",
        )
        .bind(product.as_i64())
        .fetch_optional(&mut *self.tx)
        .await?;
        let Some(key_id) = waited else {
            return Ok(None);
        };

        let sql = format!(
            "UPDATE license_keys \
             SET state = 'ASSIGNED', order_id = $2, assigned_at = NOW() \
             WHERE id = $1 AND state = 'UNASSIGNED' \
             RETURNING {KEY_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(key_id)
            .bind(order.as_i64())
            .fetch_optional(&mut *self.tx)
            .await?;
        row.as_ref().map(row_to_key).transpose()
    }

    async fn credit_wallet(&mut self, buyer: BuyerId, amount: Money) -> Result<Money> {
        let current: Option<i64> = sqlx::query_scalar(
            "SELECT wallet_balance_cents FROM buyers WHERE id = $1 FOR UPDATE",
        )
        .bind(buyer.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;
        let balance = Money::from_cents(current.ok_or(StoreError::BuyerNotFound(buyer))?)
            .checked_add(amount)
            .ok_or(StoreError::WalletOverflow(buyer))?;

        sqlx::query("UPDATE buyers SET wallet_balance_cents = $2 WHERE id = $1")
            .bind(buyer.as_uuid())
            .bind(balance.cents())
            .execute(&mut *self.tx)
            .await?;
        Ok(balance)
    }

    async fn complete_order(&mut self, id: OrderRowId, completion: Completion) -> Result<Order> {
        let (key_id, secret) = completion.license_key.unzip();
        let sql = format!(
            "UPDATE orders \
             SET state = $2, license_key_id = $3, license_key = $4, \
                 utr = COALESCE($5, utr), updated_at = NOW() \
             WHERE id = $1 AND state = 'PENDING' \
             RETURNING {ORDER_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(id.as_i64())
            .bind(completion.state.as_str())
            .bind(key_id.map(|k| k.as_i64()))
            .bind(secret)
            .bind(completion.utr)
            .fetch_optional(&mut *self.tx)
            .await?
            .ok_or(StoreError::OrderNotPending(id))?;
        row_to_order(&row)
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
