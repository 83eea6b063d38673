//! Coordinator tests against PostgreSQL row locks.
//!
//! These tests share one PostgreSQL container and need a Docker daemon.
//! Run with:
//!
//! ```bash
//! cargo test -p fulfillment --test postgres_coordinator -- --ignored --test-threads=1
//! ```

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use common::ExternalOrderId;
use domain::{
    ContactNumber, GatewayCallback, Money, NewOrder, NewProduct, Order, OrderState,
    PaymentOutcome, Product,
};
use fulfillment::FulfillmentCoordinator;
use futures_util::future::join_all;
use sqlx::PgPool;
use store::{
    BuyerDirectory, Catalog, Completion, Ledger, LedgerTransaction, PostgresLedger,
};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// How long a resolve must stay parked on a row lock to count as blocked.
const BLOCKED_FOR: Duration = Duration::from_millis(300);

struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_fulfillment_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

async fn get_test_ledger() -> PostgresLedger {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(20)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE license_keys, orders, buyers, products RESTART IDENTITY CASCADE")
        .execute(&pool)
        .await
        .unwrap();

    PostgresLedger::new(pool)
}

async fn seed_product(ledger: &PostgresLedger, keys: &[&str]) -> Product {
    let product = ledger
        .create_product(NewProduct::new("Office 2024", Money::from_major(499)))
        .await
        .unwrap();
    let secrets: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
    ledger.add_keys(product.id, &secrets).await.unwrap();
    product
}

async fn open_order(ledger: &PostgresLedger, product: &Product, contact: &str) -> Order {
    let buyer = ledger
        .find_or_create_buyer(&ContactNumber::parse(contact).unwrap(), "Buyer")
        .await
        .unwrap();
    ledger
        .create_order(NewOrder {
            order_id: ExternalOrderId::generate(),
            product_id: Some(product.id),
            buyer_id: buyer.id,
            amount: product.price,
            remark: None,
        })
        .await
        .unwrap()
}

fn success(order_id: &ExternalOrderId) -> GatewayCallback {
    GatewayCallback {
        order_id: order_id.clone(),
        outcome: PaymentOutcome::Success,
        provider_txn_ref: Some("UTR".to_string()),
    }
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires docker"]
async fn concurrent_resolves_of_one_order_assign_one_key() {
    let ledger = get_test_ledger().await;
    let product = seed_product(&ledger, &["K1", "K2", "K3"]).await;
    let order = open_order(&ledger, &product, "9000000001").await;
    let coordinator = FulfillmentCoordinator::new(ledger.clone());

    let handles = (0..8).map(|_| {
        let coordinator = coordinator.clone();
        let order_id = order.order_id.clone();
        tokio::spawn(async move { coordinator.resolve(&success(&order_id)).await })
    });
    let results: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|r| r.unwrap().unwrap())
        .collect();

    let first = results[0].view();
    assert_eq!(first.state, OrderState::Success);
    assert!(results.iter().all(|r| r.view() == first));
    assert_eq!(results.iter().filter(|r| !r.already_terminal).count(), 1);
    assert_eq!(ledger.count_unassigned(product.id).await.unwrap(), 2);
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires docker"]
async fn last_key_race_ends_success_and_failed_no_stock() {
    let ledger = get_test_ledger().await;
    let product = seed_product(&ledger, &["LAST"]).await;
    let first = open_order(&ledger, &product, "9000000002").await;
    let second = open_order(&ledger, &product, "9000000003").await;
    let coordinator = FulfillmentCoordinator::new(ledger.clone());

    let handles = [first.order_id, second.order_id].map(|order_id| {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.resolve(&success(&order_id)).await })
    });
    let mut states: Vec<OrderState> = join_all(handles)
        .await
        .into_iter()
        .map(|r| r.unwrap().unwrap().state())
        .collect();
    states.sort_by_key(|s| s.as_str());

    assert_eq!(states, vec![OrderState::FailedNoStock, OrderState::Success]);
    assert_eq!(ledger.count_unassigned(product.id).await.unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires docker"]
async fn oversubscribed_product_delivers_each_key_once() {
    let ledger = get_test_ledger().await;
    let product = seed_product(&ledger, &["A", "B", "C", "D"]).await;
    let mut orders = Vec::new();
    for i in 0..10 {
        orders.push(open_order(&ledger, &product, &format!("90000001{i:02}")).await);
    }
    let coordinator = FulfillmentCoordinator::new(ledger.clone());

    let handles = orders.into_iter().map(|order| {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.resolve(&success(&order.order_id)).await })
    });
    let results: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|r| r.unwrap().unwrap())
        .collect();

    let delivered: Vec<String> = results
        .iter()
        .filter_map(|r| r.order.license_key.clone())
        .collect();
    let unique: HashSet<&String> = delivered.iter().collect();
    assert_eq!(delivered.len(), 4);
    assert_eq!(unique.len(), 4);
    assert_eq!(
        results
            .iter()
            .filter(|r| r.state() == OrderState::FailedNoStock)
            .count(),
        6
    );
    let product = ledger.get_product(product.id).await.unwrap().unwrap();
    assert_eq!(product.available_stock, 0);
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires docker"]
async fn waiting_claim_takes_key_after_holder_rolls_back() {
    let ledger = get_test_ledger().await;
    let product = seed_product(&ledger, &["ONLY"]).await;
    let holder = open_order(&ledger, &product, "9000000004").await;
    let waiter = open_order(&ledger, &product, "9000000005").await;
    let coordinator = FulfillmentCoordinator::new(ledger.clone());

    let mut tx = ledger.begin().await.unwrap();
    tx.lock_order(&holder.order_id).await.unwrap().unwrap();
    let held = tx.claim_key(product.id, holder.id).await.unwrap().unwrap();

    let handle = {
        let coordinator = coordinator.clone();
        let order_id = waiter.order_id.clone();
        tokio::spawn(async move { coordinator.resolve(&success(&order_id)).await })
    };
    tokio::time::sleep(BLOCKED_FOR).await;
    assert!(!handle.is_finished());

    drop(tx);
    let result = handle.await.unwrap().unwrap();

    assert_eq!(result.state(), OrderState::Success);
    assert_eq!(result.order.license_key.as_deref(), Some(held.secret.as_str()));
    let holder = ledger.find_order(&holder.order_id).await.unwrap().unwrap();
    assert_eq!(holder.state, OrderState::Pending);
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires docker"]
async fn waiting_claim_finds_no_stock_after_holder_commits() {
    let ledger = get_test_ledger().await;
    let product = seed_product(&ledger, &["ONLY"]).await;
    let holder = open_order(&ledger, &product, "9000000006").await;
    let waiter = open_order(&ledger, &product, "9000000007").await;
    let coordinator = FulfillmentCoordinator::new(ledger.clone());

    let mut tx = ledger.begin().await.unwrap();
    tx.lock_order(&holder.order_id).await.unwrap().unwrap();
    let held = tx.claim_key(product.id, holder.id).await.unwrap().unwrap();

    let handle = {
        let coordinator = coordinator.clone();
        let order_id = waiter.order_id.clone();
        tokio::spawn(async move { coordinator.resolve(&success(&order_id)).await })
    };
    tokio::time::sleep(BLOCKED_FOR).await;
    assert!(!handle.is_finished());

    tx.complete_order(holder.id, Completion::delivered(&held, None))
        .await
        .unwrap();
    tx.commit().await.unwrap();
    let result = handle.await.unwrap().unwrap();

    assert_eq!(result.state(), OrderState::FailedNoStock);
    assert_eq!(result.order.license_key, None);
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires docker"]
async fn resolve_waits_on_order_lock_then_sees_terminal_state() {
    let ledger = get_test_ledger().await;
    let product = seed_product(&ledger, &["K1"]).await;
    let order = open_order(&ledger, &product, "9000000008").await;
    let coordinator = FulfillmentCoordinator::new(ledger.clone());

    let mut tx = ledger.begin().await.unwrap();
    tx.lock_order(&order.order_id).await.unwrap().unwrap();

    let handle = {
        let coordinator = coordinator.clone();
        let order_id = order.order_id.clone();
        tokio::spawn(async move { coordinator.resolve(&success(&order_id)).await })
    };
    tokio::time::sleep(BLOCKED_FOR).await;
    assert!(!handle.is_finished());

    tx.complete_order(order.id, Completion::without_key(OrderState::Failed, None))
        .await
        .unwrap();
    tx.commit().await.unwrap();
    let result = handle.await.unwrap().unwrap();

    assert!(result.already_terminal);
    assert_eq!(result.state(), OrderState::Failed);
    assert_eq!(ledger.count_unassigned(product.id).await.unwrap(), 1);
}
