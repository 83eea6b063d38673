//! HTTP API server for the license-key fulfillment engine.
//!
//! Provides the storefront checkout, the gateway webhook, the buyer's status
//! poll and the admin inventory endpoints, with structured logging (tracing)
//! and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::middleware;
use axum::routing::{delete, get, post};
use fulfillment::{
    CheckoutService, FulfillmentCoordinator, InventoryService, PaymentGateway, StatusQueryService,
};
use metrics_exporter_prometheus::PrometheusHandle;
use store::Ledger;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use routes::admin::AdminAuth;

/// Shared application state accessible from all handlers.
pub struct AppState<L: Ledger, G: PaymentGateway> {
    pub coordinator: FulfillmentCoordinator<L>,
    pub status: StatusQueryService<L, G>,
    pub checkout: CheckoutService<L, G>,
    pub inventory: InventoryService<L>,
    pub ledger: L,
    pub admin_token: Option<String>,
}

/// Wires the fulfillment services around one ledger and one gateway.
pub fn create_state<L, G>(ledger: L, gateway: G, config: &Config) -> Arc<AppState<L, G>>
where
    L: Ledger + Clone + 'static,
    G: PaymentGateway + Clone + 'static,
{
    let coordinator = FulfillmentCoordinator::new(ledger.clone());
    Arc::new(AppState {
        status: StatusQueryService::new(coordinator.clone(), gateway.clone()),
        checkout: CheckoutService::new(ledger.clone(), gateway, config.public_base_url.clone()),
        inventory: InventoryService::new(ledger.clone()),
        coordinator,
        ledger,
        admin_token: config.admin_token.clone(),
    })
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<L, G>(state: Arc<AppState<L, G>>, metrics_handle: PrometheusHandle) -> Router
where
    L: Ledger + Clone + 'static,
    G: PaymentGateway + Clone + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    let admin_router = Router::new()
        .route(
            "/api/admin/licenses",
            post(routes::admin::add_licenses::<L, G>).get(routes::admin::list_licenses::<L, G>),
        )
        .route(
            "/api/admin/licenses/{id}",
            delete(routes::admin::delete_license::<L, G>),
        )
        .route("/api/admin/orders", get(routes::admin::list_orders::<L, G>))
        .route_layer(middleware::from_fn_with_state(
            AdminAuth::new(state.admin_token.clone()),
            routes::admin::require_admin,
        ));

    Router::new()
        .route("/health", get(routes::health::check::<L, G>))
        .route(
            "/api/payment/create-order",
            post(routes::payment::create_order::<L, G>),
        )
        .route("/api/payment/webhook", post(routes::payment::webhook::<L, G>))
        .route(
            "/api/payment/check-status",
            post(routes::payment::check_status::<L, G>),
        )
        .route("/api/orders/{order_id}", get(routes::orders::get::<L, G>))
        .merge(admin_router)
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
