//! Admin inventory and order listing endpoints.
//!
//! Guarded by a static bearer token when `ADMIN_TOKEN` is configured.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use chrono::{DateTime, Utc};
use common::{LicenseKeyId, ProductId};
use domain::{LicenseKey, LicenseKeyState, Order, OrderState, split_secret_lines};
use fulfillment::{FulfillmentError, PaymentGateway};
use serde::{Deserialize, Serialize};
use store::Ledger;

use crate::AppState;
use crate::error::ApiError;

const RECENT_ORDERS_LIMIT: usize = 100;
const DEFAULT_KEY_PAGE: usize = 200;
const MAX_KEY_PAGE: usize = 1000;

/// State for the admin guard middleware.
#[derive(Clone)]
pub struct AdminAuth {
    token: Option<String>,
}

impl AdminAuth {
    pub fn new(token: Option<String>) -> Self {
        Self { token }
    }
}

/// Rejects admin requests without the configured bearer token.
pub async fn require_admin(
    State(auth): State<AdminAuth>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(expected) = auth.token.as_deref() {
        let presented = request
            .headers()
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        if presented != Some(expected) {
            tracing::warn!(path = %request.uri().path(), "admin request rejected");
            return Err(ApiError::Unauthorized);
        }
    }
    Ok(next.run(request).await)
}

// -- Request types --

/// Keys either as a JSON array or as one pasted, newline-separated string.
#[derive(Deserialize)]
#[serde(untagged)]
pub enum KeyBatch {
    List(Vec<String>),
    Text(String),
}

impl KeyBatch {
    fn into_secrets(self) -> Vec<String> {
        match self {
            KeyBatch::List(keys) => keys,
            KeyBatch::Text(text) => split_secret_lines(&text),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddLicensesRequest {
    pub product_id: ProductId,
    pub keys: KeyBatch,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListLicensesQuery {
    pub product_id: Option<ProductId>,
    pub limit: Option<usize>,
}

// -- Response types --

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddLicensesResponse {
    pub added: usize,
    pub new_stock: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseKeyResponse {
    pub id: LicenseKeyId,
    pub product_id: ProductId,
    pub secret: String,
    pub state: LicenseKeyState,
    pub order_row_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl From<LicenseKey> for LicenseKeyResponse {
    fn from(key: LicenseKey) -> Self {
        Self {
            id: key.id,
            product_id: key.product_id,
            secret: key.secret,
            state: key.state,
            order_row_id: key.order_id.map(i64::from),
            created_at: key.created_at,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub id: i64,
    pub order_id: String,
    pub product_id: Option<ProductId>,
    pub amount_cents: i64,
    pub status: OrderState,
    pub license_key: Option<String>,
    pub utr: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Order> for OrderSummary {
    fn from(order: Order) -> Self {
        Self {
            id: order.id.as_i64(),
            order_id: order.order_id.to_string(),
            product_id: order.product_id,
            amount_cents: order.amount.cents(),
            status: order.state,
            license_key: order.license_key,
            utr: order.utr,
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

// -- Handlers --

/// POST /api/admin/licenses: import keys for a product and report the new stock.
#[tracing::instrument(skip(state, body))]
pub async fn add_licenses<L, G>(
    State(state): State<Arc<AppState<L, G>>>,
    body: Result<Json<AddLicensesRequest>, JsonRejection>,
) -> Result<Json<AddLicensesResponse>, ApiError>
where
    L: Ledger + Clone + 'static,
    G: PaymentGateway + Clone + 'static,
{
    let Json(request) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let import = state
        .inventory
        .add_keys(request.product_id, request.keys.into_secrets())
        .await?;

    Ok(Json(AddLicensesResponse {
        added: import.added,
        new_stock: import.stock,
    }))
}

/// GET /api/admin/licenses: newest keys first, optionally for one product.
#[tracing::instrument(skip(state, query))]
pub async fn list_licenses<L, G>(
    State(state): State<Arc<AppState<L, G>>>,
    Query(query): Query<ListLicensesQuery>,
) -> Result<Json<Vec<LicenseKeyResponse>>, ApiError>
where
    L: Ledger + Clone + 'static,
    G: PaymentGateway + Clone + 'static,
{
    let limit = query.limit.unwrap_or(DEFAULT_KEY_PAGE).min(MAX_KEY_PAGE);
    let keys = state.inventory.list_keys(query.product_id, limit).await?;
    Ok(Json(keys.into_iter().map(LicenseKeyResponse::from).collect()))
}

/// DELETE /api/admin/licenses/{id}: remove an unassigned key.
#[tracing::instrument(skip(state))]
pub async fn delete_license<L, G>(
    State(state): State<Arc<AppState<L, G>>>,
    Path(id): Path<i64>,
) -> Result<Json<LicenseKeyResponse>, ApiError>
where
    L: Ledger + Clone + 'static,
    G: PaymentGateway + Clone + 'static,
{
    let key = state.inventory.delete_key(LicenseKeyId::new(id)).await?;
    Ok(Json(key.into()))
}

/// GET /api/admin/orders: the newest orders.
#[tracing::instrument(skip(state))]
pub async fn list_orders<L, G>(
    State(state): State<Arc<AppState<L, G>>>,
) -> Result<Json<Vec<OrderSummary>>, ApiError>
where
    L: Ledger + Clone + 'static,
    G: PaymentGateway + Clone + 'static,
{
    let orders = state
        .ledger
        .recent_orders(RECENT_ORDERS_LIMIT)
        .await
        .map_err(FulfillmentError::from)?;
    Ok(Json(orders.into_iter().map(OrderSummary::from).collect()))
}
