//! Storefront checkout, gateway webhook and status poll endpoints.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request, State};
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use common::ExternalOrderId;
use domain::{CallbackFields, CheckoutRequest, GatewayCallback, OrderState, OrderView};
use fulfillment::PaymentGateway;
use serde::{Deserialize, Serialize};
use store::Ledger;

use crate::AppState;
use crate::error::ApiError;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

// -- Request types --

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckStatusRequest {
    #[serde(alias = "order_id")]
    pub order_id: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub order_id: String,
    pub payment_url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookResponse {
    pub order_id: String,
    pub status: OrderState,
    pub already_processed: bool,
}

// -- Handlers --

/// POST /api/payment/create-order: open a PENDING order and return the gateway's payment URL.
#[tracing::instrument(skip(state, body))]
pub async fn create_order<L, G>(
    State(state): State<Arc<AppState<L, G>>>,
    body: Result<Json<CheckoutRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CheckoutResponse>), ApiError>
where
    L: Ledger + Clone + 'static,
    G: PaymentGateway + Clone + 'static,
{
    let Json(request) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let receipt = state.checkout.checkout(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(CheckoutResponse {
            order_id: receipt.order_id.to_string(),
            payment_url: receipt.payment_url,
        }),
    ))
}

/// POST /api/payment/webhook: accept a gateway notification, JSON or form encoded.
#[tracing::instrument(skip(state, request))]
pub async fn webhook<L, G>(
    State(state): State<Arc<AppState<L, G>>>,
    request: Request,
) -> Result<Json<WebhookResponse>, ApiError>
where
    L: Ledger + Clone + 'static,
    G: PaymentGateway + Clone + 'static,
{
    let fields = read_callback_fields(request).await?;
    let callback = GatewayCallback::from_fields(&fields)?;
    tracing::info!(
        order_id = %callback.order_id,
        outcome = %callback.outcome,
        "gateway webhook received"
    );

    let result = state.coordinator.resolve(&callback).await?;
    Ok(Json(WebhookResponse {
        order_id: result.order.order_id.to_string(),
        status: result.state(),
        already_processed: result.already_terminal,
    }))
}

/// POST /api/payment/check-status: the buyer's poll; reconciles with the gateway when still pending.
#[tracing::instrument(skip(state, body))]
pub async fn check_status<L, G>(
    State(state): State<Arc<AppState<L, G>>>,
    body: Result<Json<CheckStatusRequest>, JsonRejection>,
) -> Result<Json<OrderView>, ApiError>
where
    L: Ledger + Clone + 'static,
    G: PaymentGateway + Clone + 'static,
{
    let Json(request) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let order_id = request
        .order_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("orderId is required".to_string()))?;

    let view = state
        .status
        .query(&ExternalOrderId::new(order_id.trim()))
        .await?;
    Ok(Json(view))
}

async fn read_callback_fields(request: Request) -> Result<CallbackFields, ApiError> {
    let is_form = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with(FORM_CONTENT_TYPE));

    if is_form {
        let axum::Form(pairs) = axum::Form::<Vec<(String, String)>>::from_request(request, &())
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        return Ok(CallbackFields::from_pairs(pairs));
    }

    let body = Bytes::from_request(request, &())
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let value: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("invalid webhook body: {e}")))?;
    Ok(CallbackFields::from_json(&value)?)
}
