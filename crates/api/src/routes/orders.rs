//! Buyer-facing order status endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::ExternalOrderId;
use domain::OrderView;
use fulfillment::PaymentGateway;
use store::Ledger;

use crate::AppState;
use crate::error::ApiError;

/// GET /api/orders/{order_id}: same contract as the check-status poll.
#[tracing::instrument(skip(state))]
pub async fn get<L, G>(
    State(state): State<Arc<AppState<L, G>>>,
    Path(order_id): Path<String>,
) -> Result<Json<OrderView>, ApiError>
where
    L: Ledger + Clone + 'static,
    G: PaymentGateway + Clone + 'static,
{
    let view = state.status.query(&ExternalOrderId::new(order_id)).await?;
    Ok(Json(view))
}
