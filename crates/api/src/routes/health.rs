//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use fulfillment::PaymentGateway;
use serde::Serialize;
use store::Ledger;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub ledger: &'static str,
}

/// GET /health: reports whether the ledger answers queries.
pub async fn check<L, G>(
    State(state): State<Arc<AppState<L, G>>>,
) -> (StatusCode, Json<HealthResponse>)
where
    L: Ledger + Clone + 'static,
    G: PaymentGateway + Clone + 'static,
{
    match state.ledger.recent_orders(1).await {
        Ok(_) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok",
                ledger: "up",
            }),
        ),
        Err(e) => {
            tracing::error!(error = %e, "ledger health probe failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "degraded",
                    ledger: "down",
                }),
            )
        }
    }
}
