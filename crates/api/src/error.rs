//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::ValidationError;
use fulfillment::FulfillmentError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client.
    BadRequest(String),
    /// Missing or wrong admin token.
    Unauthorized,
    /// Fulfillment service error.
    Fulfillment(FulfillmentError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized".to_string()),
            ApiError::Fulfillment(err) => fulfillment_error_to_response(err),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn internal(detail: String) -> (StatusCode, String) {
    tracing::error!(error = %detail, "internal server error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal server error".to_string(),
    )
}

fn fulfillment_error_to_response(err: FulfillmentError) -> (StatusCode, String) {
    match &err {
        FulfillmentError::OrderNotFound(_)
        | FulfillmentError::ProductNotFound(_)
        | FulfillmentError::KeyNotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        FulfillmentError::Validation(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        FulfillmentError::OutOfStock(_)
        | FulfillmentError::ProductUnavailable(_)
        | FulfillmentError::KeyAssigned(_) => (StatusCode::CONFLICT, err.to_string()),
        FulfillmentError::GatewayUnavailable(e) => {
            tracing::warn!(error = %e, "payment gateway unavailable");
            (
                StatusCode::BAD_GATEWAY,
                "payment gateway unavailable".to_string(),
            )
        }
        FulfillmentError::Store(_) => internal(err.to_string()),
    }
}

impl From<FulfillmentError> for ApiError {
    fn from(err: FulfillmentError) -> Self {
        ApiError::Fulfillment(err)
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}
