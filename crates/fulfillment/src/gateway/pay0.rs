use std::time::Duration;

use async_trait::async_trait;
use common::ExternalOrderId;
use domain::CallbackFields;
use reqwest::Client;
use serde_json::Value;

use super::{CreatePaymentRequest, CreatedPayment, GatewayError, PaymentGateway, StatusReport};

const PAYMENT_URL_KEYS: &[&str] = &["payment_url", "paymentUrl"];
const PROVIDER_ORDER_KEYS: &[&str] = &["orderId", "order_id"];

/// Connection settings for a Pay0-style provider.
#[derive(Debug, Clone)]
pub struct Pay0Config {
    pub base_url: String,
    pub user_token: String,
    pub timeout: Duration,
}

impl Default for Pay0Config {
    fn default() -> Self {
        Self {
            base_url: "https://pay0.shop/api".to_string(),
            user_token: String::new(),
            timeout: Duration::from_secs(15),
        }
    }
}

/// HTTP client for a Pay0-style UPI gateway.
///
/// Both calls are form-encoded POSTs answered with a JSON envelope of the form
/// `{"status": bool, "message": ..., "result": {...}}`.
#[derive(Clone)]
pub struct Pay0Gateway {
    client: Client,
    config: Pay0Config,
}

impl Pay0Gateway {
    pub fn new(config: Pay0Config) -> Result<Self, GatewayError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    async fn post_form(
        &self,
        call: &'static str,
        path: &str,
        form: &[(&str, String)],
    ) -> Result<Value, GatewayError> {
        let result = self.send_form(path, form).await;
        let label = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!("gateway_requests_total", "call" => call, "result" => label).increment(1);
        result
    }

    async fn send_form(&self, path: &str, form: &[(&str, String)]) -> Result<Value, GatewayError> {
        let url = format!("{}/{}", self.config.base_url.trim_end_matches('/'), path);
        let response = self.client.post(&url).form(form).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Status(status.as_u16()));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        if body.get("status") == Some(&Value::Bool(false)) {
            let message = body
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("no message")
                .to_string();
            return Err(GatewayError::Rejected(message));
        }
        Ok(body)
    }
}

#[async_trait]
impl PaymentGateway for Pay0Gateway {
    #[tracing::instrument(skip(self, request), fields(order_id = %request.order_id))]
    async fn create_order(
        &self,
        request: &CreatePaymentRequest,
    ) -> Result<CreatedPayment, GatewayError> {
        let form = [
            ("user_token", self.config.user_token.clone()),
            ("customer_mobile", request.customer_mobile.clone()),
            ("amount", request.amount.to_decimal_string()),
            ("order_id", request.order_id.to_string()),
            ("redirect_url", request.redirect_url.clone()),
            ("remark1", request.remark1.clone()),
            ("remark2", request.remark2.clone()),
        ];
        let body = self.post_form("create_order", "create-order", &form).await?;

        let fields = CallbackFields::from_json(&body)
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
        let payment_url = fields
            .first_of(PAYMENT_URL_KEYS)
            .ok_or_else(|| GatewayError::InvalidResponse("missing payment_url".to_string()))?
            .to_string();

        Ok(CreatedPayment {
            payment_url,
            provider_order_ref: fields.first_of(PROVIDER_ORDER_KEYS).map(str::to_string),
        })
    }

    #[tracing::instrument(skip(self))]
    async fn check_status(&self, order_id: &ExternalOrderId) -> Result<StatusReport, GatewayError> {
        let form = [
            ("user_token", self.config.user_token.clone()),
            ("order_id", order_id.to_string()),
        ];
        let body = self
            .post_form("check_status", "check-order-status", &form)
            .await?;

        let fields = CallbackFields::from_json(&body)
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
        Ok(StatusReport {
            outcome: fields.outcome(),
            provider_txn_ref: fields.provider_txn_ref(),
        })
    }
}
