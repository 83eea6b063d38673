use std::collections::HashMap;

use common::ExternalOrderId;
use serde_json::Value;

use super::PaymentOutcome;
use crate::error::ValidationError;

const ORDER_ID_KEYS: &[&str] = &["order_id", "orderId", "client_txn_id"];
const STATUS_KEYS: &[&str] = &["txnStatus", "txn_status", "status"];
const TXN_REF_KEYS: &[&str] = &["utr", "UTR", "utr_number", "transaction_id", "txn_id"];

/// Objects some providers wrap their payload in.
const ENVELOPE_KEYS: &[&str] = &["result", "data"];

/// Flat string view over a gateway payload, whatever its encoding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackFields(HashMap<String, String>);

impl CallbackFields {
    /// Builds fields from decoded form pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Builds fields from a JSON object.
    ///
    /// Scalars inside a `result`/`data` envelope win over top-level ones, so
    /// `{"status": true, "result": {"status": "SUCCESS"}}` reads as success
    /// rather than as the envelope's boolean API flag.
    pub fn from_json(value: &Value) -> Result<Self, ValidationError> {
        let object = value.as_object().ok_or_else(|| {
            ValidationError::MalformedPayload("expected a JSON object".to_string())
        })?;

        let mut fields = HashMap::new();
        for key in ENVELOPE_KEYS {
            if let Some(Value::Object(inner)) = object.get(*key) {
                for (k, v) in inner {
                    if let Some(s) = scalar_to_string(v) {
                        fields.entry(k.clone()).or_insert(s);
                    }
                }
            }
        }
        for (k, v) in object {
            if let Some(s) = scalar_to_string(v) {
                fields.entry(k.clone()).or_insert(s);
            }
        }
        Ok(Self(fields))
    }

    /// Returns the first non-blank value among `keys`.
    pub fn first_of(&self, keys: &[&str]) -> Option<&str> {
        keys.iter()
            .filter_map(|k| self.0.get(*k))
            .map(|v| v.trim())
            .find(|v| !v.is_empty())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn order_id(&self) -> Option<ExternalOrderId> {
        self.first_of(ORDER_ID_KEYS).map(ExternalOrderId::from)
    }

    pub fn status_token(&self) -> Option<&str> {
        self.first_of(STATUS_KEYS)
    }

    pub fn provider_txn_ref(&self) -> Option<String> {
        self.first_of(TXN_REF_KEYS).map(str::to_string)
    }

    /// Outcome of the status token; a missing token reads as pending.
    pub fn outcome(&self) -> PaymentOutcome {
        self.status_token()
            .map(PaymentOutcome::from_token)
            .unwrap_or(PaymentOutcome::Pending)
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// A normalized payment signal about one order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayCallback {
    pub order_id: ExternalOrderId,
    pub outcome: PaymentOutcome,
    pub provider_txn_ref: Option<String>,
}

impl GatewayCallback {
    /// Normalizes a webhook payload.
    ///
    /// A payload without an order id or without any status token is
    /// rejected: it cannot be attributed or interpreted.
    pub fn from_fields(fields: &CallbackFields) -> Result<Self, ValidationError> {
        let order_id = fields
            .order_id()
            .ok_or(ValidationError::MissingField("order_id"))?;
        let token = fields
            .status_token()
            .ok_or(ValidationError::MissingField("status"))?;

        Ok(Self {
            order_id,
            outcome: PaymentOutcome::from_token(token),
            provider_txn_ref: fields.provider_txn_ref(),
        })
    }
}
