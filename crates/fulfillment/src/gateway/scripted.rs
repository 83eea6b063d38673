use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use common::ExternalOrderId;
use domain::PaymentOutcome;

use super::{CreatePaymentRequest, CreatedPayment, GatewayError, PaymentGateway, StatusReport};

#[derive(Debug, Default)]
struct ScriptedState {
    statuses: HashMap<ExternalOrderId, StatusReport>,
    created: Vec<CreatePaymentRequest>,
    status_calls: usize,
    fail_on_create: bool,
    fail_on_status: bool,
}

/// In-memory gateway for tests and database-less runs.
///
/// Orders report PENDING until a status is scripted with [`set_status`].
///
/// [`set_status`]: ScriptedGateway::set_status
#[derive(Debug, Clone, Default)]
pub struct ScriptedGateway {
    state: Arc<Mutex<ScriptedState>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, ScriptedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Scripts what `check_status` reports for an order.
    pub fn set_status(
        &self,
        order_id: &ExternalOrderId,
        outcome: PaymentOutcome,
        provider_txn_ref: Option<&str>,
    ) {
        self.state().statuses.insert(
            order_id.clone(),
            StatusReport {
                outcome,
                provider_txn_ref: provider_txn_ref.map(str::to_string),
            },
        );
    }

    /// Configures the gateway to fail every create-order call.
    pub fn set_fail_on_create(&self, fail: bool) {
        self.state().fail_on_create = fail;
    }

    /// Configures the gateway to fail every status check.
    pub fn set_fail_on_status(&self, fail: bool) {
        self.state().fail_on_status = fail;
    }

    /// Returns the create-order requests received so far.
    pub fn created_orders(&self) -> Vec<CreatePaymentRequest> {
        self.state().created.clone()
    }

    /// Returns the number of status checks received so far.
    pub fn status_calls(&self) -> usize {
        self.state().status_calls
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn create_order(
        &self,
        request: &CreatePaymentRequest,
    ) -> Result<CreatedPayment, GatewayError> {
        let mut state = self.state();
        if state.fail_on_create {
            return Err(GatewayError::Unavailable("scripted outage".to_string()));
        }

        state.created.push(request.clone());
        Ok(CreatedPayment {
            payment_url: format!("https://gateway.test/pay/{}", request.order_id),
            provider_order_ref: Some(format!("SCRIPTED-{:04}", state.created.len())),
        })
    }

    async fn check_status(&self, order_id: &ExternalOrderId) -> Result<StatusReport, GatewayError> {
        let mut state = self.state();
        state.status_calls += 1;
        if state.fail_on_status {
            return Err(GatewayError::Unavailable("scripted outage".to_string()));
        }

        Ok(state.statuses.get(order_id).cloned().unwrap_or(StatusReport {
            outcome: PaymentOutcome::Pending,
            provider_txn_ref: None,
        }))
    }
}
