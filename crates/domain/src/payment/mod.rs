//! Normalization of payment gateway signals.
//!
//! Webhooks (JSON or form bodies) and status-check responses all funnel
//! through [`CallbackFields`] into a [`PaymentOutcome`], so the coordinator
//! only ever sees one shape regardless of how the signal arrived.

mod callback;
mod outcome;

pub use callback::{CallbackFields, GatewayCallback};
pub use outcome::PaymentOutcome;
