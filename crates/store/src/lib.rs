//! Persistence for the fulfillment engine: catalog, buyers, the order ledger
//! and the license-key inventory.
//!
//! Two implementations share the [`Ledger`] trait: [`InMemoryLedger`] for
//! tests and single-process demos, and [`PostgresLedger`] for production.

pub mod error;
pub mod ledger;
pub mod memory;
pub mod postgres;

pub use error::{Result, StoreError};
pub use ledger::{BuyerDirectory, Catalog, Completion, KeyImport, Ledger, LedgerTransaction};
pub use memory::InMemoryLedger;
pub use postgres::PostgresLedger;
