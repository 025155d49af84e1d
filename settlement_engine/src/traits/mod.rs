//! Backend traits for the settlement engine.
//!
//! Concrete backends (currently SQLite) implement these traits; the public APIs in
//! [`crate::api`] are generic over them so that the orchestration logic can be tested against
//! any backend.

mod orders;
mod settlement;

pub use orders::{OrderManagement, OrderSyncError, StatusUpdateOutcome};
pub use settlement::{AccountAudit, ClaimOutcome, SettlementDatabase, SettlementError};
