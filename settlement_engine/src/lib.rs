//! Settlement Engine
//!
//! Core reconciliation logic for the SMM payment gateway: the balance ledger, the idempotency
//! guard for gateway settlement events, and the order state synchronizer. The engine is
//! HTTP-agnostic; the `settlement_server` crate wires it to webhook endpoints and the provider
//! polling worker.
//!
//! The crate is split into:
//! 1. Data types ([`db_types`]) and the provider status vocabulary mapping ([`status_map`]).
//! 2. Backend traits ([`traits`]) that a storage engine must implement. SQLite is the only
//!    backend currently shipped.
//! 3. The public APIs ([`SettlementApi`], [`OrderSyncApi`]) which sequence the claim → credit →
//!    apply flow and the batched order status updates. Use these rather than touching the
//!    database types directly.

mod api;
pub mod db_types;
#[cfg(feature = "sqlite")]
mod sqlite;
pub mod status_map;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use api::{OrderSyncApi, SettlementApi, SettlementOutcome};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{
    AccountAudit,
    ClaimOutcome,
    OrderManagement,
    OrderSyncError,
    SettlementDatabase,
    SettlementError,
    StatusUpdateOutcome,
};
