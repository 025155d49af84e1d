mod order_sync_api;
mod settlement_api;

pub use order_sync_api::OrderSyncApi;
pub use settlement_api::{SettlementApi, SettlementOutcome};
