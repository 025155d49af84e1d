use thiserror::Error;

use crate::db_types::{NewOrder, Order, OrderStatus, Provider, RemoteStatus};

/// What happened when a poll result was applied to a stored order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusUpdateOutcome {
    /// The order moved forward along the transition graph.
    Updated(OrderStatus),
    /// Same status as before; counters were refreshed, nothing else changed.
    Unchanged,
    /// The poll result was stale or conflicted with a terminal state and was ignored.
    Stale,
    /// No order matches the external id for this provider.
    NotFound,
}

/// Storage contract for the order state synchronizer.
#[allow(async_fn_in_trait)]
pub trait OrderManagement: Clone {
    async fn fetch_providers(&self) -> Result<Vec<Provider>, OrderSyncError>;

    /// Orders still moving through the state machine, oldest-updated first, capped at `limit`.
    async fn orders_due_for_check(&self, limit: usize) -> Result<Vec<Order>, OrderSyncError>;

    /// Apply one provider poll result to the matching order, enforcing the forward-only transition
    /// graph. Terminal orders are never modified, not even their counters.
    async fn apply_status_update(
        &self,
        provider_id: i64,
        external_order_id: &str,
        update: &RemoteStatus,
    ) -> Result<StatusUpdateOutcome, OrderSyncError>;

    async fn fetch_order(&self, provider_id: i64, external_order_id: &str) -> Result<Option<Order>, OrderSyncError>;

    /// Record a newly placed order. Placement itself happens in the storefront; this exists for the
    /// synchronizer's collaborators and for tests.
    async fn insert_order(&self, order: NewOrder) -> Result<Order, OrderSyncError>;

    async fn insert_provider(&self, name: &str, api_url: &str, api_key: &str) -> Result<Provider, OrderSyncError>;
}

#[derive(Debug, Clone, Error)]
pub enum OrderSyncError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("Order {0} does not exist")]
    OrderNotFound(String),
}

impl From<sqlx::Error> for OrderSyncError {
    fn from(e: sqlx::Error) -> Self {
        OrderSyncError::DatabaseError(e.to_string())
    }
}
