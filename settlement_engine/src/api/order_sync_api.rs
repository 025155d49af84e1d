use std::collections::HashMap;

use log::*;

use crate::{
    db_types::{Order, Provider, RemoteStatus, SyncReport},
    traits::{OrderManagement, OrderSyncError, StatusUpdateOutcome},
};

/// `OrderSyncApi` maps provider poll results onto stored orders under the forward-only transition
/// graph, reporting per-batch counts instead of failing whole runs.
pub struct OrderSyncApi<B> {
    db: B,
}

impl<B> OrderSyncApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> OrderSyncApi<B>
where B: OrderManagement
{
    pub async fn providers(&self) -> Result<Vec<Provider>, OrderSyncError> {
        self.db.fetch_providers().await
    }

    pub async fn orders_due(&self, limit: usize) -> Result<Vec<Order>, OrderSyncError> {
        self.db.orders_due_for_check(limit).await
    }

    /// Apply one provider's batch of poll results. Individual failures are counted, never
    /// propagated: a single bad entry must not sink the rest of the batch.
    pub async fn apply_provider_statuses(
        &self,
        provider_id: i64,
        statuses: &HashMap<String, RemoteStatus>,
    ) -> SyncReport {
        let mut report = SyncReport::default();
        for (external_id, update) in statuses {
            report.checked += 1;
            match self.db.apply_status_update(provider_id, external_id, update).await {
                Ok(StatusUpdateOutcome::Updated(status)) => {
                    report.updated += 1;
                    debug!("🔄️ Order [{external_id}] updated to {status}");
                },
                Ok(StatusUpdateOutcome::Unchanged) => {},
                Ok(StatusUpdateOutcome::Stale) => {
                    debug!("🔄️ Ignored stale poll result for order [{external_id}]");
                },
                Ok(StatusUpdateOutcome::NotFound) => {
                    warn!("🔄️ Provider #{provider_id} reported status for unknown order [{external_id}]");
                    report.errors += 1;
                },
                Err(e) => {
                    error!("🔄️ Could not apply status for order [{external_id}]: {e}");
                    report.errors += 1;
                },
            }
        }
        report
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
