use std::collections::HashMap;

use log::*;
use settlement_engine::{
    db_types::{Provider, SyncReport},
    OrderManagement,
    OrderSyncApi,
    SqliteDatabase,
};
use tokio::task::JoinHandle;

use crate::{config::PollConfig, providers::ProviderClient};

/// Starts the provider status polling worker. Do not await the returned JoinHandle, as it will run
/// indefinitely.
pub fn start_status_worker(db: SqliteDatabase, poll: PollConfig) -> JoinHandle<()> {
    tokio::spawn(async move {
        let client = match ProviderClient::new(poll.provider_timeout) {
            Ok(client) => client,
            Err(e) => {
                error!("🔄️ Could not build the provider status client: {e}. Status polling is disabled");
                return;
            },
        };
        let api = OrderSyncApi::new(db);
        let mut timer = tokio::time::interval(poll.interval);
        info!("🔄️ Provider status worker started, polling every {}s", poll.interval.as_secs());
        loop {
            timer.tick().await;
            let report = run_sync(&api, &client, poll.batch_size).await;
            info!("🔄️ Status sync complete: {report}");
        }
    })
}

/// One synchronizer run: fetch the due orders (capped at `batch_size`), group them by provider,
/// poll each provider once and apply the results. Providers are independent units of work: a
/// timeout or garbage response fails only that provider's orders, which stay due for the next run.
pub async fn run_sync<B: OrderManagement>(
    api: &OrderSyncApi<B>,
    client: &ProviderClient,
    batch_size: usize,
) -> SyncReport {
    let mut report = SyncReport::default();
    let orders = match api.orders_due(batch_size).await {
        Ok(orders) => orders,
        Err(e) => {
            error!("🔄️ Could not fetch orders due for a status check: {e}");
            return report;
        },
    };
    if orders.is_empty() {
        debug!("🔄️ No orders are due for a status check");
        return report;
    }
    let providers: HashMap<i64, Provider> = match api.providers().await {
        Ok(providers) => providers.into_iter().map(|p| (p.id, p)).collect(),
        Err(e) => {
            error!("🔄️ Could not fetch the provider list: {e}");
            return report;
        },
    };
    let mut by_provider: HashMap<i64, Vec<String>> = HashMap::new();
    for order in orders {
        by_provider.entry(order.provider_id).or_default().push(order.external_order_id);
    }
    for (provider_id, order_ids) in by_provider {
        let Some(provider) = providers.get(&provider_id) else {
            error!("🔄️ {} orders reference unknown provider #{provider_id}", order_ids.len());
            report.checked += order_ids.len();
            report.errors += order_ids.len();
            continue;
        };
        match client.fetch_statuses(provider, &order_ids).await {
            Ok(batch) => {
                // Entries the provider flagged or omitted were still checked this run.
                report.checked += batch.errors;
                report.errors += batch.errors;
                report.merge(api.apply_provider_statuses(provider_id, &batch.statuses).await);
            },
            Err(e) => {
                warn!(
                    "🔄️ Provider {} (#{provider_id}) failed: {e}. Its {} orders stay due for the next run",
                    provider.name,
                    order_ids.len()
                );
                report.checked += order_ids.len();
                report.errors += order_ids.len();
            },
        }
    }
    report
}
