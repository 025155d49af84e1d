//! Outbound client for the fulfilment providers' status APIs.
//!
//! All providers in this market speak the same wire dialect: an authenticated POST of
//! `{ key, action: "status", orders: "id1,id2,..." }` answered either with a single status object
//! (one order) or a map keyed by external order id. Entries the provider could not resolve come
//! back as `{"error": ...}` and are counted, not propagated.

use std::{collections::HashMap, time::Duration};

use log::*;
use serde_json::Value;
use settlement_engine::db_types::{Provider, RemoteStatus};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ProviderClientError {
    #[error("Provider unreachable: {0}")]
    Unreachable(String),
    #[error("Provider response was malformed: {0}")]
    Malformed(String),
}

/// One provider's poll result: usable statuses plus the count of entries that were missing or
/// reported as errors.
#[derive(Debug, Clone, Default)]
pub struct StatusBatch {
    pub statuses: HashMap<String, RemoteStatus>,
    pub errors: usize,
}

#[derive(Clone)]
pub struct ProviderClient {
    client: reqwest::Client,
}

impl ProviderClient {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Poll one provider for the given external order ids. A timeout or transport error fails the
    /// whole provider; per-entry problems are folded into the returned batch instead.
    pub async fn fetch_statuses(
        &self,
        provider: &Provider,
        order_ids: &[String],
    ) -> Result<StatusBatch, ProviderClientError> {
        let orders = order_ids.join(",");
        trace!("🛰️ Polling {} for {} orders", provider.name, order_ids.len());
        let response = self
            .client
            .post(&provider.api_url)
            .form(&[("key", provider.api_key.as_str()), ("action", "status"), ("orders", orders.as_str())])
            .send()
            .await
            .map_err(|e| ProviderClientError::Unreachable(e.to_string()))?;
        if !response.status().is_success() {
            return Err(ProviderClientError::Unreachable(format!("{} answered {}", provider.name, response.status())));
        }
        let body: Value = response.json().await.map_err(|e| ProviderClientError::Malformed(e.to_string()))?;
        parse_status_response(order_ids, &body)
    }
}

/// Decode a provider's status response into a [`StatusBatch`].
pub fn parse_status_response(order_ids: &[String], body: &Value) -> Result<StatusBatch, ProviderClientError> {
    let Some(map) = body.as_object() else {
        return Err(ProviderClientError::Malformed(format!("expected a JSON object, got: {body}")));
    };
    let mut batch = StatusBatch::default();
    // Single-order queries may be answered with the bare status object instead of a map.
    if order_ids.len() == 1 && map.contains_key("status") {
        match serde_json::from_value::<RemoteStatus>(body.clone()) {
            Ok(status) => {
                batch.statuses.insert(order_ids[0].clone(), status);
            },
            Err(e) => {
                warn!("🛰️ Unusable status entry for order [{}]: {e}", order_ids[0]);
                batch.errors += 1;
            },
        }
        return Ok(batch);
    }
    for id in order_ids {
        match map.get(id) {
            None => {
                warn!("🛰️ Provider response is missing order [{id}]");
                batch.errors += 1;
            },
            Some(entry) if entry.get("error").is_some() => {
                warn!("🛰️ Provider reported an error for order [{id}]: {}", entry["error"]);
                batch.errors += 1;
            },
            Some(entry) => match serde_json::from_value::<RemoteStatus>(entry.clone()) {
                Ok(status) => {
                    batch.statuses.insert(id.clone(), status);
                },
                Err(e) => {
                    warn!("🛰️ Unusable status entry for order [{id}]: {e}");
                    batch.errors += 1;
                },
            },
        }
    }
    Ok(batch)
}
