//! Mapping from the fulfilment providers' status vocabulary to [`OrderStatus`].
//!
//! The mapping must be total: every string a provider can return maps to exactly one internal status,
//! and strings outside the known vocabulary are normalized deterministically instead of being dropped.

use crate::db_types::OrderStatus;

/// Lowercase a provider status and replace internal whitespace with underscores.
pub fn normalize_status(s: &str) -> String {
    s.trim().to_lowercase().split_whitespace().collect::<Vec<_>>().join("_")
}

/// Map a provider's status string to the internal vocabulary.
pub fn map_provider_status(remote: &str) -> OrderStatus {
    match remote.trim() {
        "Pending" => OrderStatus::Pending,
        "Processing" => OrderStatus::Processing,
        "In progress" => OrderStatus::InProgress,
        "Completed" => OrderStatus::Completed,
        "Partial" => OrderStatus::Partial,
        "Canceled" | "Cancelled" => OrderStatus::Cancelled,
        "Refunded" => OrderStatus::Refunded,
        "Failed" | "Error" => OrderStatus::Failed,
        // Anything else: normalize and re-check against the internal spellings, so e.g. a provider
        // that already answers "in_progress" does not end up in an Other bucket.
        other => OrderStatus::from(normalize_status(other).as_str()),
    }
}
