//! Per-table query modules.
//!
//! Every function here takes `&mut SqliteConnection` so that callers can compose them inside a
//! single transaction (`&mut *tx`) when an operation must be atomic.

pub mod accounts;
pub mod orders;
pub mod settlement_events;
pub mod transactions;

use std::{str::FromStr, time::Duration};

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

/// Build a connection pool for the given URL. WAL mode and a generous busy timeout absorb
/// write contention between concurrent webhook deliveries, so lock conflicts surface as short
/// waits instead of errors.
pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));
    SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await
}
