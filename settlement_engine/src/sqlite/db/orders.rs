use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewOrder, Order, Provider, RemoteStatus},
    status_map::map_provider_status,
    traits::{OrderSyncError, StatusUpdateOutcome},
};

pub async fn insert_provider(
    name: &str,
    api_url: &str,
    api_key: &str,
    conn: &mut SqliteConnection,
) -> Result<Provider, OrderSyncError> {
    let provider = sqlx::query_as("INSERT INTO providers (name, api_url, api_key) VALUES ($1, $2, $3) RETURNING *")
        .bind(name)
        .bind(api_url)
        .bind(api_key)
        .fetch_one(conn)
        .await?;
    Ok(provider)
}

pub async fn fetch_providers(conn: &mut SqliteConnection) -> Result<Vec<Provider>, OrderSyncError> {
    let providers = sqlx::query_as("SELECT * FROM providers ORDER BY id ASC").fetch_all(conn).await?;
    Ok(providers)
}

pub async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, OrderSyncError> {
    let order: Order = sqlx::query_as(
        r#"INSERT INTO orders (account_id, provider_id, external_order_id, quantity)
           VALUES ($1, $2, $3, $4)
           RETURNING *"#,
    )
    .bind(order.account_id)
    .bind(order.provider_id)
    .bind(&order.external_order_id)
    .bind(order.quantity)
    .fetch_one(conn)
    .await?;
    debug!("📦️ Order [{}] recorded for provider #{}", order.external_order_id, order.provider_id);
    Ok(order)
}

pub async fn fetch_order(
    provider_id: i64,
    external_order_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, OrderSyncError> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE provider_id = $1 AND external_order_id = $2")
        .bind(provider_id)
        .bind(external_order_id)
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

/// Orders that still expect movement from the provider, oldest-updated first. `partial` is treated
/// as settled for polling purposes and is excluded along with the other terminal states.
pub async fn orders_due_for_check(limit: usize, conn: &mut SqliteConnection) -> Result<Vec<Order>, OrderSyncError> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let orders = sqlx::query_as(
        r#"SELECT * FROM orders
           WHERE status NOT IN ('completed', 'partial', 'cancelled', 'refunded', 'failed')
           ORDER BY updated_at ASC
           LIMIT $1"#,
    )
    .bind(limit)
    .fetch_all(conn)
    .await?;
    Ok(orders)
}

/// Apply one poll result under the forward-only transition guard.
///
/// The guard runs twice: once in code against the fetched row, and again in the UPDATE's WHERE
/// clause (compare-and-set on the previous status), so a concurrent synchronizer run cannot slip a
/// stale status past us between the read and the write.
pub async fn apply_status_update(
    provider_id: i64,
    external_order_id: &str,
    update: &RemoteStatus,
    conn: &mut SqliteConnection,
) -> Result<StatusUpdateOutcome, OrderSyncError> {
    let Some(order) = fetch_order(provider_id, external_order_id, &mut *conn).await? else {
        return Ok(StatusUpdateOutcome::NotFound);
    };
    let next = map_provider_status(&update.status);
    if order.status.is_terminal() {
        trace!("📦️ Order [{external_order_id}] is terminal ({}), ignoring poll result {next}", order.status);
        return Ok(StatusUpdateOutcome::Stale);
    }
    if next == order.status {
        // Counters may still move while the status holds (e.g. remains decreasing in_progress).
        sqlx::query(
            r#"UPDATE orders SET
               start_count = COALESCE($1, start_count),
               remains = COALESCE($2, remains),
               updated_at = CURRENT_TIMESTAMP
               WHERE id = $3"#,
        )
        .bind(update.start_count)
        .bind(update.remains)
        .bind(order.id)
        .execute(conn)
        .await?;
        return Ok(StatusUpdateOutcome::Unchanged);
    }
    if !order.status.accepts(&next) {
        trace!("📦️ Stale poll for order [{external_order_id}]: {} does not accept {next}", order.status);
        return Ok(StatusUpdateOutcome::Stale);
    }
    let result = sqlx::query(
        r#"UPDATE orders SET
           status = $1,
           start_count = COALESCE($2, start_count),
           remains = COALESCE($3, remains),
           completed_at = CASE WHEN $1 = 'completed' THEN COALESCE(completed_at, CURRENT_TIMESTAMP)
                               ELSE completed_at END,
           updated_at = CURRENT_TIMESTAMP
           WHERE id = $4 AND status = $5"#,
    )
    .bind(next.as_str())
    .bind(update.start_count)
    .bind(update.remains)
    .bind(order.id)
    .bind(order.status.as_str())
    .execute(conn)
    .await?;
    if result.rows_affected() == 0 {
        // Lost a race with another run; whatever won moved the order at least as far forward.
        return Ok(StatusUpdateOutcome::Stale);
    }
    debug!("📦️ Order [{external_order_id}] moved {} → {next}", order.status);
    Ok(StatusUpdateOutcome::Updated(next))
}
