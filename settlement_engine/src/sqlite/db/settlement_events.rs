use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db_types::{Gateway, NewSettlement, SettlementEvent},
    traits::{ClaimOutcome, SettlementError},
};

/// A `pending` claim older than this is assumed abandoned (the holder died between claiming and
/// settling, or its release failed) and may be taken over by a redelivery.
const STALE_CLAIM_TIMEOUT_SECS: i64 = 300;

/// Claim an event for processing. The INSERT itself is the duplicate check: the unique constraint
/// on `(gateway, external_ref)` decides the winner, never an application-level existence check.
///
/// A conflicting row that is still `pending` past [`STALE_CLAIM_TIMEOUT_SECS`] is taken over
/// rather than deferred to, so a crashed holder cannot poison the event forever. Should the
/// original holder come back from the dead and settle anyway, the unique constraint on
/// `transactions.payment_reference` still guarantees a single economic effect.
pub async fn try_claim(
    settlement: &NewSettlement,
    conn: &mut SqliteConnection,
) -> Result<ClaimOutcome, SettlementError> {
    let gateway = settlement.gateway.to_string();
    let result = sqlx::query(
        r#"INSERT INTO settlement_events (gateway, external_ref, account_id, amount, state)
           VALUES ($1, $2, $3, $4, 'pending')
           ON CONFLICT (gateway, external_ref) DO UPDATE
           SET account_id = excluded.account_id,
               amount = excluded.amount,
               updated_at = CURRENT_TIMESTAMP
           WHERE settlement_events.state = 'pending'
             AND settlement_events.updated_at <= datetime('now', $5)"#,
    )
    .bind(&gateway)
    .bind(&settlement.external_ref)
    .bind(settlement.account_id)
    .bind(settlement.amount.value())
    .bind(format!("-{STALE_CLAIM_TIMEOUT_SECS} seconds"))
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() == 1 {
        trace!("🔖️ Claimed {gateway}:{} for settlement", settlement.external_ref);
        return Ok(ClaimOutcome::Fresh);
    }
    // Lost the insert and the existing claim is live; its state tells us whether the winner
    // already finished.
    let state: Option<(String,)> =
        sqlx::query_as("SELECT state FROM settlement_events WHERE gateway = $1 AND external_ref = $2")
            .bind(&gateway)
            .bind(&settlement.external_ref)
            .fetch_optional(conn)
            .await?;
    match state.as_ref().map(|(s,)| s.as_str()) {
        Some("applied") => Ok(ClaimOutcome::AlreadyApplied),
        // A released claim can disappear between our insert and this read; treat that the same as
        // an in-flight claim and let the caller re-check.
        _ => Ok(ClaimOutcome::InProgress),
    }
}

/// Flip a pending claim to `applied`. Called inside the settlement transaction so the flip and the
/// ledger credit commit or roll back together.
pub async fn mark_applied(
    gateway: Gateway,
    external_ref: &str,
    conn: &mut SqliteConnection,
) -> Result<(), SettlementError> {
    sqlx::query(
        r#"UPDATE settlement_events SET state = 'applied', updated_at = CURRENT_TIMESTAMP
           WHERE gateway = $1 AND external_ref = $2 AND state = 'pending'"#,
    )
    .bind(gateway.to_string())
    .bind(external_ref)
    .execute(conn)
    .await?;
    Ok(())
}

/// Drop a pending claim so a later redelivery of the event can try again. Applied claims are left
/// alone; the economic effect must never become repeatable.
pub async fn release(gateway: Gateway, external_ref: &str, conn: &mut SqliteConnection) -> Result<(), SettlementError> {
    let result =
        sqlx::query("DELETE FROM settlement_events WHERE gateway = $1 AND external_ref = $2 AND state = 'pending'")
            .bind(gateway.to_string())
            .bind(external_ref)
            .execute(conn)
            .await?;
    if result.rows_affected() > 0 {
        debug!("🔖️ Released claim on {gateway}:{external_ref} after a failed settlement");
    }
    Ok(())
}

pub async fn fetch_event(
    gateway: Gateway,
    external_ref: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<SettlementEvent>, SettlementError> {
    let event = sqlx::query_as("SELECT * FROM settlement_events WHERE gateway = $1 AND external_ref = $2")
        .bind(gateway.to_string())
        .bind(external_ref)
        .fetch_optional(conn)
        .await?;
    Ok(event)
}
