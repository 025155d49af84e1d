use log::trace;
use spg_common::Money;
use sqlx::SqliteConnection;

use crate::{db_types::Account, traits::SettlementError};

pub async fn create_account(conn: &mut SqliteConnection) -> Result<Account, SettlementError> {
    let account: Account =
        sqlx::query_as("INSERT INTO accounts DEFAULT VALUES RETURNING *").fetch_one(conn).await?;
    trace!("🧑️ Created account #{}", account.id);
    Ok(account)
}

pub async fn fetch_account(account_id: i64, conn: &mut SqliteConnection) -> Result<Option<Account>, SettlementError> {
    let account = sqlx::query_as("SELECT * FROM accounts WHERE id = $1")
        .bind(account_id)
        .fetch_optional(conn)
        .await?;
    Ok(account)
}

/// Adjusts the balance by `delta` as a single server-side expression, returning the new balance.
/// Returns `None` when the account does not exist. This is the serialization boundary for
/// concurrent credits to the same account: there is deliberately no read-then-write variant.
pub async fn adjust_balance(
    account_id: i64,
    delta: Money,
    conn: &mut SqliteConnection,
) -> Result<Option<Money>, SettlementError> {
    let row: Option<(Money,)> = sqlx::query_as(
        r#"UPDATE accounts SET
           balance = balance + $1,
           updated_at = CURRENT_TIMESTAMP
           WHERE id = $2
           RETURNING balance"#,
    )
    .bind(delta.value())
    .bind(account_id)
    .fetch_optional(conn)
    .await?;
    Ok(row.map(|(balance,)| balance))
}

/// Like [`adjust_balance`], but refuses an adjustment that would drive the balance negative.
/// Returns `None` either when the account is missing or when funds are insufficient; the caller
/// disambiguates with a follow-up fetch.
pub async fn adjust_balance_checked(
    account_id: i64,
    delta: Money,
    conn: &mut SqliteConnection,
) -> Result<Option<Money>, SettlementError> {
    let row: Option<(Money,)> = sqlx::query_as(
        r#"UPDATE accounts SET
           balance = balance + $1,
           updated_at = CURRENT_TIMESTAMP
           WHERE id = $2 AND balance + $1 >= 0
           RETURNING balance"#,
    )
    .bind(delta.value())
    .bind(account_id)
    .fetch_optional(conn)
    .await?;
    Ok(row.map(|(balance,)| balance))
}
