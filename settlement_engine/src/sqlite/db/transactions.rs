use log::debug;
use spg_common::Money;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Transaction, TransactionType},
    sqlite::db::accounts,
    traits::SettlementError,
};

/// Appends a ledger entry. A unique-constraint violation on `payment_reference` means another
/// delivery of the same external event got here first and is reported as such.
#[allow(clippy::too_many_arguments)]
pub async fn insert_transaction(
    account_id: i64,
    amount: Money,
    balance_before: Money,
    balance_after: Money,
    txn_type: TransactionType,
    reference: Option<&str>,
    description: &str,
    conn: &mut SqliteConnection,
) -> Result<Transaction, SettlementError> {
    let result: Result<Transaction, sqlx::Error> = sqlx::query_as(
        r#"INSERT INTO transactions
           (account_id, txn_type, amount, balance_before, balance_after, payment_reference, description)
           VALUES ($1, $2, $3, $4, $5, $6, $7)
           RETURNING *"#,
    )
    .bind(account_id)
    .bind(txn_type.to_string())
    .bind(amount.value())
    .bind(balance_before.value())
    .bind(balance_after.value())
    .bind(reference)
    .bind(description)
    .fetch_one(conn)
    .await;
    match result {
        Ok(txn) => Ok(txn),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            Err(SettlementError::DuplicateReference(reference.unwrap_or("<none>").to_string()))
        },
        Err(e) => Err(e.into()),
    }
}

/// Adjusts the account balance and appends the matching ledger entry in one go. Callers wrap this
/// in a transaction; the before/after snapshot is derived from the atomic update's return value so
/// that `balance_after - balance_before == amount` holds by construction.
pub async fn apply_to_balance(
    account_id: i64,
    amount: Money,
    txn_type: TransactionType,
    reference: Option<&str>,
    description: &str,
    conn: &mut SqliteConnection,
) -> Result<Transaction, SettlementError> {
    let new_balance = match accounts::adjust_balance(account_id, amount, &mut *conn).await? {
        Some(balance) => balance,
        None => return Err(SettlementError::AccountNotFound(account_id)),
    };
    let txn = insert_transaction(
        account_id,
        amount,
        new_balance - amount,
        new_balance,
        txn_type,
        reference,
        description,
        conn,
    )
    .await?;
    debug!("🗃️ {txn_type} of {amount} applied to account #{account_id}, balance now {new_balance}");
    Ok(txn)
}

pub async fn transactions_for_account(
    account_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Transaction>, SettlementError> {
    let txns = sqlx::query_as("SELECT * FROM transactions WHERE account_id = $1 ORDER BY id ASC")
        .bind(account_id)
        .fetch_all(conn)
        .await?;
    Ok(txns)
}

/// `SUM(amount)` over the log for one account. The audit invariant says this always equals the
/// stored balance.
pub async fn transaction_total(account_id: i64, conn: &mut SqliteConnection) -> Result<Money, SettlementError> {
    let (total,): (i64,) =
        sqlx::query_as("SELECT COALESCE(SUM(amount), 0) FROM transactions WHERE account_id = $1")
            .bind(account_id)
            .fetch_one(conn)
            .await?;
    Ok(Money::from_cents(total))
}
