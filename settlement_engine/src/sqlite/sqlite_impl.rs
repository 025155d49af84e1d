//! `SqliteDatabase` is the concrete SQLite backend for the settlement engine.
//!
//! Multi-step operations run inside a single SQL transaction; the per-table helpers in
//! [`super::db`] are written against `&mut SqliteConnection` precisely so they can be composed
//! here without giving up atomicity.

use std::fmt::Debug;

use log::debug;
use spg_common::Money;
use sqlx::SqlitePool;

use super::db::{accounts, new_pool, orders, settlement_events, transactions};
use crate::{
    db_types::{
        Account,
        Gateway,
        NewOrder,
        NewSettlement,
        Order,
        Provider,
        RemoteStatus,
        SettlementEvent,
        Transaction,
        TransactionType,
    },
    sqlite::MIGRATOR,
    traits::{
        AccountAudit,
        ClaimOutcome,
        OrderManagement,
        OrderSyncError,
        SettlementDatabase,
        SettlementError,
        StatusUpdateOutcome,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, SettlementError> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub async fn migrate(&self) -> Result<(), SettlementError> {
        MIGRATOR.run(&self.pool).await.map_err(|e| SettlementError::DatabaseError(e.to_string()))?;
        debug!("🗃️ Database migrations complete");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl SettlementDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn claim_settlement(&self, settlement: &NewSettlement) -> Result<ClaimOutcome, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        settlement_events::try_claim(settlement, &mut conn).await
    }

    async fn release_claim(&self, gateway: Gateway, external_ref: &str) -> Result<(), SettlementError> {
        let mut conn = self.pool.acquire().await?;
        settlement_events::release(gateway, external_ref, &mut conn).await
    }

    async fn fetch_settlement_event(
        &self,
        gateway: Gateway,
        external_ref: &str,
    ) -> Result<Option<SettlementEvent>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        settlement_events::fetch_event(gateway, external_ref, &mut conn).await
    }

    async fn settle(&self, settlement: &NewSettlement, bonus: Option<Money>) -> Result<Transaction, SettlementError> {
        let mut tx = self.pool.begin().await?;
        let reference = settlement.ledger_reference();
        let txn = transactions::apply_to_balance(
            settlement.account_id,
            settlement.amount,
            TransactionType::Deposit,
            Some(&reference),
            &settlement.description,
            &mut tx,
        )
        .await?;
        if let Some(bonus) = bonus {
            let bonus_ref = format!("bonus:{reference}");
            transactions::apply_to_balance(
                settlement.account_id,
                bonus,
                TransactionType::Bonus,
                Some(&bonus_ref),
                &format!("Deposit bonus for {reference}"),
                &mut tx,
            )
            .await?;
        }
        settlement_events::mark_applied(settlement.gateway, &settlement.external_ref, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Settlement {reference} applied: {} to account #{}", settlement.amount, settlement.account_id);
        Ok(txn)
    }

    async fn credit(
        &self,
        account_id: i64,
        amount: Money,
        txn_type: TransactionType,
        reference: Option<&str>,
        description: &str,
    ) -> Result<Transaction, SettlementError> {
        let mut tx = self.pool.begin().await?;
        let txn = transactions::apply_to_balance(account_id, amount, txn_type, reference, description, &mut tx).await?;
        tx.commit().await?;
        Ok(txn)
    }

    async fn debit(
        &self,
        account_id: i64,
        amount: Money,
        txn_type: TransactionType,
        description: &str,
    ) -> Result<Transaction, SettlementError> {
        let mut tx = self.pool.begin().await?;
        let new_balance = accounts::adjust_balance_checked(account_id, -amount, &mut tx).await?;
        let Some(new_balance) = new_balance else {
            // Missing account and insufficient funds both come back as "no row"; look again to say
            // which one it was.
            return match accounts::fetch_account(account_id, &mut tx).await? {
                None => Err(SettlementError::AccountNotFound(account_id)),
                Some(account) => Err(SettlementError::InsufficientFunds {
                    account_id,
                    balance: account.balance,
                    requested: amount,
                }),
            };
        };
        let txn = transactions::insert_transaction(
            account_id,
            -amount,
            new_balance + amount,
            new_balance,
            txn_type,
            None,
            description,
            &mut tx,
        )
        .await?;
        tx.commit().await?;
        Ok(txn)
    }

    async fn create_account(&self) -> Result<Account, SettlementError> {
        let mut tx = self.pool.begin().await?;
        let account = accounts::create_account(&mut tx).await?;
        tx.commit().await?;
        Ok(account)
    }

    async fn fetch_account(&self, account_id: i64) -> Result<Option<Account>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        accounts::fetch_account(account_id, &mut conn).await
    }

    async fn account_history(&self, account_id: i64) -> Result<Vec<Transaction>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        transactions::transactions_for_account(account_id, &mut conn).await
    }

    async fn audit_account(&self, account_id: i64) -> Result<AccountAudit, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        let account = accounts::fetch_account(account_id, &mut conn)
            .await?
            .ok_or(SettlementError::AccountNotFound(account_id))?;
        let transaction_total = transactions::transaction_total(account_id, &mut conn).await?;
        Ok(AccountAudit { account_id, balance: account.balance, transaction_total })
    }
}

impl OrderManagement for SqliteDatabase {
    async fn fetch_providers(&self) -> Result<Vec<Provider>, OrderSyncError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_providers(&mut conn).await
    }

    async fn orders_due_for_check(&self, limit: usize) -> Result<Vec<Order>, OrderSyncError> {
        let mut conn = self.pool.acquire().await?;
        orders::orders_due_for_check(limit, &mut conn).await
    }

    async fn apply_status_update(
        &self,
        provider_id: i64,
        external_order_id: &str,
        update: &RemoteStatus,
    ) -> Result<StatusUpdateOutcome, OrderSyncError> {
        let mut tx = self.pool.begin().await?;
        let outcome = orders::apply_status_update(provider_id, external_order_id, update, &mut tx).await?;
        tx.commit().await?;
        Ok(outcome)
    }

    async fn fetch_order(&self, provider_id: i64, external_order_id: &str) -> Result<Option<Order>, OrderSyncError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order(provider_id, external_order_id, &mut conn).await
    }

    async fn insert_order(&self, order: NewOrder) -> Result<Order, OrderSyncError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::insert_order(order, &mut tx).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn insert_provider(&self, name: &str, api_url: &str, api_key: &str) -> Result<Provider, OrderSyncError> {
        let mut tx = self.pool.begin().await?;
        let provider = orders::insert_provider(name, api_url, api_key, &mut tx).await?;
        tx.commit().await?;
        Ok(provider)
    }
}
