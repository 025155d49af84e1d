use spg_common::Money;
use thiserror::Error;

use crate::db_types::{Account, Gateway, NewSettlement, SettlementEvent, Transaction, TransactionType};

/// Result of trying to claim a settlement event for processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The claim is ours. Exactly one delivery of a given `(gateway, external_ref)` ever sees this.
    Fresh,
    /// The event has already produced its economic effect. Ack and do nothing.
    AlreadyApplied,
    /// A concurrent delivery holds the claim. Back off and re-check rather than double-apply.
    InProgress,
}

/// Consistency check result for a single account: the stored balance versus the sum of all ledger
/// entries, which must agree at all times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountAudit {
    pub account_id: i64,
    pub balance: Money,
    pub transaction_total: Money,
}

impl AccountAudit {
    pub fn is_consistent(&self) -> bool {
        self.balance == self.transaction_total
    }
}

/// Storage contract for the balance ledger and the idempotency guard.
///
/// The claim/settle/release triple is the heart of the exactly-once guarantee:
/// * `claim_settlement` must rely on a storage-level uniqueness constraint, not an
///   existence-check-then-insert (that has a race window).
/// * `settle` must apply the balance update, the transaction insert and the claim's transition to
///   `applied` as one atomic unit.
/// * `release_claim` must make a failed claim retryable so a gateway redelivery can succeed later.
#[allow(async_fn_in_trait)]
pub trait SettlementDatabase: Clone {
    /// The URL of the database.
    fn url(&self) -> &str;

    /// Try to claim the `(gateway, external_ref)` pair for processing. A `pending` claim whose
    /// holder went away must become reclaimable after a timeout, so a crashed delivery can never
    /// poison the event permanently.
    async fn claim_settlement(&self, settlement: &NewSettlement) -> Result<ClaimOutcome, SettlementError>;

    /// Release a pending claim after a failed settlement so the event can be retried. Applied
    /// claims are never released.
    async fn release_claim(&self, gateway: Gateway, external_ref: &str) -> Result<(), SettlementError>;

    /// Look up the claim record for an event, if any.
    async fn fetch_settlement_event(
        &self,
        gateway: Gateway,
        external_ref: &str,
    ) -> Result<Option<SettlementEvent>, SettlementError>;

    /// Credit the settlement amount (and optional deposit bonus) to the account and mark the claim
    /// as applied, atomically. Returns the deposit transaction.
    ///
    /// Must only be called by the holder of a `Fresh` claim.
    async fn settle(&self, settlement: &NewSettlement, bonus: Option<Money>) -> Result<Transaction, SettlementError>;

    /// Credit an amount to an account outside the webhook flow (manual adjustments, referrals).
    async fn credit(
        &self,
        account_id: i64,
        amount: Money,
        txn_type: TransactionType,
        reference: Option<&str>,
        description: &str,
    ) -> Result<Transaction, SettlementError>;

    /// Debit an amount from an account. `amount` is positive; the ledger entry is recorded with a
    /// negative amount. Fails with [`SettlementError::InsufficientFunds`] when the debit would
    /// drive the balance negative.
    async fn debit(
        &self,
        account_id: i64,
        amount: Money,
        txn_type: TransactionType,
        description: &str,
    ) -> Result<Transaction, SettlementError>;

    async fn create_account(&self) -> Result<Account, SettlementError>;

    async fn fetch_account(&self, account_id: i64) -> Result<Option<Account>, SettlementError>;

    /// The full append-only transaction log for an account, oldest first.
    async fn account_history(&self, account_id: i64) -> Result<Vec<Transaction>, SettlementError>;

    /// Recompute `SUM(amount)` over the log and compare it to the stored balance.
    async fn audit_account(&self, account_id: i64) -> Result<AccountAudit, SettlementError>;
}

#[derive(Debug, Clone, Error)]
pub enum SettlementError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("The requested account id {0} does not exist")]
    AccountNotFound(i64),
    #[error("A transaction already exists for payment reference {0}")]
    DuplicateReference(String),
    #[error("A concurrent delivery of {gateway}:{external_ref} is in progress")]
    ClaimInProgress { gateway: Gateway, external_ref: String },
    #[error("Account #{account_id} balance {balance} cannot cover {requested}")]
    InsufficientFunds { account_id: i64, balance: Money, requested: Money },
}

impl From<sqlx::Error> for SettlementError {
    fn from(e: sqlx::Error) -> Self {
        SettlementError::DatabaseError(e.to_string())
    }
}
