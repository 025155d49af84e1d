use std::{fmt::Debug, time::Duration};

use log::*;

use crate::{
    db_types::{NewSettlement, Transaction},
    traits::{ClaimOutcome, SettlementDatabase, SettlementError},
};

/// How often a delivery that lost the claim race re-checks before giving up. Losing the race is
/// rare (it needs two concurrent deliveries of the same event), so the window is short; after it
/// closes the caller returns a retryable error and the gateway redelivers.
const CLAIM_RECHECK_ATTEMPTS: u32 = 3;
const CLAIM_RECHECK_DELAY: Duration = Duration::from_millis(50);

/// `SettlementApi` applies verified gateway settlements to the ledger exactly once.
///
/// Flow per event: claim the `(gateway, external_ref)` pair, credit the account atomically, and
/// mark the claim applied in the same transaction. A failed credit releases the claim so the
/// gateway's redelivery can try again.
pub struct SettlementApi<B> {
    db: B,
    deposit_bonus_pct: i64,
}

impl<B: Debug> Debug for SettlementApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SettlementApi ({:?})", self.db)
    }
}

#[derive(Debug, Clone)]
pub enum SettlementOutcome {
    /// The event produced its economic effect in this call.
    Applied(Transaction),
    /// The event had already been applied; this delivery was a no-op. Distinguished from
    /// `Applied` for auditing, but both are acknowledged with a success response.
    Duplicate,
}

impl<B> SettlementApi<B> {
    pub fn new(db: B) -> Self {
        Self { db, deposit_bonus_pct: 0 }
    }

    /// Credit an extra percentage of every deposit as a separate bonus transaction.
    pub fn with_deposit_bonus(mut self, pct: i64) -> Self {
        self.deposit_bonus_pct = pct;
        self
    }
}

impl<B> SettlementApi<B>
where B: SettlementDatabase
{
    pub async fn process_settlement(&self, settlement: NewSettlement) -> Result<SettlementOutcome, SettlementError> {
        let reference = settlement.ledger_reference();
        for attempt in 1..=CLAIM_RECHECK_ATTEMPTS {
            match self.db.claim_settlement(&settlement).await? {
                ClaimOutcome::Fresh => return self.apply_claimed(settlement).await,
                ClaimOutcome::AlreadyApplied => {
                    info!("💰️ Duplicate delivery of [{reference}]. Already settled, acknowledging as no-op");
                    return Ok(SettlementOutcome::Duplicate);
                },
                ClaimOutcome::InProgress if attempt < CLAIM_RECHECK_ATTEMPTS => {
                    debug!("💰️ [{reference}] is being settled by a concurrent delivery. Re-checking");
                    tokio::time::sleep(CLAIM_RECHECK_DELAY).await;
                },
                ClaimOutcome::InProgress => {
                    warn!("💰️ [{reference}] still claimed by a concurrent delivery after {attempt} checks");
                    return Err(SettlementError::ClaimInProgress {
                        gateway: settlement.gateway,
                        external_ref: settlement.external_ref,
                    });
                },
            }
        }
        unreachable!("claim loop always returns")
    }

    async fn apply_claimed(&self, settlement: NewSettlement) -> Result<SettlementOutcome, SettlementError> {
        let reference = settlement.ledger_reference();
        let bonus = (self.deposit_bonus_pct > 0)
            .then(|| settlement.amount.percent(self.deposit_bonus_pct))
            .filter(|b| b.value() > 0);
        match self.db.settle(&settlement, bonus).await {
            Ok(txn) => {
                info!(
                    "💰️ Settled [{reference}]: {} credited to account #{}, balance {} → {}",
                    txn.amount, txn.account_id, txn.balance_before, txn.balance_after
                );
                Ok(SettlementOutcome::Applied(txn))
            },
            Err(SettlementError::DuplicateReference(_)) => {
                // A taken-over claim raced its original holder and the holder's credit landed
                // first. The money is there exactly once, so this delivery is a plain duplicate.
                info!("💰️ [{reference}] was settled concurrently. Acknowledging as no-op");
                Ok(SettlementOutcome::Duplicate)
            },
            Err(e) => {
                // The claim must not stay poisoned: release it so the gateway's retry can land.
                warn!("💰️ Could not settle [{reference}]: {e}. Releasing claim for retry");
                if let Err(release_err) = self.db.release_claim(settlement.gateway, &settlement.external_ref).await {
                    error!("💰️ Failed to release claim on [{reference}]: {release_err}");
                }
                Err(e)
            },
        }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
