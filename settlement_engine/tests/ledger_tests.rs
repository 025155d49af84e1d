mod common;

use common::prepare_test_db;
use settlement_engine::{
    db_types::{Gateway, NewSettlement, TransactionType},
    ClaimOutcome,
    SettlementApi,
    SettlementDatabase,
    SettlementError,
    SettlementOutcome,
};
use spg_common::Money;

#[tokio::test]
async fn settlement_credits_account_with_before_after_snapshot() {
    let db = prepare_test_db().await;
    let account = db.create_account().await.unwrap();
    db.credit(account.id, Money::from_whole(10), TransactionType::Manual, None, "Opening balance").await.unwrap();

    let api = SettlementApi::new(db.clone());
    let settlement = NewSettlement::new(Gateway::PayPal, "uuid-123", account.id, Money::from_whole(25));
    let outcome = api.process_settlement(settlement).await.unwrap();

    let SettlementOutcome::Applied(txn) = outcome else {
        panic!("first delivery must apply");
    };
    assert_eq!(txn.amount, Money::from_whole(25));
    assert_eq!(txn.balance_before, Money::from_whole(10));
    assert_eq!(txn.balance_after, Money::from_whole(35));
    assert_eq!(txn.payment_reference.as_deref(), Some("paypal:uuid-123"));

    let account = db.fetch_account(account.id).await.unwrap().unwrap();
    assert_eq!(account.balance, Money::from_whole(35));
}

#[tokio::test]
async fn redelivery_is_a_noop_regardless_of_count() {
    let db = prepare_test_db().await;
    let account = db.create_account().await.unwrap();
    db.credit(account.id, Money::from_whole(10), TransactionType::Manual, None, "Opening balance").await.unwrap();
    let api = SettlementApi::new(db.clone());

    // The provider redelivers the same notification several times
    let mut applied = 0;
    for _ in 0..5 {
        let settlement = NewSettlement::new(Gateway::PayPal, "uuid-123", account.id, Money::from_whole(25));
        match api.process_settlement(settlement).await.unwrap() {
            SettlementOutcome::Applied(_) => applied += 1,
            SettlementOutcome::Duplicate => {},
        }
    }
    assert_eq!(applied, 1);

    let account = db.fetch_account(account.id).await.unwrap().unwrap();
    assert_eq!(account.balance, Money::from_whole(35));

    // Exactly one ledger entry moved money for this reference
    let history = db.account_history(account.id).await.unwrap();
    let effects =
        history.iter().filter(|t| t.payment_reference.as_deref() == Some("paypal:uuid-123")).count();
    assert_eq!(effects, 1);

    let event = db.fetch_settlement_event(Gateway::PayPal, "uuid-123").await.unwrap().unwrap();
    assert_eq!(event.state, "applied");
}

#[tokio::test]
async fn same_reference_on_different_gateways_settles_separately() {
    let db = prepare_test_db().await;
    let account = db.create_account().await.unwrap();
    db.credit(account.id, Money::from_whole(1), TransactionType::Manual, None, "Opening balance").await.unwrap();
    let api = SettlementApi::new(db.clone());

    let a = NewSettlement::new(Gateway::Cryptomus, "ref-1", account.id, Money::from_whole(5));
    let b = NewSettlement::new(Gateway::Fawaterk, "ref-1", account.id, Money::from_whole(7));
    assert!(matches!(api.process_settlement(a).await.unwrap(), SettlementOutcome::Applied(_)));
    assert!(matches!(api.process_settlement(b).await.unwrap(), SettlementOutcome::Applied(_)));

    let account = db.fetch_account(account.id).await.unwrap().unwrap();
    assert_eq!(account.balance, Money::from_whole(13));
}

#[tokio::test]
async fn failed_settlement_releases_the_claim_for_retry() {
    let db = prepare_test_db().await;
    let api = SettlementApi::new(db.clone());

    // No such account: the credit fails and the claim must not stay poisoned
    let settlement = NewSettlement::new(Gateway::One, "txn-404", 9999, Money::from_whole(5));
    let err = api.process_settlement(settlement).await.unwrap_err();
    assert!(matches!(err, SettlementError::AccountNotFound(9999)));
    // The released claim leaves no record behind
    assert!(db.fetch_settlement_event(Gateway::One, "txn-404").await.unwrap().is_none());

    // The gateway retries after the account exists (e.g. replication caught up)
    let account = db.create_account().await.unwrap();
    let retry = NewSettlement::new(Gateway::One, "txn-404", account.id, Money::from_whole(5));
    assert!(matches!(api.process_settlement(retry).await.unwrap(), SettlementOutcome::Applied(_)));
    let account = db.fetch_account(account.id).await.unwrap().unwrap();
    assert_eq!(account.balance, Money::from_whole(5));
}

#[tokio::test]
async fn abandoned_pending_claim_becomes_reclaimable() {
    let db = prepare_test_db().await;
    let account = db.create_account().await.unwrap();
    let api = SettlementApi::new(db.clone());

    // A delivery claims the event and dies before settling
    let settlement = NewSettlement::new(Gateway::Fawaterk, "inv-9", account.id, Money::from_whole(25));
    assert_eq!(db.claim_settlement(&settlement).await.unwrap(), ClaimOutcome::Fresh);

    // While the claim is young, redeliveries back off without touching the ledger
    let err = api.process_settlement(settlement.clone()).await.unwrap_err();
    assert!(matches!(err, SettlementError::ClaimInProgress { .. }));
    let check = db.fetch_account(account.id).await.unwrap().unwrap();
    assert_eq!(check.balance, Money::default());

    // Once the claim goes stale, the next redelivery takes it over and the money lands
    sqlx::query("UPDATE settlement_events SET updated_at = datetime('now', '-1 hour') WHERE gateway = $1 AND external_ref = $2")
        .bind(Gateway::Fawaterk.to_string())
        .bind("inv-9")
        .execute(db.pool())
        .await
        .unwrap();
    assert!(matches!(api.process_settlement(settlement).await.unwrap(), SettlementOutcome::Applied(_)));
    let account = db.fetch_account(account.id).await.unwrap().unwrap();
    assert_eq!(account.balance, Money::from_whole(25));
    let event = db.fetch_settlement_event(Gateway::Fawaterk, "inv-9").await.unwrap().unwrap();
    assert_eq!(event.state, "applied");
}

#[tokio::test]
async fn deposit_bonus_is_a_separate_idempotent_transaction() {
    let db = prepare_test_db().await;
    let account = db.create_account().await.unwrap();
    let api = SettlementApi::new(db.clone()).with_deposit_bonus(10);

    for _ in 0..3 {
        let settlement = NewSettlement::new(Gateway::Cryptomus, "dep-1", account.id, Money::from_whole(20));
        api.process_settlement(settlement).await.unwrap();
    }

    let account = db.fetch_account(account.id).await.unwrap().unwrap();
    assert_eq!(account.balance, Money::from_whole(22));
    let history = db.account_history(account.id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].txn_type, TransactionType::Deposit);
    assert_eq!(history[1].txn_type, TransactionType::Bonus);
    assert_eq!(history[1].amount, Money::from_whole(2));
}

#[tokio::test]
async fn debit_rejects_overdraft_and_keeps_ledger_consistent() {
    let db = prepare_test_db().await;
    let account = db.create_account().await.unwrap();
    db.credit(account.id, Money::from_whole(10), TransactionType::Deposit, None, "Deposit").await.unwrap();

    let txn = db.debit(account.id, Money::from_whole(4), TransactionType::Purchase, "Order #1").await.unwrap();
    assert_eq!(txn.amount, Money::from_whole(-4));
    assert_eq!(txn.balance_before, Money::from_whole(10));
    assert_eq!(txn.balance_after, Money::from_whole(6));

    let err = db.debit(account.id, Money::from_whole(7), TransactionType::Purchase, "Order #2").await.unwrap_err();
    assert!(matches!(err, SettlementError::InsufficientFunds { .. }));

    // The rejected debit left no trace
    let audit = db.audit_account(account.id).await.unwrap();
    assert!(audit.is_consistent());
    assert_eq!(audit.balance, Money::from_whole(6));
}

#[tokio::test]
async fn balance_always_equals_transaction_sum() {
    let db = prepare_test_db().await;
    let account = db.create_account().await.unwrap();

    let ops: [(i64, TransactionType); 6] = [
        (2500, TransactionType::Deposit),
        (-700, TransactionType::Purchase),
        (100, TransactionType::Bonus),
        (-300, TransactionType::Purchase),
        (700, TransactionType::Refund),
        (50, TransactionType::Referral),
    ];
    for (cents, txn_type) in ops {
        if cents >= 0 {
            db.credit(account.id, Money::from_cents(cents), txn_type, None, "credit").await.unwrap();
        } else {
            db.debit(account.id, Money::from_cents(-cents), txn_type, "debit").await.unwrap();
        }
        let audit = db.audit_account(account.id).await.unwrap();
        assert!(audit.is_consistent(), "balance {} != sum {}", audit.balance, audit.transaction_total);
    }

    let history = db.account_history(account.id).await.unwrap();
    for txn in &history {
        assert_eq!(txn.balance_after - txn.balance_before, txn.amount);
    }
    assert_eq!(history.len(), ops.len());
}

#[tokio::test]
async fn concurrent_credits_to_one_account_lose_no_updates() {
    let db = prepare_test_db().await;
    let account = db.create_account().await.unwrap();
    let api = std::sync::Arc::new(SettlementApi::new(db.clone()));

    let mut handles = Vec::new();
    for i in 0..10 {
        let api = api.clone();
        let account_id = account.id;
        handles.push(tokio::spawn(async move {
            let settlement =
                NewSettlement::new(Gateway::PayPal, format!("conc-{i}"), account_id, Money::from_whole(1));
            api.process_settlement(settlement).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let audit = db.audit_account(account.id).await.unwrap();
    assert!(audit.is_consistent());
    assert_eq!(audit.balance, Money::from_whole(10));
}

#[tokio::test]
async fn concurrent_deliveries_of_one_event_apply_once() {
    let db = prepare_test_db().await;
    let account = db.create_account().await.unwrap();
    let api = std::sync::Arc::new(SettlementApi::new(db.clone()));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let api = api.clone();
        let account_id = account.id;
        handles.push(tokio::spawn(async move {
            let settlement = NewSettlement::new(Gateway::Cryptomus, "race-1", account_id, Money::from_whole(25));
            api.process_settlement(settlement).await
        }));
    }
    let mut applied = 0;
    for handle in handles {
        // Losers may surface ClaimInProgress (retryable); they must never double-apply
        if let Ok(SettlementOutcome::Applied(_)) = handle.await.unwrap() {
            applied += 1;
        }
    }
    assert_eq!(applied, 1);
    let account = db.fetch_account(account.id).await.unwrap().unwrap();
    assert_eq!(account.balance, Money::from_whole(25));
}
