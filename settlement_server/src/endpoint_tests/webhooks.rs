use actix_web::{http::StatusCode, test, test::TestRequest, App};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use settlement_engine::{
    db_types::TransactionType,
    test_utils::prepare_test_db,
    SettlementDatabase,
    SqliteDatabase,
};
use spg_common::Money;

use super::helpers::{post_webhook, CRYPTOMUS_KEY, FAWATERK_SECRET, ONE_SECRET};
use crate::adapters::{hmac_sha256_hex, md5_hex};

fn fawaterk_body(invoice_id: i64, amount: &str, account_id: i64) -> (Vec<u8>, String) {
    let body = serde_json::to_vec(&serde_json::json!({
        "invoice_id": invoice_id,
        "invoice_key": "inv-test-key",
        "payment_method": "VISA",
        "invoice_status": "paid",
        "paid_amount": amount,
        "currency": "USD",
        "payLoad": account_id.to_string(),
    }))
    .unwrap();
    let canonical = format!("InvoiceId={invoice_id},InvoiceKey=inv-test-key,PaymentMethod=VISA");
    let sig = hmac_sha256_hex(FAWATERK_SECRET, canonical.as_bytes());
    (body, sig)
}

fn cryptomus_body(uuid: &str, status: &str, amount: &str, account_id: i64) -> (Vec<u8>, String) {
    let body = serde_json::to_vec(&serde_json::json!({
        "uuid": uuid,
        "order_id": "dep-1",
        "payment_amount": amount,
        "currency": "USDT",
        "status": status,
        "additional_data": account_id.to_string(),
    }))
    .unwrap();
    let sig = md5_hex(format!("{}{CRYPTOMUS_KEY}", BASE64.encode(&body)).as_bytes());
    (body, sig)
}

fn one_body(txn_id: &str, amount: &str, account_ref: &str) -> (Vec<u8>, String) {
    let body = serde_json::to_vec(&serde_json::json!({
        "transaction_id": txn_id,
        "amount": amount,
        "currency": "USD",
        "status": "captured",
        "merchant_reference": account_ref,
    }))
    .unwrap();
    let sig = hmac_sha256_hex(ONE_SECRET, &body);
    (body, sig)
}

async fn account_with_opening_balance(db: &SqliteDatabase, balance: Money) -> i64 {
    let account = db.create_account().await.unwrap();
    if balance.value() > 0 {
        db.credit(account.id, balance, TransactionType::Manual, None, "Opening balance").await.unwrap();
    }
    account.id
}

#[actix_web::test]
async fn redelivered_deposit_credits_exactly_once() {
    let db = prepare_test_db().await;
    let account_id = account_with_opening_balance(&db, Money::from_whole(10)).await;
    let (body, sig) = fawaterk_body(5501, "25.00", account_id);

    // The gateway delivers, then redelivers after a network hiccup
    let (status, _) = post_webhook(&db, "/webhook/fawaterk", body.clone(), &[("hashKey", &sig)]).await;
    assert_eq!(status, StatusCode::OK);
    let (status, response) = post_webhook(&db, "/webhook/fawaterk", body, &[("hashKey", &sig)]).await;
    assert_eq!(status, StatusCode::OK);
    assert!(response.contains("Already settled"), "unexpected response: {response}");

    let account = db.fetch_account(account_id).await.unwrap().unwrap();
    assert_eq!(account.balance, Money::from_whole(35));
    let history = db.account_history(account_id).await.unwrap();
    let deposits = history.iter().filter(|t| t.payment_reference.as_deref() == Some("fawaterk:5501")).count();
    assert_eq!(deposits, 1);
    let deposit = history.last().unwrap();
    assert_eq!(deposit.balance_before, Money::from_whole(10));
    assert_eq!(deposit.balance_after, Money::from_whole(35));
}

#[actix_web::test]
async fn tampered_signature_leaves_the_ledger_untouched() {
    let db = prepare_test_db().await;
    let account_id = account_with_opening_balance(&db, Money::from_whole(10)).await;
    let (body, sig) = one_body("txn-771", "25.00", &account_id.to_string());

    // Flip one byte of the body while keeping the original signature
    let mut tampered = body.clone();
    tampered[20] ^= 0x01;
    let (status, _) = post_webhook(&db, "/webhook/one", tampered, &[("X-One-Signature", &sig)]).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // And a corrupted signature with the original body
    let mut bad_sig = sig.clone();
    bad_sig.replace_range(0..1, if sig.starts_with('0') { "1" } else { "0" });
    let (status, _) = post_webhook(&db, "/webhook/one", body, &[("X-One-Signature", &bad_sig)]).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let account = db.fetch_account(account_id).await.unwrap().unwrap();
    assert_eq!(account.balance, Money::from_whole(10));
    assert_eq!(db.account_history(account_id).await.unwrap().len(), 1);
}

#[actix_web::test]
async fn non_terminal_status_is_acknowledged_without_credit() {
    let db = prepare_test_db().await;
    let account_id = account_with_opening_balance(&db, Money::default()).await;

    let (body, sig) = cryptomus_body("c0ffee-1", "check", "20.00", account_id);
    let (status, _) = post_webhook(&db, "/webhook/cryptomus", body, &[("sign", &sig)]).await;
    assert_eq!(status, StatusCode::OK);
    let account = db.fetch_account(account_id).await.unwrap().unwrap();
    assert_eq!(account.balance, Money::default());

    // The pending delivery claimed nothing, so the eventual paid delivery settles normally
    let (body, sig) = cryptomus_body("c0ffee-1", "paid", "20.00", account_id);
    let (status, _) = post_webhook(&db, "/webhook/cryptomus", body, &[("sign", &sig)]).await;
    assert_eq!(status, StatusCode::OK);
    let account = db.fetch_account(account_id).await.unwrap().unwrap();
    assert_eq!(account.balance, Money::from_whole(20));
}

#[actix_web::test]
async fn unknown_account_invites_a_retry() {
    let db = prepare_test_db().await;
    let (body, sig) = one_body("txn-404", "5.00", "424242");
    let (status, _) = post_webhook(&db, "/webhook/one", body, &[("X-One-Signature", &sig)]).await;
    // Non-2xx: the account may simply not have replicated yet, so the gateway should redeliver
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[actix_web::test]
async fn missing_account_reference_is_a_bad_request() {
    let db = prepare_test_db().await;
    let body = serde_json::to_vec(&serde_json::json!({
        "transaction_id": "txn-5",
        "amount": "5.00",
        "currency": "USD",
        "status": "captured",
    }))
    .unwrap();
    let sig = hmac_sha256_hex(ONE_SECRET, &body);
    let (status, _) = post_webhook(&db, "/webhook/one", body, &[("X-One-Signature", &sig)]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn unreachable_paypal_api_maps_to_bad_gateway() {
    let db = prepare_test_db().await;
    let body = serde_json::to_vec(&serde_json::json!({
        "event_type": "PAYMENT.CAPTURE.COMPLETED",
        "resource": { "id": "3C679366HH908993F" },
    }))
    .unwrap();
    let (status, _) = post_webhook(&db, "/webhook/paypal", body, &[]).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[actix_web::test]
async fn health_endpoint_answers() {
    let app = App::new().service(crate::routes::health);
    let service = test::init_service(app).await;
    let res = test::call_service(&service, TestRequest::get().uri("/health").to_request()).await;
    assert_eq!(res.status(), StatusCode::OK);
}
