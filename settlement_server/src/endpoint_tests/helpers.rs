use actix_web::{body::MessageBody, http::StatusCode, test, test::TestRequest, web, App};
use settlement_engine::{OrderSyncApi, SettlementApi, SqliteDatabase};
use spg_common::Secret;

use crate::{
    adapters::{CryptomusAdapter, FawaterkAdapter, OneAdapter, PayPalAdapter},
    config::{CryptomusConfig, FawaterkConfig, OneConfig, PayPalConfig, ServerConfig},
    providers::ProviderClient,
    routes::{cryptomus_webhook, fawaterk_webhook, health, one_webhook, paypal_webhook, trigger_sync},
};

pub const FAWATERK_SECRET: &str = "fawaterk-test-secret";
pub const CRYPTOMUS_KEY: &str = "cryptomus-test-key";
pub const ONE_SECRET: &str = "one-test-secret";

/// Known secrets for signing test payloads. The PayPal API base points at a closed port so the
/// pull-then-trust adapter fails fast instead of calling out.
pub fn test_config() -> ServerConfig {
    let mut config = ServerConfig::new("127.0.0.1", 0);
    config.paypal = PayPalConfig {
        api_base: "http://127.0.0.1:1".to_string(),
        client_id: "test-client".to_string(),
        secret: Secret::new("test-secret".to_string()),
    };
    config.cryptomus = CryptomusConfig { api_key: Secret::new(CRYPTOMUS_KEY.to_string()) };
    config.fawaterk = FawaterkConfig { vendor_secret: Secret::new(FAWATERK_SECRET.to_string()) };
    config.one = OneConfig { webhook_secret: Secret::new(ONE_SECRET.to_string()) };
    config
}

/// Post a raw body to a webhook route on a freshly wired app and return the response.
pub async fn post_webhook(
    db: &SqliteDatabase,
    path: &str,
    body: Vec<u8>,
    headers: &[(&str, &str)],
) -> (StatusCode, String) {
    let config = test_config();
    let settlement_api = SettlementApi::new(db.clone()).with_deposit_bonus(config.deposit_bonus_pct);
    let sync_api = OrderSyncApi::new(db.clone());
    let paypal = PayPalAdapter::new(config.paypal.clone()).unwrap();
    let provider_client = ProviderClient::new(config.poll.provider_timeout).unwrap();
    let app = App::new()
        .app_data(web::Data::new(settlement_api))
        .app_data(web::Data::new(sync_api))
        .app_data(web::Data::new(paypal))
        .app_data(web::Data::new(CryptomusAdapter::new(config.cryptomus.clone())))
        .app_data(web::Data::new(FawaterkAdapter::new(config.fawaterk.clone())))
        .app_data(web::Data::new(OneAdapter::new(config.one.clone())))
        .app_data(web::Data::new(provider_client))
        .app_data(web::Data::new(config.poll.clone()))
        .service(health)
        .route("/webhook/paypal", web::post().to(paypal_webhook::<SqliteDatabase>))
        .route("/webhook/cryptomus", web::post().to(cryptomus_webhook::<SqliteDatabase>))
        .route("/webhook/fawaterk", web::post().to(fawaterk_webhook::<SqliteDatabase>))
        .route("/webhook/one", web::post().to(one_webhook::<SqliteDatabase>))
        .route("/sync", web::post().to(trigger_sync::<SqliteDatabase>));
    let service = test::init_service(app).await;
    let mut req = TestRequest::post().uri(path).set_payload(body);
    for (name, value) in headers {
        req = req.insert_header((*name, *value));
    }
    let res = test::call_service(&service, req.to_request()).await;
    let status = res.status();
    let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
    (status, body)
}
