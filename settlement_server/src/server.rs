use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use settlement_engine::{OrderSyncApi, SettlementApi, SqliteDatabase};

use crate::{
    adapters::{CryptomusAdapter, FawaterkAdapter, OneAdapter, PayPalAdapter},
    config::ServerConfig,
    errors::ServerError,
    providers::ProviderClient,
    routes::{cryptomus_webhook, fawaterk_webhook, health, one_webhook, paypal_webhook, trigger_sync},
    status_worker::start_status_worker,
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let worker = if config.poll.enabled {
        Some(start_status_worker(db.clone(), config.poll.clone()))
    } else {
        log::info!("🔄️ Scheduled status polling is disabled. Use POST /sync to run the synchronizer manually");
        None
    };
    let srv = create_server_instance(config, db)?;
    let result = srv.await.map_err(|e| ServerError::Unspecified(e.to_string()));
    if let Some(worker) = worker {
        worker.abort();
    }
    result
}

pub fn create_server_instance(config: ServerConfig, db: SqliteDatabase) -> Result<Server, ServerError> {
    let paypal =
        PayPalAdapter::new(config.paypal.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let provider_client =
        ProviderClient::new(config.poll.provider_timeout).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let srv = HttpServer::new(move || {
        let settlement_api = SettlementApi::new(db.clone()).with_deposit_bonus(config.deposit_bonus_pct);
        let sync_api = OrderSyncApi::new(db.clone());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("spg::access_log"))
            .app_data(web::Data::new(settlement_api))
            .app_data(web::Data::new(sync_api))
            .app_data(web::Data::new(paypal.clone()))
            .app_data(web::Data::new(CryptomusAdapter::new(config.cryptomus.clone())))
            .app_data(web::Data::new(FawaterkAdapter::new(config.fawaterk.clone())))
            .app_data(web::Data::new(OneAdapter::new(config.one.clone())))
            .app_data(web::Data::new(provider_client.clone()))
            .app_data(web::Data::new(config.poll.clone()))
            .service(health)
            .route("/webhook/paypal", web::post().to(paypal_webhook::<SqliteDatabase>))
            .route("/webhook/cryptomus", web::post().to(cryptomus_webhook::<SqliteDatabase>))
            .route("/webhook/fawaterk", web::post().to(fawaterk_webhook::<SqliteDatabase>))
            .route("/webhook/one", web::post().to(one_webhook::<SqliteDatabase>))
            .route("/sync", web::post().to(trigger_sync::<SqliteDatabase>))
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
