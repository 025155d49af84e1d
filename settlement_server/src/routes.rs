//! Webhook endpoints.
//!
//! Each gateway gets its own POST route, but they all funnel through [`settle_event`]: verify with
//! the gateway's adapter, drop non-settling statuses, and hand the rest to the engine. The HTTP
//! status code of the response is the retry contract — any error variant of [`ServerError`] maps
//! to a non-2xx and invites the gateway to redeliver.

use actix_web::{get, web, HttpRequest, HttpResponse};
use log::*;
use settlement_engine::{
    db_types::NewSettlement,
    OrderManagement,
    OrderSyncApi,
    SettlementApi,
    SettlementDatabase,
    SettlementOutcome,
};

use crate::{
    adapters::{CryptomusAdapter, FawaterkAdapter, GatewayAdapter, NormalizedEvent, OneAdapter, PayPalAdapter},
    config::PollConfig,
    data_objects::JsonResponse,
    errors::ServerError,
    providers::ProviderClient,
    status_worker::run_sync,
};

#[get("/health")]
pub async fn health() -> HttpResponse {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

pub async fn paypal_webhook<B: SettlementDatabase>(
    req: HttpRequest,
    body: web::Bytes,
    adapter: web::Data<PayPalAdapter>,
    api: web::Data<SettlementApi<B>>,
) -> Result<HttpResponse, ServerError> {
    trace!("🅿️ Received PayPal webhook: {}", req.uri());
    let event = adapter.verify(&body, req.headers()).await?;
    settle_event(event, api.as_ref()).await
}

pub async fn cryptomus_webhook<B: SettlementDatabase>(
    req: HttpRequest,
    body: web::Bytes,
    adapter: web::Data<CryptomusAdapter>,
    api: web::Data<SettlementApi<B>>,
) -> Result<HttpResponse, ServerError> {
    trace!("🪙️ Received Cryptomus webhook: {}", req.uri());
    let event = adapter.verify(&body, req.headers()).await?;
    settle_event(event, api.as_ref()).await
}

pub async fn fawaterk_webhook<B: SettlementDatabase>(
    req: HttpRequest,
    body: web::Bytes,
    adapter: web::Data<FawaterkAdapter>,
    api: web::Data<SettlementApi<B>>,
) -> Result<HttpResponse, ServerError> {
    trace!("🧾️ Received Fawaterk webhook: {}", req.uri());
    let event = adapter.verify(&body, req.headers()).await?;
    settle_event(event, api.as_ref()).await
}

pub async fn one_webhook<B: SettlementDatabase>(
    req: HttpRequest,
    body: web::Bytes,
    adapter: web::Data<OneAdapter>,
    api: web::Data<SettlementApi<B>>,
) -> Result<HttpResponse, ServerError> {
    trace!("💳️ Received ONE webhook: {}", req.uri());
    let event = adapter.verify(&body, req.headers()).await?;
    settle_event(event, api.as_ref()).await
}

/// Trigger one synchronizer run outside the schedule and return its report. Used by operators
/// after a provider outage rather than waiting for the next tick.
pub async fn trigger_sync<B: OrderManagement>(
    api: web::Data<OrderSyncApi<B>>,
    client: web::Data<ProviderClient>,
    poll: web::Data<PollConfig>,
) -> Result<HttpResponse, ServerError> {
    info!("🔄️ Manual status sync requested");
    let report = run_sync(api.as_ref(), client.as_ref(), poll.batch_size).await;
    info!("🔄️ Manual status sync complete: {report}");
    Ok(HttpResponse::Ok().json(report))
}

/// The shared orchestration step behind every webhook route. The adapter has already vouched for
/// the event's authenticity; from here the ledger outcome decides the response code.
async fn settle_event<B: SettlementDatabase>(
    event: NormalizedEvent,
    api: &SettlementApi<B>,
) -> Result<HttpResponse, ServerError> {
    let reference = format!("{}:{}", event.gateway, event.external_ref);
    if !event.status.is_settled() {
        // Only confirmed successes touch the ledger. Everything else is acknowledged so the
        // gateway stops redelivering a payment that will never settle.
        info!("🔖️ [{reference}] arrived with status {}. Acknowledged without ledger effect", event.status);
        return Ok(HttpResponse::Ok().json(JsonResponse::success(format!("Status {} acknowledged", event.status))));
    }
    let account_id = resolve_account(&event)?;
    let settlement = NewSettlement::new(event.gateway, event.external_ref, account_id, event.amount);
    match api.process_settlement(settlement).await? {
        SettlementOutcome::Applied(txn) => {
            info!("🔖️ [{reference}] settled. {} credited to account #{}", txn.amount, txn.account_id);
            Ok(HttpResponse::Ok().json(JsonResponse::success("Settlement applied")))
        },
        SettlementOutcome::Duplicate => {
            info!("🔖️ [{reference}] was already settled. Acknowledging redelivery");
            Ok(HttpResponse::Ok().json(JsonResponse::success("Already settled")))
        },
    }
}

fn resolve_account(event: &NormalizedEvent) -> Result<i64, ServerError> {
    let reference = event
        .customer_ref
        .as_deref()
        .ok_or_else(|| {
            ServerError::MalformedPayload(format!(
                "{}:{} carries no account reference",
                event.gateway, event.external_ref
            ))
        })?
        .trim();
    reference.parse::<i64>().map_err(|_| {
        ServerError::MalformedPayload(format!(
            "{}:{} carries an unusable account reference '{reference}'",
            event.gateway, event.external_ref
        ))
    })
}
