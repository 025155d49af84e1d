use actix_web::http::header::HeaderMap;
use log::*;
use serde::Deserialize;
use settlement_engine::db_types::{Gateway, PaymentStatus};

use crate::{
    adapters::{parse_amount, AdapterError, GatewayAdapter, NormalizedEvent},
    config::PayPalConfig,
};

const API_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// PayPal is a pull-then-trust gateway. The webhook delivery is treated as nothing more than a
/// hint that a capture id exists: the adapter authenticates against the PayPal REST API
/// (client-credentials OAuth) and fetches the capture object, and only fields of that
/// authoritative response are trusted for money amounts. A forged webhook can at worst make us
/// look up a capture that does not exist.
#[derive(Clone)]
pub struct PayPalAdapter {
    config: PayPalConfig,
    client: reqwest::Client,
}

#[derive(Debug, Clone, Deserialize)]
struct PayPalWebhook {
    #[serde(default)]
    event_type: String,
    resource: PayPalResource,
}

#[derive(Debug, Clone, Deserialize)]
struct PayPalResource {
    id: String,
}

#[derive(Debug, Clone, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Clone, Deserialize)]
struct CaptureResponse {
    id: String,
    status: String,
    amount: CaptureAmount,
    /// Set by the storefront at order creation; carries the account reference.
    #[serde(default)]
    custom_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct CaptureAmount {
    currency_code: String,
    value: String,
}

impl PayPalAdapter {
    pub fn new(config: PayPalConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(API_TIMEOUT).build()?;
        Ok(Self { config, client })
    }

    fn map_status(status: &str) -> PaymentStatus {
        match status {
            "COMPLETED" => PaymentStatus::Paid,
            "PENDING" => PaymentStatus::Pending,
            "DECLINED" | "FAILED" | "REFUNDED" | "PARTIALLY_REFUNDED" => PaymentStatus::Failed,
            other => {
                warn!("🅿️ Unrecognized PayPal capture status '{other}'. Treating as pending");
                PaymentStatus::Pending
            },
        }
    }

    fn capture_id(body: &[u8]) -> Result<(String, String), AdapterError> {
        let webhook: PayPalWebhook =
            serde_json::from_slice(body).map_err(|e| AdapterError::MalformedPayload(e.to_string()))?;
        Ok((webhook.resource.id, webhook.event_type))
    }

    async fn access_token(&self) -> Result<String, AdapterError> {
        let url = format!("{}/v1/oauth2/token", self.config.api_base);
        let response = self
            .client
            .post(&url)
            .basic_auth(&self.config.client_id, Some(self.config.secret.reveal()))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| AdapterError::ProviderUnreachable(format!("PayPal token endpoint: {e}")))?;
        if !response.status().is_success() {
            return Err(AdapterError::ProviderUnreachable(format!(
                "PayPal token endpoint answered {}",
                response.status()
            )));
        }
        let token: TokenResponse =
            response.json().await.map_err(|e| AdapterError::ProviderUnreachable(e.to_string()))?;
        Ok(token.access_token)
    }

    async fn fetch_capture(&self, capture_id: &str) -> Result<CaptureResponse, AdapterError> {
        let token = self.access_token().await?;
        let url = format!("{}/v2/payments/captures/{capture_id}", self.config.api_base);
        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| AdapterError::ProviderUnreachable(format!("PayPal capture endpoint: {e}")))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(AdapterError::SignatureInvalid(format!("PayPal knows no capture {capture_id}")));
        }
        if !response.status().is_success() {
            return Err(AdapterError::ProviderUnreachable(format!(
                "PayPal capture endpoint answered {}",
                response.status()
            )));
        }
        response.json().await.map_err(|e| AdapterError::ProviderUnreachable(e.to_string()))
    }
}

impl GatewayAdapter for PayPalAdapter {
    async fn verify(&self, body: &[u8], _headers: &HeaderMap) -> Result<NormalizedEvent, AdapterError> {
        let (capture_id, event_type) = Self::capture_id(body)?;
        debug!("🅿️ PayPal webhook {event_type} for capture {capture_id}. Fetching authoritative capture");
        let capture = self.fetch_capture(&capture_id).await?;
        let raw = serde_json::json!({
            "id": capture.id.clone(),
            "status": capture.status.clone(),
            "amount": { "currency_code": capture.amount.currency_code.clone(), "value": capture.amount.value.clone() },
            "custom_id": capture.custom_id.clone(),
        });
        Ok(NormalizedEvent {
            gateway: Gateway::PayPal,
            external_ref: capture.id,
            customer_ref: capture.custom_id,
            amount: parse_amount(&capture.amount.value)?,
            currency: capture.amount.currency_code,
            status: Self::map_status(&capture.status),
            raw,
        })
    }
}
