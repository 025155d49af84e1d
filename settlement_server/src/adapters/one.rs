use actix_web::http::header::HeaderMap;
use log::*;
use serde::Deserialize;
use settlement_engine::db_types::{Gateway, PaymentStatus};
use spg_common::Secret;

use crate::{
    adapters::{
        constant_time_eq,
        header_value,
        hmac_sha256_hex,
        parse_amount,
        AdapterError,
        GatewayAdapter,
        NormalizedEvent,
    },
    config::OneConfig,
};

const SIGNATURE_HEADER: &str = "X-One-Signature";

/// The ONE card processor signs the entire raw body: HMAC-SHA256 over the exact bytes received,
/// hex-encoded in the `X-One-Signature` header. The signature is checked before the body is
/// parsed, so a delivery that fails verification is never even deserialized.
#[derive(Clone)]
pub struct OneAdapter {
    webhook_secret: Secret<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct OnePayload {
    transaction_id: String,
    amount: String,
    #[serde(default)]
    currency: Option<String>,
    status: String,
    /// The storefront's account reference, echoed back from payment initiation.
    #[serde(default)]
    merchant_reference: Option<String>,
}

impl OneAdapter {
    pub fn new(config: OneConfig) -> Self {
        Self { webhook_secret: config.webhook_secret }
    }

    fn map_status(status: &str) -> PaymentStatus {
        match status.to_lowercase().as_str() {
            "success" | "captured" | "approved" => PaymentStatus::Paid,
            "pending" | "authorized" => PaymentStatus::Pending,
            "failed" | "declined" | "voided" => PaymentStatus::Failed,
            other => {
                warn!("💳️ Unrecognized ONE transaction status '{other}'. Treating as pending");
                PaymentStatus::Pending
            },
        }
    }
}

impl GatewayAdapter for OneAdapter {
    async fn verify(&self, body: &[u8], headers: &HeaderMap) -> Result<NormalizedEvent, AdapterError> {
        let provided = header_value(headers, SIGNATURE_HEADER)?;
        let expected = hmac_sha256_hex(self.webhook_secret.reveal(), body);
        if !constant_time_eq(&expected, provided.trim().to_lowercase().as_str()) {
            return Err(AdapterError::SignatureInvalid("X-One-Signature mismatch".to_string()));
        }
        let raw: serde_json::Value =
            serde_json::from_slice(body).map_err(|e| AdapterError::MalformedPayload(e.to_string()))?;
        let payload: OnePayload =
            serde_json::from_value(raw.clone()).map_err(|e| AdapterError::MalformedPayload(e.to_string()))?;
        Ok(NormalizedEvent {
            gateway: Gateway::One,
            external_ref: payload.transaction_id,
            customer_ref: payload.merchant_reference,
            amount: parse_amount(&payload.amount)?,
            currency: payload.currency.unwrap_or_else(|| "USD".to_string()),
            status: Self::map_status(&payload.status),
            raw,
        })
    }
}
