use actix_web::http::header::HeaderMap;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use log::*;
use serde::Deserialize;
use settlement_engine::db_types::{Gateway, PaymentStatus};
use spg_common::Secret;

use crate::{
    adapters::{constant_time_eq, header_value, md5_hex, parse_amount, AdapterError, GatewayAdapter, NormalizedEvent},
    config::CryptomusConfig,
};

const SIGNATURE_HEADER: &str = "sign";

/// Cryptomus uses a digest-of-body scheme: `md5(base64(raw_body) + api_key)`, hex-encoded in the
/// `sign` header. The digest covers the exact bytes received, so the check runs before parsing.
#[derive(Clone)]
pub struct CryptomusAdapter {
    api_key: Secret<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct CryptomusPayload {
    /// Cryptomus's own payment id; the idempotency anchor for this gateway.
    uuid: String,
    #[serde(default)]
    order_id: Option<String>,
    payment_amount: String,
    #[serde(default)]
    currency: Option<String>,
    status: String,
    /// Opaque value the storefront attached at payment creation; carries the account reference.
    #[serde(default)]
    additional_data: Option<String>,
}

impl CryptomusAdapter {
    pub fn new(config: CryptomusConfig) -> Self {
        Self { api_key: config.api_key }
    }

    /// Cryptomus's status vocabulary. `wrong_amount` means the customer underpaid; it is
    /// acknowledged without a credit rather than settled for a partial amount.
    fn map_status(status: &str) -> PaymentStatus {
        match status {
            "paid" | "paid_over" => PaymentStatus::Paid,
            "wrong_amount" => PaymentStatus::PartiallyPaid,
            "process" | "check" | "confirm_check" => PaymentStatus::Pending,
            "fail" | "cancel" | "system_fail" | "refund_process" | "refund_paid" => PaymentStatus::Failed,
            other => {
                warn!("🪙️ Unrecognized Cryptomus payment status '{other}'. Treating as pending");
                PaymentStatus::Pending
            },
        }
    }

    fn expected_signature(&self, body: &[u8]) -> String {
        let mut message = BASE64.encode(body);
        message.push_str(self.api_key.reveal());
        md5_hex(message.as_bytes())
    }
}

impl GatewayAdapter for CryptomusAdapter {
    async fn verify(&self, body: &[u8], headers: &HeaderMap) -> Result<NormalizedEvent, AdapterError> {
        let provided = header_value(headers, SIGNATURE_HEADER)?;
        let expected = self.expected_signature(body);
        if !constant_time_eq(&expected, provided.trim()) {
            return Err(AdapterError::SignatureInvalid("sign header mismatch".to_string()));
        }
        let raw: serde_json::Value =
            serde_json::from_slice(body).map_err(|e| AdapterError::MalformedPayload(e.to_string()))?;
        let payload: CryptomusPayload =
            serde_json::from_value(raw.clone()).map_err(|e| AdapterError::MalformedPayload(e.to_string()))?;
        if let Some(order_id) = &payload.order_id {
            trace!("🪙️ Cryptomus payment {} for storefront order {order_id}", payload.uuid);
        }
        Ok(NormalizedEvent {
            gateway: Gateway::Cryptomus,
            external_ref: payload.uuid,
            customer_ref: payload.additional_data,
            amount: parse_amount(&payload.payment_amount)?,
            currency: payload.currency.unwrap_or_else(|| "USDT".to_string()),
            status: Self::map_status(&payload.status),
            raw,
        })
    }
}
