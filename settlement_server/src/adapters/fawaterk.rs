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
    config::FawaterkConfig,
};

const SIGNATURE_HEADER: &str = "hashKey";

/// Fawaterk signs the invoice identity fields, not the whole body: HMAC-SHA256 over
/// `InvoiceId={id},InvoiceKey={key},PaymentMethod={method}` with the vendor secret, hex-encoded in
/// the `hashKey` header. Fields outside the canonical string (amount, status) are accepted as-is
/// once the invoice identity checks out, because the invoice key is itself an unguessable secret.
#[derive(Clone)]
pub struct FawaterkAdapter {
    vendor_secret: Secret<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct FawaterkPayload {
    invoice_id: i64,
    invoice_key: String,
    payment_method: String,
    invoice_status: String,
    paid_amount: String,
    #[serde(default)]
    currency: Option<String>,
    /// Opaque value the storefront attached at invoice creation; carries the account reference.
    #[serde(rename = "payLoad", default)]
    pay_load: Option<String>,
}

impl FawaterkAdapter {
    pub fn new(config: FawaterkConfig) -> Self {
        Self { vendor_secret: config.vendor_secret }
    }

    fn map_status(status: &str) -> PaymentStatus {
        match status.to_lowercase().as_str() {
            "paid" => PaymentStatus::Paid,
            "pending" | "unpaid" => PaymentStatus::Pending,
            "expired" | "failed" | "cancelled" => PaymentStatus::Failed,
            other => {
                warn!("🧾️ Unrecognized Fawaterk invoice status '{other}'. Treating as pending");
                PaymentStatus::Pending
            },
        }
    }
}

impl GatewayAdapter for FawaterkAdapter {
    async fn verify(&self, body: &[u8], headers: &HeaderMap) -> Result<NormalizedEvent, AdapterError> {
        let provided = header_value(headers, SIGNATURE_HEADER)?;
        let raw: serde_json::Value =
            serde_json::from_slice(body).map_err(|e| AdapterError::MalformedPayload(e.to_string()))?;
        let payload: FawaterkPayload =
            serde_json::from_value(raw.clone()).map_err(|e| AdapterError::MalformedPayload(e.to_string()))?;
        let canonical = format!(
            "InvoiceId={},InvoiceKey={},PaymentMethod={}",
            payload.invoice_id, payload.invoice_key, payload.payment_method
        );
        let expected = hmac_sha256_hex(self.vendor_secret.reveal(), canonical.as_bytes());
        if !constant_time_eq(&expected, provided.trim()) {
            return Err(AdapterError::SignatureInvalid(format!(
                "hashKey mismatch for invoice {}",
                payload.invoice_id
            )));
        }
        Ok(NormalizedEvent {
            gateway: Gateway::Fawaterk,
            external_ref: payload.invoice_id.to_string(),
            customer_ref: payload.pay_load,
            amount: parse_amount(&payload.paid_amount)?,
            currency: payload.currency.unwrap_or_else(|| "USD".to_string()),
            status: Self::map_status(&payload.invoice_status),
            raw,
        })
    }
}
