//! Gateway adapters.
//!
//! One adapter per payment gateway, all behind [`GatewayAdapter`]: verify the authenticity of a
//! raw webhook delivery and normalize it into a [`NormalizedEvent`]. Nothing downstream of an
//! adapter ever sees raw gateway JSON, and a failed verification produces zero side effects.
//!
//! Every signing scheme's crypto lives in this module rather than in the per-gateway files, so
//! there is exactly one comparison routine to audit.

mod cryptomus;
mod fawaterk;
mod one;
mod paypal;

use actix_web::http::header::HeaderMap;
pub use cryptomus::CryptomusAdapter;
pub use fawaterk::FawaterkAdapter;
use hmac::{Hmac, Mac};
use md5::Md5;
pub use one::OneAdapter;
pub use paypal::PayPalAdapter;
use serde_json::Value;
use settlement_engine::db_types::{Gateway, PaymentStatus};
use sha2::{Digest, Sha256};
use spg_common::Money;
use thiserror::Error;

/// A verified, gateway-agnostic settlement notification.
///
/// `customer_ref` is the account reference the storefront attached when the payment was initiated
/// (PayPal `custom_id`, Cryptomus `additional_data`, and so on); the orchestrator resolves it to
/// an account id.
#[derive(Debug, Clone)]
pub struct NormalizedEvent {
    pub gateway: Gateway,
    pub external_ref: String,
    pub customer_ref: Option<String>,
    pub amount: Money,
    pub currency: String,
    pub status: PaymentStatus,
    pub raw: Value,
}

#[derive(Debug, Clone, Error)]
pub enum AdapterError {
    #[error("Signature verification failed. {0}")]
    SignatureInvalid(String),
    #[error("Payload could not be parsed. {0}")]
    MalformedPayload(String),
    #[error("Gateway API unreachable. {0}")]
    ProviderUnreachable(String),
}

/// Verifies and normalizes one gateway's webhook deliveries.
#[allow(async_fn_in_trait)]
pub trait GatewayAdapter {
    /// Authenticate a raw delivery and normalize it. Must not trust any field of `body` that the
    /// gateway's scheme does not cover.
    async fn verify(&self, body: &[u8], headers: &HeaderMap) -> Result<NormalizedEvent, AdapterError>;
}

/// Gateways send amounts as decimal strings. Anything `Money` cannot represent exactly is a
/// malformed payload, not something to round.
pub(crate) fn parse_amount(s: &str) -> Result<Money, AdapterError> {
    s.parse::<Money>().map_err(|e| AdapterError::MalformedPayload(e.to_string()))
}

pub(crate) fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, AdapterError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AdapterError::SignatureInvalid(format!("Missing {name} header")))
}

pub(crate) fn hmac_sha256_hex(secret: &str, message: &[u8]) -> String {
    type HmacSha256 = Hmac<Sha256>;
    // HMAC accepts keys of any length, so this cannot fail for string secrets
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(message);
    hex::encode(mac.finalize().into_bytes())
}

pub(crate) fn md5_hex(message: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(message);
    hex::encode(hasher.finalize())
}

/// Compare two hex signatures without short-circuiting on the first mismatched byte.
pub(crate) fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        diff |= x ^ y;
    }
    diff == 0
}
