use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use settlement_engine::SettlementError;
use thiserror::Error;

use crate::adapters::AdapterError;

/// The status codes here are the retry-control contract with the gateways: any 2xx stops
/// redelivery, anything else invites it. A rejected signature and a malformed payload are
/// permanent failures, but still answered with a non-2xx so the gateway's alerting fires.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Webhook signature invalid or not provided. {0}")]
    InvalidSignature(String),
    #[error("Could not read webhook payload. {0}")]
    MalformedPayload(String),
    #[error("Upstream provider could not be reached. {0}")]
    UpstreamUnreachable(String),
    #[error("Settlement is busy and should be retried. {0}")]
    RetrySettlement(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidSignature(_) => StatusCode::FORBIDDEN,
            Self::MalformedPayload(_) => StatusCode::BAD_REQUEST,
            Self::UpstreamUnreachable(_) => StatusCode::BAD_GATEWAY,
            Self::RetrySettlement(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

impl From<AdapterError> for ServerError {
    fn from(e: AdapterError) -> Self {
        match e {
            AdapterError::SignatureInvalid(s) => Self::InvalidSignature(s),
            AdapterError::MalformedPayload(s) => Self::MalformedPayload(s),
            AdapterError::ProviderUnreachable(s) => Self::UpstreamUnreachable(s),
        }
    }
}

impl From<SettlementError> for ServerError {
    fn from(e: SettlementError) -> Self {
        match e {
            // Transient from the gateway's point of view: a later redelivery may succeed once the
            // account exists or the concurrent delivery has finished.
            SettlementError::AccountNotFound(id) => Self::BackendError(format!("Account #{id} not found")),
            SettlementError::ClaimInProgress { .. } => Self::RetrySettlement(e.to_string()),
            e => Self::BackendError(e.to_string()),
        }
    }
}
