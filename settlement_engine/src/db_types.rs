use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::error;
use serde::{Deserialize, Serialize};
use spg_common::Money;
use sqlx::FromRow;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(pub String);

//--------------------------------------      Gateway       ----------------------------------------------------------
/// The payment gateways we accept settlement notifications from. Stored as lowercase text and used as
/// half of the `(gateway, external_ref)` idempotency key, so the spelling here is part of the data model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gateway {
    PayPal,
    Cryptomus,
    Fawaterk,
    One,
}

impl Display for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Gateway::PayPal => "paypal",
            Gateway::Cryptomus => "cryptomus",
            Gateway::Fawaterk => "fawaterk",
            Gateway::One => "one",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Gateway {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "paypal" => Ok(Self::PayPal),
            "cryptomus" => Ok(Self::Cryptomus),
            "fawaterk" => Ok(Self::Fawaterk),
            "one" => Ok(Self::One),
            s => Err(ConversionError(format!("Unknown gateway: {s}"))),
        }
    }
}

//--------------------------------------    PaymentStatus   ----------------------------------------------------------
/// Normalized payment status as reported by a gateway. Only `Paid` ever reaches the ledger; everything
/// else is acknowledged and dropped by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    Paid,
    PartiallyPaid,
    Pending,
    Failed,
}

impl PaymentStatus {
    pub fn is_settled(&self) -> bool {
        matches!(self, PaymentStatus::Paid)
    }
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Paid => write!(f, "Paid"),
            PaymentStatus::PartiallyPaid => write!(f, "PartiallyPaid"),
            PaymentStatus::Pending => write!(f, "Pending"),
            PaymentStatus::Failed => write!(f, "Failed"),
        }
    }
}

//--------------------------------------   TransactionType  ----------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Deposit,
    Purchase,
    Bonus,
    Refund,
    Manual,
    Referral,
}

impl Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TransactionType::Deposit => "deposit",
            TransactionType::Purchase => "purchase",
            TransactionType::Bonus => "bonus",
            TransactionType::Refund => "refund",
            TransactionType::Manual => "manual",
            TransactionType::Referral => "referral",
        };
        write!(f, "{s}")
    }
}

impl FromStr for TransactionType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deposit" => Ok(Self::Deposit),
            "purchase" => Ok(Self::Purchase),
            "bonus" => Ok(Self::Bonus),
            "refund" => Ok(Self::Refund),
            "manual" => Ok(Self::Manual),
            "referral" => Ok(Self::Referral),
            s => Err(ConversionError(format!("Invalid transaction type: {s}"))),
        }
    }
}

impl From<String> for TransactionType {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid transaction type in database: {value}. Defaulting to Manual");
            TransactionType::Manual
        })
    }
}

//--------------------------------------      Account       ----------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub balance: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------    Transaction     ----------------------------------------------------------
/// An append-only ledger entry. `balance_before`/`balance_after` snapshot the account around this entry,
/// and `payment_reference` (unique when present) ties it to the external event that caused it.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub account_id: i64,
    #[sqlx(try_from = "String")]
    pub txn_type: TransactionType,
    pub amount: Money,
    pub balance_before: Money,
    pub balance_after: Money,
    pub payment_reference: Option<String>,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------    NewSettlement   ----------------------------------------------------------
/// A verified, normalized settlement ready to be applied to the ledger. Produced by a gateway adapter
/// after signature verification; the engine trusts its contents.
#[derive(Debug, Clone)]
pub struct NewSettlement {
    pub gateway: Gateway,
    pub external_ref: String,
    pub account_id: i64,
    pub amount: Money,
    pub description: String,
}

impl NewSettlement {
    pub fn new(gateway: Gateway, external_ref: impl Into<String>, account_id: i64, amount: Money) -> Self {
        let external_ref = external_ref.into();
        let description = format!("{gateway} deposit {external_ref}");
        Self { gateway, external_ref, account_id, amount, description }
    }

    /// The value stored in `transactions.payment_reference`. Prefixed with the gateway so that two
    /// providers using the same reference string can never collide.
    pub fn ledger_reference(&self) -> String {
        format!("{}:{}", self.gateway, self.external_ref)
    }
}

//--------------------------------------   SettlementEvent  ----------------------------------------------------------
#[derive(Debug, Clone, FromRow)]
pub struct SettlementEvent {
    pub id: i64,
    pub gateway: String,
    pub external_ref: String,
    pub account_id: Option<i64>,
    pub amount: Option<Money>,
    pub state: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------    OrderStatus     ----------------------------------------------------------
/// Internal order state. The allowed transition graph is
/// `pending → processing → in_progress → {completed, partial, cancelled, refunded, failed}`,
/// forward-only; stages may be skipped but never revisited. Unrecognized provider vocabulary is kept
/// as a normalized `Other` value rather than dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OrderStatus {
    Pending,
    Processing,
    InProgress,
    Completed,
    Partial,
    Cancelled,
    Refunded,
    Failed,
    Other(String),
}

impl OrderStatus {
    pub fn as_str(&self) -> &str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::InProgress => "in_progress",
            OrderStatus::Completed => "completed",
            OrderStatus::Partial => "partial",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
            OrderStatus::Failed => "failed",
            OrderStatus::Other(s) => s.as_str(),
        }
    }

    /// `partial` counts as terminal here: no further transition is expected from a poll, even though
    /// the graph does not contractually forbid one.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Completed
                | OrderStatus::Partial
                | OrderStatus::Cancelled
                | OrderStatus::Refunded
                | OrderStatus::Failed
        )
    }

    /// Position along the transition graph. Unknown statuses sit at the `in_progress` stage so that a
    /// later terminal poll still lands on them.
    fn rank(&self) -> u8 {
        match self {
            OrderStatus::Pending => 0,
            OrderStatus::Processing => 1,
            OrderStatus::InProgress | OrderStatus::Other(_) => 2,
            _ => 3,
        }
    }

    /// Whether a poll result may move an order from `self` to `next`. Terminal states never change,
    /// and last-writer-wins only applies forward along the graph.
    pub fn accepts(&self, next: &OrderStatus) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&str> for OrderStatus {
    fn from(s: &str) -> Self {
        match s {
            "pending" => Self::Pending,
            "processing" => Self::Processing,
            "in_progress" => Self::InProgress,
            "completed" => Self::Completed,
            "partial" => Self::Partial,
            "cancelled" => Self::Cancelled,
            "refunded" => Self::Refunded,
            "failed" => Self::Failed,
            other => Self::Other(crate::status_map::normalize_status(other)),
        }
    }
}

impl From<String> for OrderStatus {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<OrderStatus> for String {
    fn from(s: OrderStatus) -> Self {
        s.as_str().to_string()
    }
}

//--------------------------------------        Order       ----------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub account_id: i64,
    pub provider_id: i64,
    pub external_order_id: String,
    pub quantity: i64,
    #[sqlx(try_from = "String")]
    pub status: OrderStatus,
    pub start_count: Option<i64>,
    pub remains: Option<i64>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub account_id: i64,
    pub provider_id: i64,
    pub external_order_id: String,
    pub quantity: i64,
}

//--------------------------------------      Provider      ----------------------------------------------------------
/// A fulfilment provider we poll for order status. The API key lives in this row because providers are
/// configured at runtime by the (out of scope) admin panel, not via the environment.
#[derive(Debug, Clone, FromRow)]
pub struct Provider {
    pub id: i64,
    pub name: String,
    pub api_url: String,
    pub api_key: String,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------    RemoteStatus    ----------------------------------------------------------
/// One entry of a provider's status-poll response, still in the provider's vocabulary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteStatus {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub start_count: Option<i64>,
    #[serde(default)]
    pub remains: Option<i64>,
}

//--------------------------------------     SyncReport     ----------------------------------------------------------
/// Outcome of a synchronizer run. Per-provider failures are folded into `errors`; a run never fails as
/// a whole.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub checked: usize,
    pub updated: usize,
    pub errors: usize,
}

impl SyncReport {
    pub fn merge(&mut self, other: SyncReport) {
        self.checked += other.checked;
        self.updated += other.updated;
        self.errors += other.errors;
    }
}

impl Display for SyncReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} checked, {} updated, {} errors", self.checked, self.updated, self.errors)
    }
}
