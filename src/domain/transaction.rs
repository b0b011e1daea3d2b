//! Transaction domain entity.
//! Framework-agnostic representation of one ticket purchase.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Lifecycle of a purchase: `pending -> completed -> used`. `failed` is terminal
/// and never reached from the redemption flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Used,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Used => "used",
            TransactionStatus::Failed => "failed",
        }
    }

    /// Only forward moves along `pending -> completed -> used` are allowed.
    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        matches!(
            (self, next),
            (TransactionStatus::Pending, TransactionStatus::Completed)
                | (TransactionStatus::Completed, TransactionStatus::Used)
        )
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown transaction status '{}'", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

impl FromStr for TransactionStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TransactionStatus::Pending),
            "completed" => Ok(TransactionStatus::Completed),
            "used" => Ok(TransactionStatus::Used),
            "failed" => Ok(TransactionStatus::Failed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Domain entity representing a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: i64,
    pub event_id: i64,
    pub amount: BigDecimal,
    pub currency: String,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub signed_ticket: Option<String>,
}

impl Transaction {
    /// `used_at` is set if and only if the status is `used`.
    pub fn is_consistent(&self) -> bool {
        (self.status == TransactionStatus::Used) == self.used_at.is_some()
    }

    pub fn is_redeemed(&self) -> bool {
        self.status == TransactionStatus::Used || self.used_at.is_some()
    }
}

/// Fields supplied by the purchase flow; the ledger assigns `id` and `created_at`.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub user_id: i64,
    pub event_id: i64,
    pub amount: BigDecimal,
    pub currency: String,
    pub status: TransactionStatus,
}

impl NewTransaction {
    /// Payment is modelled as instantaneous, so purchases start out `completed`.
    pub fn completed(user_id: i64, event_id: i64, amount: BigDecimal, currency: String) -> Self {
        Self {
            user_id,
            event_id,
            amount,
            currency,
            status: TransactionStatus::Completed,
        }
    }

    /// Materialize the row the way a ledger would on insert.
    pub fn into_transaction(self, id: Uuid, created_at: DateTime<Utc>) -> Transaction {
        Transaction {
            id,
            user_id: self.user_id,
            event_id: self.event_id,
            amount: self.amount,
            currency: self.currency,
            status: self.status,
            created_at,
            used_at: None,
            signed_ticket: None,
        }
    }
}

/// Fields the generic update path may touch. Status changes go through
/// `TransactionRepository::mark_used` only.
#[derive(Debug, Clone, Default)]
pub struct TransactionUpdate {
    pub signed_ticket: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionFilter {
    pub event_id: Option<i64>,
    pub user_id: Option<i64>,
    pub status: Option<TransactionStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl TransactionFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn matches(&self, tx: &Transaction) -> bool {
        self.event_id.map_or(true, |id| tx.event_id == id)
            && self.user_id.map_or(true, |id| tx.user_id == id)
            && self.status.map_or(true, |status| tx.status == status)
    }
}
