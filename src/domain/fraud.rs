//! Fraud log entries. Append-only audit records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FraudReason {
    DuplicateUse,
    StatisticalOutlier,
    Other,
}

impl FraudReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FraudReason::DuplicateUse => "duplicate_use",
            FraudReason::StatisticalOutlier => "statistical_outlier",
            FraudReason::Other => "other",
        }
    }
}

impl fmt::Display for FraudReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FraudReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "duplicate_use" => Ok(FraudReason::DuplicateUse),
            "statistical_outlier" => Ok(FraudReason::StatisticalOutlier),
            "other" => Ok(FraudReason::Other),
            other => Err(format!("unknown fraud reason '{}'", other)),
        }
    }
}

/// Entry as submitted to the fraud log store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFraudLogEntry {
    pub transaction_id: Option<Uuid>,
    pub reason: FraudReason,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl NewFraudLogEntry {
    pub fn duplicate_use(transaction_id: Uuid, details: serde_json::Value) -> Self {
        Self {
            transaction_id: Some(transaction_id),
            reason: FraudReason::DuplicateUse,
            details,
            created_at: Utc::now(),
        }
    }

    pub fn statistical_outlier(transaction_id: Option<Uuid>, details: serde_json::Value) -> Self {
        Self {
            transaction_id,
            reason: FraudReason::StatisticalOutlier,
            details,
            created_at: Utc::now(),
        }
    }
}

/// Stored entry. Never mutated or deleted once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudLogEntry {
    pub id: Uuid,
    pub transaction_id: Option<Uuid>,
    pub reason: FraudReason,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl FraudLogEntry {
    pub fn from_new(id: Uuid, entry: NewFraudLogEntry) -> Self {
        Self {
            id,
            transaction_id: entry.transaction_id,
            reason: entry.reason,
            details: entry.details,
            created_at: entry.created_at,
        }
    }
}
