//! Numeric features for outlier scoring.

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::Transaction;

/// Loosely-typed view of a transaction as seen by the scanner. Fields that
/// cannot be read are `None` and fall back during extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanInput {
    pub transaction_id: Uuid,
    pub amount: Option<f64>,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<&Transaction> for ScanInput {
    fn from(tx: &Transaction) -> Self {
        Self {
            transaction_id: tx.id,
            amount: tx.amount.to_string().parse::<f64>().ok(),
            created_at: Some(tx.created_at),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub amount: f64,
    /// 0-23, UTC.
    pub hour: u32,
    /// 0 = Monday .. 6 = Sunday.
    pub day_of_week: u32,
}

impl FeatureRow {
    /// Missing or non-finite amounts count as 0; a missing timestamp is replaced
    /// by `now` so the row is still scored.
    pub fn extract(input: &ScanInput, now: DateTime<Utc>) -> Self {
        let amount = input.amount.filter(|a| a.is_finite()).unwrap_or(0.0);
        let at = input.created_at.unwrap_or(now);

        Self {
            amount,
            hour: at.hour(),
            day_of_week: at.weekday().num_days_from_monday(),
        }
    }

    pub fn to_vec(&self) -> Vec<f64> {
        vec![self.amount, f64::from(self.hour), f64::from(self.day_of_week)]
    }
}
