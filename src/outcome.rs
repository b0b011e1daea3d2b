//! Non-fatal results of best-effort side writes.

use serde::Serialize;
use uuid::Uuid;

/// A side write that failed without failing the request that triggered it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// The token was issued but could not be stored on the transaction row.
    /// The token still verifies; the ledger just does not hold a copy.
    TicketNotPersisted { transaction_id: Uuid, reason: String },

    /// A fraud log entry could not be written after all retries.
    FraudLogWriteFailed {
        transaction_id: Option<Uuid>,
        reason: String,
        attempts: u32,
    },
}

/// Primary value plus any warnings raised on the way.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome<T> {
    pub value: T,
    pub warnings: Vec<Warning>,
}

impl<T> Outcome<T> {
    pub fn clean(value: T) -> Self {
        Self {
            value,
            warnings: Vec::new(),
        }
    }

    pub fn with_warnings(value: T, warnings: Vec<Warning>) -> Self {
        Self { value, warnings }
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}
