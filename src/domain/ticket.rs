//! Ticket payload carried inside a signed token.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Transaction;

/// Data bound by the ticket signature. Never persisted on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TicketPayload {
    pub transaction_id: Uuid,
    pub user_id: i64,
    pub event_id: i64,
    pub issued_at: DateTime<Utc>,
}

impl TicketPayload {
    pub fn for_transaction(tx: &Transaction, issued_at: DateTime<Utc>) -> Self {
        Self {
            transaction_id: tx.id,
            user_id: tx.user_id,
            event_id: tx.event_id,
            issued_at,
        }
    }

    /// Compact JSON with keys in lexicographic order.
    ///
    /// Goes through `serde_json::Value`, whose object map is a `BTreeMap` as long
    /// as the `preserve_order` feature stays disabled, so key order does not
    /// depend on struct field order.
    pub fn to_canonical_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        let value = serde_json::to_value(self)?;
        serde_json::to_vec(&value)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
