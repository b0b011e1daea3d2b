//! Ports the ticket core consumes. Implementations live in `crate::adapters`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{
    FraudLogEntry, NewFraudLogEntry, NewTransaction, Transaction, TransactionFilter,
    TransactionUpdate,
};

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed row: {0}")]
    InvalidRow(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("row not found".to_string()),
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                RepositoryError::InvalidRow(err.to_string())
            }
            other => RepositoryError::Unavailable(other.to_string()),
        }
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Ledger of ticket purchases.
#[async_trait]
pub trait TransactionRepository: Send + Sync {
    /// Insert a new row; the store assigns `id` and `created_at`.
    async fn create(&self, new: &NewTransaction) -> RepositoryResult<Transaction>;

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Transaction>;

    async fn update(&self, id: Uuid, update: &TransactionUpdate) -> RepositoryResult<Transaction>;

    /// Conditionally move a row from `completed` to `used`.
    ///
    /// Applies only when the row is `completed` with no `used_at`; returns `None`
    /// when that precondition does not hold (including a missing row).
    async fn mark_used(
        &self,
        id: Uuid,
        used_at: DateTime<Utc>,
    ) -> RepositoryResult<Option<Transaction>>;

    async fn list(&self, filter: &TransactionFilter) -> RepositoryResult<Vec<Transaction>>;

    /// Cheap connectivity probe for health checks.
    async fn ping(&self) -> RepositoryResult<()> {
        Ok(())
    }
}

/// Append-only sink for suspicious events.
#[async_trait]
pub trait FraudLogStore: Send + Sync {
    async fn append(&self, entry: &NewFraudLogEntry) -> RepositoryResult<FraudLogEntry>;

    /// Newest first.
    async fn list(&self, limit: i64, offset: i64) -> RepositoryResult<Vec<FraudLogEntry>>;
}
