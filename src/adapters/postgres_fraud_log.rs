//! Postgres implementation of FraudLogStore.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{FraudLogEntry, FraudReason, NewFraudLogEntry};
use crate::ports::{FraudLogStore, RepositoryError, RepositoryResult};

#[derive(Clone)]
pub struct PostgresFraudLog {
    pool: PgPool,
}

impl PostgresFraudLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FraudLogStore for PostgresFraudLog {
    async fn append(&self, entry: &NewFraudLogEntry) -> RepositoryResult<FraudLogEntry> {
        let row = sqlx::query_as::<_, FraudLogRow>(
            r#"
            INSERT INTO fraud_log (id, transaction_id, reason, details, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, transaction_id, reason, details, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(entry.transaction_id)
        .bind(entry.reason.as_str())
        .bind(&entry.details)
        .bind(entry.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        row.into_domain()
    }

    async fn list(&self, limit: i64, offset: i64) -> RepositoryResult<Vec<FraudLogEntry>> {
        let rows = sqlx::query_as::<_, FraudLogRow>(
            "SELECT * FROM fraud_log ORDER BY created_at DESC, id DESC LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        rows.into_iter().map(FraudLogRow::into_domain).collect()
    }
}

#[derive(Debug, sqlx::FromRow)]
struct FraudLogRow {
    id: Uuid,
    transaction_id: Option<Uuid>,
    reason: String,
    details: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl FraudLogRow {
    fn into_domain(self) -> RepositoryResult<FraudLogEntry> {
        let reason: FraudReason = self
            .reason
            .parse()
            .map_err(|e: String| RepositoryError::InvalidRow(format!("fraud_log {}: {}", self.id, e)))?;

        Ok(FraudLogEntry {
            id: self.id,
            transaction_id: self.transaction_id,
            reason,
            details: self.details,
            created_at: self.created_at,
        })
    }
}
