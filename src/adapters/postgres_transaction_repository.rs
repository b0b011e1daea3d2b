//! Postgres implementation of TransactionRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::domain::{
    NewTransaction, Transaction, TransactionFilter, TransactionStatus, TransactionUpdate,
};
use crate::ports::{RepositoryError, RepositoryResult, TransactionRepository};

/// Postgres-backed transaction ledger.
#[derive(Clone)]
pub struct PostgresTransactionRepository {
    pool: PgPool,
}

impl PostgresTransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionRepository for PostgresTransactionRepository {
    async fn create(&self, new: &NewTransaction) -> RepositoryResult<Transaction> {
        let row = sqlx::query_as::<_, TransactionRow>(
            r#"
            INSERT INTO transactions (id, user_id, event_id, amount, currency, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW())
            RETURNING id, user_id, event_id, amount, currency, status,
                created_at, used_at, signed_ticket
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.user_id)
        .bind(new.event_id)
        .bind(&new.amount)
        .bind(&new.currency)
        .bind(new.status.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        row.into_domain()
    }

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Transaction> {
        let row = sqlx::query_as::<_, TransactionRow>("SELECT * FROM transactions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        row.ok_or_else(|| RepositoryError::NotFound(id.to_string()))?
            .into_domain()
    }

    async fn update(&self, id: Uuid, update: &TransactionUpdate) -> RepositoryResult<Transaction> {
        let row = sqlx::query_as::<_, TransactionRow>(
            r#"
            UPDATE transactions
            SET signed_ticket = COALESCE($2, signed_ticket)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&update.signed_ticket)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        row.ok_or_else(|| RepositoryError::NotFound(id.to_string()))?
            .into_domain()
    }

    async fn mark_used(
        &self,
        id: Uuid,
        used_at: DateTime<Utc>,
    ) -> RepositoryResult<Option<Transaction>> {
        // Single conditional statement: concurrent callers race on the row lock and
        // only the first one still sees `completed`.
        let row = sqlx::query_as::<_, TransactionRow>(
            r#"
            UPDATE transactions
            SET status = 'used', used_at = $2
            WHERE id = $1 AND status = 'completed' AND used_at IS NULL
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(used_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        row.map(TransactionRow::into_domain).transpose()
    }

    async fn list(&self, filter: &TransactionFilter) -> RepositoryResult<Vec<Transaction>> {
        let rows = list_query(filter)
            .build_query_as::<TransactionRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        rows.into_iter().map(TransactionRow::into_domain).collect()
    }

    async fn ping(&self) -> RepositoryResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::from)?;
        Ok(())
    }
}

/// Oldest first. Without a `limit` every matching row is returned.
fn list_query(filter: &TransactionFilter) -> QueryBuilder<'static, Postgres> {
    let mut query: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT * FROM transactions WHERE TRUE");

    if let Some(event_id) = filter.event_id {
        query.push(" AND event_id = ").push_bind(event_id);
    }
    if let Some(user_id) = filter.user_id {
        query.push(" AND user_id = ").push_bind(user_id);
    }
    if let Some(status) = filter.status {
        query.push(" AND status = ").push_bind(status.as_str());
    }
    query.push(" ORDER BY created_at ASC, id ASC");

    if let Some(limit) = filter.limit {
        query.push(" LIMIT ").push_bind(limit.max(0));
    }
    if let Some(offset) = filter.offset {
        query.push(" OFFSET ").push_bind(offset.max(0));
    }

    query
}

/// Internal row type for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: Uuid,
    user_id: i64,
    event_id: i64,
    amount: bigdecimal::BigDecimal,
    currency: String,
    status: String,
    created_at: DateTime<Utc>,
    used_at: Option<DateTime<Utc>>,
    signed_ticket: Option<String>,
}

impl TransactionRow {
    /// Rejects rows that would break domain invariants instead of passing them on.
    fn into_domain(self) -> RepositoryResult<Transaction> {
        let status: TransactionStatus = self
            .status
            .parse()
            .map_err(|e| RepositoryError::InvalidRow(format!("transaction {}: {}", self.id, e)))?;

        let tx = Transaction {
            id: self.id,
            user_id: self.user_id,
            event_id: self.event_id,
            amount: self.amount,
            currency: self.currency,
            status,
            created_at: self.created_at,
            used_at: self.used_at,
            signed_ticket: self.signed_ticket,
        };

        if !tx.is_consistent() {
            return Err(RepositoryError::InvalidRow(format!(
                "transaction {}: used_at does not match status {}",
                tx.id, tx.status
            )));
        }

        Ok(tx)
    }
}
