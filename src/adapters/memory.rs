//! In-process ledger and fraud log.
//!
//! Backs `serve --in-memory` and the test suite. The write lock makes
//! `mark_used` a compare-and-set on the row, mirroring the Postgres statement.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{
    FraudLogEntry, NewFraudLogEntry, NewTransaction, Transaction, TransactionFilter,
    TransactionStatus, TransactionUpdate,
};
use crate::ports::{
    FraudLogStore, RepositoryError, RepositoryResult, TransactionRepository,
};

#[derive(Clone, Default)]
pub struct InMemoryLedger {
    rows: Arc<RwLock<HashMap<Uuid, Transaction>>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fully-formed row, bypassing id assignment. Used to seed fixtures.
    pub async fn insert(&self, tx: Transaction) {
        self.rows.write().await.insert(tx.id, tx);
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }
}

#[async_trait]
impl TransactionRepository for InMemoryLedger {
    async fn create(&self, new: &NewTransaction) -> RepositoryResult<Transaction> {
        let tx = new.clone().into_transaction(Uuid::new_v4(), Utc::now());
        self.rows.write().await.insert(tx.id, tx.clone());
        Ok(tx)
    }

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Transaction> {
        self.rows
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    async fn update(&self, id: Uuid, update: &TransactionUpdate) -> RepositoryResult<Transaction> {
        let mut rows = self.rows.write().await;
        let tx = rows
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;

        if let Some(ticket) = &update.signed_ticket {
            tx.signed_ticket = Some(ticket.clone());
        }

        Ok(tx.clone())
    }

    async fn mark_used(
        &self,
        id: Uuid,
        used_at: DateTime<Utc>,
    ) -> RepositoryResult<Option<Transaction>> {
        let mut rows = self.rows.write().await;
        match rows.get_mut(&id) {
            Some(tx) if tx.status == TransactionStatus::Completed && tx.used_at.is_none() => {
                tx.status = TransactionStatus::Used;
                tx.used_at = Some(used_at);
                Ok(Some(tx.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn list(&self, filter: &TransactionFilter) -> RepositoryResult<Vec<Transaction>> {
        let rows = self.rows.read().await;
        let mut matching: Vec<Transaction> =
            rows.values().filter(|tx| filter.matches(tx)).cloned().collect();
        matching.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        let offset = filter.offset.unwrap_or(0).max(0) as usize;
        let limit = filter.limit.map(|l| l.max(0) as usize).unwrap_or(usize::MAX);
        Ok(matching.into_iter().skip(offset).take(limit).collect())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryFraudLog {
    entries: Arc<RwLock<Vec<FraudLogEntry>>>,
}

impl InMemoryFraudLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot in insertion order.
    pub async fn entries(&self) -> Vec<FraudLogEntry> {
        self.entries.read().await.clone()
    }
}

#[async_trait]
impl FraudLogStore for InMemoryFraudLog {
    async fn append(&self, entry: &NewFraudLogEntry) -> RepositoryResult<FraudLogEntry> {
        let stored = FraudLogEntry::from_new(Uuid::new_v4(), entry.clone());
        self.entries.write().await.push(stored.clone());
        Ok(stored)
    }

    async fn list(&self, limit: i64, offset: i64) -> RepositoryResult<Vec<FraudLogEntry>> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .rev()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}
