//! Exactly-once consumption of a ticket, keyed on the transaction id.
//!
//! A token can be copied, so uniqueness is enforced on the ledger row rather
//! than on the token: the first redemption moves the row `completed -> used`,
//! every later attempt is rejected and recorded as `duplicate_use`.

use chrono::{DateTime, SubsecRound, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

use crate::domain::{NewFraudLogEntry, Transaction, TransactionStatus};
use crate::error::TicketError;
use crate::ports::{RepositoryError, TransactionRepository};

use super::{bounded, FraudRecorder};

/// Per-transaction async locks. Different ids never contend.
#[derive(Clone, Default)]
pub struct RedemptionLocks {
    inner: Arc<Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>>,
}

impl RedemptionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            // Entries only referenced by the map are idle.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(id).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Number of ids with a holder or waiter, plus idle entries not yet pruned.
    pub fn tracked(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[derive(Clone)]
pub struct RedemptionStateMachine {
    ledger: Arc<dyn TransactionRepository>,
    recorder: FraudRecorder,
    locks: RedemptionLocks,
    timeout: Duration,
}

impl RedemptionStateMachine {
    pub fn new(
        ledger: Arc<dyn TransactionRepository>,
        recorder: FraudRecorder,
        timeout: Duration,
    ) -> Self {
        Self {
            ledger,
            recorder,
            locks: RedemptionLocks::new(),
            timeout,
        }
    }

    /// Drive `completed -> used` for `transaction_id`.
    ///
    /// `evidence` is what the caller presented (the ticket payload) and is stored
    /// with any duplicate-use fraud entry.
    pub async fn redeem(
        &self,
        transaction_id: Uuid,
        evidence: serde_json::Value,
    ) -> Result<Transaction, TicketError> {
        let _guard = self.locks.acquire(transaction_id).await;

        let tx = self.fetch(transaction_id).await?;
        if tx.is_redeemed() {
            return Err(self.reject_duplicate(transaction_id, evidence).await);
        }
        if !tx.status.can_transition_to(TransactionStatus::Used) {
            tracing::info!(
                transaction_id = %transaction_id,
                status = %tx.status,
                "Redemption refused for non-completed transaction"
            );
            return Err(TicketError::TransactionNotRedeemable {
                transaction_id,
                status: tx.status,
            });
        }

        // Microsecond precision survives a Postgres round trip, so the value can
        // be compared during reconciliation.
        let used_at = Utc::now().trunc_subsecs(6);

        match bounded(self.timeout, self.ledger.mark_used(transaction_id, used_at)).await {
            Ok(Some(updated)) => {
                tracing::info!(transaction_id = %transaction_id, "Ticket redeemed");
                Ok(updated)
            }
            Ok(None) => {
                // Another writer changed the row between our read and write.
                let current = self.fetch(transaction_id).await?;
                if current.is_redeemed() {
                    Err(self.reject_duplicate(transaction_id, evidence).await)
                } else {
                    Err(TicketError::TransactionNotRedeemable {
                        transaction_id,
                        status: current.status,
                    })
                }
            }
            Err(RepositoryError::Unavailable(reason)) => {
                self.reconcile(transaction_id, used_at, reason).await
            }
            Err(e) => Err(TicketError::from_repository(transaction_id, e)),
        }
    }

    async fn fetch(&self, transaction_id: Uuid) -> Result<Transaction, TicketError> {
        bounded(self.timeout, self.ledger.get_by_id(transaction_id))
            .await
            .map_err(|e| TicketError::from_repository(transaction_id, e))
    }

    /// The write outcome is unknown; read back once so a committed transition is
    /// never reported as a failure.
    async fn reconcile(
        &self,
        transaction_id: Uuid,
        used_at: DateTime<Utc>,
        reason: String,
    ) -> Result<Transaction, TicketError> {
        tracing::warn!(
            transaction_id = %transaction_id,
            error = %reason,
            "Redemption write outcome unknown, reconciling"
        );

        match bounded(self.timeout, self.ledger.get_by_id(transaction_id)).await {
            Ok(current)
                if current.status == TransactionStatus::Used
                    && current.used_at == Some(used_at) =>
            {
                tracing::info!(transaction_id = %transaction_id, "Ticket redeemed (reconciled)");
                Ok(current)
            }
            Ok(_) => Err(TicketError::LedgerUnavailable(reason)),
            Err(e) => {
                tracing::error!(
                    alert = true,
                    transaction_id = %transaction_id,
                    error = %e,
                    "Redemption outcome could not be confirmed"
                );
                Err(TicketError::RedemptionOutcomeUnknown {
                    transaction_id,
                    reason: format!("{}; reconciliation read failed: {}", reason, e),
                })
            }
        }
    }

    async fn reject_duplicate(
        &self,
        transaction_id: Uuid,
        evidence: serde_json::Value,
    ) -> TicketError {
        tracing::warn!(transaction_id = %transaction_id, "Duplicate ticket redemption attempt");

        let fraud_logged = self
            .recorder
            .record(NewFraudLogEntry::duplicate_use(transaction_id, evidence))
            .await
            .is_ok();

        TicketError::AlreadyRedeemed {
            transaction_id,
            fraud_logged,
        }
    }
}
