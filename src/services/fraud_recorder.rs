use std::sync::Arc;
use std::time::Duration;

use crate::domain::{FraudLogEntry, NewFraudLogEntry};
use crate::outcome::Warning;
use crate::ports::FraudLogStore;

use super::bounded;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub max_retries: u32,
    /// Sleep before retry `n` is `backoff * n`.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff: Duration::from_millis(50),
        }
    }
}

/// Best-effort writer for the fraud log.
///
/// A failed append is retried per the policy and then surfaced as a
/// [`Warning`]; it never fails the redemption or scan that produced it.
#[derive(Clone)]
pub struct FraudRecorder {
    store: Arc<dyn FraudLogStore>,
    retry: RetryPolicy,
    timeout: Duration,
}

impl FraudRecorder {
    pub fn new(store: Arc<dyn FraudLogStore>, retry: RetryPolicy, timeout: Duration) -> Self {
        Self {
            store,
            retry,
            timeout,
        }
    }

    pub async fn record(&self, entry: NewFraudLogEntry) -> Result<FraudLogEntry, Warning> {
        let attempts = self.retry.max_retries + 1;
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match bounded(self.timeout, self.store.append(&entry)).await {
                Ok(stored) => {
                    tracing::info!(
                        fraud_log_id = %stored.id,
                        transaction_id = ?stored.transaction_id,
                        reason = %stored.reason,
                        "Fraud log entry recorded"
                    );
                    return Ok(stored);
                }
                Err(e) => {
                    tracing::warn!(
                        transaction_id = ?entry.transaction_id,
                        reason = %entry.reason,
                        attempt,
                        error = %e,
                        "Fraud log append failed"
                    );
                    last_error = e.to_string();
                    if attempt < attempts {
                        tokio::time::sleep(self.retry.backoff * attempt).await;
                    }
                }
            }
        }

        tracing::error!(
            alert = true,
            transaction_id = ?entry.transaction_id,
            reason = %entry.reason,
            attempts,
            error = %last_error,
            "Fraud log entry dropped after retries"
        );

        Err(Warning::FraudLogWriteFailed {
            transaction_id: entry.transaction_id,
            reason: last_error,
            attempts,
        })
    }
}
