use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use crate::anomaly::{AnomalyScanner, ScanReport};
use crate::domain::{NewFraudLogEntry, TransactionFilter};
use crate::error::TicketError;
use crate::outcome::Outcome;
use crate::ports::{RepositoryError, TransactionRepository};

use super::{bounded, FraudRecorder};

/// Runs the anomaly scanner over the whole ledger.
#[derive(Clone)]
pub struct FraudScanService {
    ledger: Arc<dyn TransactionRepository>,
    recorder: FraudRecorder,
    scanner: AnomalyScanner,
    timeout: Duration,
}

impl FraudScanService {
    pub fn new(
        ledger: Arc<dyn TransactionRepository>,
        recorder: FraudRecorder,
        scanner: AnomalyScanner,
        timeout: Duration,
    ) -> Self {
        Self {
            ledger,
            recorder,
            scanner,
            timeout,
        }
    }

    pub fn default_threshold(&self) -> f64 {
        self.scanner.config().threshold
    }

    /// Score every transaction; `threshold` falls back to the configured default.
    pub async fn scan(&self, threshold: Option<f64>) -> Result<ScanReport, TicketError> {
        let threshold = threshold.unwrap_or_else(|| self.default_threshold());

        let transactions = bounded(self.timeout, self.ledger.list(&TransactionFilter::all()))
            .await
            .map_err(|e| match e {
                RepositoryError::Unavailable(msg) => TicketError::LedgerUnavailable(msg),
                other => TicketError::Internal(other.to_string()),
            })?;

        let scanner = self.scanner.clone();
        tokio::task::spawn_blocking(move || scanner.scan(&transactions, threshold))
            .await
            .map_err(|e| TicketError::Internal(format!("scan task failed: {}", e)))?
            .map_err(TicketError::from)
    }

    /// Scan and append one `statistical_outlier` entry per flagged transaction.
    pub async fn scan_and_record(
        &self,
        threshold: Option<f64>,
    ) -> Result<Outcome<ScanReport>, TicketError> {
        let report = self.scan(threshold).await?;
        let mut warnings = Vec::new();

        for flagged in &report.flagged {
            let details = json!({
                "score": flagged.score,
                "features": flagged.features,
                "threshold": report.threshold,
            });
            let entry = NewFraudLogEntry::statistical_outlier(Some(flagged.transaction_id), details);
            if let Err(warning) = self.recorder.record(entry).await {
                warnings.push(warning);
            }
        }

        if report.count > 0 {
            tracing::warn!(
                flagged = report.count,
                sample_size = report.sample_size,
                "Statistical outliers recorded"
            );
        }

        Ok(Outcome::with_warnings(report, warnings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryFraudLog, InMemoryLedger};
    use crate::anomaly::ScanConfig;
    use crate::domain::{FraudReason, NewTransaction, Transaction, TransactionUpdate};
    use crate::ports::RepositoryResult;
    use crate::services::RetryPolicy;
    use async_trait::async_trait;
    use bigdecimal::BigDecimal;
    use chrono::{DateTime, TimeZone, Utc};
    use uuid::Uuid;

    async fn seeded_ledger() -> (InMemoryLedger, Uuid) {
        let ledger = InMemoryLedger::new();
        for (i, amount) in [95, 98, 99, 100, 100, 101, 102, 103, 104, 105, 97]
            .into_iter()
            .enumerate()
        {
            let created_at = Utc.with_ymd_and_hms(2024, 5, 4, 18 + (i as u32 % 3), 0, 0).unwrap();
            let tx = NewTransaction::completed(i as i64, 1, BigDecimal::from(amount), "INR".to_string())
                .into_transaction(Uuid::new_v4(), created_at);
            ledger.insert(tx).await;
        }

        let outlier = NewTransaction::completed(99, 1, BigDecimal::from(100_000), "INR".to_string())
            .into_transaction(
                Uuid::new_v4(),
                Utc.with_ymd_and_hms(2024, 5, 4, 19, 0, 0).unwrap(),
            );
        let outlier_id = outlier.id;
        ledger.insert(outlier).await;

        (ledger, outlier_id)
    }

    fn service(ledger: InMemoryLedger, fraud_log: InMemoryFraudLog) -> FraudScanService {
        let timeout = Duration::from_secs(1);
        FraudScanService::new(
            Arc::new(ledger),
            FraudRecorder::new(Arc::new(fraud_log), RetryPolicy::default(), timeout),
            AnomalyScanner::new(ScanConfig::default()),
            timeout,
        )
    }

    #[tokio::test]
    async fn flags_and_records_the_outlier() {
        let (ledger, outlier_id) = seeded_ledger().await;
        let fraud_log = InMemoryFraudLog::new();
        let service = service(ledger, fraud_log.clone());

        let outcome = service.scan_and_record(None).await.unwrap();
        assert!(!outcome.has_warnings());
        assert!(outcome
            .value
            .flagged
            .iter()
            .any(|f| f.transaction_id == outlier_id));

        let entries = fraud_log.entries().await;
        assert_eq!(entries.len(), outcome.value.count);
        assert!(entries
            .iter()
            .all(|e| e.reason == FraudReason::StatisticalOutlier));
    }

    /// Ledger whose `list` always fails with the given error.
    struct FailingLedger(fn() -> RepositoryError);

    #[async_trait]
    impl TransactionRepository for FailingLedger {
        async fn create(&self, _new: &NewTransaction) -> RepositoryResult<Transaction> {
            Err((self.0)())
        }

        async fn get_by_id(&self, _id: Uuid) -> RepositoryResult<Transaction> {
            Err((self.0)())
        }

        async fn update(&self, _id: Uuid, _update: &TransactionUpdate) -> RepositoryResult<Transaction> {
            Err((self.0)())
        }

        async fn mark_used(
            &self,
            _id: Uuid,
            _used_at: DateTime<Utc>,
        ) -> RepositoryResult<Option<Transaction>> {
            Err((self.0)())
        }

        async fn list(&self, _filter: &TransactionFilter) -> RepositoryResult<Vec<Transaction>> {
            Err((self.0)())
        }
    }

    fn scan_service_over(ledger: FailingLedger) -> FraudScanService {
        let timeout = Duration::from_secs(1);
        FraudScanService::new(
            Arc::new(ledger),
            FraudRecorder::new(Arc::new(InMemoryFraudLog::new()), RetryPolicy::default(), timeout),
            AnomalyScanner::new(ScanConfig::default()),
            timeout,
        )
    }

    #[tokio::test]
    async fn malformed_row_is_not_reported_as_outage() {
        let service = scan_service_over(FailingLedger(|| {
            RepositoryError::InvalidRow("unknown transaction status 'refunded'".to_string())
        }));

        let err = service.scan(None).await.unwrap_err();
        assert!(matches!(err, TicketError::Internal(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn unreachable_ledger_is_retryable() {
        let service = scan_service_over(FailingLedger(|| {
            RepositoryError::Unavailable("connection refused".to_string())
        }));

        let err = service.scan(None).await.unwrap_err();
        assert!(matches!(err, TicketError::LedgerUnavailable(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn empty_ledger_is_insufficient_data() {
        let service = service(InMemoryLedger::new(), InMemoryFraudLog::new());
        let report = service.scan(None).await.unwrap();
        assert!(report.insufficient_data);
        assert!(report.flagged.is_empty());
    }
}
