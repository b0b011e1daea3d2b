use bigdecimal::BigDecimal;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::domain::{NewTransaction, TicketPayload, Transaction, TransactionStatus, TransactionUpdate};
use crate::error::TicketError;
use crate::outcome::{Outcome, Warning};
use crate::ports::{RepositoryError, TransactionRepository};
use crate::signing::Signer;
use crate::validation::{
    sanitize_string, validate_currency, validate_non_negative_amount, validate_signed_ticket,
    DEFAULT_CURRENCY,
};

use super::{bounded, RedemptionStateMachine};

#[derive(Debug, Clone, Deserialize)]
pub struct PurchaseRequest {
    pub user_id: i64,
    pub event_id: i64,
    pub amount: BigDecimal,
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IssuedTicket {
    pub token: String,
    pub payload: TicketPayload,
}

#[derive(Debug, Clone, Serialize)]
pub struct Purchase {
    pub transaction: Transaction,
    pub ticket: IssuedTicket,
}

#[derive(Debug, Clone, Serialize)]
pub struct Redemption {
    pub transaction: Transaction,
    pub payload: TicketPayload,
}

/// Issues signed tickets for completed transactions and redeems them.
#[derive(Clone)]
pub struct TicketService {
    ledger: Arc<dyn TransactionRepository>,
    signer: Signer,
    redemption: RedemptionStateMachine,
    timeout: Duration,
}

impl TicketService {
    pub fn new(
        ledger: Arc<dyn TransactionRepository>,
        signer: Signer,
        redemption: RedemptionStateMachine,
        timeout: Duration,
    ) -> Self {
        Self {
            ledger,
            signer,
            redemption,
            timeout,
        }
    }

    /// Record a purchase as a completed transaction and issue its ticket.
    pub async fn purchase(&self, req: PurchaseRequest) -> Result<Outcome<Purchase>, TicketError> {
        validate_non_negative_amount(&req.amount)?;
        let currency = req
            .currency
            .as_deref()
            .map(sanitize_string)
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());
        validate_currency(&currency)?;

        let new = NewTransaction::completed(req.user_id, req.event_id, req.amount, currency);
        let transaction = bounded(self.timeout, self.ledger.create(&new))
            .await
            .map_err(|e| match e {
                RepositoryError::Unavailable(msg) => TicketError::LedgerUnavailable(msg),
                other => TicketError::Internal(other.to_string()),
            })?;

        tracing::info!(
            transaction_id = %transaction.id,
            user_id = transaction.user_id,
            event_id = transaction.event_id,
            "Purchase recorded"
        );

        let Outcome { value: ticket, warnings } = self.issue(&transaction).await?;

        let mut transaction = transaction;
        if warnings.is_empty() {
            transaction.signed_ticket = Some(ticket.token.clone());
        }

        Ok(Outcome::with_warnings(
            Purchase {
                transaction,
                ticket,
            },
            warnings,
        ))
    }

    /// Sign a ticket for `transaction` and store the token on its row.
    ///
    /// Storing the token is best-effort: the token is independently verifiable,
    /// so a failed write surfaces as [`Warning::TicketNotPersisted`] and the
    /// ticket is still returned.
    pub async fn issue(&self, transaction: &Transaction) -> Result<Outcome<IssuedTicket>, TicketError> {
        if transaction.status != TransactionStatus::Completed || transaction.used_at.is_some() {
            return Err(TicketError::NotIssuable {
                transaction_id: transaction.id,
                status: transaction.status,
            });
        }

        let payload = TicketPayload::for_transaction(transaction, Utc::now());
        let canonical = payload
            .to_canonical_json()
            .map_err(|e| TicketError::Internal(e.to_string()))?;
        let token = self.signer.sign(&canonical)?;

        let update = TransactionUpdate {
            signed_ticket: Some(token.clone()),
        };
        let warnings = match bounded(self.timeout, self.ledger.update(transaction.id, &update)).await {
            Ok(_) => {
                tracing::info!(transaction_id = %transaction.id, "Ticket issued");
                Vec::new()
            }
            Err(e) => {
                tracing::warn!(
                    transaction_id = %transaction.id,
                    error = %e,
                    "Ticket issued but not persisted on the transaction"
                );
                vec![Warning::TicketNotPersisted {
                    transaction_id: transaction.id,
                    reason: e.to_string(),
                }]
            }
        };

        Ok(Outcome::with_warnings(IssuedTicket { token, payload }, warnings))
    }

    /// Check a token's signature and decode its payload. Never touches the ledger.
    pub fn verify(&self, token: &str) -> Result<TicketPayload, TicketError> {
        validate_signed_ticket(token).map_err(|e| TicketError::MalformedToken(e.to_string()))?;

        let bytes = self.signer.verify(token)?;
        TicketPayload::from_json(&bytes)
            .map_err(|e| TicketError::MalformedToken(format!("invalid payload: {}", e)))
    }

    /// Verify `token` and consume the ticket it names.
    pub async fn redeem(&self, token: &str) -> Result<Redemption, TicketError> {
        let payload = match self.verify(token) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(error = %e, "Rejected ticket at redemption");
                return Err(e);
            }
        };

        let evidence =
            serde_json::to_value(&payload).map_err(|e| TicketError::Internal(e.to_string()))?;
        let transaction = self.redemption.redeem(payload.transaction_id, evidence).await?;

        Ok(Redemption {
            transaction,
            payload,
        })
    }

    pub async fn get_transaction(&self, id: Uuid) -> Result<Transaction, TicketError> {
        bounded(self.timeout, self.ledger.get_by_id(id))
            .await
            .map_err(|e| TicketError::from_repository(id, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryFraudLog, InMemoryLedger};
    use crate::services::{FraudRecorder, RetryPolicy};
    use crate::signing::SigningSecret;

    fn service() -> (TicketService, InMemoryLedger, InMemoryFraudLog) {
        let ledger = InMemoryLedger::new();
        let fraud_log = InMemoryFraudLog::new();
        let timeout = Duration::from_secs(1);
        let recorder = FraudRecorder::new(Arc::new(fraud_log.clone()), RetryPolicy::default(), timeout);
        let redemption = RedemptionStateMachine::new(Arc::new(ledger.clone()), recorder, timeout);
        let service = TicketService::new(
            Arc::new(ledger.clone()),
            Signer::new(SigningSecret::new("unit-test-secret")),
            redemption,
            timeout,
        );
        (service, ledger, fraud_log)
    }

    fn request(amount: i64) -> PurchaseRequest {
        PurchaseRequest {
            user_id: 42,
            event_id: 9,
            amount: BigDecimal::from(amount),
            currency: None,
        }
    }

    #[tokio::test]
    async fn purchase_issues_verifiable_ticket() {
        let (service, ledger, _) = service();
        let outcome = service.purchase(request(250)).await.unwrap();
        assert!(!outcome.has_warnings());

        let purchase = outcome.value;
        assert_eq!(purchase.transaction.currency, "INR");
        assert_eq!(purchase.transaction.status, TransactionStatus::Completed);

        let stored = ledger.get_by_id(purchase.transaction.id).await.unwrap();
        assert_eq!(stored.signed_ticket.as_deref(), Some(purchase.ticket.token.as_str()));

        let payload = service.verify(&purchase.ticket.token).unwrap();
        assert_eq!(payload, purchase.ticket.payload);
        assert_eq!(payload.transaction_id, purchase.transaction.id);
    }

    #[tokio::test]
    async fn purchase_rejects_negative_amount_and_bad_currency() {
        let (service, ledger, _) = service();

        let err = service.purchase(request(-1)).await.unwrap_err();
        assert!(matches!(err, TicketError::Validation(_)));

        let mut req = request(10);
        req.currency = Some("rupees".to_string());
        let err = service.purchase(req).await.unwrap_err();
        assert!(matches!(err, TicketError::Validation(_)));

        assert!(ledger.is_empty().await);
    }

    #[tokio::test]
    async fn issue_requires_completed_status() {
        let (service, ledger, _) = service();
        let pending = NewTransaction {
            status: TransactionStatus::Pending,
            ..NewTransaction::completed(1, 1, BigDecimal::from(5), "INR".to_string())
        }
        .into_transaction(Uuid::new_v4(), Utc::now());
        ledger.insert(pending.clone()).await;

        let err = service.issue(&pending).await.unwrap_err();
        assert!(matches!(err, TicketError::NotIssuable { .. }));
    }

    #[tokio::test]
    async fn redeem_consumes_once() {
        let (service, _, fraud_log) = service();
        let token = service.purchase(request(100)).await.unwrap().value.ticket.token;

        let first = service.redeem(&token).await.unwrap();
        assert_eq!(first.transaction.status, TransactionStatus::Used);
        assert!(first.transaction.used_at.is_some());

        let second = service.redeem(&token).await.unwrap_err();
        assert!(matches!(
            second,
            TicketError::AlreadyRedeemed {
                fraud_logged: true,
                ..
            }
        ));
        assert_eq!(fraud_log.entries().await.len(), 1);
    }

    #[tokio::test]
    async fn forged_token_never_reaches_ledger() {
        let (service, ledger, _) = service();
        let token = service.purchase(request(100)).await.unwrap().value.ticket.token;
        let (encoded, _) = token.rsplit_once('.').unwrap();
        let forged = format!("{}.{}", encoded, "0".repeat(64));

        assert_eq!(
            service.redeem(&forged).await.unwrap_err(),
            TicketError::SignatureMismatch
        );

        let stored = ledger.list(&Default::default()).await.unwrap();
        assert_eq!(stored[0].status, TransactionStatus::Completed);
    }

    #[test]
    fn verify_rejects_payload_with_unknown_fields() {
        let (service, _, _) = service();
        let token = service
            .signer
            .sign(br#"{"event_id":1,"extra":true,"issued_at":"2024-05-01T18:30:00Z","transaction_id":"6f1c2b9e-7a41-4f0e-9a53-0c9e4b7d2a10","user_id":2}"#)
            .unwrap();

        assert!(matches!(
            service.verify(&token),
            Err(TicketError::MalformedToken(_))
        ));
    }
}
