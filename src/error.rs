use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::TransactionStatus;
use crate::ports::RepositoryError;
use crate::signing::SigningError;
use crate::validation::ValidationError;

/// Failures of the ticket issue / redeem protocol.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TicketError {
    #[error("Malformed token: {0}")]
    MalformedToken(String),

    #[error("Ticket signature mismatch")]
    SignatureMismatch,

    #[error("Transaction {0} not found")]
    TransactionNotFound(Uuid),

    #[error("Transaction {transaction_id} is {status} and cannot be redeemed")]
    TransactionNotRedeemable {
        transaction_id: Uuid,
        status: TransactionStatus,
    },

    #[error("Transaction {transaction_id} is {status}; tickets are only issued for completed transactions")]
    NotIssuable {
        transaction_id: Uuid,
        status: TransactionStatus,
    },

    #[error("Ticket for transaction {transaction_id} was already used")]
    AlreadyRedeemed {
        transaction_id: Uuid,
        fraud_logged: bool,
    },

    #[error("Ledger unavailable: {0}")]
    LedgerUnavailable(String),

    /// The redemption write may or may not have committed and the follow-up
    /// read failed too. Check the transaction before trying again.
    #[error("Redemption of transaction {transaction_id} could not be confirmed: {reason}")]
    RedemptionOutcomeUnknown {
        transaction_id: Uuid,
        reason: String,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TicketError {
    /// Only ledger unavailability may be retried. Signature and format failures
    /// indicate forgery or corruption.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TicketError::LedgerUnavailable(_))
    }

    /// Map a ledger error for a lookup of `id`.
    pub fn from_repository(id: Uuid, err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(_) => TicketError::TransactionNotFound(id),
            RepositoryError::Unavailable(msg) => TicketError::LedgerUnavailable(msg),
            RepositoryError::InvalidRow(msg) => TicketError::Internal(msg),
        }
    }
}

impl From<SigningError> for TicketError {
    fn from(err: SigningError) -> Self {
        match err {
            SigningError::MalformedToken(msg) => TicketError::MalformedToken(msg),
            SigningError::SignatureMismatch => TicketError::SignatureMismatch,
            SigningError::InvalidKey => TicketError::Internal(err.to_string()),
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Ticket(#[from] TicketError),

    #[error("Store error: {0}")]
    Store(#[from] RepositoryError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Ticket(err) => match err {
                TicketError::MalformedToken(_) | TicketError::Validation(_) => {
                    StatusCode::BAD_REQUEST
                }
                TicketError::SignatureMismatch => StatusCode::UNAUTHORIZED,
                TicketError::TransactionNotFound(_) => StatusCode::NOT_FOUND,
                TicketError::TransactionNotRedeemable { .. }
                | TicketError::NotIssuable { .. }
                | TicketError::AlreadyRedeemed { .. } => StatusCode::CONFLICT,
                TicketError::LedgerUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                TicketError::RedemptionOutcomeUnknown { .. } | TicketError::Internal(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            AppError::Store(RepositoryError::NotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Store(RepositoryError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Store(RepositoryError::InvalidRow(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}
