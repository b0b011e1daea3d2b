use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{TicketPayload, Transaction};
use crate::error::AppError;
use crate::outcome::{Outcome, Warning};
use crate::services::PurchaseRequest;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct PurchaseResponse {
    pub transaction: Transaction,
    pub signed_ticket: String,
    pub payload: TicketPayload,
    pub warnings: Vec<Warning>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyTicketRequest {
    pub signed_ticket: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyTicketResponse {
    pub ok: bool,
    pub transaction: Transaction,
}

pub async fn purchase(
    State(state): State<AppState>,
    Json(req): Json<PurchaseRequest>,
) -> Result<impl IntoResponse, AppError> {
    let Outcome { value, warnings } = state.tickets.purchase(req).await?;

    Ok((
        StatusCode::CREATED,
        Json(PurchaseResponse {
            transaction: value.transaction,
            signed_ticket: value.ticket.token,
            payload: value.ticket.payload,
            warnings,
        }),
    ))
}

/// Redeems the ticket: a valid token is accepted at the gate exactly once.
pub async fn verify_ticket(
    State(state): State<AppState>,
    Json(req): Json<VerifyTicketRequest>,
) -> Result<Json<VerifyTicketResponse>, AppError> {
    let redemption = state.tickets.redeem(req.signed_ticket.trim()).await?;

    Ok(Json(VerifyTicketResponse {
        ok: true,
        transaction: redemption.transaction,
    }))
}

pub async fn get_transaction(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Transaction>, AppError> {
    let id = Uuid::parse_str(&id)
        .map_err(|_| AppError::BadRequest(format!("invalid transaction id '{}'", id)))?;

    Ok(Json(state.tickets.get_transaction(id).await?))
}
