use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::anomaly::ScanReport;
use crate::domain::FraudLogEntry;
use crate::error::AppError;
use crate::outcome::{Outcome, Warning};
use crate::services::bounded;
use crate::AppState;

const DEFAULT_LOG_LIMIT: i64 = 50;
const MAX_LOG_LIMIT: i64 = 500;

#[derive(Debug, Deserialize)]
pub struct ScanParams {
    pub threshold: Option<f64>,
    #[serde(default)]
    pub record: bool,
}

#[derive(Debug, Serialize)]
pub struct ScanResponse {
    #[serde(flatten)]
    pub report: ScanReport,
    pub warnings: Vec<Warning>,
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn scan(
    State(state): State<AppState>,
    Query(params): Query<ScanParams>,
) -> Result<Json<ScanResponse>, AppError> {
    let Outcome { value, warnings } = if params.record {
        state.fraud_scan.scan_and_record(params.threshold).await?
    } else {
        Outcome::clean(state.fraud_scan.scan(params.threshold).await?)
    };

    Ok(Json(ScanResponse {
        report: value,
        warnings,
    }))
}

pub async fn fraud_log(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Vec<FraudLogEntry>>, AppError> {
    let limit = pagination
        .limit
        .unwrap_or(DEFAULT_LOG_LIMIT)
        .clamp(1, MAX_LOG_LIMIT);
    let offset = pagination.offset.unwrap_or(0).max(0);

    let entries = bounded(state.ledger_timeout, state.fraud_log.list(limit, offset)).await?;
    Ok(Json(entries))
}
