pub mod fraud;
pub mod tickets;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::services::bounded;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub ledger: String,
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let ledger_ok = bounded(state.ledger_timeout, state.ledger.ping()).await.is_ok();

    let health_response = HealthStatus {
        status: if ledger_ok { "healthy" } else { "unhealthy" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        ledger: if ledger_ok { "connected" } else { "disconnected" }.to_string(),
    };

    // Return 503 if the ledger is down, 200 otherwise
    let status_code = if ledger_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(health_response))
}
