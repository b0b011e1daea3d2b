pub mod adapters;
pub mod anomaly;
pub mod cli;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod outcome;
pub mod ports;
pub mod secrets;
pub mod services;
pub mod signing;
pub mod utils;
pub mod validation;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;

use crate::anomaly::AnomalyScanner;
use crate::config::Config;
use crate::ports::{FraudLogStore, TransactionRepository};
use crate::services::{FraudRecorder, FraudScanService, RedemptionStateMachine, TicketService};
use crate::signing::Signer;

/// Everything a request handler needs, built once at startup and injected.
#[derive(Clone)]
pub struct AppState {
    pub tickets: TicketService,
    pub fraud_scan: Arc<FraudScanService>,
    pub ledger: Arc<dyn TransactionRepository>,
    pub fraud_log: Arc<dyn FraudLogStore>,
    pub admin_api_key: Arc<str>,
    pub ledger_timeout: Duration,
    pub log_request_body: bool,
}

impl AppState {
    pub fn build(
        config: &Config,
        signer: Signer,
        ledger: Arc<dyn TransactionRepository>,
        fraud_log: Arc<dyn FraudLogStore>,
    ) -> Self {
        let timeout = config.ledger_timeout;
        let recorder = FraudRecorder::new(fraud_log.clone(), config.fraud_log_retry, timeout);
        let redemption = RedemptionStateMachine::new(ledger.clone(), recorder.clone(), timeout);
        let tickets = TicketService::new(ledger.clone(), signer, redemption, timeout);
        let fraud_scan = Arc::new(FraudScanService::new(
            ledger.clone(),
            recorder,
            AnomalyScanner::new(config.scan),
            timeout,
        ));

        Self {
            tickets,
            fraud_scan,
            ledger,
            fraud_log,
            admin_api_key: Arc::from(config.admin_api_key.as_str()),
            ledger_timeout: timeout,
            log_request_body: config.log_request_body,
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    let admin_routes = Router::new()
        .route("/admin/fraud/scan", get(handlers::fraud::scan))
        .route("/admin/fraud/log", get(handlers::fraud::fraud_log))
        .route_layer(axum_middleware::from_fn_with_state(
            state.admin_api_key.clone(),
            middleware::auth::admin_auth,
        ));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/purchase", post(handlers::tickets::purchase))
        .route("/tickets/verify", post(handlers::tickets::verify_ticket))
        .route("/transactions/:id", get(handlers::tickets::get_transaction))
        .merge(admin_routes)
        .layer(axum_middleware::from_fn_with_state(
            state.log_request_body,
            middleware::request_logger::request_logger_middleware,
        ))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
