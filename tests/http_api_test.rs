use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use turnstile_core::adapters::{InMemoryFraudLog, InMemoryLedger};
use turnstile_core::anomaly::ScanConfig;
use turnstile_core::config::{Config, LogFormat, SecretSource};
use turnstile_core::services::RetryPolicy;
use turnstile_core::signing::{Signer, SigningSecret};
use turnstile_core::{create_app, AppState};

const ADMIN_KEY: &str = "test-admin-key";

fn test_config() -> Config {
    Config {
        server_port: 3000,
        database_url: None,
        signing_secret_source: SecretSource::Env,
        signing_secret: Some(SigningSecret::new("http-test-secret")),
        admin_api_key: ADMIN_KEY.to_string(),
        scan: ScanConfig::default(),
        ledger_timeout: Duration::from_secs(1),
        fraud_log_retry: RetryPolicy::default(),
        fraud_scan_schedule: None,
        log_format: LogFormat::Text,
        log_request_body: true,
    }
}

fn app() -> Router {
    let config = test_config();
    let state = AppState::build(
        &config,
        Signer::new(SigningSecret::new("http-test-secret")),
        Arc::new(InMemoryLedger::new()),
        Arc::new(InMemoryFraudLog::new()),
    );
    create_app(state)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn admin_get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("Authorization", format!("Bearer {}", ADMIN_KEY))
        .body(Body::empty())
        .unwrap()
}

async fn purchase(app: &Router, amount: f64) -> Value {
    let (status, body) = send(
        app,
        post_json(
            "/purchase",
            json!({ "user_id": 42, "event_id": 9, "amount": amount }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body
}

#[tokio::test]
async fn test_health_reports_ledger() {
    let app = app();
    let (status, body) = send(&app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["ledger"], "connected");
}

#[tokio::test]
async fn test_purchase_then_verify_once() {
    let app = app();
    let purchased = purchase(&app, 250.0).await;

    let ticket = purchased["signed_ticket"].as_str().unwrap().to_string();
    assert_eq!(purchased["transaction"]["status"], "completed");
    assert_eq!(purchased["transaction"]["currency"], "INR");
    assert_eq!(purchased["warnings"], json!([]));
    assert_eq!(purchased["payload"]["user_id"], 42);

    let (status, body) = send(
        &app,
        post_json("/tickets/verify", json!({ "signed_ticket": ticket })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["transaction"]["status"], "used");

    let (status, body) = send(
        &app,
        post_json("/tickets/verify", json!({ "signed_ticket": ticket })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["status"], 409);

    let (status, log) = send(&app, admin_get("/admin/fraud/log")).await;
    assert_eq!(status, StatusCode::OK);
    let entries = log.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["reason"], "duplicate_use");
}

#[tokio::test]
async fn test_verify_rejects_tampered_and_garbage_tokens() {
    let app = app();
    let purchased = purchase(&app, 80.0).await;
    let ticket = purchased["signed_ticket"].as_str().unwrap();
    let (encoded, _) = ticket.rsplit_once('.').unwrap();
    let forged = format!("{}.{}", encoded, "0".repeat(64));

    let (status, _) = send(
        &app,
        post_json("/tickets/verify", json!({ "signed_ticket": forged })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        post_json("/tickets/verify", json!({ "signed_ticket": "not-a-ticket" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let id = purchased["transaction"]["id"].as_str().unwrap();
    let (_, tx) = send(&app, get(&format!("/transactions/{}", id))).await;
    assert_eq!(tx["status"], "completed");
}

#[tokio::test]
async fn test_purchase_validation() {
    let app = app();

    let (status, _) = send(
        &app,
        post_json(
            "/purchase",
            json!({ "user_id": 1, "event_id": 1, "amount": -5 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        post_json(
            "/purchase",
            json!({ "user_id": 1, "event_id": 1, "amount": 5, "currency": "dollars" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_transaction() {
    let app = app();
    let purchased = purchase(&app, 120.0).await;
    let id = purchased["transaction"]["id"].as_str().unwrap();

    let (status, body) = send(&app, get(&format!("/transactions/{}", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], id);
    assert_eq!(body["signed_ticket"], purchased["signed_ticket"]);

    let (status, _) = send(&app, get("/transactions/not-a-uuid")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        get("/transactions/00000000-0000-4000-8000-000000000000"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_routes_require_key() {
    let app = app();

    let (status, _) = send(&app, get("/admin/fraud/scan")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .uri("/admin/fraud/log")
        .header("x-api-key", "wrong")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_scan_flags_and_records_outlier() {
    let app = app();

    let (status, body) = send(&app, admin_get("/admin/fraud/scan")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["insufficient_data"], true);
    assert_eq!(body["count"], 0);

    for amount in [95.0, 97.0, 98.0, 99.0, 100.0, 100.0, 101.0, 102.0, 103.0, 104.0, 105.0] {
        purchase(&app, amount).await;
    }
    let outlier = purchase(&app, 100_000.0).await;
    let outlier_id = outlier["transaction"]["id"].clone();

    let (status, body) = send(&app, admin_get("/admin/fraud/scan?record=true")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sample_size"], 12);
    let flagged = body["flagged"].as_array().unwrap();
    assert!(flagged.iter().any(|f| f["transaction_id"] == outlier_id));

    let (_, log) = send(&app, admin_get("/admin/fraud/log?limit=100")).await;
    let entries = log.as_array().unwrap();
    assert_eq!(entries.len(), flagged.len());
    assert!(entries
        .iter()
        .all(|e| e["reason"] == "statistical_outlier"));
}

#[tokio::test]
async fn test_admin_scan_rejects_non_finite_threshold() {
    let app = app();
    let (status, _) = send(&app, admin_get("/admin/fraud/scan?threshold=NaN")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
