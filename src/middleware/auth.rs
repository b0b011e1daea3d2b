use axum::{
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::error::AppError;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Guards admin routes. Accepts `Authorization: Bearer <key>` or `x-api-key: <key>`.
pub async fn admin_auth<B>(
    State(admin_api_key): State<Arc<str>>,
    req: Request<B>,
    next: Next<B>,
) -> Result<Response, AppError> {
    let headers = req.headers();

    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));
    let api_key = headers.get(API_KEY_HEADER).and_then(|h| h.to_str().ok());

    let authorized = bearer.or(api_key).map(|key| key == &*admin_api_key);

    match authorized {
        Some(true) => Ok(next.run(req).await),
        Some(false) => {
            tracing::warn!(uri = %req.uri(), "Rejected admin request with invalid API key");
            Err(AppError::Unauthorized("invalid API key".to_string()))
        }
        None => Err(AppError::Unauthorized("missing API key".to_string())),
    }
}
