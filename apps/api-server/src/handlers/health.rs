//! Health check endpoint.

use actix_web::{HttpResponse, web};

use turnstile_shared::dto::HealthResponse;

use crate::middleware::error::{AppError, AppResult};
use crate::state::AppState;

/// Health check endpoint - returns server and store status.
///
/// GET /api/health
pub async fn health_check(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let tracked_keys = state
        .store
        .len()
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    let response = HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        store: state.store.backend().to_string(),
        tracked_keys: Some(tracked_keys),
    };

    Ok(HttpResponse::Ok().json(response))
}
