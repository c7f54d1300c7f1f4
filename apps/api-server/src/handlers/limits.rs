//! Policy introspection.

use actix_web::{HttpResponse, web};

use turnstile_shared::ApiResponse;
use turnstile_shared::dto::PolicySummary;

use crate::state::AppState;

/// GET /api/limits
pub async fn list_limits(state: web::Data<AppState>) -> HttpResponse {
    let policies: Vec<PolicySummary> = state
        .limiters
        .iter()
        .map(|(named, limiter)| PolicySummary {
            name: named.name().to_string(),
            window_secs: limiter.window().as_secs(),
            max_requests: limiter.max_requests(),
            key: named.key_template().to_string(),
            message: limiter.message().to_string(),
        })
        .collect();

    HttpResponse::Ok().json(ApiResponse::ok(policies))
}
