//! Placeholder downstream handlers.
//!
//! Each sits behind a named limiter; reaching one means the request was admitted.

use actix_web::HttpResponse;

use turnstile_shared::ApiResponse;

/// POST behind any gated route.
pub async fn accepted() -> HttpResponse {
    HttpResponse::Ok().json(ApiResponse::message("accepted"))
}
