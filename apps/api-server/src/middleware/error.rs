//! Error responses.

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use std::fmt;

use turnstile_core::Rejection;
use turnstile_shared::{ErrorResponse, RateLimitExceededResponse};

/// Application-level error type.
///
/// Rate limit rejections keep the `{success, message, retryAfter, limit, remaining}`
/// body clients already parse; everything else is RFC 7807.
#[derive(Debug)]
pub enum AppError {
    RateLimited(Rejection),
    BadRequest(String),
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::RateLimited(rejection) => write!(
                f,
                "Rate limit exceeded for {}: retry after {}s",
                rejection.key, rejection.retry_after
            ),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            AppError::RateLimited(rejection) => HttpResponse::TooManyRequests()
                .insert_header(("Retry-After", rejection.retry_after.to_string()))
                .insert_header(("X-RateLimit-Limit", rejection.limit.to_string()))
                .insert_header(("X-RateLimit-Remaining", "0"))
                .json(RateLimitExceededResponse::new(
                    rejection.message.clone(),
                    rejection.retry_after,
                    rejection.limit,
                )),
            AppError::BadRequest(detail) => {
                HttpResponse::build(self.status_code()).json(ErrorResponse::bad_request(detail))
            }
            AppError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                HttpResponse::build(self.status_code()).json(ErrorResponse::internal_error())
            }
        }
    }
}

/// Result type alias for handlers.
pub type AppResult<T> = Result<T, AppError>;
