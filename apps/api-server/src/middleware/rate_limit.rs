//! Rate limiting middleware.

use actix_web::{
    Error, HttpMessage, ResponseError,
    body::EitherBody,
    dev::{Payload, Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    http::header::{self, HeaderName, HeaderValue},
    web,
};
use actix_http::BoxedPayloadStream;
use actix_http::error::PayloadError;
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use std::future::{Future, Ready, ready};
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;

use turnstile_core::{Admission, Decision, FixedWindowLimiter, RequestContext};

use crate::middleware::error::AppError;

/// Identity of the caller, inserted into request extensions by an upstream
/// authentication layer. Used by limiters keyed on the user id.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub String);

/// Rate limiting middleware factory.
///
/// ```ignore
/// web::resource("/login")
///     .wrap(RateLimit::new(limiters.get(NamedLimiter::Login)))
///     .route(web::post().to(login));
/// ```
pub struct RateLimit {
    limiter: Arc<FixedWindowLimiter>,
    trust_proxy: bool,
}

impl RateLimit {
    pub fn new(limiter: Arc<FixedWindowLimiter>) -> Self {
        Self {
            limiter,
            trust_proxy: false,
        }
    }

    /// Take the caller IP from `Forwarded` / `X-Forwarded-For` when present.
    /// Only enable behind a proxy that overwrites those headers.
    pub fn trust_proxy(mut self, trust: bool) -> Self {
        self.trust_proxy = trust;
        self
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimit
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = RateLimitMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimitMiddlewareService {
            service: Rc::new(service),
            limiter: self.limiter.clone(),
            trust_proxy: self.trust_proxy,
        }))
    }
}

pub struct RateLimitMiddlewareService<S> {
    service: Rc<S>,
    limiter: Arc<FixedWindowLimiter>,
    trust_proxy: bool,
}

impl<S, B> Service<ServiceRequest> for RateLimitMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let limiter = self.limiter.clone();
        let trust_proxy = self.trust_proxy;

        Box::pin(async move {
            let ctx = request_context(&mut req, trust_proxy, limiter.reads_body()).await;

            match limiter.check(&ctx).await {
                Ok(Decision::Rejected(rejection)) => {
                    // Rejected - return 429 without calling the inner service
                    let response = AppError::RateLimited(rejection).error_response();
                    let (http_req, _payload) = req.into_parts();
                    let srv_response = ServiceResponse::new(http_req, response);

                    Ok(srv_response.map_into_right_body())
                }
                Ok(Decision::Admitted(admission)) => {
                    let mut res = service.call(req).await?;
                    insert_rate_limit_headers(&mut res, &admission);
                    Ok(res.map_into_left_body())
                }
                Err(e) => {
                    // Store unavailable - fail open
                    tracing::error!(
                        limiter = limiter.name(),
                        error = %e,
                        "Rate limiter error, failing open"
                    );
                    let res = service.call(req).await?;
                    Ok(res.map_into_left_body())
                }
            }
        })
    }
}

/// Headers already set by an inner (route-level) limiter take precedence.
fn insert_rate_limit_headers<B>(res: &mut ServiceResponse<B>, admission: &Admission) {
    let headers = res.headers_mut();
    if headers.contains_key("x-ratelimit-limit") {
        return;
    }

    headers.insert(
        HeaderName::from_static("x-ratelimit-limit"),
        HeaderValue::from(admission.limit),
    );
    headers.insert(
        HeaderName::from_static("x-ratelimit-remaining"),
        HeaderValue::from(admission.remaining),
    );
    headers.insert(
        HeaderName::from_static("x-ratelimit-reset"),
        HeaderValue::from(admission.reset_in),
    );
}

/// Collect the key attributes of a request. Never fails: anything missing
/// renders as `unknown` in the key.
async fn request_context(
    req: &mut ServiceRequest,
    trust_proxy: bool,
    reads_body: bool,
) -> RequestContext {
    let ip = {
        let info = req.connection_info();
        let addr = if trust_proxy {
            info.realip_remote_addr()
        } else {
            info.peer_addr()
        };
        addr.map(str::to_string)
    };

    // "Bearer <token>": whatever follows the first single space, up to the next
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(' ').nth(1))
        .map(str::to_string);

    let user_id = req
        .extensions()
        .get::<AuthenticatedUser>()
        .map(|user| user.0.clone());

    let email = if reads_body { read_email(req).await } else { None };

    RequestContext {
        ip,
        email,
        user_id,
        token,
    }
}

/// Largest body inspected for an `email` field.
const EMAIL_BODY_LIMIT: usize = 256 * 1024;

#[derive(Deserialize)]
struct EmailField {
    #[serde(default)]
    email: serde_json::Value,
}

/// Render the `email` field the way it would print: strings as-is, other
/// scalars stringified, absent or null as no email.
fn email_from_json(body: &[u8]) -> Option<String> {
    let field = serde_json::from_slice::<EmailField>(body).ok()?;
    match field.email {
        serde_json::Value::Null => None,
        serde_json::Value::String(email) => Some(email),
        other => Some(other.to_string()),
    }
}

/// Read `email` from a JSON body, then put the body back for the handler.
///
/// Bodies over [`EMAIL_BODY_LIMIT`] or that fail mid-stream are not parsed.
/// Whatever was read is replayed ahead of the unread remainder either way.
async fn read_email(req: &mut ServiceRequest) -> Option<String> {
    let mut payload = req.take_payload();
    let mut chunks: Vec<Result<web::Bytes, PayloadError>> = Vec::new();
    let mut size = 0;
    let mut complete = true;

    while let Some(chunk) = payload.next().await {
        match chunk {
            Ok(bytes) => {
                size += bytes.len();
                chunks.push(Ok(bytes));
                if size > EMAIL_BODY_LIMIT {
                    complete = false;
                    break;
                }
            }
            Err(e) => {
                chunks.push(Err(e));
                complete = false;
                break;
            }
        }
    }

    let email = if complete {
        let mut body = web::BytesMut::with_capacity(size);
        for bytes in chunks.iter().flatten() {
            body.extend_from_slice(bytes);
        }
        email_from_json(&body)
    } else {
        tracing::debug!(read = size, "Request body not inspected for email");
        None
    };

    let replay: BoxedPayloadStream = Box::pin(stream::iter(chunks).chain(payload));
    req.set_payload(Payload::from(replay));
    email
}
