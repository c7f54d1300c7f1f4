//! HTTP handlers and route configuration.

mod gate;
mod health;
mod limits;

use actix_web::web;

use turnstile_core::NamedLimiter;

use crate::middleware::rate_limit::RateLimit;
use crate::state::Limiters;

/// Configure all application routes.
///
/// The general API limiter covers the whole `/api` scope; gated routes are
/// counted by it and by their own limiter.
pub fn configure_routes(cfg: &mut web::ServiceConfig, limiters: &Limiters, trust_proxy: bool) {
    let limit = |named: NamedLimiter| RateLimit::new(limiters.get(named)).trust_proxy(trust_proxy);

    cfg.service(
        web::scope("/api")
            .wrap(limit(NamedLimiter::Api))
            // Public routes
            .route("/health", web::get().to(health::health_check))
            .route("/limits", web::get().to(limits::list_limits))
            // Auth routes
            .service(
                web::scope("/auth")
                    .service(
                        web::resource("/send-otp")
                            .wrap(limit(NamedLimiter::Otp))
                            .route(web::post().to(gate::accepted)),
                    )
                    .service(
                        web::resource("/login")
                            .wrap(limit(NamedLimiter::Login))
                            .route(web::post().to(gate::accepted)),
                    )
                    .service(
                        web::resource("/register")
                            .wrap(limit(NamedLimiter::Registration))
                            .route(web::post().to(gate::accepted)),
                    )
                    .service(
                        web::resource("/forgot-password")
                            .wrap(limit(NamedLimiter::PasswordReset))
                            .route(web::post().to(gate::accepted)),
                    ),
            )
            // Admin routes
            .service(
                web::scope("/admin")
                    .service(
                        web::resource("/send-otp")
                            .wrap(limit(NamedLimiter::AdminOtp))
                            .route(web::post().to(gate::accepted)),
                    )
                    .service(
                        web::resource("/login")
                            .wrap(limit(NamedLimiter::AdminLogin))
                            .route(web::post().to(gate::accepted)),
                    )
                    .service(
                        web::resource("/ai/chat")
                            .wrap(limit(NamedLimiter::AiChatbot))
                            .route(web::post().to(gate::accepted)),
                    ),
            )
            .service(
                web::resource("/account/sensitive")
                    .wrap(limit(NamedLimiter::SensitiveOperation))
                    .route(web::post().to(gate::accepted)),
            ),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use actix_web::http::StatusCode;
    use actix_web::{App, test};

    use turnstile_core::ManualClock;

    use crate::config::AppConfig;
    use crate::state::AppState;

    async fn app_state() -> AppState {
        let config = AppConfig::from_lookup(|_| None);
        AppState::new(&config, Arc::new(ManualClock::new(0)))
            .await
            .unwrap()
    }

    #[actix_web::test]
    async fn test_password_reset_route_is_limited() {
        let state = app_state().await;
        let limiters = state.limiters.clone();

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(|cfg| configure_routes(cfg, &limiters, false)),
        )
        .await;

        let send = || {
            test::TestRequest::post()
                .uri("/api/auth/forgot-password")
                .peer_addr("10.0.0.7:5000".parse().unwrap())
                .set_json(serde_json::json!({ "email": "reset@x.com" }))
                .to_request()
        };

        for expected in ["2", "1", "0"] {
            let res = test::call_service(&app, send()).await;
            assert_eq!(res.status(), StatusCode::OK);
            // The route-level limiter's headers win over the scope-level ones.
            assert_eq!(res.headers().get("x-ratelimit-limit").unwrap(), "3");
            assert_eq!(res.headers().get("x-ratelimit-remaining").unwrap(), expected);
        }

        let res = test::call_service(&app, send()).await;
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
        let body: serde_json::Value = test::read_body_json(res).await;
        assert_eq!(body["limit"], 3);
        assert_eq!(body["retryAfter"], 3600);
        assert_eq!(
            body["message"],
            "Too many password reset requests. Please try again after 1 hour."
        );
    }

    #[actix_web::test]
    async fn test_limits_and_health() {
        let state = app_state().await;
        let limiters = state.limiters.clone();

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(|cfg| configure_routes(cfg, &limiters, false)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/limits")
            .peer_addr("10.0.0.8:5000".parse().unwrap())
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        let policies = body["data"].as_array().unwrap();
        assert_eq!(policies.len(), 9);
        assert_eq!(policies[1]["name"], "login");
        assert_eq!(policies[1]["key"], "login:ip:email");
        assert_eq!(policies[1]["windowSecs"], 900);

        let req = test::TestRequest::get()
            .uri("/api/health")
            .peer_addr("10.0.0.8:5000".parse().unwrap())
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["store"], "memory");
        // One general-API key for this caller.
        assert_eq!(body["trackedKeys"], 1);
    }
}
