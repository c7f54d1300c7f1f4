//! # Turnstile API Server
//!
//! Actix-web server that puts fixed-window rate limits in front of the
//! auth, admin and AI routes.

use std::sync::Arc;

use actix_web::{App, HttpServer, web};
use tracing_actix_web::TracingLogger;

use turnstile_core::{Clock, SystemClock};

mod background;
mod config;
mod handlers;
mod middleware;
mod state;
mod telemetry;

use background::Scheduler;
use config::AppConfig;
use state::AppState;
use telemetry::{TelemetryConfig, init_telemetry};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_telemetry(&TelemetryConfig::from_env());

    let config = AppConfig::from_env();

    tracing::info!(
        "Starting Turnstile API Server on {}:{}",
        config.host,
        config.port
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let state = AppState::new(&config, clock.clone()).await?;

    let mut scheduler = Scheduler::new().await?;
    background::sweep::register_sweep(
        &scheduler,
        state.store.clone(),
        clock,
        config.sweep_interval,
    )
    .await?;
    scheduler.start().await?;

    let limiters = state.limiters.clone();
    let trust_proxy = config.trust_proxy;

    let server = HttpServer::new(move || {
        let limiters = limiters.clone();
        App::new()
            .wrap(TracingLogger::default())
            .app_data(web::Data::new(state.clone()))
            .configure(move |cfg| handlers::configure_routes(cfg, &limiters, trust_proxy))
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await;

    if let Err(e) = scheduler.shutdown().await {
        tracing::warn!(error = %e, "Scheduler did not stop cleanly");
    }

    server?;
    Ok(())
}
