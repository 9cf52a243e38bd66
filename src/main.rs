mod auth;
mod booking;
mod client;
mod config;
mod middleware;

mod error;
mod models;
mod routes;

use std::{sync::Arc, time::Duration};

use crate::{
    booking::store::WizardStore, client::HttpMedtechApi, config::Config, models::AppState,
};

use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use axum::http::header;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cfg = Config::from_env()?;
    let api = HttpMedtechApi::new(&cfg.api_base_url, Duration::from_secs(cfg.http_timeout_secs))?;

    let state = AppState {
        api: Arc::new(api),
        wizards: WizardStore::new(cfg.wizard_ttl_minutes),
    };

    // Browser clients send the bearer token cross-origin; preflight must pass.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
        ]);

    let app = routes::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    tracing::info!(upstream = %cfg.api_base_url, "Listening on http://{}", cfg.bind_addr);
    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
