//! # Roadside Narrator — Binary Entrypoint
//! Boots the Axum HTTP server, wiring routes, shared state, and middleware.
//!
//! ## Endpoints
//! - `GET /health` — liveness check with version string
//! - `POST /api/story-both` — pick a nearby POI, ground a story in its facts,
//!   return text + audio (or a silent decision with a reason)
//! - `POST /api/taste/feedback`, `POST /api/taste/set` — taste profiles
//! - `GET /metrics` — Prometheus exposition

use tracing_subscriber::EnvFilter;

use roadside_narrator::bootstrap::build_state;
use roadside_narrator::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg = AppConfig::from_env();
    let port = cfg.port;
    let app = roadside_narrator::api::router(build_state(cfg));

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(port, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
