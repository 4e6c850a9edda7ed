// src/metrics.rs
//! Prometheus exposition. The recorder is process-global and installed on
//! first use, so building the app more than once (tests do) reuses it.

use axum::{routing::get, Router};
use metrics::gauge;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::Lazy;

static RECORDER: Lazy<PrometheusHandle> = Lazy::new(|| {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("prometheus: install recorder")
});

/// Install (or reuse) the global recorder and set the startup gauges.
pub fn install(geo_cache_ttl_ms: u64) {
    Lazy::force(&RECORDER);
    gauge!("geo_cache_ttl_ms").set(geo_cache_ttl_ms as f64);
}

async fn render() -> String {
    RECORDER.render()
}

/// `/metrics` in the Prometheus exposition format.
pub fn router() -> Router {
    Router::new().route("/metrics", get(render))
}
