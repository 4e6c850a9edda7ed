// src/api.rs
//! HTTP API layer: request normalization (field aliases, language codes,
//! user-key resolution), the decision endpoint, taste endpoints, health and
//! metrics. Always 200 on orchestrator completion; non-200 only for
//! transport/validation failures and terminal collaborator errors.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::Extension,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::info;

use crate::config::{normalize_lang, AppConfig};
use crate::decision::{reason, PoiSummary};
use crate::geo;
use crate::llm::upstream_status;
use crate::metrics;
use crate::orchestrator::{Orchestrator, StoryRequest};
use crate::taste::{TasteFeedback, TasteStore};

pub const VERSION: &str = concat!("roadside-narrator ", env!("CARGO_PKG_VERSION"));

/// Shared state injected into handlers via `Extension`.
#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<Orchestrator>,
    pub tastes: Arc<TasteStore>,
    pub cfg: AppConfig,
}

/// Build the Router from an already-wired state.
pub fn router(state: ApiState) -> Router {
    metrics::install(state.cfg.geo_cache_ttl_ms);
    let cors = cors_layer(&state.cfg.cors_allow_origins);

    Router::new()
        .route("/health", get(health))
        .route("/api/story-both", post(story_both))
        .route("/api/taste/feedback", post(taste_feedback))
        .route("/api/taste/set", post(taste_set))
        .merge(metrics::router())
        .layer(cors)
        .layer(Extension(Arc::new(state)))
}

fn cors_layer(allow_origins: &str) -> CorsLayer {
    if allow_origins.trim() == "*" {
        return CorsLayer::very_permissive();
    }
    let origins: Vec<HeaderValue> = allow_origins
        .split(',')
        .filter_map(|o| HeaderValue::from_str(o.trim()).ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
}

// Dev logging gate: NARRATOR_DEV_LOG=1.
fn dev_logging_enabled() -> bool {
    std::env::var("NARRATOR_DEV_LOG").ok().as_deref() == Some("1")
}

/// Short anonymized id for a user key; raw keys never reach the log.
fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{b:02x}");
    }
    out
}

/// Transport/validation error body: `{error, details?}`.
struct ApiError {
    status: StatusCode,
    error: &'static str,
    details: Option<String>,
}

impl ApiError {
    fn bad_request(error: &'static str) -> Self {
        Self { status: StatusCode::BAD_REQUEST, error, details: None }
    }

    fn upstream(error: &'static str, source: &anyhow::Error) -> Self {
        let status = upstream_status(source)
            .and_then(|code| StatusCode::from_u16(code).ok())
            .filter(|s| s.is_client_error() || s.is_server_error())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self {
            status,
            error,
            details: Some(format!("{source:#}").chars().take(512).collect()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct Body {
            error: &'static str,
            #[serde(skip_serializing_if = "Option::is_none")]
            details: Option<String>,
        }
        (self.status, Json(Body { error: self.error, details: self.details })).into_response()
    }
}

async fn health() -> &'static str {
    VERSION
}

/// Decision endpoint request. Coordinate and language fields tolerate the
/// client aliases seen in the wild; everything else (including the legacy
/// `prompt` field) is ignored.
#[derive(Debug, Deserialize)]
struct StoryBothRequest {
    #[serde(default, alias = "latitude", alias = "Latitude")]
    lat: Option<f64>,
    #[serde(default, alias = "lon", alias = "longitude", alias = "Longitude")]
    lng: Option<f64>,
    #[serde(default, alias = "language", alias = "locale", alias = "speechLang")]
    lang: Option<String>,
    #[serde(default, rename = "userId")]
    user_id: Option<String>,
    #[serde(default, rename = "tasteProfileId")]
    taste_profile_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AudioEnvelope {
    content_type: String,
    base64: String,
    bytes: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StoryBothResponse {
    should_speak: bool,
    reason: String,
    poi: Option<PoiSummary>,
    facts: Vec<String>,
    text: String,
    story_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    audio_base64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    audio_content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    audio: Option<AudioEnvelope>,
    #[serde(skip_serializing_if = "Option::is_none")]
    distance_meters_approx: Option<u32>,
    lang: String,
    version: &'static str,
    timing_ms: u64,
}

/// Explicit identifier first, then the forwarded client address, then anon.
fn resolve_user_key(body_user_id: Option<&str>, headers: &HeaderMap) -> String {
    if let Some(id) = body_user_id.map(str::trim).filter(|s| !s.is_empty()) {
        return id.to_string();
    }
    if let Some(id) = headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        return id.to_string();
    }
    if let Some(addr) = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        return addr.to_string();
    }
    "anon".to_string()
}

async fn story_both(
    Extension(state): Extension<Arc<ApiState>>,
    headers: HeaderMap,
    Json(body): Json<StoryBothRequest>,
) -> Result<Json<StoryBothResponse>, ApiError> {
    let t0 = Instant::now();

    let (Some(lat), Some(lng)) = (body.lat, body.lng) else {
        return Err(ApiError::bad_request(reason::LOCATION_MISSING));
    };
    if !geo::valid_coords(lat, lng) {
        return Err(ApiError::bad_request(reason::LOCATION_MISSING));
    }

    let lang = normalize_lang(body.lang.as_deref().unwrap_or("en"));
    let user_key = resolve_user_key(body.user_id.as_deref(), &headers);

    let req = StoryRequest {
        lat,
        lng,
        lang: lang.clone(),
        user_key: user_key.clone(),
        taste_profile_id: body.taste_profile_id.clone(),
    };

    if dev_logging_enabled() {
        info!(
            target: "narrator",
            user = %anon_hash(&user_key),
            lang = %lang,
            "decision request"
        );
    }

    let result = state
        .orchestrator
        .narrate(&req)
        .await
        .map_err(|e| ApiError::upstream("narration_failed", &e))?;

    let audio = result.audio.map(|a| {
        use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
        AudioEnvelope {
            base64: BASE64_STANDARD.encode(&a.bytes),
            bytes: a.bytes.len(),
            content_type: a.content_type,
        }
    });

    let d = result.decision;
    Ok(Json(StoryBothResponse {
        should_speak: d.should_speak,
        reason: d.reason,
        poi: d.poi,
        facts: d.facts,
        text: d.story_text.clone(),
        story_text: d.story_text,
        audio_base64: audio.as_ref().map(|a| a.base64.clone()),
        audio_content_type: audio.as_ref().map(|a| a.content_type.clone()),
        audio,
        distance_meters_approx: d.distance_meters_approx,
        lang,
        version: VERSION,
        timing_ms: t0.elapsed().as_millis() as u64,
    }))
}

/// Taste endpoints accept either id; the profile id wins over the user id.
#[derive(Debug, Deserialize)]
struct TasteRequest {
    #[serde(default, rename = "userId")]
    user_id: Option<String>,
    #[serde(default, rename = "tasteProfileId")]
    taste_profile_id: Option<String>,
    #[serde(flatten)]
    feedback: TasteFeedback,
}

fn taste_key(req: &TasteRequest) -> String {
    req.taste_profile_id
        .clone()
        .or_else(|| req.user_id.clone())
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "anon".to_string())
}

async fn taste_feedback(
    Extension(state): Extension<Arc<ApiState>>,
    Json(body): Json<TasteRequest>,
) -> Json<crate::taste::TasteProfile> {
    let key = taste_key(&body);
    Json(state.tastes.apply_feedback(&key, &body.feedback))
}

async fn taste_set(
    Extension(state): Extension<Arc<ApiState>>,
    Json(body): Json<TasteRequest>,
) -> Json<crate::taste::TasteProfile> {
    let key = taste_key(&body);
    match body.feedback.taste {
        Some(profile) => Json(state.tastes.set(&key, profile)),
        None => Json(state.tastes.get(&key)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_key_resolution_order() {
        let mut headers = HeaderMap::new();
        headers.insert("x-user-id", HeaderValue::from_static("header-user"));
        headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.1, 10.0.0.2"));

        assert_eq!(resolve_user_key(Some("body-user"), &headers), "body-user");
        assert_eq!(resolve_user_key(None, &headers), "header-user");

        headers.remove("x-user-id");
        assert_eq!(resolve_user_key(None, &headers), "10.0.0.1");

        headers.remove("x-forwarded-for");
        assert_eq!(resolve_user_key(None, &headers), "anon");
    }

    #[test]
    fn request_aliases_deserialize() {
        let body: StoryBothRequest = serde_json::from_str(
            r#"{"Latitude": 51.5, "longitude": -0.12, "speechLang": "EN", "prompt": "ignored"}"#,
        )
        .unwrap();
        assert_eq!(body.lat, Some(51.5));
        assert_eq!(body.lng, Some(-0.12));
        assert_eq!(body.lang.as_deref(), Some("EN"));
    }

    #[test]
    fn anon_hash_is_short_and_stable() {
        assert_eq!(anon_hash("u1"), anon_hash("u1"));
        assert_eq!(anon_hash("u1").len(), 12);
        assert_ne!(anon_hash("u1"), anon_hash("u2"));
    }
}
