// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /health
// - POST /api/story-both input validation and silent envelope
// - POST /api/taste/set and /api/taste/feedback
// - GET /metrics

mod common;

use serde_json::{json, Value as Json};

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use tower::ServiceExt as _; // for `oneshot`

use common::build_app;
use roadside_narrator::api;

const BODY_LIMIT: usize = 2 * 1024 * 1024;

/// Router with no providers at all: every decision is silent.
fn empty_router() -> Router {
    let app = build_app(
        Vec::new(),
        Vec::new(),
        common::ScriptedFacts::new(Default::default()),
        vec!["unused".to_string()],
    );
    api::router(app.state)
}

fn post_json(uri: &str, payload: &Json) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .expect("build request")
}

async fn read_json(resp: axum::response::Response) -> Json {
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT).await.expect("read body");
    serde_json::from_slice(&bytes).expect("parse json")
}

#[tokio::test]
async fn health_returns_200_with_version_string() {
    let app = empty_router();
    let req = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .expect("build GET /health");

    let resp = app.oneshot(req).await.expect("oneshot /health");
    assert_eq!(resp.status(), StatusCode::OK);

    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT).await.expect("read body");
    let text = String::from_utf8(bytes.to_vec()).expect("utf8");
    assert!(text.starts_with("roadside-narrator "), "body was '{text}'");
}

#[tokio::test]
async fn missing_coordinates_fail_with_400_and_reason() {
    let app = empty_router();
    let resp = app
        .oneshot(post_json("/api/story-both", &json!({ "lang": "en" })))
        .await
        .expect("oneshot");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let v = read_json(resp).await;
    assert_eq!(v["error"], json!("location_missing"));
}

#[tokio::test]
async fn out_of_range_coordinates_fail_with_400() {
    let app = empty_router();
    let resp = app
        .oneshot(post_json("/api/story-both", &json!({ "lat": 91.0, "lng": 0.0 })))
        .await
        .expect("oneshot");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn silent_decision_is_still_200_with_full_envelope() {
    let app = empty_router();
    let resp = app
        .oneshot(post_json(
            "/api/story-both",
            &json!({ "latitude": 51.5007, "lon": -0.1246, "speechLang": "EN-GB", "prompt": "legacy, ignored" }),
        ))
        .await
        .expect("oneshot");
    assert_eq!(resp.status(), StatusCode::OK, "silent decisions are not errors");

    let v = read_json(resp).await;
    assert_eq!(v["shouldSpeak"], json!(false));
    assert_eq!(v["reason"], json!("no_strong_poi"));
    assert_eq!(v["poi"], Json::Null);
    assert_eq!(v["text"], json!(""));
    assert_eq!(v["storyText"], json!(""));
    assert_eq!(v["lang"], json!("en-gb"), "lang is normalized lowercase");
    assert!(v.get("audioBase64").is_none(), "no audio on silence");
    assert!(v.get("timingMs").is_some());
    assert!(v["version"].as_str().unwrap().starts_with("roadside-narrator"));
}

#[tokio::test]
async fn taste_set_then_feedback_round_trip() {
    let app = empty_router();

    let set = post_json(
        "/api/taste/set",
        &json!({
            "tasteProfileId": "p1",
            "taste": { "humor": 0.9, "nerdy": 0.2, "dramatic": 0.3, "shortness": 0.4 }
        }),
    );
    let resp = app.clone().oneshot(set).await.expect("oneshot set");
    assert_eq!(resp.status(), StatusCode::OK);
    let v = read_json(resp).await;
    assert!((v["humor"].as_f64().unwrap() - 0.9).abs() < 1e-6);

    let fb = post_json(
        "/api/taste/feedback",
        &json!({ "tasteProfileId": "p1", "moreNerdy": true }),
    );
    let resp = app.oneshot(fb).await.expect("oneshot feedback");
    let v = read_json(resp).await;
    assert!((v["nerdy"].as_f64().unwrap() - 0.35).abs() < 1e-6, "0.2 + 0.15 nudge");
    assert!((v["humor"].as_f64().unwrap() - 0.9).abs() < 1e-6, "other weights untouched");
}

#[tokio::test]
async fn metrics_endpoint_renders_prometheus_text() {
    let app = empty_router();
    let req = Request::builder()
        .method("GET")
        .uri("/metrics")
        .body(Body::empty())
        .expect("build GET /metrics");
    let resp = app.oneshot(req).await.expect("oneshot /metrics");
    assert_eq!(resp.status(), StatusCode::OK);
}
