// tests/pipeline_repair.rs
//
// Repair loop: a short first draft is repaired once; a second failure
// produces silence tagged final_validation_failed_<subreason>.

mod common;

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
};
use serde_json::{json, Value as Json};
use tower::ServiceExt as _;

use common::{build_app, fact_lines, poi, story_of, ScriptedFacts, ScriptedProvider};
use roadside_narrator::api;
use roadside_narrator::poi::types::{PoiProvider, PoiSource};

const BODY_LIMIT: usize = 2 * 1024 * 1024;

async fn post_story(app: axum::Router) -> Json {
    let payload = json!({ "lat": 51.5007, "lng": -0.1246, "lang": "en", "userId": "u1" });
    let req = Request::builder()
        .method("POST")
        .uri("/api/story-both")
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .expect("build request");
    let resp = app.oneshot(req).await.expect("oneshot");
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT).await.expect("read body");
    serde_json::from_slice(&bytes).expect("parse json")
}

fn dense_fixture() -> (Arc<ScriptedProvider>, Arc<ScriptedFacts>) {
    let provider = ScriptedProvider::ok(
        "overpass",
        PoiSource::Osm,
        vec![poi("osm:node/1", "Old Mill", 51.5007, -0.1240, PoiSource::Osm)],
    );
    let facts = ScriptedFacts::new(HashMap::from([(
        "osm:node/1".to_string(),
        fact_lines(12, 3),
    )]));
    (provider, facts)
}

#[tokio::test]
async fn short_draft_is_repaired_and_the_rewrite_is_spoken() {
    let (provider, facts) = dense_fixture();
    // 90 words is below the 180 minimum; the repair returns 220 words.
    let app = build_app(
        vec![provider as Arc<dyn PoiProvider>],
        Vec::new(),
        facts,
        vec![story_of(90), story_of(220)],
    );
    let generator = app.generator.clone();
    let tts = app.tts.clone();
    let router = api::router(app.state);

    let v = post_story(router).await;

    assert_eq!(v["shouldSpeak"], json!(true));
    assert_eq!(v["reason"], json!("ok"));
    assert_eq!(
        v["storyText"].as_str().unwrap().split_whitespace().count(),
        220,
        "the validated story is the repaired draft"
    );
    assert_eq!(tts.call_count(), 1);

    let calls = generator.calls();
    assert_eq!(calls.len(), 2, "exactly one repair pass");
    assert!(calls[1].user.contains("bad_length"));
    assert!(calls[1].user.contains("PREVIOUS DRAFT:"));
}

#[tokio::test]
async fn repair_failure_is_silent_with_tagged_reason() {
    let (provider, facts) = dense_fixture();
    let app = build_app(
        vec![provider as Arc<dyn PoiProvider>],
        Vec::new(),
        facts,
        vec![story_of(90), story_of(95)],
    );
    let history = app.history.clone();
    let tts = app.tts.clone();
    let router = api::router(app.state);

    let v = post_story(router).await;

    assert_eq!(v["shouldSpeak"], json!(false));
    assert_eq!(v["reason"], json!("final_validation_failed_bad_length"));
    assert_eq!(tts.call_count(), 0);
    assert!(history.heard_set("u1").is_empty());
}

#[tokio::test]
async fn repair_declaring_no_story_is_tagged_too() {
    let (provider, facts) = dense_fixture();
    let app = build_app(
        vec![provider as Arc<dyn PoiProvider>],
        Vec::new(),
        facts,
        vec![story_of(90), "NO_STORY".to_string()],
    );
    let router = api::router(app.state);

    let v = post_story(router).await;
    assert_eq!(v["reason"], json!("final_validation_failed_model_no_story"));
}
