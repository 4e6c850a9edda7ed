// tests/sensitive_filter.rs
//
// Sensitive-content filtering at the pipeline level: a flagged fact line is
// excluded from the FACTS block, and when the exclusion drops the count
// below the gate the whole candidate is rejected.

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
use roadside_narrator::facts::sensitive::SensitiveFilter;
use roadside_narrator::poi::types::{PoiProvider, PoiSource};

const BODY_LIMIT: usize = 2 * 1024 * 1024;

async fn post_story(app: axum::Router, lang: &str) -> Json {
    let payload = json!({ "lat": 51.5007, "lng": -0.1246, "lang": lang, "userId": "u1" });
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

fn fixture_with_lines(lines: Vec<String>) -> (Arc<ScriptedProvider>, Arc<ScriptedFacts>) {
    let provider = ScriptedProvider::ok(
        "overpass",
        PoiSource::Osm,
        vec![poi("osm:node/1", "Border Fort", 51.5007, -0.1240, PoiSource::Osm)],
    );
    let facts = ScriptedFacts::new(HashMap::from([("osm:node/1".to_string(), lines)]));
    (provider, facts)
}

#[tokio::test]
async fn flagged_line_is_dropped_but_the_rest_survive() {
    // 11 safe-ish lines + 1 conflict line: still 11 after filtering, gate holds.
    let mut lines = fact_lines(11, 3);
    lines.push("The fort was shelled during the war of the two rivers.".to_string());
    let (provider, facts) = fixture_with_lines(lines);
    let app = build_app(
        vec![provider as Arc<dyn PoiProvider>],
        Vec::new(),
        facts,
        vec![story_of(200)],
    );
    let router = api::router(app.state);

    let v = post_story(router, "en").await;
    assert_eq!(v["shouldSpeak"], json!(true));
    for fact in v["facts"].as_array().unwrap() {
        let text = fact.as_str().unwrap().to_lowercase();
        assert!(!text.contains("war"), "filtered token leaked into the FACTS wire list: {text}");
    }
}

#[tokio::test]
async fn filtering_below_the_gate_rejects_the_candidate() {
    // Exactly 10 lines, one of them sensitive: 9 remain, the gate fails.
    let mut lines = fact_lines(9, 3);
    lines.push("A massacre took place near the gate in the old days.".to_string());
    assert_eq!(lines.len(), 10);
    let (provider, facts) = fixture_with_lines(lines);
    let app = build_app(
        vec![provider as Arc<dyn PoiProvider>],
        Vec::new(),
        facts,
        vec![story_of(200)],
    );
    let router = api::router(app.state);

    let v = post_story(router, "en").await;
    assert_eq!(v["shouldSpeak"], json!(false));
    assert_eq!(v["reason"], json!("no_strong_poi"));
}

#[tokio::test]
async fn hebrew_denylist_applies_to_hebrew_requests() {
    let mut lines = fact_lines(9, 3);
    lines.push("המבצר נפגע קשות במלחמה הגדולה של האזור.".to_string());
    let (provider, facts) = fixture_with_lines(lines);
    let app = build_app(
        vec![provider as Arc<dyn PoiProvider>],
        Vec::new(),
        facts,
        vec![story_of(200)],
    );
    let router = api::router(app.state);

    let v = post_story(router, "he").await;
    assert_eq!(v["reason"], json!("no_strong_poi"), "the Hebrew conflict line must not count toward the gate");
}

#[test]
fn filter_is_line_level_not_set_level() {
    let f = SensitiveFilter::new();
    let kept = f.retain_safe(
        "en",
        vec![
            "Built in 1901 on the river bank.".to_string(),
            "Scene of a terror attack decades later.".to_string(),
            "Hosts a small museum since 1988.".to_string(),
        ],
    );
    assert_eq!(kept.len(), 2, "only the flagged line disappears");
}
