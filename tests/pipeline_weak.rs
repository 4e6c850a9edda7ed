// tests/pipeline_weak.rs
//
// Weak facts: candidates exist but never pass the story-potential gate, so
// the orchestrator walks every radius step and ends silent. Also the
// all-sources-empty case.

mod common;

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
};
use serde_json::{json, Value as Json};
use tower::ServiceExt as _;

use common::{build_app, fact_lines, poi, ScriptedFacts, ScriptedProvider};
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

#[tokio::test]
async fn thin_facts_walk_all_radii_and_end_silent() {
    let provider = ScriptedProvider::ok(
        "overpass",
        PoiSource::Osm,
        vec![poi("osm:node/1", "Thin Spot", 51.5007, -0.1240, PoiSource::Osm)],
    );
    // 4 facts never pass the >= 10 gate.
    let facts = ScriptedFacts::new(HashMap::from([(
        "osm:node/1".to_string(),
        fact_lines(4, 2),
    )]));
    let app = build_app(
        vec![provider.clone() as Arc<dyn PoiProvider>],
        Vec::new(),
        facts,
        vec!["unused".to_string()],
    );
    let tts = app.tts.clone();
    let router = api::router(app.state);

    let v = post_story(router).await;
    assert_eq!(v["shouldSpeak"], json!(false));
    assert_eq!(v["reason"], json!("no_strong_poi"));
    assert_eq!(
        provider.call_count(),
        4,
        "every radius step queries its own bucket before giving up"
    );
    assert_eq!(tts.call_count(), 0);
}

#[tokio::test]
async fn enough_facts_but_too_few_year_anchors_stays_silent() {
    let provider = ScriptedProvider::ok(
        "overpass",
        PoiSource::Osm,
        vec![poi("osm:node/1", "Yearless Spot", 51.5007, -0.1240, PoiSource::Osm)],
    );
    let facts = ScriptedFacts::new(HashMap::from([(
        "osm:node/1".to_string(),
        fact_lines(12, 1),
    )]));
    let app = build_app(
        vec![provider as Arc<dyn PoiProvider>],
        Vec::new(),
        facts,
        vec!["unused".to_string()],
    );
    let router = api::router(app.state);

    let v = post_story(router).await;
    assert_eq!(v["reason"], json!("no_strong_poi"));
}

#[tokio::test]
async fn all_sources_empty_is_a_silent_no_strong_poi() {
    let osm = ScriptedProvider::ok("overpass", PoiSource::Osm, Vec::new());
    let graph = ScriptedProvider::ok("wikidata", PoiSource::Graph, Vec::new());
    let app = build_app(
        vec![osm as Arc<dyn PoiProvider>, graph as Arc<dyn PoiProvider>],
        Vec::new(),
        ScriptedFacts::new(Default::default()),
        vec!["unused".to_string()],
    );
    let exposure = app.exposure.clone();
    let router = api::router(app.state);

    let v = post_story(router).await;
    assert_eq!(v["shouldSpeak"], json!(false));
    assert_eq!(v["reason"], json!("no_strong_poi"));

    let tail = exposure.snapshot_last_n(10);
    assert_eq!(tail.len(), 1, "silent decisions are logged too");
    assert_eq!(tail[0].reason, "no_strong_poi");
    assert!(!tail[0].should_speak);
}
