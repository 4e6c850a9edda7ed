// src/poi/providers/wikidata.rs
//! Knowledge-graph proximity adapter: a single SPARQL `wikibase:around`
//! query returning labeled entities with coordinates. Radius is kilometers
//! on the wire.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::poi::types::{Poi, PoiProvider, PoiSource, ProximityQuery};

const LIMIT: usize = 40;

pub struct WikidataProximityProvider {
    http: reqwest::Client,
    sparql_url: String,
}

impl WikidataProximityProvider {
    pub fn new(sparql_url: &str, user_agent: &str, timeout_ms: u64) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(user_agent.to_string())
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .expect("reqwest client");
        Self {
            http,
            sparql_url: sparql_url.to_string(),
        }
    }

    fn build_query(&self, q: &ProximityQuery) -> String {
        let radius_km = (q.radius_m as f64 / 1000.0).max(0.05);
        let lang_chain = label_language_chain(&q.lang);
        format!(
            r#"SELECT ?place ?placeLabel ?placeDescription ?location WHERE {{
  SERVICE wikibase:around {{
    ?place wdt:P625 ?location .
    bd:serviceParam wikibase:center "Point({lng:.6} {lat:.6})"^^geo:wktLiteral .
    bd:serviceParam wikibase:radius "{radius_km:.3}" .
  }}
  SERVICE wikibase:label {{ bd:serviceParam wikibase:language "{lang_chain}". }}
}}
LIMIT {LIMIT}"#,
            lng = q.lng,
            lat = q.lat,
        )
    }
}

/// Localization chain for labels: requested language first, then he, en, fr.
pub fn label_language_chain(lang: &str) -> String {
    let mut chain = vec![lang];
    for fallback in ["he", "en", "fr"] {
        if !chain.contains(&fallback) {
            chain.push(fallback);
        }
    }
    chain.join(",")
}

#[async_trait::async_trait]
impl PoiProvider for WikidataProximityProvider {
    async fn fetch(&self, query: &ProximityQuery) -> Result<Vec<Poi>> {
        let sparql = self.build_query(query);
        let resp = self
            .http
            .get(&self.sparql_url)
            .query(&[("query", sparql.as_str()), ("format", "json")])
            .header("accept", "application/sparql-results+json")
            .send()
            .await
            .context("wikidata request")?;
        let status = resp.status();
        if !status.is_success() {
            let snippet: String = resp.text().await.unwrap_or_default().chars().take(1_536).collect();
            anyhow::bail!("wikidata status {status}: {snippet}");
        }
        let body: SparqlResponse = resp.json().await.context("wikidata body")?;
        Ok(parse_bindings(body))
    }

    fn name(&self) -> &'static str {
        "wikidata"
    }

    fn source(&self) -> PoiSource {
        PoiSource::Graph
    }
}

#[derive(Debug, Deserialize)]
pub struct SparqlResponse {
    pub results: SparqlResults,
}

#[derive(Debug, Deserialize)]
pub struct SparqlResults {
    #[serde(default)]
    pub bindings: Vec<serde_json::Value>,
}

fn binding_value(b: &serde_json::Value, name: &str) -> Option<String> {
    b.get(name)?.get("value")?.as_str().map(|s| s.to_string())
}

/// `http://www.wikidata.org/entity/Q123` → `Q123`.
pub fn entity_id_from_uri(uri: &str) -> Option<String> {
    let id = uri.rsplit('/').next()?;
    if id.starts_with('Q') && id[1..].chars().all(|c| c.is_ascii_digit()) {
        Some(id.to_string())
    } else {
        None
    }
}

/// `Point(lng lat)` WKT literal → (lat, lng).
pub fn parse_point(wkt: &str) -> Option<(f64, f64)> {
    let inner = wkt.strip_prefix("Point(")?.strip_suffix(')')?;
    let mut parts = inner.split_whitespace();
    let lng: f64 = parts.next()?.parse().ok()?;
    let lat: f64 = parts.next()?.parse().ok()?;
    Some((lat, lng))
}

pub fn parse_bindings(body: SparqlResponse) -> Vec<Poi> {
    let mut out = Vec::new();
    for b in body.results.bindings.into_iter().take(LIMIT) {
        let Some(qid) = binding_value(&b, "place").and_then(|uri| entity_id_from_uri(&uri)) else {
            continue;
        };
        let Some((lat, lng)) = binding_value(&b, "location").and_then(|wkt| parse_point(&wkt)) else {
            continue;
        };
        if !crate::geo::valid_coords(lat, lng) {
            continue;
        }
        // The label service echoes the QID when no label exists in the chain.
        let label = binding_value(&b, "placeLabel")
            .filter(|l| l != &qid)
            .unwrap_or_default();
        let description = binding_value(&b, "placeDescription");

        let mut raw_tags = std::collections::HashMap::new();
        if let Some(d) = &description {
            raw_tags.insert("description".to_string(), d.clone());
        }

        let poi = Poi {
            key: format!("graph:{qid}"),
            source: PoiSource::Graph,
            label,
            lat,
            lng,
            kind_hints: Vec::new(),
            graph_id: Some(qid),
            encyclopedia_ref: None,
            raw_tags,
        };
        if poi.is_identifiable() {
            out.push(poi);
        }
    }
    out
}
