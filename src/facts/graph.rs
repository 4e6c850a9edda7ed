// src/facts/graph.rs
//! Structured claims from the knowledge graph, synthesized into terse
//! single-sentence fact lines in a stable order: Description, Type,
//! Inception year, Named after, Heritage designation, Notable events.

use std::collections::BTreeSet;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::warn;

use crate::cache::TtlCache;
use crate::poi::providers::wikidata::label_language_chain;

/// Aggregated claims for one entity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphClaims {
    pub description: Option<String>,
    pub types: Vec<String>,
    pub inception_year: Option<i32>,
    pub named_after: Vec<String>,
    pub heritage: Option<String>,
    pub events: Vec<String>,
}

/// Render claims as fact lines. Order is stable so downstream dedup and the
/// FACTS block are reproducible.
pub fn synthesize_facts(claims: &GraphClaims) -> Vec<String> {
    let mut out = Vec::new();
    if let Some(desc) = &claims.description {
        out.push(format!("{}.", capitalize(desc.trim_end_matches('.'))));
    }
    if !claims.types.is_empty() {
        out.push(format!("It is a {}.", claims.types.join(", ")));
    }
    if let Some(year) = claims.inception_year {
        out.push(format!("It was established in {year}."));
    }
    if !claims.named_after.is_empty() {
        out.push(format!("It is named after {}.", claims.named_after.join(", ")));
    }
    if let Some(heritage) = &claims.heritage {
        out.push(format!("It is designated as {heritage}."));
    }
    for event in &claims.events {
        out.push(format!("A notable event associated with it: {event}."));
    }
    out
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// `"1859-05-31T00:00:00Z"` → `1859`. Negative (BCE) timestamps are skipped.
pub fn parse_claim_year(raw: &str) -> Option<i32> {
    let digits: String = raw.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() || raw.starts_with('-') {
        return None;
    }
    digits.parse().ok().filter(|y| (1..=2999).contains(y))
}

pub struct GraphFactClient {
    http: reqwest::Client,
    sparql_url: String,
    cache: TtlCache<Vec<String>>,
    cache_ttl_ms: u64,
}

impl GraphFactClient {
    pub fn new(sparql_url: &str, user_agent: &str, timeout_ms: u64, cache_ttl_ms: u64) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(user_agent.to_string())
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .expect("reqwest client");
        Self {
            http,
            sparql_url: sparql_url.to_string(),
            cache: TtlCache::new(),
            cache_ttl_ms,
        }
    }

    /// Fetch + synthesize fact lines for a graph entity. Failures degrade to
    /// an empty list; fact insufficiency is never an error.
    pub async fn facts(&self, graph_id: &str, lang: &str) -> Vec<String> {
        let cache_key = format!("{graph_id}|{lang}");
        if let Some(hit) = self.cache.get(&cache_key) {
            return hit;
        }
        let facts = match self.query_claims(graph_id, lang).await {
            Ok(claims) => synthesize_facts(&claims),
            Err(e) => {
                warn!(graph_id, error = %format!("{e:#}"), "graph fact query failed");
                Vec::new()
            }
        };
        self.cache.set(cache_key, facts.clone(), self.cache_ttl_ms);
        facts
    }

    fn build_query(&self, graph_id: &str, lang: &str) -> String {
        let chain = label_language_chain(lang);
        format!(
            r#"SELECT ?desc ?typeLabel ?inception ?namedAfterLabel ?heritageLabel ?eventLabel WHERE {{
  OPTIONAL {{ wd:{graph_id} schema:description ?desc . FILTER(LANG(?desc) IN ("{lang}", "en")) }}
  OPTIONAL {{ wd:{graph_id} wdt:P31 ?type . }}
  OPTIONAL {{ wd:{graph_id} wdt:P571 ?inception . }}
  OPTIONAL {{ wd:{graph_id} wdt:P138 ?namedAfter . }}
  OPTIONAL {{ wd:{graph_id} wdt:P1435 ?heritage . }}
  OPTIONAL {{ wd:{graph_id} wdt:P793 ?event . }}
  SERVICE wikibase:label {{
    bd:serviceParam wikibase:language "{chain}".
    ?type rdfs:label ?typeLabel.
    ?namedAfter rdfs:label ?namedAfterLabel.
    ?heritage rdfs:label ?heritageLabel.
    ?event rdfs:label ?eventLabel.
  }}
}}
LIMIT 50"#
        )
    }

    async fn query_claims(&self, graph_id: &str, lang: &str) -> Result<GraphClaims> {
        let sparql = self.build_query(graph_id, lang);
        let resp = self
            .http
            .get(&self.sparql_url)
            .query(&[("query", sparql.as_str()), ("format", "json")])
            .header("accept", "application/sparql-results+json")
            .send()
            .await
            .context("graph claims request")?;
        let status = resp.status();
        if !status.is_success() {
            let snippet: String = resp.text().await.unwrap_or_default().chars().take(1_536).collect();
            anyhow::bail!("graph claims status {status}: {snippet}");
        }
        let body: ClaimsResponse = resp.json().await.context("graph claims body")?;
        Ok(aggregate_bindings(body))
    }
}

#[derive(Debug, Deserialize)]
pub struct ClaimsResponse {
    pub results: ClaimsResults,
}

#[derive(Debug, Deserialize)]
pub struct ClaimsResults {
    #[serde(default)]
    pub bindings: Vec<serde_json::Value>,
}

fn binding_value(b: &serde_json::Value, name: &str) -> Option<String> {
    b.get(name)?.get("value")?.as_str().map(|s| s.to_string())
}

/// Client-side aggregation over the (cartesian) binding rows: distinct
/// labels in first-seen order, MIN inception year, first description.
pub fn aggregate_bindings(body: ClaimsResponse) -> GraphClaims {
    let mut claims = GraphClaims::default();
    let mut seen_types = BTreeSet::new();
    let mut seen_named = BTreeSet::new();
    let mut seen_events = BTreeSet::new();

    for b in &body.results.bindings {
        if claims.description.is_none() {
            claims.description = binding_value(b, "desc").filter(|d| !d.trim().is_empty());
        }
        if let Some(t) = binding_value(b, "typeLabel") {
            if seen_types.insert(t.clone()) {
                claims.types.push(t);
            }
        }
        if let Some(year) = binding_value(b, "inception").and_then(|v| parse_claim_year(&v)) {
            claims.inception_year = Some(claims.inception_year.map_or(year, |y: i32| y.min(year)));
        }
        if let Some(n) = binding_value(b, "namedAfterLabel") {
            if seen_named.insert(n.clone()) {
                claims.named_after.push(n);
            }
        }
        if claims.heritage.is_none() {
            claims.heritage = binding_value(b, "heritageLabel");
        }
        if let Some(ev) = binding_value(b, "eventLabel") {
            if seen_events.insert(ev.clone()) {
                claims.events.push(ev);
            }
        }
    }
    claims
}
