// src/poi/providers/overpass.rs
//! OSM proximity adapter: one Overpass POST with a union query over the
//! "worth narrating" tag families, across node/way/relation.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::poi::types::{EncyclopediaRef, Poi, PoiProvider, PoiSource, ProximityQuery};

/// Overpass responses are capped server-side so a dense city center cannot
/// flood the normalizer.
const MAX_ELEMENTS: usize = 180;

/// Tag selectors for the union query, in emission order. `memorial` is its
/// own bare-key family (`memorial=plaque`, `memorial=war_memorial`, ...),
/// separate from `historic=*`.
const SELECTORS: &[&str] = &[
    r#"["historic"]"#,
    r#"["tourism"="attraction"]"#,
    r#"["tourism"="viewpoint"]"#,
    r#"["memorial"]"#,
    r#"["natural"]"#,
    r#"["place"]"#,
];

pub struct OverpassProvider {
    http: reqwest::Client,
    base_url: String,
}

impl OverpassProvider {
    pub fn new(base_url: &str, user_agent: &str, timeout_ms: u64) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(user_agent.to_string())
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .expect("reqwest client");
        Self {
            http,
            base_url: base_url.to_string(),
        }
    }

    fn build_query(&self, q: &ProximityQuery) -> String {
        let mut body = String::from("[out:json][timeout:8];\n(\n");
        for sel in SELECTORS {
            for kind in ["node", "way", "relation"] {
                body.push_str(&format!(
                    "  {kind}{sel}(around:{},{:.6},{:.6});\n",
                    q.radius_m, q.lat, q.lng
                ));
            }
        }
        body.push_str(&format!(");\nout center {MAX_ELEMENTS};\n"));
        body
    }
}

#[async_trait::async_trait]
impl PoiProvider for OverpassProvider {
    async fn fetch(&self, query: &ProximityQuery) -> Result<Vec<Poi>> {
        let ql = self.build_query(query);
        let resp = self
            .http
            .post(&self.base_url)
            .form(&[("data", ql.as_str())])
            .send()
            .await
            .context("overpass request")?;
        let status = resp.status();
        if !status.is_success() {
            let snippet: String = resp.text().await.unwrap_or_default().chars().take(1_536).collect();
            anyhow::bail!("overpass status {status}: {snippet}");
        }
        let body: OverpassResponse = resp.json().await.context("overpass body")?;
        Ok(parse_elements(body))
    }

    fn name(&self) -> &'static str {
        "overpass"
    }

    fn source(&self) -> PoiSource {
        PoiSource::Osm
    }
}

#[derive(Debug, Deserialize)]
pub struct OverpassResponse {
    #[serde(default)]
    pub elements: Vec<OverpassElement>,
}

#[derive(Debug, Deserialize)]
pub struct OverpassElement {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: u64,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub center: Option<OverpassCenter>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct OverpassCenter {
    pub lat: f64,
    pub lon: f64,
}

/// Map raw elements to POIs. Ways and relations carry their coordinates in
/// `center`; elements with neither are dropped.
pub fn parse_elements(body: OverpassResponse) -> Vec<Poi> {
    let mut out = Vec::new();
    for el in body.elements.into_iter().take(MAX_ELEMENTS) {
        let (lat, lng) = match (el.lat, el.lon, &el.center) {
            (Some(lat), Some(lon), _) => (lat, lon),
            (_, _, Some(c)) => (c.lat, c.lon),
            _ => continue,
        };
        if !crate::geo::valid_coords(lat, lng) {
            continue;
        }

        let encyclopedia_ref = el.tags.get("wikipedia").and_then(|v| parse_wikipedia_tag(v));
        let label = el
            .tags
            .get("name")
            .or_else(|| el.tags.get("name:he"))
            .or_else(|| el.tags.get("name:en"))
            .cloned()
            .or_else(|| encyclopedia_ref.as_ref().map(|r| r.title.clone()))
            .unwrap_or_default();

        let poi = Poi {
            key: format!("osm:{}/{}", el.kind, el.id),
            source: PoiSource::Osm,
            label,
            lat,
            lng,
            kind_hints: kind_hints(&el.tags),
            graph_id: el.tags.get("wikidata").cloned(),
            encyclopedia_ref,
            raw_tags: el.tags,
        };
        if poi.is_identifiable() {
            out.push(poi);
        }
    }
    out
}

/// `wikipedia=lang:Title` → an encyclopedia reference.
pub fn parse_wikipedia_tag(tag: &str) -> Option<EncyclopediaRef> {
    let (lang, title) = tag.split_once(':')?;
    let lang = lang.trim().to_lowercase();
    let title = title.trim();
    if lang.is_empty() || title.is_empty() {
        return None;
    }
    Some(EncyclopediaRef {
        lang,
        title: title.to_string(),
    })
}

fn kind_hints(tags: &HashMap<String, String>) -> Vec<String> {
    let mut hints = Vec::new();
    for key in ["historic", "tourism", "natural", "place", "memorial"] {
        if let Some(v) = tags.get(key) {
            if v == "yes" {
                hints.push(key.to_string());
            } else {
                hints.push(v.clone());
            }
        }
    }
    hints.dedup();
    hints
}
