// src/poi/providers/places.rs
//! Commercial places adapter (Google Places Nearby Search). Used only as a
//! fallback when OSM and the knowledge graph both come back empty, or in
//! explicit non-"interesting" mode. Without an API key it yields nothing.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::poi::types::{Poi, PoiProvider, PoiSource, ProximityQuery};

pub struct PlacesProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl PlacesProvider {
    pub fn new(api_key: Option<String>, user_agent: &str, timeout_ms: u64) -> Self {
        Self::with_base_url("https://maps.googleapis.com/maps/api/place", api_key, user_agent, timeout_ms)
    }

    pub fn with_base_url(
        base_url: &str,
        api_key: Option<String>,
        user_agent: &str,
        timeout_ms: u64,
    ) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(user_agent.to_string())
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .expect("reqwest client");
        Self {
            http,
            base_url: base_url.to_string(),
            api_key,
        }
    }
}

#[async_trait::async_trait]
impl PoiProvider for PlacesProvider {
    async fn fetch(&self, query: &ProximityQuery) -> Result<Vec<Poi>> {
        let Some(key) = &self.api_key else {
            return Ok(Vec::new());
        };
        let url = format!("{}/nearbysearch/json", self.base_url);
        let location = format!("{:.6},{:.6}", query.lat, query.lng);
        let resp = self
            .http
            .get(&url)
            .query(&[
                ("location", location.as_str()),
                ("radius", &query.radius_m.to_string()),
                ("language", &query.lang),
                ("key", key),
            ])
            .send()
            .await
            .context("places request")?;
        let status = resp.status();
        if !status.is_success() {
            let snippet: String = resp.text().await.unwrap_or_default().chars().take(1_536).collect();
            anyhow::bail!("places status {status}: {snippet}");
        }
        let body: PlacesResponse = resp.json().await.context("places body")?;
        Ok(parse_results(body))
    }

    fn name(&self) -> &'static str {
        "places"
    }

    fn source(&self) -> PoiSource {
        PoiSource::Places
    }
}

#[derive(Debug, Deserialize)]
pub struct PlacesResponse {
    #[serde(default)]
    pub results: Vec<PlaceResult>,
}

#[derive(Debug, Deserialize)]
pub struct PlaceResult {
    pub place_id: String,
    pub name: Option<String>,
    pub geometry: Option<PlaceGeometry>,
    #[serde(default)]
    pub types: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct PlaceGeometry {
    pub location: PlaceLatLng,
}

#[derive(Debug, Deserialize)]
pub struct PlaceLatLng {
    pub lat: f64,
    pub lng: f64,
}

pub fn parse_results(body: PlacesResponse) -> Vec<Poi> {
    let mut out = Vec::new();
    for r in body.results {
        let Some(geom) = r.geometry else { continue };
        let (lat, lng) = (geom.location.lat, geom.location.lng);
        if !crate::geo::valid_coords(lat, lng) {
            continue;
        }
        let poi = Poi {
            key: format!("places:{}", r.place_id),
            source: PoiSource::Places,
            label: r.name.unwrap_or_default(),
            lat,
            lng,
            kind_hints: r.types,
            graph_id: None,
            encyclopedia_ref: None,
            raw_tags: std::collections::HashMap::new(),
        };
        if poi.is_identifiable() {
            out.push(poi);
        }
    }
    out
}
