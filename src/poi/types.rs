// src/poi/types.rs
//! Normalized POI record and the provider seam every knowledge source
//! implements.

use std::collections::HashMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Which provider a POI came from. `Anchor` marks hand-seeded entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoiSource {
    Osm,
    Graph,
    Places,
    Anchor,
}

impl PoiSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PoiSource::Osm => "osm",
            PoiSource::Graph => "graph",
            PoiSource::Places => "places",
            PoiSource::Anchor => "anchor",
        }
    }
}

/// Pointer to an encyclopedia page, e.g. `{lang: "en", title: "Big Ben"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncyclopediaRef {
    pub lang: String,
    pub title: String,
}

/// A point of interest after normalization. `key` is stable across retries
/// for the same underlying entity (`<source>:<native-id>`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Poi {
    pub key: String,
    pub source: PoiSource,
    pub label: String,
    pub lat: f64,
    pub lng: f64,
    /// Coarse category tags in provider order, e.g. `["historic", "memorial"]`.
    #[serde(default)]
    pub kind_hints: Vec<String>,
    /// QID-shaped pointer into the knowledge graph, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encyclopedia_ref: Option<EncyclopediaRef>,
    /// Opaque provider tags kept for downstream enrichment.
    #[serde(default)]
    pub raw_tags: HashMap<String, String>,
}

impl Poi {
    /// A POI is usable only when something downstream can say or look up
    /// anything about it.
    pub fn is_identifiable(&self) -> bool {
        !self.label.trim().is_empty() || self.graph_id.is_some() || self.encyclopedia_ref.is_some()
    }
}

/// Proximity query passed to every provider. `radius_m` is meters; adapters
/// translate to their native unit.
#[derive(Debug, Clone, PartialEq)]
pub struct ProximityQuery {
    pub lat: f64,
    pub lng: f64,
    pub radius_m: u32,
    pub lang: String,
}

/// One knowledge source. Implementations do their own HTTP; the pipeline
/// wraps calls in a timeout and treats any failure as an empty result.
#[async_trait::async_trait]
pub trait PoiProvider: Send + Sync {
    async fn fetch(&self, query: &ProximityQuery) -> Result<Vec<Poi>>;
    fn name(&self) -> &'static str;
    fn source(&self) -> PoiSource;
}
