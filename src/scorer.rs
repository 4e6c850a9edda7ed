// src/scorer.rs
//! Candidate scoring and selection: distance filter, history filter, the
//! story-potential gate, and the distance-minus-density score. Pure logic
//! apart from the fact lookups, so the policy is testable offline.

use std::collections::HashSet;

use tracing::debug;

use crate::facts::{FactProvider, PoiWithFacts};
use crate::geo;
use crate::poi::types::Poi;

/// Selection knobs, taken from `AppConfig` at startup.
#[derive(Debug, Clone)]
pub struct ScorerConfig {
    /// Candidates farther than this are never narrated.
    pub max_distance_m: u32,
    /// At most this many nearest candidates get fact extraction.
    pub max_candidates: usize,
    /// Story-potential gate: minimum merged facts.
    pub min_facts: usize,
    /// Story-potential gate: minimum facts carrying a year.
    pub min_year_anchored: usize,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            max_distance_m: 2_200,
            max_candidates: 18,
            min_facts: 10,
            min_year_anchored: 2,
        }
    }
}

/// A gated candidate with its merged facts and caller distance.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub enriched: PoiWithFacts,
    pub distance_m: f64,
    pub score: f64,
}

/// Distance + heard-set filter, nearest-first cut to `max_candidates`.
/// Returns (poi, distance) pairs in ascending distance; ties keep input
/// order (stable sort).
pub fn shortlist(
    pois: &[Poi],
    lat: f64,
    lng: f64,
    heard: &HashSet<String>,
    cfg: &ScorerConfig,
) -> Vec<(Poi, f64)> {
    let mut with_distance: Vec<(Poi, f64)> = pois
        .iter()
        .map(|p| (p.clone(), geo::haversine_meters(lat, lng, p.lat, p.lng)))
        .filter(|(p, d)| *d <= cfg.max_distance_m as f64 && !heard.contains(&p.key))
        .collect();
    with_distance.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
    with_distance.truncate(cfg.max_candidates);
    with_distance
}

/// Story-potential gate: enough facts overall, enough of them year-anchored.
pub fn passes_gate(enriched: &PoiWithFacts, cfg: &ScorerConfig) -> bool {
    enriched.facts.len() >= cfg.min_facts && enriched.year_anchored_count() >= cfg.min_year_anchored
}

/// `score = distance − boost`; denser fact sets and more anchors pull the
/// score down. Lower wins.
pub fn score(distance_m: f64, fact_count: usize, anchor_count: usize) -> f64 {
    let boost = (fact_count.min(20) as f64) * 80.0 + (anchor_count.min(10) as f64) * 220.0;
    distance_m - boost
}

/// Run fact extraction over the shortlist and pick the minimum-score
/// candidate that passes the gate. Ties keep shortlist order.
pub async fn select_best(
    shortlisted: Vec<(Poi, f64)>,
    lang: &str,
    facts: &dyn FactProvider,
    cfg: &ScorerConfig,
) -> Option<ScoredCandidate> {
    let mut best: Option<ScoredCandidate> = None;
    for (poi, distance_m) in shortlisted {
        let enriched = facts.facts_for(&poi, lang).await;
        if !passes_gate(&enriched, cfg) {
            debug!(
                poi = %enriched.poi.key,
                facts = enriched.facts.len(),
                year_anchored = enriched.year_anchored_count(),
                "candidate failed story-potential gate"
            );
            continue;
        }
        let s = score(distance_m, enriched.facts.len(), enriched.anchored_count());
        let better = match &best {
            Some(b) => s < b.score,
            None => true,
        };
        if better {
            best = Some(ScoredCandidate { enriched, distance_m, score: s });
        }
    }
    best
}
