// src/poi/mod.rs
//! POI pipeline: concurrent provider fan-out with settle-all semantics,
//! normalization into one deduplicated list, and a bucket-keyed TTL cache so
//! nearby queries do not hit the providers again.

pub mod providers;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use tracing::warn;

use crate::cache::TtlCache;
use crate::geo;
use crate::poi::types::{Poi, PoiProvider, ProximityQuery};

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("poi_fetched_total", "POIs returned by providers before normalization.");
        describe_counter!("poi_kept_total", "POIs kept after normalization + dedup.");
        describe_counter!("poi_dedup_total", "POIs dropped as duplicates.");
        describe_counter!("poi_provider_errors_total", "Provider fetch errors or timeouts.");
        describe_counter!("poi_cache_hits_total", "Bucket-cache hits for proximity queries.");
    });
}

/// Dedup key: lowercased label + coordinates rounded to 4 decimal places.
fn dedup_key(poi: &Poi) -> String {
    format!("{}|{:.4}|{:.4}", poi.label.to_lowercase(), geo::round4(poi.lat), geo::round4(poi.lng))
}

/// De-duplicate a merged provider list. First occurrence wins, so the merge
/// order (osm, graph, places) decides which record survives.
pub fn normalize_dedup(merged: Vec<Poi>) -> (Vec<Poi>, usize) {
    let mut seen = std::collections::HashSet::new();
    let mut kept = Vec::with_capacity(merged.len());
    let mut dropped = 0usize;
    for poi in merged {
        if !geo::valid_coords(poi.lat, poi.lng) || !poi.is_identifiable() {
            dropped += 1;
            continue;
        }
        if !seen.insert(dedup_key(&poi)) {
            dropped += 1;
            continue;
        }
        kept.push(poi);
    }
    (kept, dropped)
}

/// Provider fan-out + normalizer + bucket cache.
pub struct PoiPipeline {
    /// Queried on every request, merged in declaration order.
    primary: Vec<Arc<dyn PoiProvider>>,
    /// Queried only when the primary set yields nothing.
    fallback: Vec<Arc<dyn PoiProvider>>,
    cache: TtlCache<Vec<Poi>>,
    cache_ttl_ms: u64,
    call_timeout_ms: u64,
}

impl PoiPipeline {
    pub fn new(
        primary: Vec<Arc<dyn PoiProvider>>,
        fallback: Vec<Arc<dyn PoiProvider>>,
        cache: TtlCache<Vec<Poi>>,
        cache_ttl_ms: u64,
        call_timeout_ms: u64,
    ) -> Self {
        ensure_metrics_described();
        Self {
            primary,
            fallback,
            cache,
            cache_ttl_ms,
            call_timeout_ms,
        }
    }

    /// Fetch, normalize and cache the POI set for one proximity bucket.
    pub async fn fetch_nearby(&self, query: &ProximityQuery) -> Vec<Poi> {
        let bucket = geo::bucket_key(query.lat, query.lng, query.radius_m);
        if let Some(hit) = self.cache.get(&bucket) {
            counter!("poi_cache_hits_total").increment(1);
            return hit;
        }

        let mut merged = self.settle_all(&self.primary, query).await;
        if merged.is_empty() && !self.fallback.is_empty() {
            merged = self.settle_all(&self.fallback, query).await;
        }

        counter!("poi_fetched_total").increment(merged.len() as u64);
        let (kept, dropped) = normalize_dedup(merged);
        counter!("poi_kept_total").increment(kept.len() as u64);
        counter!("poi_dedup_total").increment(dropped as u64);

        self.cache.set(bucket, kept.clone(), self.cache_ttl_ms);
        kept
    }

    /// Run all providers concurrently and join with settle-all semantics:
    /// a failing or slow provider contributes nothing, the rest still count.
    /// Results are merged in provider declaration order regardless of which
    /// call finished first, so dedup is reproducible.
    async fn settle_all(&self, providers: &[Arc<dyn PoiProvider>], query: &ProximityQuery) -> Vec<Poi> {
        let timeout = Duration::from_millis(self.call_timeout_ms);
        let mut handles = Vec::with_capacity(providers.len());
        for provider in providers {
            let provider = Arc::clone(provider);
            let query = query.clone();
            handles.push(tokio::spawn(async move {
                match tokio::time::timeout(timeout, provider.fetch(&query)).await {
                    Ok(Ok(pois)) => Ok(pois),
                    Ok(Err(e)) => Err(format!("{e:#}")),
                    Err(_) => Err(format!("timeout after {}ms", timeout.as_millis())),
                }
            }));
        }

        let mut merged = Vec::new();
        for (handle, provider) in handles.into_iter().zip(providers) {
            match handle.await {
                Ok(Ok(mut pois)) => merged.append(&mut pois),
                Ok(Err(e)) => {
                    counter!("poi_provider_errors_total").increment(1);
                    warn!(provider = provider.name(), error = %e, "provider failed, continuing without it");
                }
                Err(e) => {
                    counter!("poi_provider_errors_total").increment(1);
                    warn!(provider = provider.name(), error = ?e, "provider task panicked");
                }
            }
        }
        merged
    }
}
