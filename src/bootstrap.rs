// src/bootstrap.rs
//! Production wiring: build the full collaborator graph from `AppConfig`.
//! Tests assemble the same graph by hand with scripted collaborators.

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::api::ApiState;
use crate::cache::TtlCache;
use crate::config::AppConfig;
use crate::exposure::ExposureLog;
use crate::facts::{encyclopedia::EncyclopediaFactClient, graph::GraphFactClient, sensitive::SensitiveFilter, FactPipeline};
use crate::history::HistoryStore;
use crate::llm::{OpenAiChatClient, TextGenerator};
use crate::orchestrator::Orchestrator;
use crate::poi::providers::{overpass::OverpassProvider, places::PlacesProvider, wikidata::WikidataProximityProvider};
use crate::poi::types::PoiProvider;
use crate::poi::PoiPipeline;
use crate::story::StoryEngine;
use crate::taste::TasteStore;
use crate::tts::{DisabledSynthesizer, OpenAiSpeechClient, SpeechSynthesizer};

/// Wire the production state. Missing credentials degrade individual
/// collaborators (empty places results, erroring TTS) without blocking boot.
pub fn build_state(cfg: AppConfig) -> ApiState {
    let (history, exposure, tastes) = match cfg.data_dir.as_deref() {
        Some(dir) => {
            let dir = Path::new(dir);
            if let Err(e) = std::fs::create_dir_all(dir) {
                warn!(error = %e, "DATA_DIR not usable; durable tier disabled");
                (HistoryStore::in_memory(), ExposureLog::in_memory(), TasteStore::in_memory())
            } else {
                (
                    HistoryStore::with_data_dir(dir),
                    ExposureLog::with_data_dir(dir),
                    TasteStore::with_data_dir(dir),
                )
            }
        }
        None => {
            warn!("DATA_DIR unset; history, exposure log and taste profiles are memory-only");
            (HistoryStore::in_memory(), ExposureLog::in_memory(), TasteStore::in_memory())
        }
    };
    let history = Arc::new(history);
    let exposure = Arc::new(exposure);
    let tastes = Arc::new(tastes);

    let primary: Vec<Arc<dyn PoiProvider>> = vec![
        Arc::new(OverpassProvider::new(&cfg.overpass_base_url, &cfg.osm_user_agent, cfg.batch_timeout_ms)),
        Arc::new(WikidataProximityProvider::new(&cfg.wikidata_sparql_url, &cfg.osm_user_agent, cfg.http_timeout_ms)),
    ];
    let fallback: Vec<Arc<dyn PoiProvider>> = vec![Arc::new(PlacesProvider::new(
        cfg.google_places_api_key.clone(),
        &cfg.osm_user_agent,
        cfg.http_timeout_ms,
    ))];
    let pipeline = PoiPipeline::new(
        primary,
        fallback,
        TtlCache::new(),
        cfg.geo_cache_ttl_ms,
        cfg.batch_timeout_ms,
    );

    let api_key = cfg.openai_api_key.clone().unwrap_or_default();
    if api_key.is_empty() {
        warn!("OPENAI_API_KEY unset; generation and synthesis will fail until configured");
    }
    let generator: Arc<dyn TextGenerator> = Arc::new(OpenAiChatClient::new(
        &cfg.openai_base_url,
        &api_key,
        &cfg.openai_model,
        cfg.batch_timeout_ms,
    ));

    let facts = Arc::new(FactPipeline::new(
        GraphFactClient::new(&cfg.wikidata_sparql_url, &cfg.osm_user_agent, cfg.http_timeout_ms, cfg.geo_cache_ttl_ms),
        EncyclopediaFactClient::new(Arc::clone(&generator), &cfg.osm_user_agent, cfg.http_timeout_ms, cfg.geo_cache_ttl_ms),
        SensitiveFilter::new(),
    ));

    let tts: Arc<dyn SpeechSynthesizer> = if api_key.is_empty() {
        Arc::new(DisabledSynthesizer)
    } else {
        Arc::new(OpenAiSpeechClient::new(
            &cfg.openai_base_url,
            &api_key,
            &cfg.tts_model,
            &cfg.tts_voice,
            cfg.batch_timeout_ms,
        ))
    };

    let orchestrator = Arc::new(Orchestrator::new(
        cfg.clone(),
        pipeline,
        facts,
        StoryEngine::new(generator),
        tts,
        history,
        exposure,
        Arc::clone(&tastes),
    ));

    info!(
        radii = ?cfg.radius_steps_m,
        geo_cache_ttl_ms = cfg.geo_cache_ttl_ms,
        "narrator state wired"
    );

    ApiState { orchestrator, tastes, cfg }
}
