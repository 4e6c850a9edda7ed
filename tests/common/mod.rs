// tests/common/mod.rs
//
// Scripted collaborators shared by the integration tests. Everything is
// assembled through the same constructors the binary uses; only the leaf
// collaborators (providers, fact source, generator, synthesizer) are fakes.
// Not every test binary uses every helper.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;

use roadside_narrator::api::ApiState;
use roadside_narrator::cache::TtlCache;
use roadside_narrator::config::AppConfig;
use roadside_narrator::exposure::ExposureLog;
use roadside_narrator::facts::{merge_facts, sensitive::SensitiveFilter, FactProvider, PoiWithFacts, SourceRef};
use roadside_narrator::history::HistoryStore;
use roadside_narrator::llm::ScriptedGenerator;
use roadside_narrator::orchestrator::Orchestrator;
use roadside_narrator::poi::types::{Poi, PoiProvider, PoiSource, ProximityQuery};
use roadside_narrator::poi::PoiPipeline;
use roadside_narrator::story::StoryEngine;
use roadside_narrator::taste::TasteStore;
use roadside_narrator::tts::CapturingSynthesizer;

pub fn poi(key: &str, label: &str, lat: f64, lng: f64, source: PoiSource) -> Poi {
    Poi {
        key: key.into(),
        source,
        label: label.into(),
        lat,
        lng,
        kind_hints: Vec::new(),
        graph_id: None,
        encyclopedia_ref: None,
        raw_tags: HashMap::new(),
    }
}

/// Provider returning a fixed POI list, counting calls; optionally failing.
pub struct ScriptedProvider {
    name: &'static str,
    source: PoiSource,
    pois: Vec<Poi>,
    fail: bool,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn ok(name: &'static str, source: PoiSource, pois: Vec<Poi>) -> Arc<Self> {
        Arc::new(Self { name, source, pois, fail: false, calls: AtomicUsize::new(0) })
    }

    pub fn failing(name: &'static str, source: PoiSource) -> Arc<Self> {
        Arc::new(Self { name, source, pois: Vec::new(), fail: true, calls: AtomicUsize::new(0) })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl PoiProvider for ScriptedProvider {
    async fn fetch(&self, _query: &ProximityQuery) -> Result<Vec<Poi>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            anyhow::bail!("scripted provider failure");
        }
        Ok(self.pois.clone())
    }

    fn name(&self) -> &'static str {
        self.name
    }

    fn source(&self) -> PoiSource {
        self.source
    }
}

/// Fact source scripted per POI key. Lines pass the sensitive filter and the
/// production merge/cap, mirroring the real pipeline's post-processing.
pub struct ScriptedFacts {
    by_key: HashMap<String, Vec<String>>,
    filter: SensitiveFilter,
}

impl ScriptedFacts {
    pub fn new(by_key: HashMap<String, Vec<String>>) -> Arc<Self> {
        Arc::new(Self { by_key, filter: SensitiveFilter::new() })
    }
}

#[async_trait::async_trait]
impl FactProvider for ScriptedFacts {
    async fn facts_for(&self, poi: &Poi, lang: &str) -> PoiWithFacts {
        let lines = self.by_key.get(&poi.key).cloned().unwrap_or_default();
        let kept = self.filter.retain_safe(lang, lines);
        PoiWithFacts {
            poi: poi.clone(),
            facts: merge_facts(kept, Vec::new()),
            sources: vec![SourceRef { kind: "test".into(), url: "test://facts".into(), title: None }],
        }
    }
}

/// `n` facts, the first `with_year` of them carrying a distinct year.
pub fn fact_lines(n: usize, with_year: usize) -> Vec<String> {
    (0..n)
        .map(|i| {
            if i < with_year {
                format!("The site gained its wing number {i} in {}.", 1820 + i)
            } else {
                format!("Local guides point out detail number {i} of the facade.")
            }
        })
        .collect()
}

/// A draft of exactly `n` words that passes every validator rule.
pub fn story_of(n: usize) -> String {
    (0..n).map(|i| format!("word{i}")).collect::<Vec<_>>().join(" ")
}

pub struct TestApp {
    pub state: ApiState,
    pub history: Arc<HistoryStore>,
    pub exposure: Arc<ExposureLog>,
    pub generator: Arc<ScriptedGenerator>,
    pub tts: Arc<CapturingSynthesizer>,
}

/// Assemble the orchestrator exactly as the binary does, with scripted
/// leaves. `generator_outputs` are replayed in order, last repeated.
pub fn build_app(
    primary: Vec<Arc<dyn PoiProvider>>,
    fallback: Vec<Arc<dyn PoiProvider>>,
    facts: Arc<dyn FactProvider>,
    generator_outputs: Vec<String>,
) -> TestApp {
    let cfg = AppConfig::for_tests();
    let history = Arc::new(HistoryStore::in_memory());
    let exposure = Arc::new(ExposureLog::in_memory());
    let tastes = Arc::new(TasteStore::in_memory());
    let generator = Arc::new(ScriptedGenerator::new(generator_outputs));
    let tts = Arc::new(CapturingSynthesizer::new());

    let pipeline = PoiPipeline::new(
        primary,
        fallback,
        TtlCache::new(),
        cfg.geo_cache_ttl_ms,
        cfg.http_timeout_ms,
    );
    let orchestrator = Arc::new(Orchestrator::new(
        cfg.clone(),
        pipeline,
        facts,
        StoryEngine::new(generator.clone()),
        tts.clone(),
        Arc::clone(&history),
        Arc::clone(&exposure),
        Arc::clone(&tastes),
    ));

    TestApp {
        state: ApiState { orchestrator, tastes, cfg },
        history,
        exposure,
        generator,
        tts,
    }
}
