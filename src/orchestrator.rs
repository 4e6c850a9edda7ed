// src/orchestrator.rs
//! Request orchestration: expanding-radius candidate search, grounded
//! generation, speech synthesis, history marking and exposure logging.
//! Per-source failures are recovered here; only generator and TTS failures
//! surface to the caller.

use std::sync::Arc;

use anyhow::Result;
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::decision::{reason, Decision, PoiSummary};
use crate::exposure::{ExposureLog, ExposureRecord};
use crate::facts::FactProvider;
use crate::geo;
use crate::history::HistoryStore;
use crate::poi::types::ProximityQuery;
use crate::poi::PoiPipeline;
use crate::scorer::{self, ScoredCandidate, ScorerConfig};
use crate::story::prompt::StoryContext;
use crate::story::{StoryEngine, StoryOutcome};
use crate::taste::TasteStore;
use crate::tts::{SpeechAudio, SpeechSynthesizer};

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("narration_requests_total", "Narration requests handled.");
        describe_counter!("narration_spoken_total", "Decisions that produced a story.");
        describe_counter!("narration_silent_total", "Silent decisions, any reason.");
    });
}

/// One narration request after API-level normalization.
#[derive(Debug, Clone)]
pub struct StoryRequest {
    pub lat: f64,
    pub lng: f64,
    pub lang: String,
    pub user_key: String,
    pub taste_profile_id: Option<String>,
}

/// Decision plus the synthesized audio when the decision speaks.
#[derive(Debug)]
pub struct NarrationResult {
    pub decision: Decision,
    pub audio: Option<SpeechAudio>,
}

pub struct Orchestrator {
    cfg: AppConfig,
    pipeline: PoiPipeline,
    facts: Arc<dyn FactProvider>,
    story: StoryEngine,
    tts: Arc<dyn SpeechSynthesizer>,
    history: Arc<HistoryStore>,
    exposure: Arc<ExposureLog>,
    tastes: Arc<TasteStore>,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cfg: AppConfig,
        pipeline: PoiPipeline,
        facts: Arc<dyn FactProvider>,
        story: StoryEngine,
        tts: Arc<dyn SpeechSynthesizer>,
        history: Arc<HistoryStore>,
        exposure: Arc<ExposureLog>,
        tastes: Arc<TasteStore>,
    ) -> Self {
        ensure_metrics_described();
        Self { cfg, pipeline, facts, story, tts, history, exposure, tastes }
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn exposure(&self) -> &ExposureLog {
        &self.exposure
    }

    fn scorer_config(&self) -> ScorerConfig {
        ScorerConfig {
            max_distance_m: self.cfg.max_poi_distance_m,
            max_candidates: self.cfg.max_candidates,
            min_facts: self.cfg.min_facts_to_speak,
            min_year_anchored: self.cfg.min_anchored_facts,
        }
    }

    /// Expanding-radius search: stop at the first radius yielding a gated
    /// candidate.
    async fn find_candidate(&self, req: &StoryRequest) -> Option<ScoredCandidate> {
        let heard = self.history.heard_set(&req.user_key);
        let scorer_cfg = self.scorer_config();
        for &radius_m in &self.cfg.radius_steps_m {
            let query = ProximityQuery {
                lat: req.lat,
                lng: req.lng,
                radius_m,
                lang: req.lang.clone(),
            };
            let pois = self.pipeline.fetch_nearby(&query).await;
            debug!(radius_m, pois = pois.len(), "radius step");
            let shortlisted = scorer::shortlist(&pois, req.lat, req.lng, &heard, &scorer_cfg);
            if let Some(candidate) =
                scorer::select_best(shortlisted, &req.lang, self.facts.as_ref(), &scorer_cfg).await
            {
                return Some(candidate);
            }
        }
        None
    }

    /// Handle one request end to end. `Err` only for generator/TTS
    /// failures; everything else resolves to a Decision.
    pub async fn narrate(&self, req: &StoryRequest) -> Result<NarrationResult> {
        counter!("narration_requests_total").increment(1);

        let Some(candidate) = self.find_candidate(req).await else {
            return Ok(self.silent(req, None, reason::NO_STRONG_POI));
        };

        let enriched = &candidate.enriched;
        let display_distance =
            geo::round_display_distance(candidate.distance_m, self.cfg.display_distance_step_m);
        let taste_id = req.taste_profile_id.clone().unwrap_or_else(|| req.user_key.clone());
        let ctx = StoryContext {
            place_label: enriched.poi.label.clone(),
            distance_m: display_distance,
            lang: req.lang.clone(),
            facts: enriched.facts.clone(),
            taste: self.tastes.get(&taste_id),
            min_words: self.cfg.min_words,
            max_words: self.cfg.max_words,
        };

        match self.story.tell(&ctx).await? {
            StoryOutcome::Story(text) => {
                // TTS failure bubbles without marking history, so the POI
                // stays eligible for a retry.
                let audio = self.tts.synthesize(&text, &req.lang).await?;

                self.history.mark_heard(&req.user_key, &enriched.poi.key);
                self.log_decision(req, Some(candidate.clone()), reason::OK, true, text.len());
                counter!("narration_spoken_total").increment(1);
                info!(
                    poi = %enriched.poi.key,
                    distance_m = display_distance,
                    words = crate::story::validator::word_count(&text),
                    "speaking"
                );

                let summary = poi_summary(enriched);
                let wire_facts: Vec<String> =
                    enriched.facts.iter().take(8).map(|f| f.text.clone()).collect();
                Ok(NarrationResult {
                    decision: Decision::spoken(summary, wire_facts, text, display_distance),
                    audio: Some(audio),
                })
            }
            StoryOutcome::NoStory => {
                Ok(self.silent(req, Some(candidate), reason::MODEL_NO_STORY))
            }
            StoryOutcome::Rejected(sub) => {
                let tagged = reason::final_validation_failed(sub);
                Ok(self.silent(req, Some(candidate), &tagged))
            }
        }
    }

    /// A silent decision: no synthesis, no history mark, one exposure
    /// record. The selected POI (if any) stays out of the response so an
    /// unheard place is not leaked.
    fn silent(&self, req: &StoryRequest, candidate: Option<ScoredCandidate>, why: &str) -> NarrationResult {
        counter!("narration_silent_total").increment(1);
        info!(reason = why, "silent decision");
        self.log_decision(req, candidate, why, false, 0);
        NarrationResult {
            decision: Decision::silent(why),
            audio: None,
        }
    }

    fn log_decision(
        &self,
        req: &StoryRequest,
        candidate: Option<ScoredCandidate>,
        why: &str,
        spoke: bool,
        story_len: usize,
    ) {
        let mut record = ExposureRecord::silent(&req.user_key, req.lat, req.lng, why);
        record.should_speak = spoke;
        record.story_len = story_len;
        record.taste_profile_id = req.taste_profile_id.clone();
        if let Some(c) = candidate {
            record.poi_key = c.enriched.poi.key.clone();
            record.poi_name = c.enriched.poi.label.clone();
            record.poi_source = c.enriched.poi.source.as_str().to_string();
            record.distance_meters = c.distance_m.round() as u32;
        }
        self.exposure.append(record);
    }
}

fn poi_summary(enriched: &crate::facts::PoiWithFacts) -> PoiSummary {
    PoiSummary {
        key: enriched.poi.key.clone(),
        source: enriched.poi.source,
        label: enriched.poi.label.clone(),
        description: enriched.poi.raw_tags.get("description").cloned(),
        anchor: enriched.facts.iter().find(|f| f.anchored()).map(|f| f.text.clone()),
    }
}
