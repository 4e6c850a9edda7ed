// src/config.rs
//! Immutable application configuration, read once from the environment at
//! startup and passed explicitly to the components that need it.

use std::env;

fn env_string(name: &str, default: &str) -> String {
    env::var(name).ok().filter(|v| !v.trim().is_empty()).unwrap_or_else(|| default.to_string())
}

fn env_opt(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name).ok().and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name).ok().and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,

    // Generator (OpenAI-compatible chat completions + speech endpoints).
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_model: String,
    pub tts_model: String,
    pub tts_voice: String,

    // Knowledge sources.
    pub google_places_api_key: Option<String>,
    pub overpass_base_url: String,
    /// Accepted for deployment compatibility; proximity queries go through
    /// Overpass, so nothing reads this today.
    pub nominatim_base_url: String,
    pub wikidata_sparql_url: String,
    pub osm_user_agent: String,

    // Timeouts and caching.
    pub http_timeout_ms: u64,
    pub batch_timeout_ms: u64,
    pub geo_cache_ttl_ms: u64,

    // Candidate selection.
    pub radius_steps_m: Vec<u32>,
    pub max_poi_distance_m: u32,
    pub max_candidates: usize,
    pub min_facts_to_speak: usize,
    pub min_anchored_facts: usize,

    // Story length law.
    pub min_words: usize,
    pub max_words: usize,

    // Presentation.
    pub display_distance_step_m: u32,

    // Durable tier; `None` degrades to memory-only.
    pub data_dir: Option<String>,

    pub cors_allow_origins: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self {
            port: env_u64("PORT", 8080).min(u16::MAX as u64) as u16,
            openai_api_key: env_opt("OPENAI_API_KEY"),
            openai_base_url: env_string("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            openai_model: env_string("OPENAI_MODEL", "gpt-4o-mini"),
            tts_model: env_string("OPENAI_TTS_MODEL", "gpt-4o-mini-tts"),
            tts_voice: env_string("OPENAI_TTS_VOICE", "alloy"),
            google_places_api_key: env_opt("GOOGLE_PLACES_API_KEY"),
            overpass_base_url: env_string("OSM_OVERPASS_BASE_URL", "https://overpass-api.de/api/interpreter"),
            nominatim_base_url: env_string("OSM_NOMINATIM_BASE_URL", "https://nominatim.openstreetmap.org"),
            wikidata_sparql_url: env_string("WIKIDATA_SPARQL_URL", "https://query.wikidata.org/sparql"),
            osm_user_agent: env_string(
                "OSM_USER_AGENT",
                "roadside-narrator/0.1 (+github.com/roadside-narrator/roadside-narrator)",
            ),
            http_timeout_ms: env_u64("HTTP_TIMEOUT_MS", 6_500),
            batch_timeout_ms: env_u64("BATCH_TIMEOUT_MS", 9_000),
            geo_cache_ttl_ms: env_u64("GEO_CACHE_TTL_MS", 6 * 60 * 60 * 1000),
            radius_steps_m: parse_radius_steps(env_opt("POI_RADIUS_METERS")),
            max_poi_distance_m: env_u64("MAX_POI_DISTANCE_METERS", 2_200) as u32,
            max_candidates: env_usize("POI_MAX_CANDIDATES", 18),
            min_facts_to_speak: env_usize("MIN_FACTS_TO_SPEAK", 10),
            min_anchored_facts: env_usize("MIN_ANCHORED_FACTS", 2),
            min_words: env_usize("BTW_MIN_WORDS", 180),
            max_words: env_usize("BTW_MAX_WORDS", 340),
            display_distance_step_m: env_u64("DISPLAY_DISTANCE_STEP_METERS", 50) as u32,
            data_dir: env_opt("DATA_DIR"),
            cors_allow_origins: env_string("CORS_ALLOW_ORIGINS", "*"),
        };
        cfg.sanitize();
        cfg
    }

    /// Defaults suitable for tests: no network keys, no durable tier.
    pub fn for_tests() -> Self {
        let mut cfg = Self {
            port: 0,
            openai_api_key: None,
            openai_base_url: "https://api.openai.com/v1".into(),
            openai_model: "gpt-4o-mini".into(),
            tts_model: "gpt-4o-mini-tts".into(),
            tts_voice: "alloy".into(),
            google_places_api_key: None,
            overpass_base_url: "https://overpass-api.de/api/interpreter".into(),
            nominatim_base_url: "https://nominatim.openstreetmap.org".into(),
            wikidata_sparql_url: "https://query.wikidata.org/sparql".into(),
            osm_user_agent: "roadside-narrator/0.1 (tests)".into(),
            http_timeout_ms: 6_500,
            batch_timeout_ms: 9_000,
            geo_cache_ttl_ms: 6 * 60 * 60 * 1000,
            radius_steps_m: vec![500, 900, 1500, 2400],
            max_poi_distance_m: 2_200,
            max_candidates: 18,
            min_facts_to_speak: 10,
            min_anchored_facts: 2,
            min_words: 180,
            max_words: 340,
            display_distance_step_m: 50,
            data_dir: None,
            cors_allow_origins: "*".into(),
        };
        cfg.sanitize();
        cfg
    }

    fn sanitize(&mut self) {
        if self.min_words > self.max_words {
            std::mem::swap(&mut self.min_words, &mut self.max_words);
        }
        if self.radius_steps_m.is_empty() {
            self.radius_steps_m = vec![500, 900, 1500, 2400];
        }
        // The expanding-radius loop requires a strictly increasing sequence
        // capped at 2500 m.
        self.radius_steps_m.retain(|r| *r > 0 && *r <= 2_500);
        self.radius_steps_m.sort_unstable();
        self.radius_steps_m.dedup();
        if self.radius_steps_m.is_empty() {
            self.radius_steps_m = vec![500, 900, 1500, 2400];
        }
        if self.max_candidates == 0 {
            self.max_candidates = 18;
        }
    }
}

/// `POI_RADIUS_METERS` accepts a comma-separated list ("500,900,1500,2400")
/// or a single outer radius, which becomes the last step of the default ramp.
fn parse_radius_steps(raw: Option<String>) -> Vec<u32> {
    let Some(raw) = raw else {
        return vec![500, 900, 1500, 2400];
    };
    let steps: Vec<u32> = raw
        .split(',')
        .filter_map(|p| p.trim().parse::<u32>().ok())
        .collect();
    match steps.len() {
        0 => vec![500, 900, 1500, 2400],
        1 => {
            let outer = steps[0].min(2_500);
            let mut ramp: Vec<u32> = vec![500, 900, 1500].into_iter().filter(|r| *r < outer).collect();
            ramp.push(outer);
            ramp
        }
        _ => steps,
    }
}

/// Normalize a client-supplied language code: lowercase, max 5 chars,
/// empty → "en".
pub fn normalize_lang(raw: &str) -> String {
    let lang: String = raw.trim().to_lowercase().chars().take(5).collect();
    if lang.is_empty() {
        "en".to_string()
    } else {
        lang
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn radius_steps_parse_list_and_scalar() {
        assert_eq!(parse_radius_steps(Some("400,800,1500,2200".into())), vec![400, 800, 1500, 2200]);
        assert_eq!(parse_radius_steps(Some("1200".into())), vec![500, 900, 1200]);
        assert_eq!(parse_radius_steps(None), vec![500, 900, 1500, 2400]);
    }

    #[test]
    fn sanitize_enforces_increasing_capped_radii() {
        let mut cfg = AppConfig::for_tests();
        cfg.radius_steps_m = vec![900, 500, 900, 9_000];
        cfg.sanitize();
        assert_eq!(cfg.radius_steps_m, vec![500, 900]);
    }

    #[test]
    fn lang_normalization() {
        assert_eq!(normalize_lang("EN"), "en");
        assert_eq!(normalize_lang("he-IL-x"), "he-il");
        assert_eq!(normalize_lang("  "), "en");
    }
}
