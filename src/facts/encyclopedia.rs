// src/facts/encyclopedia.rs
//! Encyclopedia fact extraction: resolve a page reference, pull the
//! plain-text extract, pick candidate sentences worth distilling, and ask
//! the generator for atomic facts as strict JSON.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::cache::TtlCache;
use crate::llm::{CompletionRequest, TextGenerator};
use crate::poi::types::{EncyclopediaRef, Poi};

/// Extracts are truncated to this many characters before sentence splitting.
const MAX_EXTRACT_CHARS: usize = 12_000;

/// Candidate sentence length bounds.
const MIN_SENTENCE_CHARS: usize = 25;
const MAX_SENTENCE_CHARS: usize = 260;

/// Atomic-fact extraction bounds passed to the generator.
const MIN_ATOMIC_FACTS: usize = 8;
const MAX_ATOMIC_FACTS: usize = 14;

static RE_YEAR_RANGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(1[5-9]\d{2}|20\d{2})\b").expect("year regex"));

static RE_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d+)\b").expect("number regex"));

/// Language-specific "signal" tokens marking a sentence as fact-bearing.
fn signal_tokens(lang: &str) -> &'static [&'static str] {
    match lang.split(['-', '_']).next().unwrap_or(lang) {
        "he" => &[
            "נבנה", "נוסד", "הוקם", "נחנך", "מלך", "מלכה", "קרב", "מאה", "מוזיאון", "כנסייה",
            "מצודה", "גשר", "מגדל", "עתיק", "שוחזר", "נהרס",
        ],
        "fr" => &[
            "construit", "fondé", "établi", "inauguré", "roi", "reine", "bataille", "siècle",
            "musée", "église", "château", "pont", "tour", "classé",
        ],
        _ => &[
            "built", "founded", "established", "constructed", "opened", "designed", "named",
            "king", "queen", "emperor", "battle", "century", "museum", "church", "castle",
            "bridge", "tower", "ancient", "restored", "destroyed", "population", "meters",
            "metres",
        ],
    }
}

/// Split an extract into sentences on `.`, `!`, `?`.
pub fn split_sentences(text: &str) -> Vec<String> {
    text.split_inclusive(['.', '!', '?'])
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn has_signal_token(sentence: &str, lang: &str) -> bool {
    let folded = sentence.to_lowercase();
    signal_tokens(lang).iter().any(|t| {
        if t.chars().all(|c| c.is_ascii()) {
            folded.contains(t)
        } else {
            sentence.contains(t)
        }
    })
}

fn has_large_number(sentence: &str) -> bool {
    RE_NUMBER
        .captures_iter(sentence)
        .filter_map(|c| c[1].parse::<u64>().ok())
        .any(|n| n >= 10)
}

/// Candidate selection: bounded length AND at least one of {year in
/// [1500, 2099], number ≥ 10 alongside a signal token, signal token alone}.
/// When nothing survives, the first 10 sentences are used instead.
pub fn select_candidates(sentences: &[String], lang: &str) -> Vec<String> {
    let picked: Vec<String> = sentences
        .iter()
        .filter(|s| {
            let len = s.chars().count();
            if !(MIN_SENTENCE_CHARS..=MAX_SENTENCE_CHARS).contains(&len) {
                return false;
            }
            let signal = has_signal_token(s, lang);
            RE_YEAR_RANGE.is_match(s) || (has_large_number(s) && signal) || signal
        })
        .cloned()
        .collect();
    if picked.is_empty() {
        sentences.iter().take(10).cloned().collect()
    } else {
        picked
    }
}

/// Parse the generator's reply as a JSON array of strings, tolerating code
/// fences and prose around the array.
pub fn parse_facts_json(raw: &str) -> Vec<String> {
    let start = match raw.find('[') {
        Some(i) => i,
        None => return Vec::new(),
    };
    let end = match raw.rfind(']') {
        Some(i) if i > start => i,
        _ => return Vec::new(),
    };
    serde_json::from_str::<Vec<String>>(&raw[start..=end]).unwrap_or_default()
}

/// Normalize extracted facts: terminal punctuation to `.`, case-folded
/// dedup, preserve order.
pub fn normalize_extracted(raw_facts: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for raw in raw_facts {
        let mut text = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        if text.is_empty() {
            continue;
        }
        while text.ends_with(['!', '?']) {
            text.pop();
        }
        if !text.ends_with('.') {
            text.push('.');
        }
        if seen.insert(text.to_lowercase()) {
            out.push(text);
        }
    }
    out
}

/// A resolved page with its distilled facts.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFacts {
    pub lang: String,
    pub title: String,
    pub facts: Vec<String>,
}

pub struct EncyclopediaFactClient {
    http: reqwest::Client,
    generator: Arc<dyn TextGenerator>,
    /// Base for `Special:EntityData/<qid>.json` sitelink resolution.
    entity_data_base: String,
    cache: TtlCache<ResolvedFacts>,
    cache_ttl_ms: u64,
}

impl EncyclopediaFactClient {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        user_agent: &str,
        timeout_ms: u64,
        cache_ttl_ms: u64,
    ) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(user_agent.to_string())
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .expect("reqwest client");
        Self {
            http,
            generator,
            entity_data_base: "https://www.wikidata.org/wiki/Special:EntityData".to_string(),
            cache: TtlCache::new(),
            cache_ttl_ms,
        }
    }

    /// Resolve and distill facts for a POI. `None` when no page reference
    /// can be resolved; network or generator failures degrade to an empty
    /// fact list for the resolved page.
    pub async fn facts(&self, poi: &Poi, lang: &str) -> Option<ResolvedFacts> {
        let page = match &poi.encyclopedia_ref {
            Some(r) => r.clone(),
            None => self.resolve_sitelink(poi.graph_id.as_deref()?, lang).await?,
        };

        let cache_key = format!("{}|{}", page.lang, page.title);
        if let Some(hit) = self.cache.get(&cache_key) {
            return Some(hit);
        }

        let extract = match self.fetch_extract(&page).await {
            Ok(text) => text,
            Err(e) => {
                warn!(title = %page.title, error = %format!("{e:#}"), "extract fetch failed");
                return None;
            }
        };

        let sentences = split_sentences(&extract);
        let candidates = select_candidates(&sentences, &page.lang);
        let facts = match self.distill(&page.title, &candidates).await {
            Ok(facts) => facts,
            Err(e) => {
                warn!(title = %page.title, error = %format!("{e:#}"), "atomic-fact distillation failed");
                Vec::new()
            }
        };

        let resolved = ResolvedFacts {
            lang: page.lang,
            title: page.title,
            facts,
        };
        self.cache.set(cache_key, resolved.clone(), self.cache_ttl_ms);
        Some(resolved)
    }

    /// Pick a sitelink for the entity: requested language first, then the
    /// he/en/fr fallbacks.
    async fn resolve_sitelink(&self, graph_id: &str, lang: &str) -> Option<EncyclopediaRef> {
        let url = format!("{}/{graph_id}.json", self.entity_data_base);
        let body: serde_json::Value = match self.http.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => resp.json().await.ok()?,
            Ok(resp) => {
                warn!(graph_id, status = %resp.status(), "entity data fetch failed");
                return None;
            }
            Err(e) => {
                warn!(graph_id, error = %e, "entity data fetch failed");
                return None;
            }
        };
        let sitelinks = body.get("entities")?.get(graph_id)?.get("sitelinks")?;
        choose_sitelink(sitelinks, lang)
    }

    async fn fetch_extract(&self, page: &EncyclopediaRef) -> Result<String> {
        let url = format!("https://{}.wikipedia.org/w/api.php", page.lang);
        let resp = self
            .http
            .get(&url)
            .query(&[
                ("action", "query"),
                ("prop", "extracts"),
                ("explaintext", "1"),
                ("redirects", "1"),
                ("format", "json"),
                ("titles", page.title.as_str()),
            ])
            .send()
            .await
            .context("extract request")?;
        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("extract status {status}");
        }
        let body: serde_json::Value = resp.json().await.context("extract body")?;
        let pages = body
            .get("query")
            .and_then(|q| q.get("pages"))
            .and_then(|p| p.as_object())
            .context("extract pages")?;
        let text = pages
            .values()
            .filter_map(|p| p.get("extract").and_then(|e| e.as_str()))
            .next()
            .unwrap_or_default();
        Ok(text.chars().take(MAX_EXTRACT_CHARS).collect())
    }

    /// One JSON-only extraction call: 8–14 atomic facts, no outside
    /// knowledge, no duplicates, one short sentence each.
    async fn distill(&self, title: &str, candidates: &[String]) -> Result<Vec<String>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        let system = format!(
            "You extract atomic facts from encyclopedia sentences. Reply with a JSON array of \
             strings and nothing else. Each string is one short factual sentence. Use only the \
             sentences provided; no outside knowledge, no invented details, no duplicates. \
             Return between {MIN_ATOMIC_FACTS} and {MAX_ATOMIC_FACTS} facts; fewer only if the \
             input does not support {MIN_ATOMIC_FACTS}."
        );
        let user = format!("Sentences about \"{title}\":\n\n{}", candidates.join("\n"));
        let req = CompletionRequest::new(system, user).temperature(0.1).max_tokens(700);
        let raw = self.generator.complete(&req).await?;
        Ok(normalize_extracted(parse_facts_json(&raw)))
    }
}

/// Sitelink preference: `{lang}wiki`, then `hewiki`, `enwiki`, `frwiki`.
pub fn choose_sitelink(sitelinks: &serde_json::Value, lang: &str) -> Option<EncyclopediaRef> {
    let base_lang = lang.split(['-', '_']).next().unwrap_or(lang);
    let mut order = vec![base_lang.to_string()];
    for fallback in ["he", "en", "fr"] {
        if !order.iter().any(|l| l == fallback) {
            order.push(fallback.to_string());
        }
    }
    for candidate in order {
        let key = format!("{candidate}wiki");
        if let Some(title) = sitelinks.get(&key).and_then(|s| s.get("title")).and_then(|t| t.as_str()) {
            return Some(EncyclopediaRef {
                lang: candidate,
                title: title.to_string(),
            });
        }
    }
    None
}
