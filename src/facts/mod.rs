// src/facts/mod.rs
//! Atomic facts: the sole ground truth a story may draw from. Facts come
//! from the knowledge graph and the encyclopedia extract, pass the
//! sensitive-content filter, and are merged, deduplicated and capped here.

pub mod encyclopedia;
pub mod graph;
pub mod sensitive;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::poi::types::Poi;

/// Hard cap on merged facts per POI.
pub const MAX_FACTS: usize = 22;

/// Maximum fact length in characters.
pub const MAX_FACT_CHARS: usize = 260;

static RE_YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(1[5-9]\d{2}|20\d{2})\b").expect("year regex"));

static RE_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(\d{1,2}[./]\d{1,2}[./]\d{2,4}|\d{1,2}\s+(january|february|march|april|may|june|july|august|september|october|november|december)|(january|february|march|april|may|june|july|august|september|october|november|december)\s+\d{1,2})\b",
    )
    .expect("date regex")
});

static RE_EVENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(battle|siege|war|revolt|uprising|earthquake|fire|flood|coronation|exhibition|olympic|festival|treaty|independence)\b")
        .expect("event regex")
});

static RE_PERSON: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(King|Queen|Emperor|Empress|Sultan|Caliph|Tsar|Saint|Rabbi|Lord|Baron|Duke|Sir|Pope)\s+\p{Lu}").expect("person regex")
});

/// A verified single-sentence fact plus anchor flags used for scoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fact {
    pub text: String,
    pub has_year: bool,
    pub has_date: bool,
    pub has_named_event: bool,
    pub has_named_person: bool,
}

impl Fact {
    /// Normalize and validate a candidate sentence. Returns `None` for
    /// empty, multi-line or over-long text. Terminal punctuation is
    /// normalized to `.` when missing.
    pub fn new(raw: &str) -> Option<Self> {
        let mut text = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        if text.is_empty() || text.chars().count() > MAX_FACT_CHARS {
            return None;
        }
        if !text.ends_with(['.', '!', '?']) {
            text.push('.');
        }
        Some(Self {
            has_year: RE_YEAR.is_match(&text),
            has_date: RE_DATE.is_match(&text),
            has_named_event: RE_EVENT.is_match(&text),
            has_named_person: RE_PERSON.is_match(&text),
            text,
        })
    }

    /// A fact is anchored when it carries a concrete time/event/person marker.
    pub fn anchored(&self) -> bool {
        self.has_year || self.has_date || self.has_named_event || self.has_named_person
    }
}

/// Where a fact set came from, for client attribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// A POI with its merged fact set and attributions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoiWithFacts {
    pub poi: Poi,
    pub facts: Vec<Fact>,
    pub sources: Vec<SourceRef>,
}

impl PoiWithFacts {
    pub fn anchored_count(&self) -> usize {
        self.facts.iter().filter(|f| f.anchored()).count()
    }

    pub fn year_anchored_count(&self) -> usize {
        self.facts.iter().filter(|f| f.has_year).count()
    }
}

/// Merge graph facts before encyclopedia facts, dedup case-folded, cap at
/// [`MAX_FACTS`].
pub fn merge_facts(graph: Vec<String>, encyclopedia: Vec<String>) -> Vec<Fact> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for raw in graph.into_iter().chain(encyclopedia) {
        let Some(fact) = Fact::new(&raw) else { continue };
        if !seen.insert(fact.text.to_lowercase()) {
            continue;
        }
        out.push(fact);
        if out.len() == MAX_FACTS {
            break;
        }
    }
    out
}

/// Fact assembly seam. The production pipeline talks to the knowledge graph,
/// the encyclopedia and the generator; tests script it.
#[async_trait::async_trait]
pub trait FactProvider: Send + Sync {
    async fn facts_for(&self, poi: &Poi, lang: &str) -> PoiWithFacts;
}

/// Production fact assembly: graph claims ⊕ encyclopedia distillation,
/// sensitive-content filtering, merge + cap.
pub struct FactPipeline {
    graph: graph::GraphFactClient,
    encyclopedia: encyclopedia::EncyclopediaFactClient,
    filter: sensitive::SensitiveFilter,
}

impl FactPipeline {
    pub fn new(
        graph: graph::GraphFactClient,
        encyclopedia: encyclopedia::EncyclopediaFactClient,
        filter: sensitive::SensitiveFilter,
    ) -> Self {
        Self { graph, encyclopedia, filter }
    }
}

#[async_trait::async_trait]
impl FactProvider for FactPipeline {
    async fn facts_for(&self, poi: &Poi, lang: &str) -> PoiWithFacts {
        let mut sources = Vec::new();

        let graph_facts = match &poi.graph_id {
            Some(qid) => {
                let lines = self.graph.facts(qid, lang).await;
                if !lines.is_empty() {
                    sources.push(SourceRef {
                        kind: "graph".to_string(),
                        url: format!("https://www.wikidata.org/wiki/{qid}"),
                        title: Some(poi.label.clone()).filter(|l| !l.is_empty()),
                    });
                }
                lines
            }
            None => Vec::new(),
        };

        let ency = self.encyclopedia.facts(poi, lang).await;
        let ency_facts = match ency {
            Some(resolved) => {
                sources.push(SourceRef {
                    kind: "encyclopedia".to_string(),
                    url: format!(
                        "https://{}.wikipedia.org/wiki/{}",
                        resolved.lang,
                        resolved.title.replace(' ', "_")
                    ),
                    title: Some(resolved.title.clone()),
                });
                resolved.facts
            }
            None => Vec::new(),
        };

        let graph_kept = self.filter.retain_safe(lang, graph_facts);
        let ency_kept = self.filter.retain_safe(lang, ency_facts);

        PoiWithFacts {
            poi: poi.clone(),
            facts: merge_facts(graph_kept, ency_kept),
            sources,
        }
    }
}
