// src/decision.rs
//! Decision envelope: the structured outcome of one narration request.
//! Pipeline branching happens on machine-readable `reason` strings rather
//! than errors; errors are reserved for transport and input validation.

use serde::{Deserialize, Serialize};

use crate::poi::types::PoiSource;

/// Stable reason tags surfaced to clients and the exposure log.
pub mod reason {
    pub const OK: &str = "ok";
    pub const NO_STRONG_POI: &str = "no_strong_poi";
    pub const MODEL_NO_STORY: &str = "model_no_story";
    pub const LOCATION_MISSING: &str = "location_missing";

    /// Validation failure after the one-shot repair pass.
    pub fn final_validation_failed(sub: &str) -> String {
        format!("final_validation_failed_{sub}")
    }
}

/// Client-facing summary of the narrated POI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoiSummary {
    pub key: String,
    pub source: PoiSource,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// First anchored fact, when one exists; a concrete hook for UIs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor: Option<String>,
}

/// Outcome of one request. `should_speak` implies a non-empty story grounded
/// in at least two facts, one of them anchored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub should_speak: bool,
    pub reason: String,
    pub poi: Option<PoiSummary>,
    /// Facts actually offered to the generator, capped at 8 for the wire.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub facts: Vec<String>,
    #[serde(default)]
    pub story_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_meters_approx: Option<u32>,
}

impl Decision {
    /// A silent decision: nothing to narrate, with the reason why.
    pub fn silent(reason: impl Into<String>) -> Self {
        Self {
            should_speak: false,
            reason: reason.into(),
            poi: None,
            facts: Vec::new(),
            story_text: String::new(),
            distance_meters_approx: None,
        }
    }

    /// A spoken decision with the validated story text.
    pub fn spoken(poi: PoiSummary, facts: Vec<String>, story_text: String, distance_m: u32) -> Self {
        Self {
            should_speak: true,
            reason: reason::OK.to_string(),
            poi: Some(poi),
            facts,
            story_text,
            distance_meters_approx: Some(distance_m),
        }
    }

    pub fn with_poi(mut self, poi: PoiSummary) -> Self {
        self.poi = Some(poi);
        self
    }

    pub fn with_distance(mut self, distance_m: u32) -> Self {
        self.distance_meters_approx = Some(distance_m);
        self
    }
}
