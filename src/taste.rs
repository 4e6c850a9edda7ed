// src/taste.rs
//! Coarse taste profiles used as prompt conditioning weights. Profiles are
//! keyed by an opaque id (tasteProfileId, else userId) and kept in memory
//! with an optional JSON file tier.

use std::collections::HashMap;
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// How strongly one feedback nudge moves a weight.
const NUDGE: f32 = 0.15;

/// All weights live in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TasteProfile {
    pub humor: f32,
    pub nerdy: f32,
    pub dramatic: f32,
    pub shortness: f32,
}

impl Default for TasteProfile {
    fn default() -> Self {
        Self { humor: 0.5, nerdy: 0.5, dramatic: 0.5, shortness: 0.5 }
    }
}

impl TasteProfile {
    fn clamped(mut self) -> Self {
        self.humor = self.humor.clamp(0.0, 1.0);
        self.nerdy = self.nerdy.clamp(0.0, 1.0);
        self.dramatic = self.dramatic.clamp(0.0, 1.0);
        self.shortness = self.shortness.clamp(0.0, 1.0);
        self
    }
}

/// Feedback payload; every field optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TasteFeedback {
    #[serde(default)]
    pub liked: Option<bool>,
    #[serde(default, rename = "moreHumor")]
    pub more_humor: Option<bool>,
    #[serde(default, rename = "moreNerdy")]
    pub more_nerdy: Option<bool>,
    #[serde(default)]
    pub shorter: Option<bool>,
    #[serde(default, rename = "moreDramatic")]
    pub more_dramatic: Option<bool>,
    /// Full replacement profile, when the client sends one.
    #[serde(default)]
    pub taste: Option<TasteProfile>,
}

pub struct TasteStore {
    profiles: Mutex<HashMap<String, TasteProfile>>,
    /// Durable file; `None` means memory-only.
    path: Option<PathBuf>,
}

impl TasteStore {
    pub fn in_memory() -> Self {
        Self { profiles: Mutex::new(HashMap::new()), path: None }
    }

    /// Load the durable file when present; a missing or unreadable file
    /// starts empty.
    pub fn with_data_dir(dir: &Path) -> Self {
        let path = dir.join("taste_profiles.json");
        let profiles = fs::read_to_string(&path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default();
        Self { profiles: Mutex::new(profiles), path: Some(path) }
    }

    pub fn get(&self, id: &str) -> TasteProfile {
        self.profiles
            .lock()
            .expect("taste mutex poisoned")
            .get(id)
            .copied()
            .unwrap_or_default()
    }

    pub fn set(&self, id: &str, profile: TasteProfile) -> TasteProfile {
        let clamped = profile.clamped();
        {
            let mut map = self.profiles.lock().expect("taste mutex poisoned");
            map.insert(id.to_string(), clamped);
        }
        self.persist();
        clamped
    }

    /// Apply feedback nudges on top of the stored profile.
    pub fn apply_feedback(&self, id: &str, fb: &TasteFeedback) -> TasteProfile {
        if let Some(full) = fb.taste {
            return self.set(id, full);
        }
        let mut p = self.get(id);
        if fb.more_humor == Some(true) {
            p.humor += NUDGE;
        }
        if fb.more_nerdy == Some(true) {
            p.nerdy += NUDGE;
        }
        if fb.more_dramatic == Some(true) {
            p.dramatic += NUDGE;
        }
        if fb.shorter == Some(true) {
            p.shortness += NUDGE;
        }
        // A plain dislike shortens future stories a little.
        if fb.liked == Some(false) {
            p.shortness += NUDGE / 2.0;
        }
        self.set(id, p)
    }

    fn persist(&self) {
        let Some(path) = &self.path else { return };
        let snapshot = {
            let map = self.profiles.lock().expect("taste mutex poisoned");
            serde_json::to_string(&*map).unwrap_or_else(|_| "{}".to_string())
        };
        if let Err(e) = atomic_write(path, snapshot.as_bytes()) {
            warn!(error = %e, "taste profile persist failed; memory state remains authoritative");
        }
    }
}

/// tmp + rename so readers never observe a half-written file.
fn atomic_write(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("json.tmp");
    let mut f = fs::File::create(&tmp)?;
    f.write_all(bytes)?;
    fs::rename(tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_profile_for_unknown_id() {
        let store = TasteStore::in_memory();
        assert_eq!(store.get("nobody"), TasteProfile::default());
    }

    #[test]
    fn feedback_nudges_and_clamps() {
        let store = TasteStore::in_memory();
        let fb = TasteFeedback { more_humor: Some(true), ..Default::default() };
        for _ in 0..10 {
            store.apply_feedback("u1", &fb);
        }
        let p = store.get("u1");
        assert_eq!(p.humor, 1.0, "repeated nudges must clamp at 1.0");
        assert_eq!(p.nerdy, 0.5);
    }

    #[test]
    fn full_taste_object_replaces_profile() {
        let store = TasteStore::in_memory();
        let fb = TasteFeedback {
            taste: Some(TasteProfile { humor: 0.9, nerdy: 0.1, dramatic: 0.2, shortness: 0.8 }),
            ..Default::default()
        };
        let p = store.apply_feedback("u1", &fb);
        assert_eq!(p.humor, 0.9);
        assert_eq!(store.get("u1").shortness, 0.8);
    }

    #[test]
    fn set_clamps_out_of_range_weights() {
        let store = TasteStore::in_memory();
        let p = store.set("u1", TasteProfile { humor: 2.0, nerdy: -1.0, dramatic: 0.5, shortness: 0.5 });
        assert_eq!(p.humor, 1.0);
        assert_eq!(p.nerdy, 0.0);
    }
}
