// src/history.rs
//! Per-user exposure history: the set of POI keys a user has already been
//! narrated about. Memory tier is authoritative; the durable JSONL tier is
//! loaded lazily on first read and appended on writes. Durable failures are
//! logged, never fatal.

use std::collections::{HashMap, HashSet};
use std::fs::{self, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Serialize, Deserialize)]
struct HistoryRow {
    user_key: String,
    poi_key: String,
    first_seen_at: String,
}

pub struct HistoryStore {
    /// user key → POI keys heard.
    heard: Mutex<HashMap<String, HashSet<String>>>,
    /// Durable JSONL file; `None` means memory-only.
    path: Option<PathBuf>,
    /// Whether the durable file has been folded into memory yet.
    loaded: Mutex<bool>,
}

impl HistoryStore {
    pub fn in_memory() -> Self {
        Self {
            heard: Mutex::new(HashMap::new()),
            path: None,
            loaded: Mutex::new(true),
        }
    }

    pub fn with_data_dir(dir: &Path) -> Self {
        Self {
            heard: Mutex::new(HashMap::new()),
            path: Some(dir.join("user_poi_history.jsonl")),
            loaded: Mutex::new(false),
        }
    }

    /// Fold durable rows into memory once, on first read.
    fn ensure_loaded(&self) {
        let mut loaded = self.loaded.lock().expect("history loaded flag poisoned");
        if *loaded {
            return;
        }
        *loaded = true;
        let Some(path) = &self.path else { return };
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return,
            Err(e) => {
                warn!(error = %e, "history load failed; starting from memory only");
                return;
            }
        };
        let mut map = self.heard.lock().expect("history mutex poisoned");
        for line in content.lines() {
            let Ok(row) = serde_json::from_str::<HistoryRow>(line) else {
                continue;
            };
            map.entry(row.user_key).or_default().insert(row.poi_key);
        }
    }

    /// The POI keys this user has already heard.
    pub fn heard_set(&self, user_key: &str) -> HashSet<String> {
        self.ensure_loaded();
        self.heard
            .lock()
            .expect("history mutex poisoned")
            .get(user_key)
            .cloned()
            .unwrap_or_default()
    }

    /// Record a narration. Idempotent: repeat marks change nothing and do
    /// not append duplicate durable rows.
    pub fn mark_heard(&self, user_key: &str, poi_key: &str) {
        self.ensure_loaded();
        let newly_inserted = {
            let mut map = self.heard.lock().expect("history mutex poisoned");
            map.entry(user_key.to_string()).or_default().insert(poi_key.to_string())
        };
        if !newly_inserted {
            return;
        }
        if let Some(path) = &self.path {
            let row = HistoryRow {
                user_key: user_key.to_string(),
                poi_key: poi_key.to_string(),
                first_seen_at: chrono::Utc::now().to_rfc3339(),
            };
            if let Err(e) = append_jsonl(path, &row) {
                warn!(error = %e, "history durable write failed; memory state remains authoritative");
            }
        }
    }
}

fn append_jsonl<T: Serialize>(path: &Path, row: &T) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut f = OpenOptions::new().create(true).append(true).open(path)?;
    let line = serde_json::to_string(row).unwrap_or_else(|_| "{}".to_string());
    writeln!(f, "{line}")
}
