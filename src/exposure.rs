// src/exposure.rs
//! Append-only exposure log: one record per decision, spoken or silent.
//! Memory keeps a capped tail for diagnostics; the durable tier is JSONL.

use std::fs::{self, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Capped in-memory tail.
const MEMORY_CAP: usize = 2_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposureRecord {
    pub created_at: String,
    pub user_key: String,
    pub lat: f64,
    pub lng: f64,
    pub poi_key: String,
    pub poi_name: String,
    pub poi_source: String,
    pub distance_meters: u32,
    pub should_speak: bool,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub taste_profile_id: Option<String>,
    pub story_len: usize,
}

impl ExposureRecord {
    /// A record for a silent decision with no selected POI.
    pub fn silent(user_key: &str, lat: f64, lng: f64, reason: &str) -> Self {
        Self {
            created_at: chrono::Utc::now().to_rfc3339(),
            user_key: user_key.to_string(),
            lat,
            lng,
            poi_key: String::new(),
            poi_name: String::new(),
            poi_source: String::new(),
            distance_meters: 0,
            should_speak: false,
            reason: reason.to_string(),
            taste_profile_id: None,
            story_len: 0,
        }
    }
}

pub struct ExposureLog {
    memory: Mutex<Vec<ExposureRecord>>,
    path: Option<PathBuf>,
}

impl ExposureLog {
    pub fn in_memory() -> Self {
        Self {
            memory: Mutex::new(Vec::new()),
            path: None,
        }
    }

    pub fn with_data_dir(dir: &Path) -> Self {
        Self {
            memory: Mutex::new(Vec::new()),
            path: Some(dir.join("exposure_log.jsonl")),
        }
    }

    /// Append one record. Durable failure is logged and ignored.
    pub fn append(&self, record: ExposureRecord) {
        {
            let mut mem = self.memory.lock().expect("exposure mutex poisoned");
            mem.push(record.clone());
            if mem.len() > MEMORY_CAP {
                let excess = mem.len() - MEMORY_CAP;
                mem.drain(0..excess);
            }
        }
        if let Some(path) = &self.path {
            if let Err(e) = append_line(path, &record) {
                warn!(error = %e, "exposure log durable write failed");
            }
        }
    }

    /// Last `n` records, oldest first.
    pub fn snapshot_last_n(&self, n: usize) -> Vec<ExposureRecord> {
        let mem = self.memory.lock().expect("exposure mutex poisoned");
        let start = mem.len().saturating_sub(n);
        mem[start..].to_vec()
    }
}

fn append_line(path: &Path, record: &ExposureRecord) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut f = OpenOptions::new().create(true).append(true).open(path)?;
    let line = serde_json::to_string(record).unwrap_or_else(|_| "{}".to_string());
    writeln!(f, "{line}")
}
