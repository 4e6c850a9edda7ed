// src/tts.rs
//! Speech synthesis collaborator: opaque `synthesize(text, lang) -> bytes`.
//! Failures here are terminal for the request (5xx) and must not mark the
//! POI as heard, so it can be retried.

use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;

/// Synthesized audio plus its MIME type.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechAudio {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

#[async_trait::async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, lang: &str) -> Result<SpeechAudio>;
    fn name(&self) -> &'static str;
}

/// OpenAI-compatible `/audio/speech` client.
pub struct OpenAiSpeechClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    voice: String,
}

impl OpenAiSpeechClient {
    pub fn new(base_url: &str, api_key: &str, model: &str, voice: &str, timeout_ms: u64) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("roadside-narrator/0.1 (+github.com/roadside-narrator/roadside-narrator)")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .expect("reqwest client");
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            voice: voice.to_string(),
        }
    }
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    voice: &'a str,
    input: &'a str,
    response_format: &'a str,
}

#[async_trait::async_trait]
impl SpeechSynthesizer for OpenAiSpeechClient {
    async fn synthesize(&self, text: &str, _lang: &str) -> Result<SpeechAudio> {
        let body = SpeechRequest {
            model: &self.model,
            voice: &self.voice,
            input: text,
            response_format: "mp3",
        };
        let resp = self
            .http
            .post(format!("{}/audio/speech", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("tts request")?;
        let status = resp.status();
        if !status.is_success() {
            let snippet: String = resp.text().await.unwrap_or_default().chars().take(1_536).collect();
            anyhow::bail!("tts status {}: {snippet}", status.as_u16());
        }
        let bytes = resp.bytes().await.context("tts body")?.to_vec();
        Ok(SpeechAudio {
            bytes,
            content_type: "audio/mpeg".to_string(),
        })
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

/// Used when no TTS credentials are configured: every synthesis attempt is
/// a hard error, surfaced as 5xx.
pub struct DisabledSynthesizer;

#[async_trait::async_trait]
impl SpeechSynthesizer for DisabledSynthesizer {
    async fn synthesize(&self, _text: &str, _lang: &str) -> Result<SpeechAudio> {
        anyhow::bail!("tts disabled: no API key configured")
    }

    fn name(&self) -> &'static str {
        "disabled"
    }
}

/// Test double: fixed bytes, records every call.
pub struct CapturingSynthesizer {
    calls: Mutex<Vec<String>>,
}

impl CapturingSynthesizer {
    pub fn new() -> Self {
        Self { calls: Mutex::new(Vec::new()) }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("tts calls mutex poisoned").len()
    }
}

impl Default for CapturingSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SpeechSynthesizer for CapturingSynthesizer {
    async fn synthesize(&self, text: &str, _lang: &str) -> Result<SpeechAudio> {
        self.calls.lock().expect("tts calls mutex poisoned").push(text.to_string());
        Ok(SpeechAudio {
            bytes: b"FAKE-MP3".to_vec(),
            content_type: "audio/mpeg".to_string(),
        })
    }

    fn name(&self) -> &'static str {
        "capturing"
    }
}
