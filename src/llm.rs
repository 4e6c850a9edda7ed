// src/llm.rs
//! Text-generation collaborator. The model is an impure function
//! `complete(system, user, opts) -> String`; retries are decided at the
//! call-site (one repair pass, no blind loops).

use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// One completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl CompletionRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            temperature: 0.4,
            max_tokens: 900,
        }
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.temperature = t;
        self
    }

    pub fn max_tokens(mut self, n: u32) -> Self {
        self.max_tokens = n;
        self
    }
}

#[async_trait::async_trait]
pub trait TextGenerator: Send + Sync {
    async fn complete(&self, req: &CompletionRequest) -> Result<String>;
    fn name(&self) -> &'static str;
}

/// OpenAI-compatible chat-completions client.
pub struct OpenAiChatClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiChatClient {
    pub fn new(base_url: &str, api_key: &str, model: &str, timeout_ms: u64) -> Self {
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
        }
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

#[async_trait::async_trait]
impl TextGenerator for OpenAiChatClient {
    async fn complete(&self, req: &CompletionRequest) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: &req.system },
                ChatMessage { role: "user", content: &req.user },
            ],
            temperature: req.temperature,
            max_tokens: req.max_tokens,
        };
        let resp = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("generator request")?;
        let status = resp.status();
        if !status.is_success() {
            let snippet: String = resp.text().await.unwrap_or_default().chars().take(1_536).collect();
            anyhow::bail!("generator status {}: {snippet}", status.as_u16());
        }
        let parsed: ChatResponse = resp.json().await.context("generator body")?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();
        Ok(content.trim().to_string())
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

/// Pull a numeric upstream status out of a collaborator error message, when
/// one was recorded. Used to preserve upstream 4xx/5xx codes on the wire.
pub fn upstream_status(err: &anyhow::Error) -> Option<u16> {
    let msg = format!("{err:#}");
    let idx = ["generator status ", "tts status "]
        .iter()
        .find_map(|marker| msg.find(marker).map(|i| i + marker.len()))?;
    msg[idx..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect::<String>()
        .parse()
        .ok()
}

/// Scripted generator for tests and keyless local runs: pops pre-seeded
/// outputs in order, then repeats the last one.
pub struct ScriptedGenerator {
    outputs: Mutex<Vec<String>>,
    calls: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedGenerator {
    pub fn new(outputs: Vec<String>) -> Self {
        let mut rev = outputs;
        rev.reverse();
        Self {
            outputs: Mutex::new(rev),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every request seen so far, for assertions on prompt contents.
    pub fn calls(&self) -> Vec<CompletionRequest> {
        self.calls.lock().expect("calls mutex poisoned").clone()
    }
}

#[async_trait::async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn complete(&self, req: &CompletionRequest) -> Result<String> {
        self.calls.lock().expect("calls mutex poisoned").push(req.clone());
        let mut outputs = self.outputs.lock().expect("outputs mutex poisoned");
        match outputs.len() {
            0 => anyhow::bail!("scripted generator exhausted"),
            1 => Ok(outputs[0].clone()),
            _ => Ok(outputs.pop().expect("non-empty")),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}
