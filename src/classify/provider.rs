// src/classify/provider.rs
//! Text-generation backends. The classifier treats their output as untrusted free text.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ClassifyError;
use crate::config::{AiConfig, AiProvider};

pub type GenerateFuture<'a> = Pin<Box<dyn Future<Output = Result<String, ClassifyError>> + Send + 'a>>;

/// Black-box `prompt -> raw text` call.
pub trait TextGenerator: Send + Sync {
    fn generate<'a>(&'a self, prompt: &'a str) -> GenerateFuture<'a>;
    /// Provider name for diagnostics.
    fn name(&self) -> &'static str;
}

pub type DynGenerator = Arc<dyn TextGenerator>;

/// Factory: build the generator selected by `[ai]`.
pub fn build_generator(cfg: &AiConfig) -> Result<DynGenerator, ClassifyError> {
    match cfg.provider {
        AiProvider::Gemini => Ok(Arc::new(GeminiProvider::new(cfg)?)),
        AiProvider::Openai => Ok(Arc::new(OpenAiProvider::new(cfg)?)),
        AiProvider::Disabled => Ok(Arc::new(DisabledGenerator)),
    }
}

fn http_client(timeout_secs: u64) -> Result<reqwest::Client, ClassifyError> {
    reqwest::Client::builder()
        .user_agent(concat!("page-sentinel/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ClassifyError::Generation(format!("building client: {e}")))
}

async fn error_for_status(resp: reqwest::Response) -> Result<reqwest::Response, ClassifyError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let snippet: String = body.chars().take(200).collect();
    Err(ClassifyError::Generation(format!("HTTP {status}: {snippet}")))
}

// ------------------------------------------------------------
// Gemini (generateContent REST API)
// ------------------------------------------------------------

pub struct GeminiProvider {
    http: reqwest::Client,
    api_key: String,
    model: String,
    temperature: f32,
    top_p: f32,
    base_url: String,
}

impl GeminiProvider {
    pub fn new(cfg: &AiConfig) -> Result<Self, ClassifyError> {
        Ok(Self {
            http: http_client(cfg.timeout_secs)?,
            api_key: cfg.api_key.clone(),
            model: cfg.model_name().to_string(),
            temperature: cfg.temperature,
            top_p: cfg.top_p,
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
        })
    }

    /// Point at a different endpoint (proxies, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiReq<'a> {
    contents: Vec<GeminiContent<'a>>,
    generation_config: GeminiGenConfig,
}
#[derive(Serialize)]
struct GeminiContent<'a> {
    parts: Vec<GeminiPartOut<'a>>,
}
#[derive(Serialize)]
struct GeminiPartOut<'a> {
    text: &'a str,
}
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenConfig {
    temperature: f32,
    top_p: f32,
}
#[derive(Deserialize)]
struct GeminiResp {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}
#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiCandidateContent>,
}
#[derive(Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiPartIn>,
}
#[derive(Deserialize)]
struct GeminiPartIn {
    #[serde(default)]
    text: String,
}

impl TextGenerator for GeminiProvider {
    fn generate<'a>(&'a self, prompt: &'a str) -> GenerateFuture<'a> {
        Box::pin(async move {
            if self.api_key.is_empty() {
                return Err(ClassifyError::Generation("missing Gemini API key".into()));
            }
            let req = GeminiReq {
                contents: vec![GeminiContent {
                    parts: vec![GeminiPartOut { text: prompt }],
                }],
                generation_config: GeminiGenConfig {
                    temperature: self.temperature,
                    top_p: self.top_p,
                },
            };
            let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
            let resp = self
                .http
                .post(url)
                .header("x-goog-api-key", &self.api_key)
                .json(&req)
                .send()
                .await
                .map_err(|e| ClassifyError::Generation(e.to_string()))?;
            let body: GeminiResp = error_for_status(resp)
                .await?
                .json()
                .await
                .map_err(|e| ClassifyError::Generation(format!("decoding response: {e}")))?;

            let text: String = body
                .candidates
                .into_iter()
                .next()
                .and_then(|c| c.content)
                .map(|c| c.parts.into_iter().map(|p| p.text).collect())
                .unwrap_or_default();
            Ok(text)
        })
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}

// ------------------------------------------------------------
// OpenAI (Chat Completions API)
// ------------------------------------------------------------

pub struct OpenAiProvider {
    http: reqwest::Client,
    api_key: String,
    model: String,
    temperature: f32,
    top_p: f32,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new(cfg: &AiConfig) -> Result<Self, ClassifyError> {
        Ok(Self {
            http: http_client(cfg.timeout_secs)?,
            api_key: cfg.api_key.clone(),
            model: cfg.model_name().to_string(),
            temperature: cfg.temperature,
            top_p: cfg.top_p,
            base_url: "https://api.openai.com/v1".to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Serialize)]
struct ChatMsg<'a> {
    role: &'a str,
    content: &'a str,
}
#[derive(Serialize)]
struct ChatReq<'a> {
    model: &'a str,
    messages: Vec<ChatMsg<'a>>,
    temperature: f32,
    top_p: f32,
}
#[derive(Deserialize)]
struct ChatResp {
    choices: Vec<ChatChoice>,
}
#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMsg,
}
#[derive(Deserialize)]
struct ChatChoiceMsg {
    #[serde(default)]
    content: Option<String>,
}

impl TextGenerator for OpenAiProvider {
    fn generate<'a>(&'a self, prompt: &'a str) -> GenerateFuture<'a> {
        Box::pin(async move {
            if self.api_key.is_empty() {
                return Err(ClassifyError::Generation("missing OpenAI API key".into()));
            }
            let req = ChatReq {
                model: &self.model,
                messages: vec![ChatMsg {
                    role: "user",
                    content: prompt,
                }],
                temperature: self.temperature,
                top_p: self.top_p,
            };
            let resp = self
                .http
                .post(format!("{}/chat/completions", self.base_url))
                .bearer_auth(&self.api_key)
                .json(&req)
                .send()
                .await
                .map_err(|e| ClassifyError::Generation(e.to_string()))?;
            let body: ChatResp = error_for_status(resp)
                .await?
                .json()
                .await
                .map_err(|e| ClassifyError::Generation(format!("decoding response: {e}")))?;
            Ok(body
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .unwrap_or_default())
        })
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

// ------------------------------------------------------------
// Disabled + scripted
// ------------------------------------------------------------

/// Always fails; every change then classifies as not meaningful.
pub struct DisabledGenerator;

impl TextGenerator for DisabledGenerator {
    fn generate<'a>(&'a self, _prompt: &'a str) -> GenerateFuture<'a> {
        Box::pin(async { Err(ClassifyError::Disabled) })
    }
    fn name(&self) -> &'static str {
        "disabled"
    }
}

/// Replays canned replies in order and records every prompt. Once the script runs
/// out, calls fail. Useful for tests and dry runs.
#[derive(Default)]
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<Result<String, String>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new<I>(replies: I) -> Self
    where
        I: IntoIterator<Item = Result<String, String>>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// A script with one successful reply.
    pub fn reply(text: impl Into<String>) -> Self {
        Self::new([Ok(text.into())])
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap_or_else(|p| p.into_inner()).len()
    }
}

impl TextGenerator for ScriptedGenerator {
    fn generate<'a>(&'a self, prompt: &'a str) -> GenerateFuture<'a> {
        self.prompts
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(prompt.to_string());
        let next = self
            .replies
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .pop_front();
        Box::pin(async move {
            match next {
                Some(Ok(text)) => Ok(text),
                Some(Err(e)) => Err(ClassifyError::Generation(e)),
                None => Err(ClassifyError::Generation("script exhausted".into())),
            }
        })
    }
    fn name(&self) -> &'static str {
        "scripted"
    }
}
