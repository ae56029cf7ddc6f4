// src/config/ai.rs
use serde::{Deserialize, Serialize};
use std::env;

use super::ConfigError;

fn default_temperature() -> f32 {
    0.1
}
fn default_top_p() -> f32 {
    0.9
}
fn default_timeout_secs() -> u64 {
    60
}
const MAX_EXCERPT_CHARS: usize = 1200;

fn default_excerpt_chars() -> usize {
    MAX_EXCERPT_CHARS
}
fn default_min_confidence() -> f64 {
    crate::model::MIN_MEANINGFUL_CONFIDENCE
}
fn default_api_key() -> String {
    "ENV".to_string()
}
fn default_audience() -> String {
    "students and applicants".to_string()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AiProvider {
    #[default]
    Gemini,
    Openai,
    Disabled,
}

impl AiProvider {
    pub fn default_model(self) -> &'static str {
        match self {
            AiProvider::Gemini => "gemini-2.5-flash",
            AiProvider::Openai => "gpt-4o-mini",
            AiProvider::Disabled => "",
        }
    }

    fn key_env(self) -> Option<&'static str> {
        match self {
            AiProvider::Gemini => Some("GEMINI_API_KEY"),
            AiProvider::Openai => Some("OPENAI_API_KEY"),
            AiProvider::Disabled => None,
        }
    }
}

/// `[ai]` section: which text-generation service classifies changes, and how.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    #[serde(default)]
    pub provider: AiProvider,
    #[serde(default)]
    pub model: Option<String>,
    /// "ENV" means: read from GEMINI_API_KEY / OPENAI_API_KEY (by provider)
    #[serde(default = "default_api_key")]
    pub api_key: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// How much of old/new content goes into the prompt.
    #[serde(default = "default_excerpt_chars")]
    pub excerpt_chars: usize,
    /// Positive verdicts below this are discarded.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
    /// Who the alerts are for; named in the prompt.
    #[serde(default = "default_audience")]
    pub audience: String,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: AiProvider::default(),
            model: None,
            api_key: default_api_key(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            timeout_secs: default_timeout_secs(),
            excerpt_chars: default_excerpt_chars(),
            min_confidence: default_min_confidence(),
            audience: default_audience(),
        }
    }
}

impl AiConfig {
    pub fn model_name(&self) -> &str {
        self.model
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| self.provider.default_model())
    }

    /// Replace an "ENV" placeholder with the provider's key from the environment.
    /// A missing key is an error only for providers that need one.
    pub fn resolve_api_key(&mut self) -> Result<(), ConfigError> {
        if !self.api_key.trim().eq_ignore_ascii_case("env") {
            return Ok(());
        }
        let Some(var) = self.provider.key_env() else {
            self.api_key.clear();
            return Ok(());
        };
        self.api_key = env::var(var).map_err(|_| ConfigError::MissingEnv(var))?;
        Ok(())
    }

    pub(crate) fn sanitize(&mut self) {
        if !(0.0..=2.0).contains(&self.temperature) {
            self.temperature = default_temperature();
        }
        if !(0.0..=1.0).contains(&self.top_p) {
            self.top_p = default_top_p();
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            self.min_confidence = default_min_confidence();
        }
        if self.excerpt_chars == 0 {
            self.excerpt_chars = default_excerpt_chars();
        }
        self.excerpt_chars = self.excerpt_chars.min(MAX_EXCERPT_CHARS);
        self.timeout_secs = self.timeout_secs.max(1);
        if self.audience.trim().is_empty() {
            self.audience = default_audience();
        }
    }
}
