// src/classify/mod.rs
//! Semantic change classification: prompt → external generation → extraction →
//! schema validation → confidence gate. Every failure converges to the safe default.

pub mod parse;
pub mod prompt;
pub mod provider;

use metrics::counter;
use tracing::{debug, info, warn};

use crate::config::AiConfig;
use crate::model::{ClassificationResult, MIN_MEANINGFUL_CONFIDENCE};
pub use provider::{
    build_generator, DisabledGenerator, DynGenerator, GeminiProvider, OpenAiProvider,
    ScriptedGenerator, TextGenerator,
};

#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("text generation is disabled")]
    Disabled,
    #[error("text generation failed: {0}")]
    Generation(String),
    #[error("no JSON object in response")]
    NoJsonObject,
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("field `{field}` is not a {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },
    #[error("confidence {0} outside [0, 1]")]
    ConfidenceOutOfRange(f64),
    #[error("meaningful verdict with low confidence {0}")]
    LowConfidence(f64),
}

impl ClassifyError {
    /// Short label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            ClassifyError::Disabled => "disabled",
            ClassifyError::Generation(_) => "generation",
            ClassifyError::NoJsonObject | ClassifyError::InvalidJson(_) => "extraction",
            ClassifyError::MissingField(_)
            | ClassifyError::WrongType { .. }
            | ClassifyError::ConfidenceOutOfRange(_) => "schema",
            ClassifyError::LowConfidence(_) => "low_confidence",
        }
    }
}

pub struct Classifier {
    generator: DynGenerator,
    excerpt_chars: usize,
    min_confidence: f64,
    audience: String,
}

impl Classifier {
    pub fn new(generator: DynGenerator, cfg: &AiConfig) -> Self {
        Self {
            generator,
            excerpt_chars: cfg.excerpt_chars,
            min_confidence: cfg.min_confidence,
            audience: cfg.audience.clone(),
        }
    }

    /// Default prompt settings around an arbitrary generator.
    pub fn with_generator(generator: DynGenerator) -> Self {
        Self::new(generator, &AiConfig::default())
    }

    pub fn from_config(cfg: &AiConfig) -> Result<Self, ClassifyError> {
        Ok(Self::new(build_generator(cfg)?, cfg))
    }

    pub fn provider_name(&self) -> &'static str {
        self.generator.name()
    }

    /// Never fails: any error is logged and replaced by the safe default.
    pub async fn classify(&self, old: Option<&str>, new: &str) -> ClassificationResult {
        match self.try_classify(old, new).await {
            Ok(result) => result,
            Err(e) => {
                warn!(provider = self.generator.name(), reason = e.reason(), error = %e, "classification discarded; using safe default");
                counter!("sentinel_classify_fallbacks_total", "reason" => e.reason()).increment(1);
                ClassificationResult::safe_default()
            }
        }
    }

    pub async fn try_classify(
        &self,
        old: Option<&str>,
        new: &str,
    ) -> Result<ClassificationResult, ClassifyError> {
        let prompt = prompt::build_prompt(old, new, self.excerpt_chars, &self.audience);
        let raw = self.generator.generate(&prompt).await?;
        debug!(provider = self.generator.name(), len = raw.len(), "generation returned");

        let value = parse::extract_json(&raw)?;
        let result = parse::validate(&value)?;

        // A positive verdict must clear the gate; the gate never drops below the floor.
        let gate = self.min_confidence.max(MIN_MEANINGFUL_CONFIDENCE);
        if result.is_meaningful && result.confidence < gate {
            return Err(ClassifyError::LowConfidence(result.confidence));
        }

        info!(
            provider = self.generator.name(),
            meaningful = result.is_meaningful,
            confidence = result.confidence,
            bullets = result.summary.len(),
            "classification accepted"
        );
        Ok(result)
    }
}
