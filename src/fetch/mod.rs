// src/fetch/mod.rs
//! Page fetching: an ordered chain of strategies, each with its own timeout and retry
//! policy. A later strategy runs only when the earlier one failed.

pub mod extract;
pub mod http;
pub mod render;

use async_trait::async_trait;
use metrics::{counter, histogram};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::config::FetchConfig;
use crate::fingerprint::short_id;
use extract::Extracted;
use http::HttpStrategy;
use render::PageRenderer;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("building http client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("request timed out")]
    Timeout,
    #[error("tls/certificate failure: {0}")]
    Tls(String),
    #[error("unexpected HTTP status {0}")]
    Status(u16),
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("extracted text too short ({got} chars, need more than {min})")]
    InsufficientContent { got: usize, min: usize },
    #[error("render failed: {0}")]
    Render(String),
    #[error("no page renderer available")]
    RendererUnavailable,
    #[error("no attempts were made")]
    NoAttempts,
    #[error("all strategies failed (http: {http}; render: {render})")]
    Exhausted { http: String, render: String },
}

/// Accept an extraction only when its main text clears `min_chars`.
pub(crate) fn qualify(extracted: Extracted, min_chars: usize) -> Result<String, FetchError> {
    let got = extracted.main_chars();
    if got > min_chars {
        Ok(extracted.compose())
    } else {
        Err(FetchError::InsufficientContent {
            got,
            min: min_chars,
        })
    }
}

/// What the pipeline needs from a fetcher: page text or a typed reason why not.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

pub struct Fetcher {
    http: HttpStrategy,
    renderer: Arc<dyn PageRenderer>,
    render_min_chars: usize,
    max_supplemental: usize,
}

impl Fetcher {
    pub fn new(cfg: &FetchConfig, renderer: Arc<dyn PageRenderer>) -> Result<Self, FetchError> {
        Ok(Self {
            http: HttpStrategy::new(cfg)?,
            renderer,
            render_min_chars: cfg.render_min_chars,
            max_supplemental: cfg.max_supplemental,
        })
    }

    /// Build with the renderer matching `cfg.render_enabled` and the compiled features.
    pub fn from_config(cfg: &FetchConfig) -> Result<Self, FetchError> {
        let renderer = render::default_renderer(
            cfg.render_enabled,
            Duration::from_secs(cfg.render_timeout_secs),
        );
        Self::new(cfg, renderer)
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.http = self.http.with_retry_delay(delay);
        self
    }

    /// Page text, or `None` once every strategy is exhausted. Never errors.
    pub async fn fetch_text(&self, url: &str) -> Option<String> {
        PageSource::fetch(self, url).await.ok()
    }

    async fn render_strategy(&self, url: &str) -> Result<String, FetchError> {
        let html = self.renderer.render(url).await?;
        qualify(
            extract::extract(&html, self.max_supplemental),
            self.render_min_chars,
        )
    }
}

#[async_trait]
impl PageSource for Fetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let t0 = Instant::now();

        let http_err = match self.http.fetch(url).await {
            Ok(text) => {
                record_success("http", t0);
                info!(%url, strategy = "http", len = text.len(), id = %short_id(&text), "page fetched");
                return Ok(text);
            }
            Err(e) => e,
        };
        counter!("sentinel_fetch_failures_total", "strategy" => "http").increment(1);
        warn!(%url, error = %http_err, "http strategy exhausted; falling back to render");

        match self.render_strategy(url).await {
            Ok(text) => {
                record_success("render", t0);
                info!(%url, strategy = self.renderer.name(), len = text.len(), id = %short_id(&text), "page fetched");
                Ok(text)
            }
            Err(render_err) => {
                counter!("sentinel_fetch_failures_total", "strategy" => "render").increment(1);
                warn!(%url, error = %render_err, "render strategy failed");
                Err(FetchError::Exhausted {
                    http: http_err.to_string(),
                    render: render_err.to_string(),
                })
            }
        }
    }
}

fn record_success(strategy: &'static str, t0: Instant) {
    counter!("sentinel_fetch_success_total", "strategy" => strategy).increment(1);
    histogram!("sentinel_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
}
