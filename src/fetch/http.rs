// src/fetch/http.rs
//! Strategy A: browser-impersonating HTTP GET with bounded retries and a one-shot
//! certificate-tolerant retry for misconfigured TLS.

use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use std::error::Error;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use super::{extract::extract, qualify, FetchError};
use crate::config::FetchConfig;

/// Which client an attempt goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    Verified,
    /// Certificate checks off, generic User-Agent.
    Unverified,
}

pub struct HttpStrategy {
    client: Client,
    insecure: Client,
    attempts: u32,
    retry_delay: Duration,
    min_chars: usize,
    max_supplemental: usize,
}

fn browser_headers() -> HeaderMap {
    let mut h = HeaderMap::new();
    h.insert(
        header::ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
        ),
    );
    h.insert(
        header::ACCEPT_LANGUAGE,
        HeaderValue::from_static("en-US,en;q=0.9"),
    );
    h.insert(
        header::UPGRADE_INSECURE_REQUESTS,
        HeaderValue::from_static("1"),
    );
    h.insert("sec-ch-ua-mobile", HeaderValue::from_static("?0"));
    h.insert("sec-ch-ua-platform", HeaderValue::from_static("\"Windows\""));
    h
}

impl HttpStrategy {
    pub fn new(cfg: &FetchConfig) -> Result<Self, FetchError> {
        let timeout = Duration::from_secs(cfg.http_timeout_secs);
        let client = Client::builder()
            .user_agent(&cfg.user_agent)
            .default_headers(browser_headers())
            .cookie_store(true)
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .timeout(timeout)
            .build()
            .map_err(FetchError::Client)?;
        let insecure = Client::builder()
            .user_agent(&cfg.fallback_user_agent)
            .danger_accept_invalid_certs(true)
            .timeout(timeout)
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self {
            client,
            insecure,
            attempts: cfg.http_attempts.max(1),
            retry_delay: Duration::from_secs(cfg.retry_delay_secs),
            min_chars: cfg.http_min_chars,
            max_supplemental: cfg.max_supplemental,
        })
    }

    /// Test hook: shorten the sleep between attempts.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.run_attempts(url, |mode| self.attempt(mode, url)).await
    }

    /// Attempt loop: retries with a sleep in between, except that a TLS failure gets
    /// exactly one unverified retry and a thin document ends the strategy at once.
    pub(crate) async fn run_attempts<F, Fut>(&self, url: &str, mut attempt: F) -> Result<String, FetchError>
    where
        F: FnMut(Mode) -> Fut,
        Fut: Future<Output = Result<String, FetchError>>,
    {
        let mut last_err = FetchError::NoAttempts;
        for n in 1..=self.attempts {
            match attempt(Mode::Verified).await {
                Ok(text) => return Ok(text),
                Err(FetchError::Tls(msg)) => {
                    warn!(%url, attempt = n, error = %msg, "tls verification failed; retrying without verification");
                    metrics::counter!("sentinel_fetch_tls_fallback_total").increment(1);
                    return attempt(Mode::Unverified).await;
                }
                Err(e @ FetchError::InsufficientContent { .. }) => {
                    debug!(%url, attempt = n, error = %e, "thin document; skipping remaining http attempts");
                    return Err(e);
                }
                Err(e) => {
                    warn!(%url, attempt = n, of = self.attempts, error = %e, "http attempt failed");
                    last_err = e;
                    if n < self.attempts {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }
        Err(last_err)
    }

    pub(crate) async fn attempt(&self, mode: Mode, url: &str) -> Result<String, FetchError> {
        let client = match mode {
            Mode::Verified => &self.client,
            Mode::Unverified => &self.insecure,
        };
        let resp = client.get(url).send().await.map_err(classify_send_error)?;
        let status = resp.status();
        if status != StatusCode::OK {
            return Err(FetchError::Status(status.as_u16()));
        }
        let body = resp.text().await.map_err(classify_send_error)?;
        qualify(extract(&body, self.max_supplemental), self.min_chars)
    }
}

/// Map a reqwest failure onto the fetch taxonomy; certificate problems get their own
/// variant so the caller can take the unverified path.
pub(crate) fn classify_send_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::Timeout;
    }
    let causes = cause_chain(&err);
    if looks_like_tls_failure(&causes) {
        return FetchError::Tls(causes);
    }
    FetchError::Transport(err)
}

/// Messages of every underlying cause, skipping the top-level error. reqwest's own
/// message embeds the request URL, which must not influence classification.
pub(crate) fn cause_chain(err: &dyn Error) -> String {
    let mut parts = Vec::new();
    let mut cur = err.source();
    while let Some(e) = cur {
        parts.push(e.to_string());
        cur = e.source();
    }
    parts.join(": ")
}

// rustls and openssl wordings for verification and handshake failures.
const TLS_MARKERS: &[&str] = &[
    "certificate",
    "unknownissuer",
    "handshakefailure",
    "handshake failure",
    "ssl routines",
    "peer misbehaved",
];

pub(crate) fn looks_like_tls_failure(causes: &str) -> bool {
    let causes = causes.to_ascii_lowercase();
    TLS_MARKERS.iter().any(|m| causes.contains(m))
}
