// src/config/mod.rs
//! Layered configuration: defaults → `config/sentinel.toml` → environment.

pub mod ai;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::{env, fs};

pub use ai::{AiConfig, AiProvider};

// --- env defaults & names ---
pub const DEFAULT_CONFIG_PATH: &str = "config/sentinel.toml";
pub const ENV_CONFIG_PATH: &str = "SENTINEL_CONFIG_PATH";
pub const ENV_STORE_PATH: &str = "SENTINEL_STORE_PATH";
pub const ENV_INTERVAL_SECS: &str = "SENTINEL_INTERVAL_SECS";
pub const ENV_BIND: &str = "SENTINEL_BIND";

pub const DESKTOP_CHROME_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";
pub const GENERIC_BROWSER_UA: &str = "Mozilla/5.0";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading config from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("missing {0} env var")]
    MissingEnv(&'static str),
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// `[fetch]` section: timeouts and thresholds for the page-fetch strategy chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub http_timeout_secs: u64,
    pub http_attempts: u32,
    pub retry_delay_secs: u64,
    /// Strategy A succeeds only when the extracted main text is longer than this.
    pub http_min_chars: usize,
    pub render_enabled: bool,
    pub render_timeout_secs: u64,
    pub render_min_chars: usize,
    pub user_agent: String,
    pub fallback_user_agent: String,
    pub max_supplemental: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            http_timeout_secs: 25,
            http_attempts: 3,
            retry_delay_secs: 15,
            http_min_chars: 500,
            render_enabled: true,
            render_timeout_secs: 60,
            render_min_chars: 200,
            user_agent: DESKTOP_CHROME_UA.to_string(),
            fallback_user_agent: GENERIC_BROWSER_UA.to_string(),
            max_supplemental: 10,
        }
    }
}

/// `[email]` section. When disabled, notifications are only logged.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub enabled: bool,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    /// "ENV" means: read from SMTP_PASSWORD
    pub password: String,
    /// Sender address; empty means `username`.
    pub from: String,
    pub subject_prefix: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_host: String::new(),
            smtp_port: 465,
            username: String::new(),
            password: "ENV".to_string(),
            from: String::new(),
            subject_prefix: "Page Sentinel Alert".to_string(),
        }
    }
}

impl EmailConfig {
    pub fn sender(&self) -> &str {
        if self.from.trim().is_empty() {
            &self.username
        } else {
            &self.from
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("state/sentinel.json"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub interval_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        // 6h
        Self {
            interval_secs: 21_600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub metrics: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
            metrics: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SentinelConfig {
    pub fetch: FetchConfig,
    pub ai: AiConfig,
    pub email: EmailConfig,
    pub store: StoreConfig,
    pub schedule: ScheduleConfig,
    pub server: ServerConfig,
}

impl SentinelConfig {
    /// Parse TOML text without touching the environment.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let mut cfg: SentinelConfig = toml::from_str(s)?;
        cfg.sanitize();
        Ok(cfg)
    }

    /// Load from an explicit file, then apply env overrides and resolve secrets.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut cfg = Self::from_toml_str(&content)?;
        cfg.apply_env()?;
        Ok(cfg)
    }

    /// Load using env var + fallbacks:
    /// 1) $SENTINEL_CONFIG_PATH (must exist)
    /// 2) config/sentinel.toml
    /// 3) built-in defaults
    pub fn load_default() -> Result<Self, ConfigError> {
        if let Ok(p) = env::var(ENV_CONFIG_PATH) {
            return Self::load_from(Path::new(&p));
        }
        let default_path = Path::new(DEFAULT_CONFIG_PATH);
        if default_path.exists() {
            return Self::load_from(default_path);
        }
        let mut cfg = Self::default();
        cfg.apply_env()?;
        Ok(cfg)
    }

    /// Env overrides for deployment-specific values, then secret resolution.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(v) = env::var(ENV_STORE_PATH) {
            self.store.path = PathBuf::from(v);
        }
        if let Ok(v) = env::var(ENV_INTERVAL_SECS) {
            self.schedule.interval_secs = v.trim().parse().map_err(|_| ConfigError::Invalid {
                key: ENV_INTERVAL_SECS,
                value: v.clone(),
            })?;
        }
        if let Ok(v) = env::var(ENV_BIND) {
            self.server.bind = v;
        }
        if let Ok(v) = env::var("SMTP_HOST").or_else(|_| env::var("SMTP_SERVER")) {
            self.email.smtp_host = v;
        }
        if let Ok(v) = env::var("SMTP_PORT") {
            self.email.smtp_port = v.trim().parse().map_err(|_| ConfigError::Invalid {
                key: "SMTP_PORT",
                value: v.clone(),
            })?;
        }
        if let Ok(v) = env::var("SMTP_USER") {
            self.email.username = v;
        }
        if let Ok(v) = env::var("SENDER_EMAIL") {
            self.email.from = v;
        }

        self.ai.resolve_api_key()?;
        if self.email.enabled && self.email.password.trim().eq_ignore_ascii_case("env") {
            self.email.password =
                env::var("SMTP_PASSWORD").map_err(|_| ConfigError::MissingEnv("SMTP_PASSWORD"))?;
        }
        self.sanitize();
        Ok(())
    }

    fn sanitize(&mut self) {
        self.ai.sanitize();
        self.fetch.http_attempts = self.fetch.http_attempts.max(1);
        self.fetch.http_timeout_secs = self.fetch.http_timeout_secs.max(1);
        self.fetch.render_timeout_secs = self.fetch.render_timeout_secs.max(1);
        self.schedule.interval_secs = self.schedule.interval_secs.max(1);
    }
}
