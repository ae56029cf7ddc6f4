// src/model.rs
//! Records shared by the fetch → classify → notify pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Minimum confidence a positive classification must carry to survive the classifier.
pub const MIN_MEANINGFUL_CONFIDENCE: f64 = 0.6;

/// A web page tracked for content changes. Created outside the core; the pipeline only
/// ever applies a [`SourceSnapshot`] to it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonitoredSource {
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub last_content: Option<String>,
    #[serde(default)]
    pub content_hash: Option<String>,
    #[serde(default)]
    pub last_checked: Option<DateTime<Utc>>,
}

impl MonitoredSource {
    pub fn new(id: impl Into<String>, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            url: url.into(),
            last_content: None,
            content_hash: None,
            last_checked: None,
        }
    }

    /// Stored fingerprint, with "never fetched" mapped to the empty fingerprint.
    pub fn stored_hash(&self) -> &str {
        self.content_hash.as_deref().unwrap_or("")
    }
}

/// The fields the pipeline writes back after every successful fetch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceSnapshot {
    pub content: String,
    pub content_hash: String,
    pub checked_at: DateTime<Utc>,
}

/// Parsed + validated verdict from the text-generation service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassificationResult {
    pub is_meaningful: bool,
    pub summary: Vec<String>,
    pub confidence: f64,
}

impl ClassificationResult {
    /// The canonical "nothing worth reporting" verdict every failure path converges to.
    pub fn safe_default() -> Self {
        Self {
            is_meaningful: false,
            summary: Vec::new(),
            confidence: 0.0,
        }
    }

    pub fn is_safe_default(&self) -> bool {
        *self == Self::safe_default()
    }
}

impl Default for ClassificationResult {
    fn default() -> Self {
        Self::safe_default()
    }
}

/// Notification body: free text or a list of bullet points.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Summary {
    PlainText(String),
    BulletList(Vec<String>),
}

impl Summary {
    /// Single-string form used for storage: one `• item` line per bullet.
    pub fn to_bullet_text(&self) -> String {
        match self {
            Summary::PlainText(text) => text.clone(),
            Summary::BulletList(items) => items
                .iter()
                .map(|item| format!("• {item}"))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// A meaningful change recorded by the pipeline. Only the read flag is ever changed
/// afterwards, and never by the core.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetectedChange {
    pub id: Uuid,
    pub source_id: String,
    pub title: String,
    pub summary: String,
    pub is_meaningful: bool,
    pub url: String,
    #[serde(default)]
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl DetectedChange {
    /// Project a meaningful classification onto a storable record.
    pub fn from_classification(
        source: &MonitoredSource,
        result: &ClassificationResult,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_id: source.id.clone(),
            title: source.name.clone(),
            summary: Summary::BulletList(result.summary.clone()).to_bullet_text(),
            is_meaningful: true,
            url: source.url.clone(),
            is_read: false,
            created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Subscriber {
    pub email: String,
}

impl Subscriber {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
        }
    }
}
