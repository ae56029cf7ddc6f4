// src/notify/mod.rs
//! Notification sinks. The pipeline hands over a title, a [`Summary`], and an optional
//! page link; each sink decides how to render and deliver it.

pub mod email;
pub mod render;

use std::sync::Mutex;

use crate::model::Summary;

pub use email::EmailNotifier;
pub use render::{render_html, render_plain, RenderedBody};

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("loading subscribers: {0}")]
    Subscribers(#[from] crate::store::StoreError),
    #[error("building message: {0}")]
    Build(String),
    #[error("delivery failed: {0}")]
    Delivery(String),
}

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver to all current subscribers; a no-op when there are none.
    async fn notify(&self, title: &str, summary: &Summary, url: Option<&str>)
        -> Result<(), NotifyError>;
    fn name(&self) -> &'static str;
}

/// Logs the rendered plain-text body instead of sending anything.
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn notify(
        &self,
        title: &str,
        summary: &Summary,
        url: Option<&str>,
    ) -> Result<(), NotifyError> {
        let body = render_plain(summary, url);
        tracing::info!(target: "notify", %title, body = %body, "notification (email disabled)");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// One captured `notify` call.
#[derive(Debug, Clone, PartialEq)]
pub struct SentNotification {
    pub title: String,
    pub summary: Summary,
    pub url: Option<String>,
}

// --- Test helper ---
#[derive(Default)]
pub struct RecordingNotifier {
    pub calls: Mutex<Vec<SentNotification>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records calls but reports every delivery as failed.
    pub fn failing() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        self.calls.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(
        &self,
        title: &str,
        summary: &Summary,
        url: Option<&str>,
    ) -> Result<(), NotifyError> {
        self.calls
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(SentNotification {
                title: title.to_string(),
                summary: summary.clone(),
                url: url.map(str::to_string),
            });
        if self.fail {
            return Err(NotifyError::Delivery("smtp unavailable".into()));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}
