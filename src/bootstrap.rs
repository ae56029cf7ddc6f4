// src/bootstrap.rs
//! Wires config into concrete collaborators: store, fetcher, classifier, notifier.

use anyhow::Context;
use std::sync::Arc;
use tracing::{info, warn};

use crate::classify::Classifier;
use crate::config::{AiProvider, SentinelConfig};
use crate::fetch::Fetcher;
use crate::notify::{EmailNotifier, LogNotifier, Notifier};
use crate::pipeline::Pipeline;
use crate::scheduler::Runner;
use crate::store::{JsonFileStore, Store};

pub struct SentinelRuntime {
    pub cfg: SentinelConfig,
    pub runner: Arc<Runner>,
}

impl SentinelRuntime {
    pub fn from_config(cfg: SentinelConfig) -> anyhow::Result<Self> {
        let store: Arc<dyn Store> = Arc::new(JsonFileStore::new(cfg.store.path.clone()));

        let fetcher = Fetcher::from_config(&cfg.fetch).context("building fetcher")?;
        let classifier = Classifier::from_config(&cfg.ai).context("building classifier")?;

        let notifier: Arc<dyn Notifier> = if cfg.email.enabled {
            Arc::new(
                EmailNotifier::from_config(&cfg.email, store.clone())
                    .context("building email notifier")?,
            )
        } else {
            warn!("email disabled; notifications will only be logged");
            Arc::new(LogNotifier)
        };

        // Safe diagnostics: only provider + key length
        info!(
            provider = classifier.provider_name(),
            model = cfg.ai.model_name(),
            key_len = cfg.ai.api_key.len(),
            store = %cfg.store.path.display(),
            notifier = notifier.name(),
            "sentinel configured"
        );
        if cfg.ai.provider == AiProvider::Disabled {
            warn!("text generation disabled: every change will classify as not meaningful");
        }

        let pipeline = Pipeline::new(Arc::new(fetcher), classifier, store, notifier);
        Ok(Self {
            cfg,
            runner: Arc::new(Runner::new(pipeline)),
        })
    }

    /// Classify a canned change once and log the verdict. Never fails.
    pub async fn quick_probe(&self) {
        let classifier = match Classifier::from_config(&self.cfg.ai) {
            Ok(c) => c,
            Err(e) => {
                warn!("probe skipped: {e}");
                return;
            }
        };
        let old = "Admissions open. Last date to apply: June 1.";
        let new = "Admissions open. Last date to apply: July 15. Application fee revised to 3000.";
        let out = classifier.try_classify(Some(old), new).await;
        info!("classifier probe => {:?}", out);
    }
}
