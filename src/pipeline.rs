// src/pipeline.rs
//! Per-run orchestration: for each source, Fetch → Hash-compare → Classify →
//! Persist + Notify → Update record, strictly one source at a time.

use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::classify::{ClassifyError, Classifier};
use crate::fetch::{FetchError, PageSource};
use crate::fingerprint::fingerprint;
use crate::model::{DetectedChange, MonitoredSource, SourceSnapshot, Summary};
use crate::notify::{Notifier, NotifyError};
use crate::store::{Store, StoreError};

pub const NO_CHANGES_TITLE: &str = "No changes detected";

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("sentinel_runs_total", "Pipeline runs started.");
        describe_counter!("sentinel_sources_checked_total", "Sources fetched successfully.");
        describe_counter!("sentinel_sources_skipped_total", "Sources skipped after fetch failure.");
        describe_counter!("sentinel_changes_detected_total", "Fingerprint changes seen.");
        describe_counter!("sentinel_meaningful_changes_total", "Changes classified as meaningful.");
        describe_counter!("sentinel_notify_failures_total", "Notification delivery failures.");
        describe_counter!("sentinel_classify_fallbacks_total", "Classifications replaced by the safe default.");
        describe_counter!("sentinel_fetch_failures_total", "Fetch strategy failures.");
        describe_counter!("sentinel_fetch_success_total", "Fetch strategy successes.");
        describe_histogram!("sentinel_fetch_ms", "Page fetch time in milliseconds.");
        describe_gauge!("sentinel_last_run_ts", "Unix ts when the pipeline last finished.");
    });
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("store failure: {0}")]
    Store(#[from] StoreError),
    #[error("a run is already in progress")]
    Busy,
}

/// Anything a single pipeline step can fail with.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Classify(#[from] ClassifyError),
    #[error(transparent)]
    Notify(#[from] NotifyError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What the orchestrator does when a step fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Leave this source untouched for this run and move on.
    SkipSource,
    /// Treat the step as "no meaningful change".
    Degrade,
    /// Log, count, and carry on with the current source.
    Continue,
    /// Stop the run and surface the error.
    Abort,
}

impl StepError {
    /// The failure policy, in one place.
    pub fn disposition(&self) -> Disposition {
        match self {
            StepError::Fetch(_) => Disposition::SkipSource,
            StepError::Classify(_) => Disposition::Degrade,
            StepError::Notify(_) => Disposition::Continue,
            StepError::Store(_) => Disposition::Abort,
        }
    }
}

/// Outcome of one run; what a UI or operator polls instead of a re-render flag.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub sources_total: usize,
    /// Names of sources whose fetch succeeded.
    pub checked: Vec<String>,
    /// Names of sources skipped because every fetch strategy failed.
    pub failed: Vec<String>,
    pub unchanged: usize,
    pub changed_not_meaningful: usize,
    /// Names of sources with a recorded meaningful change.
    pub meaningful: Vec<String>,
    pub notifications_failed: usize,
    pub digest_sent: bool,
}

impl RunReport {
    fn start(now: DateTime<Utc>, sources_total: usize) -> Self {
        Self {
            started_at: now,
            finished_at: now,
            sources_total,
            checked: Vec::new(),
            failed: Vec::new(),
            unchanged: 0,
            changed_not_meaningful: 0,
            meaningful: Vec::new(),
            notifications_failed: 0,
            digest_sent: false,
        }
    }
}

enum Outcome {
    Unchanged,
    NotMeaningful,
    Meaningful,
}

pub struct Pipeline {
    fetcher: Arc<dyn PageSource>,
    classifier: Classifier,
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
}

impl Pipeline {
    pub fn new(
        fetcher: Arc<dyn PageSource>,
        classifier: Classifier,
        store: Arc<dyn Store>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            fetcher,
            classifier,
            store,
            notifier,
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Process every monitored source once. Only store failures abort the run.
    pub async fn run_once(&self) -> Result<RunReport, PipelineError> {
        ensure_metrics_described();
        counter!("sentinel_runs_total").increment(1);

        let sources = self.store.list_sources().await?;
        let mut report = RunReport::start(Utc::now(), sources.len());
        info!(sources = sources.len(), "run started");

        for (idx, source) in sources.iter().enumerate() {
            info!(source = %source.name, url = %source.url, n = idx + 1, of = sources.len(), "checking source");

            let content = match self.fetcher.fetch(&source.url).await {
                Ok(c) => c,
                Err(e) => {
                    let err = StepError::from(e);
                    debug_assert_eq!(err.disposition(), Disposition::SkipSource);
                    warn!(source = %source.name, error = %err, "fetch failed; skipping source");
                    counter!("sentinel_sources_skipped_total").increment(1);
                    report.failed.push(source.name.clone());
                    continue;
                }
            };
            report.checked.push(source.name.clone());
            counter!("sentinel_sources_checked_total").increment(1);

            match self.process(source, content, &mut report).await {
                Ok(Outcome::Unchanged) => report.unchanged += 1,
                Ok(Outcome::NotMeaningful) => report.changed_not_meaningful += 1,
                Ok(Outcome::Meaningful) => report.meaningful.push(source.name.clone()),
                Err(e) => {
                    // Store failures are the one Abort case in the policy table.
                    warn!(source = %source.name, error = %e, "store write failed; aborting run");
                    return Err(PipelineError::Store(e));
                }
            }
        }

        if report.meaningful.is_empty() && !report.checked.is_empty() {
            let summary = no_change_digest(&report.checked, &report.failed);
            match self.notifier.notify(NO_CHANGES_TITLE, &summary, None).await {
                Ok(()) => report.digest_sent = true,
                Err(e) => self.notify_failed(StepError::from(e), &mut report),
            }
        }

        report.finished_at = Utc::now();
        gauge!("sentinel_last_run_ts").set(report.finished_at.timestamp() as f64);
        info!(
            checked = report.checked.len(),
            failed = report.failed.len(),
            meaningful = report.meaningful.len(),
            digest = report.digest_sent,
            "run finished"
        );
        Ok(report)
    }

    async fn process(
        &self,
        source: &MonitoredSource,
        content: String,
        report: &mut RunReport,
    ) -> Result<Outcome, StoreError> {
        let new_hash = fingerprint(Some(&content));
        let mut outcome = Outcome::Unchanged;

        if new_hash != source.stored_hash() {
            counter!("sentinel_changes_detected_total").increment(1);
            info!(source = %source.name, "content changed; classifying");
            let analysis = self
                .classifier
                .classify(source.last_content.as_deref(), &content)
                .await;

            if analysis.is_meaningful {
                counter!("sentinel_meaningful_changes_total").increment(1);
                let change = DetectedChange::from_classification(source, &analysis, Utc::now());
                self.store.insert_change(change).await?;

                let summary = Summary::BulletList(analysis.summary);
                if let Err(e) = self
                    .notifier
                    .notify(&source.name, &summary, Some(&source.url))
                    .await
                {
                    self.notify_failed(StepError::from(e), report);
                }
                outcome = Outcome::Meaningful;
            } else {
                info!(source = %source.name, "change not meaningful");
                outcome = Outcome::NotMeaningful;
            }
        } else {
            info!(source = %source.name, "no change");
        }

        // Always refresh the record, even when nothing changed.
        self.store
            .update_source(
                &source.id,
                SourceSnapshot {
                    content,
                    content_hash: new_hash,
                    checked_at: Utc::now(),
                },
            )
            .await?;
        Ok(outcome)
    }

    fn notify_failed(&self, err: StepError, report: &mut RunReport) {
        debug_assert_eq!(err.disposition(), Disposition::Continue);
        warn!(notifier = self.notifier.name(), error = %err, "notification failed");
        counter!("sentinel_notify_failures_total").increment(1);
        report.notifications_failed += 1;
    }
}

/// Digest body listing checked sources and, when any, those that could not be fetched.
pub fn no_change_digest(checked: &[String], failed: &[String]) -> Summary {
    let mut text = String::from("No changes were detected for the following monitored pages:\n\n");
    text.push_str(&bullets(checked));
    if !failed.is_empty() {
        text.push_str("\n\nThe following pages could not be checked this run:\n\n");
        text.push_str(&bullets(failed));
    }
    Summary::PlainText(text)
}

fn bullets(names: &[String]) -> String {
    names
        .iter()
        .map(|n| format!("• {n}"))
        .collect::<Vec<_>>()
        .join("\n")
}
