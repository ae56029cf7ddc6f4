// src/scheduler.rs
//! Run-to-completion trigger: on demand or on a fixed interval, never overlapping.

use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::pipeline::{Pipeline, PipelineError, RunReport};

/// Owns the pipeline, a single-run lock, and the last finished report.
pub struct Runner {
    pipeline: Pipeline,
    running: Mutex<()>,
    last: RwLock<Option<RunReport>>,
}

impl Runner {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline,
            running: Mutex::new(()),
            last: RwLock::new(None),
        }
    }

    /// Run now unless a run is already in progress.
    pub async fn run_now(&self) -> Result<RunReport, PipelineError> {
        let Ok(_guard) = self.running.try_lock() else {
            return Err(PipelineError::Busy);
        };
        let report = self.pipeline.run_once().await?;
        if let Ok(mut last) = self.last.write() {
            *last = Some(report.clone());
        }
        Ok(report)
    }

    pub fn last_report(&self) -> Option<RunReport> {
        self.last.read().ok().and_then(|g| g.clone())
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }
}

/// Tick every `interval` (first tick immediately). Failed runs are logged and the loop
/// keeps going.
pub fn spawn_interval(runner: Arc<Runner>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match runner.run_now().await {
                Ok(report) => tracing::info!(
                    checked = report.checked.len(),
                    meaningful = report.meaningful.len(),
                    "scheduled run complete"
                ),
                Err(PipelineError::Busy) => {
                    tracing::debug!("scheduled tick skipped: run in progress")
                }
                Err(e) => tracing::warn!("scheduled run failed: {e:#}"),
            }
        }
    })
}
