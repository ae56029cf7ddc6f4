// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod bootstrap;
pub mod classify;
pub mod cli;
pub mod config;
pub mod fetch;
pub mod fingerprint;
pub mod metrics;
pub mod model;
pub mod notify;
pub mod pipeline;
pub mod scheduler;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::classify::Classifier;
pub use crate::fetch::{Fetcher, PageSource};
pub use crate::fingerprint::fingerprint;
pub use crate::model::{ClassificationResult, DetectedChange, MonitoredSource, Subscriber, Summary};
pub use crate::notify::Notifier;
pub use crate::pipeline::{Pipeline, RunReport};
pub use crate::store::Store;
