// src/store/mod.rs
//! Record store the pipeline reads sources/subscribers from and writes results to.

pub mod json_file;
pub mod memory;

use async_trait::async_trait;

use crate::model::{DetectedChange, MonitoredSource, SourceSnapshot, Subscriber};

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("monitored source `{0}` not found")]
    NotFound(String),
    #[error("store io: {0}")]
    Io(#[from] std::io::Error),
    #[error("store data: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("store backend: {0}")]
    Backend(String),
}

/// Each call is independent; no transactions span calls.
#[async_trait]
pub trait Store: Send + Sync {
    async fn list_sources(&self) -> Result<Vec<MonitoredSource>, StoreError>;
    async fn update_source(&self, id: &str, snapshot: SourceSnapshot) -> Result<(), StoreError>;
    async fn insert_change(&self, change: DetectedChange) -> Result<(), StoreError>;
    async fn list_changes(&self) -> Result<Vec<DetectedChange>, StoreError>;
    async fn list_subscribers(&self) -> Result<Vec<Subscriber>, StoreError>;
}
