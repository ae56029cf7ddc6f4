// src/store/memory.rs
use async_trait::async_trait;
use std::sync::Mutex;

use super::{Store, StoreError};
use crate::model::{DetectedChange, MonitoredSource, SourceSnapshot, Subscriber};

/// In-process store for tests and embedding. Can be told to fail writes.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Tables>,
}

#[derive(Default)]
struct Tables {
    sources: Vec<MonitoredSource>,
    changes: Vec<DetectedChange>,
    subscribers: Vec<Subscriber>,
    update_calls: usize,
    fail_updates: bool,
}

impl MemoryStore {
    pub fn new(sources: Vec<MonitoredSource>, subscribers: Vec<Subscriber>) -> Self {
        Self {
            inner: Mutex::new(Tables {
                sources,
                subscribers,
                ..Tables::default()
            }),
        }
    }

    /// Make every subsequent `update_source` fail with a backend error.
    pub fn fail_updates(&self, on: bool) {
        self.tables().fail_updates = on;
    }

    pub fn source(&self, id: &str) -> Option<MonitoredSource> {
        self.tables().sources.iter().find(|s| s.id == id).cloned()
    }

    pub fn changes(&self) -> Vec<DetectedChange> {
        self.tables().changes.clone()
    }

    pub fn update_calls(&self) -> usize {
        self.tables().update_calls
    }

    fn tables(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn list_sources(&self) -> Result<Vec<MonitoredSource>, StoreError> {
        Ok(self.tables().sources.clone())
    }

    async fn update_source(&self, id: &str, snapshot: SourceSnapshot) -> Result<(), StoreError> {
        let mut t = self.tables();
        t.update_calls += 1;
        if t.fail_updates {
            return Err(StoreError::Backend("update rejected".into()));
        }
        let src = t
            .sources
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        src.last_content = Some(snapshot.content);
        src.content_hash = Some(snapshot.content_hash);
        src.last_checked = Some(snapshot.checked_at);
        Ok(())
    }

    async fn insert_change(&self, change: DetectedChange) -> Result<(), StoreError> {
        self.tables().changes.push(change);
        Ok(())
    }

    async fn list_changes(&self) -> Result<Vec<DetectedChange>, StoreError> {
        Ok(self.tables().changes.clone())
    }

    async fn list_subscribers(&self) -> Result<Vec<Subscriber>, StoreError> {
        Ok(self.tables().subscribers.clone())
    }
}
