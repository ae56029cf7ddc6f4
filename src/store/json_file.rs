// src/store/json_file.rs
//! Single-document JSON store: `{ "sources": [...], "changes": [...], "subscribers": [...] }`.
//! Sources and subscribers are edited by hand (or another tool); the pipeline only
//! applies snapshots and appends changes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::{fs, sync::Mutex};

use super::{Store, StoreError};
use crate::model::{DetectedChange, MonitoredSource, SourceSnapshot, Subscriber};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreDocument {
    #[serde(default)]
    pub sources: Vec<MonitoredSource>,
    #[serde(default)]
    pub changes: Vec<DetectedChange>,
    #[serde(default)]
    pub subscribers: Vec<Subscriber>,
}

pub struct JsonFileStore {
    path: PathBuf,
    // serialises read-modify-write cycles within this process
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file reads as an empty document.
    pub async fn read(&self) -> Result<StoreDocument, StoreError> {
        match fs::read_to_string(&self.path).await {
            Ok(s) if s.trim().is_empty() => Ok(StoreDocument::default()),
            Ok(s) => Ok(serde_json::from_str(&s)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StoreDocument::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write via tmp file + rename so readers never see a half-written document.
    pub async fn write(&self, doc: &StoreDocument) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(doc)?).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    async fn modify<F>(&self, f: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut StoreDocument) -> Result<(), StoreError> + Send,
    {
        let _guard = self.lock.lock().await;
        let mut doc = self.read().await?;
        f(&mut doc)?;
        self.write(&doc).await
    }
}

#[async_trait]
impl Store for JsonFileStore {
    async fn list_sources(&self) -> Result<Vec<MonitoredSource>, StoreError> {
        let _guard = self.lock.lock().await;
        Ok(self.read().await?.sources)
    }

    async fn update_source(&self, id: &str, snapshot: SourceSnapshot) -> Result<(), StoreError> {
        self.modify(|doc| {
            let src = doc
                .sources
                .iter_mut()
                .find(|s| s.id == id)
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            src.last_content = Some(snapshot.content);
            src.content_hash = Some(snapshot.content_hash);
            src.last_checked = Some(snapshot.checked_at);
            Ok(())
        })
        .await
    }

    async fn insert_change(&self, change: DetectedChange) -> Result<(), StoreError> {
        self.modify(|doc| {
            doc.changes.push(change);
            Ok(())
        })
        .await
    }

    async fn list_changes(&self) -> Result<Vec<DetectedChange>, StoreError> {
        let _guard = self.lock.lock().await;
        Ok(self.read().await?.changes)
    }

    async fn list_subscribers(&self) -> Result<Vec<Subscriber>, StoreError> {
        let _guard = self.lock.lock().await;
        Ok(self.read().await?.subscribers)
    }
}
