use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::error::StoreError;
use super::types::{ChildProcedure, ProcedureId, ProcedureKind, TerminalOutcome};
use crate::cluster::RegionInfo;
use crate::config::StoreConfig;

const RECORD_SUFFIX: &str = ".procedure.json";

/// A child procedure the executor is waiting on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledChild {
    pub id: ProcedureId,
    pub parent: ProcedureId,
    pub request: ChildProcedure,
}

/// Durable snapshot of one unfinished procedure.
///
/// The region is the procedure's own identity; the kind-specific payload in
/// `state_data` never repeats it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcedureRecord {
    pub id: ProcedureId,
    pub kind: ProcedureKind,
    pub region: RegionInfo,
    pub state_id: i32,
    pub state_data: Vec<u8>,
    pub pending_children: Vec<ScheduledChild>,
    /// Set once the procedure reached a terminal outcome but still waits on
    /// children scheduled by its last step
    pub outcome: Option<TerminalOutcome>,
    /// Whether the procedure held its region lock when persisted
    #[serde(default)]
    pub lock_held: bool,
    pub last_persisted: DateTime<Utc>,
}

/// Trait for procedure persistence operations
#[async_trait]
pub trait ProcedureStore: Send + Sync {
    /// Insert or replace the record for `record.id`
    async fn save(&self, record: &ProcedureRecord) -> Result<(), StoreError>;

    async fn load(&self, id: &ProcedureId) -> Result<Option<ProcedureRecord>, StoreError>;

    /// Every unfinished procedure, for crash recovery
    async fn load_all(&self) -> Result<Vec<ProcedureRecord>, StoreError>;

    /// Forget a finished procedure; deleting a missing record is not an error
    async fn delete(&self, id: &ProcedureId) -> Result<(), StoreError>;
}

#[async_trait]
impl<T: ProcedureStore + ?Sized> ProcedureStore for Arc<T> {
    async fn save(&self, record: &ProcedureRecord) -> Result<(), StoreError> {
        (**self).save(record).await
    }

    async fn load(&self, id: &ProcedureId) -> Result<Option<ProcedureRecord>, StoreError> {
        (**self).load(id).await
    }

    async fn load_all(&self) -> Result<Vec<ProcedureRecord>, StoreError> {
        (**self).load_all().await
    }

    async fn delete(&self, id: &ProcedureId) -> Result<(), StoreError> {
        (**self).delete(id).await
    }
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: RwLock<HashMap<ProcedureId, ProcedureRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl ProcedureStore for InMemoryStore {
    async fn save(&self, record: &ProcedureRecord) -> Result<(), StoreError> {
        self.records.write().await.insert(record.id, record.clone());
        Ok(())
    }

    async fn load(&self, id: &ProcedureId) -> Result<Option<ProcedureRecord>, StoreError> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn load_all(&self) -> Result<Vec<ProcedureRecord>, StoreError> {
        Ok(self.records.read().await.values().cloned().collect())
    }

    async fn delete(&self, id: &ProcedureId) -> Result<(), StoreError> {
        self.records.write().await.remove(id);
        Ok(())
    }
}

/// File system implementation: one JSON file per procedure
#[derive(Debug, Clone)]
pub struct FileSystemStore {
    directory: PathBuf,
}

impl FileSystemStore {
    pub fn new(config: &StoreConfig) -> Self {
        Self::with_directory(&config.directory)
    }

    pub fn with_directory(directory: impl AsRef<Path>) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn record_path(&self, id: &ProcedureId) -> PathBuf {
        self.directory.join(format!("{}{}", id, RECORD_SUFFIX))
    }

    async fn read_record(&self, path: &Path) -> Result<ProcedureRecord, StoreError> {
        let bytes = fs::read(path).await?;
        serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupted {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl ProcedureStore for FileSystemStore {
    async fn save(&self, record: &ProcedureRecord) -> Result<(), StoreError> {
        fs::create_dir_all(&self.directory).await?;

        let path = self.record_path(&record.id);
        let temp_path = path.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(record)?;

        // rename is atomic, so a crash never leaves a half-written record
        fs::write(&temp_path, &json).await?;
        fs::rename(&temp_path, &path).await?;

        debug!(procedure_id = %record.id, path = ?path, "Saved procedure record");
        Ok(())
    }

    async fn load(&self, id: &ProcedureId) -> Result<Option<ProcedureRecord>, StoreError> {
        let path = self.record_path(id);
        if !fs::try_exists(&path).await? {
            return Ok(None);
        }
        self.read_record(&path).await.map(Some)
    }

    async fn load_all(&self) -> Result<Vec<ProcedureRecord>, StoreError> {
        if !fs::try_exists(&self.directory).await? {
            return Ok(Vec::new());
        }

        let mut records = Vec::new();
        let mut entries = fs::read_dir(&self.directory).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_record = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.ends_with(RECORD_SUFFIX));
            if !is_record {
                continue;
            }
            match self.read_record(&path).await {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(path = ?path, error = %e, "Refusing to recover from corrupted store");
                    return Err(e);
                }
            }
        }
        Ok(records)
    }

    async fn delete(&self, id: &ProcedureId) -> Result<(), StoreError> {
        match fs::remove_file(self.record_path(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
