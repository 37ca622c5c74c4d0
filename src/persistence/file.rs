use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::{Result, SchedulerError};
use crate::persistence::PersistenceEngine;
use crate::scheduler::{DriverState, SubmissionId};

/// Durable engine keeping one JSON document per submission under a
/// directory.
///
/// Writes go to a temp file first and are moved into place with an atomic
/// rename, so a crash mid-write never leaves a truncated record behind.
#[derive(Debug, Clone)]
pub struct FileStateEngine {
    dir: PathBuf,
}

impl FileStateEngine {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| {
            SchedulerError::Storage(format!("failed to create state dir {}: {}", dir.display(), e))
        })?;
        Ok(Self { dir })
    }

    fn record_path(&self, id: &SubmissionId) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    async fn read_record(path: &Path) -> Result<DriverState> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            SchedulerError::Storage(format!("failed to read {}: {}", path.display(), e))
        })?;
        serde_json::from_slice(&bytes).map_err(|e| {
            SchedulerError::Storage(format!("corrupt record {}: {}", path.display(), e))
        })
    }
}

#[async_trait]
impl PersistenceEngine for FileStateEngine {
    async fn persist(&self, id: &SubmissionId, state: &DriverState) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(state)
            .map_err(|e| SchedulerError::Storage(format!("failed to encode {}: {}", id, e)))?;

        let path = self.record_path(id);
        let tmp = self.dir.join(format!("{}.json.tmp", id));
        tokio::fs::write(&tmp, &bytes).await.map_err(|e| {
            SchedulerError::Storage(format!("failed to write {}: {}", tmp.display(), e))
        })?;
        tokio::fs::rename(&tmp, &path).await.map_err(|e| {
            SchedulerError::Storage(format!("failed to move record into place for {}: {}", id, e))
        })?;
        tracing::debug!(submission_id = %id, path = %path.display(), "Persisted driver state");
        Ok(())
    }

    async fn read(&self, id: &SubmissionId) -> Result<Option<DriverState>> {
        let path = self.record_path(id);
        match tokio::fs::try_exists(&path).await {
            Ok(false) => return Ok(None),
            Ok(true) => {}
            Err(e) => {
                return Err(SchedulerError::Storage(format!(
                    "failed to stat {}: {}",
                    path.display(),
                    e
                )))
            }
        }
        Ok(Some(Self::read_record(&path).await?))
    }

    async fn read_all(&self) -> Result<Vec<DriverState>> {
        let mut entries = tokio::fs::read_dir(&self.dir).await.map_err(|e| {
            SchedulerError::Storage(format!(
                "failed to list state dir {}: {}",
                self.dir.display(),
                e
            ))
        })?;

        let mut records = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| {
            SchedulerError::Storage(format!("failed to walk {}: {}", self.dir.display(), e))
        })? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            records.push(Self::read_record(&path).await?);
        }
        Ok(records)
    }

    async fn expunge(&self, id: &SubmissionId) -> Result<()> {
        let path = self.record_path(id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SchedulerError::Storage(format!(
                "failed to expunge {}: {}",
                id, e
            ))),
        }
    }
}
