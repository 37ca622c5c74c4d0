//! Pluggable durable storage for submission records.

use async_trait::async_trait;

use crate::config::PersistenceMode;
use crate::error::Result;
use crate::scheduler::{DriverState, SubmissionId};

pub mod blackhole;
pub mod file;

pub use blackhole::BlackHoleEngine;
pub use file::FileStateEngine;

/// Durable key/value store for driver state.
///
/// A successful `persist` must be visible to `read`/`read_all` even after
/// a process restart. The registry persists through this trait before it
/// exposes any state change.
#[async_trait]
pub trait PersistenceEngine: Send + Sync {
    async fn persist(&self, id: &SubmissionId, state: &DriverState) -> Result<()>;

    async fn read(&self, id: &SubmissionId) -> Result<Option<DriverState>>;

    async fn read_all(&self) -> Result<Vec<DriverState>>;

    async fn expunge(&self, id: &SubmissionId) -> Result<()>;
}

/// Select the engine implementation from configuration.
pub fn engine_for(mode: &PersistenceMode) -> Result<Box<dyn PersistenceEngine>> {
    match mode {
        PersistenceMode::None => Ok(Box::new(BlackHoleEngine)),
        PersistenceMode::Directory(dir) => Ok(Box::new(FileStateEngine::new(dir)?)),
    }
}
