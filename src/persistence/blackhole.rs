use async_trait::async_trait;

use crate::error::Result;
use crate::persistence::PersistenceEngine;
use crate::scheduler::{DriverState, SubmissionId};

/// Persistence engine that provides no durability.
///
/// Every operation succeeds and stores nothing; `read_all` always returns
/// an empty set, so a restarted scheduler starts from a clean slate. Used
/// when durability is explicitly not required.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlackHoleEngine;

#[async_trait]
impl PersistenceEngine for BlackHoleEngine {
    async fn persist(&self, _id: &SubmissionId, _state: &DriverState) -> Result<()> {
        Ok(())
    }

    async fn read(&self, _id: &SubmissionId) -> Result<Option<DriverState>> {
        Ok(None)
    }

    async fn read_all(&self) -> Result<Vec<DriverState>> {
        Ok(Vec::new())
    }

    async fn expunge(&self, _id: &SubmissionId) -> Result<()> {
        Ok(())
    }
}
