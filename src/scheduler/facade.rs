use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::config::SchedulerConfig;
use crate::error::{Result, SchedulerError};
use crate::persistence::PersistenceEngine;
use crate::scheduler::driver::{DriverDescription, DriverState, SubmissionId};
use crate::scheduler::registry::{
    Disposition, DriverRegistry, SchedulerSnapshot, TerminationOutcome,
};

/// Result of a submission attempt, as seen by external callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionResult {
    pub success: bool,
    pub submission_id: String,
    pub message: String,
}

/// Result of a kill attempt, as seen by external callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KillResult {
    pub success: bool,
    pub message: String,
}

/// Public operation surface of the scheduler.
///
/// Serializes every mutation through a single write lock over the
/// [`DriverRegistry`], so submit/kill/transition ordering is linearizable
/// as observed by any snapshot. Failures surface as structured results,
/// never as error types crossing this boundary.
pub struct DriverScheduler {
    registry: Arc<RwLock<DriverRegistry>>,
    ready: AtomicBool,
}

impl DriverScheduler {
    pub fn new(config: &SchedulerConfig, engine: Box<dyn PersistenceEngine>) -> Self {
        Self {
            registry: Arc::new(RwLock::new(DriverRegistry::new(
                config.submission_prefix.clone(),
                config.retry.clone(),
                config.retained_drivers,
                engine,
            ))),
            ready: AtomicBool::new(false),
        }
    }

    /// Replay persisted state into the registry. The scheduler accepts no
    /// operations until this has completed successfully.
    pub async fn initialize(&self) -> Result<()> {
        self.registry.write().await.recover().await?;
        self.ready.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Whether recovery replay has completed.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    pub async fn submit(&self, description: DriverDescription) -> SubmissionResult {
        if !self.is_ready() {
            return SubmissionResult {
                success: false,
                submission_id: String::new(),
                message: SchedulerError::NotReady.to_string(),
            };
        }

        match self.registry.write().await.submit(description).await {
            Ok(id) => SubmissionResult {
                success: true,
                submission_id: id.to_string(),
                message: format!("driver queued as {}", id),
            },
            Err(e) => SubmissionResult {
                success: false,
                submission_id: String::new(),
                message: e.to_string(),
            },
        }
    }

    pub async fn kill(&self, id: &SubmissionId) -> KillResult {
        if !self.is_ready() {
            return KillResult {
                success: false,
                message: SchedulerError::NotReady.to_string(),
            };
        }

        match self.registry.write().await.kill(id).await {
            Ok(message) => KillResult {
                success: true,
                message,
            },
            Err(e) => KillResult {
                success: false,
                message: e.to_string(),
            },
        }
    }

    /// Point-in-time copy of all lifecycle collections. Never touches
    /// the persistence engine.
    pub async fn snapshot(&self) -> SchedulerSnapshot {
        self.registry.read().await.snapshot()
    }

    /// Look up a single submission in any collection.
    pub async fn driver_status(&self, id: &SubmissionId) -> Option<DriverState> {
        self.registry.read().await.find(id).cloned()
    }

    /// Queued submission ids for the offer-matching layer.
    pub async fn queued_drivers(&self) -> Vec<SubmissionId> {
        self.registry.read().await.queued_drivers()
    }

    /// Callback from the matching layer: a resource offer was accepted
    /// for this driver. Returns the materialized launch command.
    pub async fn on_offer_accepted(&self, id: &SubmissionId) -> Result<String> {
        self.registry.write().await.on_offer_accepted(id).await
    }

    /// Callback from the execution layer: a launched driver ended.
    ///
    /// A supervised driver with retry budget remaining is re-queued in the
    /// background once its backoff elapses.
    pub async fn on_terminated(&self, id: &SubmissionId, outcome: TerminationOutcome) -> Result<()> {
        let disposition = self.registry.write().await.on_terminated(id, outcome).await?;

        if let Disposition::Retrying { backoff, .. } = disposition {
            let registry = self.registry.clone();
            let id = id.clone();
            tokio::spawn(async move {
                tokio::time::sleep(backoff).await;
                if let Err(e) = registry.write().await.requeue(&id).await {
                    tracing::warn!(submission_id = %id, error = %e, "Failed to re-queue driver");
                }
            });
        }
        Ok(())
    }
}
