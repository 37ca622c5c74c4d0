use std::collections::{HashMap, VecDeque};

use chrono::Utc;
use std::time::Duration;

use crate::config::RetryPolicy;
use crate::error::{Result, SchedulerError};
use crate::persistence::PersistenceEngine;
use crate::scheduler::driver::{
    DriverDescription, DriverLaunch, DriverState, DriverStatus, SubmissionId, SubmissionIdGenerator,
};
use crate::shell;

/// Outcome reported by the execution layer when a launched driver ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationOutcome {
    Finished,
    Failed { reason: String },
    Killed,
}

/// What the registry decided to do with a terminated driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// The driver reached a terminal status and was moved to the
    /// retained history.
    Terminal(DriverStatus),
    /// A supervised driver will be re-queued after the given backoff.
    Retrying { attempt: u32, backoff: Duration },
}

/// Read-only, owned view of the lifecycle collections.
#[derive(Debug, Clone, Default)]
pub struct SchedulerSnapshot {
    /// Queued drivers in first-submitted-first order.
    pub queued: Vec<DriverState>,
    pub launched: Vec<DriverState>,
    pub retrying: Vec<DriverState>,
    /// Recently finished/failed/killed drivers, oldest first, bounded.
    pub terminal: Vec<DriverState>,
}

/// Owns every driver lifecycle collection and drives all state transitions.
///
/// Each submission lives in exactly one of `queued`, `launched`, `retrying`
/// or `terminal`. Every transition is persisted through the engine before
/// the in-memory collections change, so a storage failure leaves the
/// visible state exactly where it was.
pub struct DriverRegistry {
    queued: VecDeque<DriverState>,
    launched: HashMap<SubmissionId, DriverState>,
    retrying: Vec<DriverState>,
    terminal: VecDeque<DriverState>,
    retained_drivers: usize,
    retry: RetryPolicy,
    ids: SubmissionIdGenerator,
    engine: Box<dyn PersistenceEngine>,
}

impl DriverRegistry {
    pub fn new(
        submission_prefix: impl Into<String>,
        retry: RetryPolicy,
        retained_drivers: usize,
        engine: Box<dyn PersistenceEngine>,
    ) -> Self {
        Self {
            queued: VecDeque::new(),
            launched: HashMap::new(),
            retrying: Vec::new(),
            terminal: VecDeque::new(),
            retained_drivers,
            retry,
            ids: SubmissionIdGenerator::new(submission_prefix),
            engine,
        }
    }

    /// Repopulate the collections from the persistence engine.
    ///
    /// Queued records are rebuilt in submission order. Launched and
    /// retrying records are re-queued: launch handles do not survive a
    /// restart, so those drivers must be matched against offers again.
    pub async fn recover(&mut self) -> Result<()> {
        let mut records = self.engine.read_all().await?;
        records.sort_by(|a, b| {
            (a.description.submitted_at, &a.id).cmp(&(b.description.submitted_at, &b.id))
        });

        let total = records.len();
        for mut state in records {
            match state.status {
                DriverStatus::Queued => self.queued.push_back(state),
                DriverStatus::Launched | DriverStatus::Retrying => {
                    state.status = DriverStatus::Queued;
                    state.kill_requested = false;
                    state.launch = None;
                    self.engine.persist(&state.id, &state).await?;
                    self.queued.push_back(state);
                }
                _ => self.retain_terminal(state).await,
            }
        }

        tracing::info!(
            recovered = total,
            queued = self.queued.len(),
            terminal = self.terminal.len(),
            "Recovered scheduler state"
        );
        Ok(())
    }

    /// Accept a new submission: validate, assign an id, persist, enqueue.
    pub async fn submit(&mut self, description: DriverDescription) -> Result<SubmissionId> {
        description.validate()?;

        let id = self.ids.next();
        let state = DriverState::new(id.clone(), description);
        self.engine.persist(&id, &state).await?;

        tracing::info!(submission_id = %id, app_name = %state.description.app_name, "Driver queued");
        self.queued.push_back(state);
        Ok(id)
    }

    /// Kill a submission wherever it currently is.
    ///
    /// Queued and retrying drivers move straight to KILLED. Launched
    /// drivers are marked for termination; the transition to KILLED
    /// happens when the execution layer confirms via [`Self::on_terminated`].
    /// Killing an already-terminal driver is a no-op success.
    pub async fn kill(&mut self, id: &SubmissionId) -> Result<String> {
        if let Some(pos) = self.queued.iter().position(|d| &d.id == id) {
            let mut state = self.queued[pos].clone();
            state.status = DriverStatus::Killed;
            self.engine.persist(id, &state).await?;

            self.queued.remove(pos);
            self.retain_terminal(state).await;
            tracing::info!(submission_id = %id, "Queued driver killed");
            return Ok("driver removed from queue and killed".to_string());
        }

        if let Some(pos) = self.retrying.iter().position(|d| &d.id == id) {
            let mut state = self.retrying[pos].clone();
            state.status = DriverStatus::Killed;
            self.engine.persist(id, &state).await?;

            self.retrying.remove(pos);
            self.retain_terminal(state).await;
            tracing::info!(submission_id = %id, "Retrying driver killed");
            return Ok("driver removed from retry list and killed".to_string());
        }

        if let Some(current) = self.launched.get(id) {
            if current.kill_requested {
                return Ok("kill already requested".to_string());
            }
            let mut state = current.clone();
            state.kill_requested = true;
            self.engine.persist(id, &state).await?;

            self.launched.insert(id.clone(), state);
            tracing::info!(submission_id = %id, "Kill requested for launched driver");
            return Ok("kill request forwarded to the execution layer".to_string());
        }

        if let Some(state) = self.terminal.iter().find(|d| &d.id == id) {
            return Ok(format!("driver already {}", state.status));
        }

        Err(SchedulerError::DriverNotFound(id.to_string()))
    }

    /// The matching layer accepted a resource offer for a queued driver.
    ///
    /// Materializes the escaped launch command, transitions
    /// QUEUED -> LAUNCHED and returns the command line for the execution
    /// layer.
    pub async fn on_offer_accepted(&mut self, id: &SubmissionId) -> Result<String> {
        let pos = self
            .queued
            .iter()
            .position(|d| &d.id == id)
            .ok_or_else(|| SchedulerError::DriverNotFound(id.to_string()))?;

        let mut state = self.queued[pos].clone();
        let command = shell::launch_command(&state.description.command);
        state.status = DriverStatus::Launched;
        state.launch = Some(DriverLaunch {
            command: command.clone(),
            launched_at: Utc::now(),
        });
        self.engine.persist(id, &state).await?;

        self.queued.remove(pos);
        self.launched.insert(id.clone(), state);
        tracing::info!(submission_id = %id, "Driver launched");
        Ok(command)
    }

    /// The execution layer reported that a launched driver ended.
    pub async fn on_terminated(
        &mut self,
        id: &SubmissionId,
        outcome: TerminationOutcome,
    ) -> Result<Disposition> {
        let current = self
            .launched
            .get(id)
            .ok_or_else(|| SchedulerError::DriverNotFound(id.to_string()))?;
        let mut state = current.clone();

        // A driver that dies after a kill request counts as killed, never
        // as a supervised failure.
        let disposition = if state.kill_requested {
            state.status = DriverStatus::Killed;
            Disposition::Terminal(DriverStatus::Killed)
        } else {
            match outcome {
                TerminationOutcome::Finished => {
                    state.status = DriverStatus::Finished;
                    Disposition::Terminal(DriverStatus::Finished)
                }
                TerminationOutcome::Killed => {
                    state.status = DriverStatus::Killed;
                    Disposition::Terminal(DriverStatus::Killed)
                }
                TerminationOutcome::Failed { reason } => {
                    state.last_failure = Some(reason);
                    if state.description.supervise && state.retry_count < self.retry.max_retries {
                        let attempt = state.retry_count + 1;
                        state.retry_count = attempt;
                        state.status = DriverStatus::Retrying;
                        Disposition::Retrying {
                            attempt,
                            backoff: self.retry.backoff_for(attempt),
                        }
                    } else {
                        if state.description.supervise {
                            tracing::warn!(
                                submission_id = %id,
                                retries = state.retry_count,
                                "Retry budget exhausted, driver failed permanently"
                            );
                        }
                        state.status = DriverStatus::Failed;
                        Disposition::Terminal(DriverStatus::Failed)
                    }
                }
            }
        };

        state.launch = None;
        self.engine.persist(id, &state).await?;
        self.launched.remove(id);

        match &disposition {
            Disposition::Terminal(status) => {
                tracing::info!(submission_id = %id, status = %status, "Driver terminated");
                self.retain_terminal(state).await;
            }
            Disposition::Retrying { attempt, backoff } => {
                tracing::info!(
                    submission_id = %id,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    "Supervised driver will be re-queued"
                );
                self.retrying.push(state);
            }
        }
        Ok(disposition)
    }

    /// Move a retrying driver back to the tail of the queue, once its
    /// backoff elapsed. A driver killed while waiting is left alone.
    pub async fn requeue(&mut self, id: &SubmissionId) -> Result<()> {
        let Some(pos) = self.retrying.iter().position(|d| &d.id == id) else {
            return Ok(());
        };

        let mut state = self.retrying[pos].clone();
        state.status = DriverStatus::Queued;
        self.engine.persist(id, &state).await?;

        self.retrying.remove(pos);
        tracing::info!(submission_id = %id, attempt = state.retry_count, "Driver re-queued");
        self.queued.push_back(state);
        Ok(())
    }

    /// Queued submission ids, in submission order, for the matching layer.
    pub fn queued_drivers(&self) -> Vec<SubmissionId> {
        self.queued.iter().map(|d| d.id.clone()).collect()
    }

    /// Find a submission in any collection.
    pub fn find(&self, id: &SubmissionId) -> Option<&DriverState> {
        self.queued
            .iter()
            .find(|d| &d.id == id)
            .or_else(|| self.launched.get(id))
            .or_else(|| self.retrying.iter().find(|d| &d.id == id))
            .or_else(|| self.terminal.iter().find(|d| &d.id == id))
    }

    /// Copy out the current lifecycle collections.
    pub fn snapshot(&self) -> SchedulerSnapshot {
        SchedulerSnapshot {
            queued: self.queued.iter().cloned().collect(),
            launched: self.launched.values().cloned().collect(),
            retrying: self.retrying.clone(),
            terminal: self.terminal.iter().cloned().collect(),
        }
    }

    /// Append to the bounded terminal history, evicting the oldest entry
    /// (and its persisted record) once the bound is exceeded.
    async fn retain_terminal(&mut self, state: DriverState) {
        self.terminal.push_back(state);
        while self.terminal.len() > self.retained_drivers {
            if let Some(evicted) = self.terminal.pop_front() {
                if let Err(e) = self.engine.expunge(&evicted.id).await {
                    tracing::warn!(
                        submission_id = %evicted.id,
                        error = %e,
                        "Failed to expunge evicted terminal driver"
                    );
                }
            }
        }
    }
}
