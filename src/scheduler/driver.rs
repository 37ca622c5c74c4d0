use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, SchedulerError};

/// Unique identifier of one accepted submission.
///
/// Issued once at acceptance and never reused. Within a single scheduler
/// process, later submissions always compare greater, so the id doubles as
/// a submission-order tiebreaker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubmissionId(String);

impl SubmissionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SubmissionId {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl From<&str> for SubmissionId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl std::fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Issues submission ids of the form
/// `{prefix}-{instance}-{yyyymmddHHMMSS}-{seq:04}`.
///
/// The instance discriminator is fresh per process, so ids can never
/// collide with ones issued by an earlier incarnation of the scheduler.
#[derive(Debug)]
pub struct SubmissionIdGenerator {
    prefix: String,
    instance: String,
    next_seq: u64,
}

impl SubmissionIdGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        let instance = Uuid::new_v4().simple().to_string()[..8].to_string();
        Self {
            prefix: prefix.into(),
            instance,
            next_seq: 0,
        }
    }

    pub fn next(&mut self) -> SubmissionId {
        let stamp = Utc::now().format("%Y%m%d%H%M%S");
        let seq = self.next_seq;
        self.next_seq += 1;
        SubmissionId(format!(
            "{}-{}-{}-{:04}",
            self.prefix, self.instance, stamp, seq
        ))
    }
}

/// Command used to start a driver process, escaped and assembled into a
/// single shell line when the driver is launched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverCommand {
    /// Main entry point (binary or main class).
    pub entrypoint: String,
    pub arguments: Vec<String>,
    pub environment: BTreeMap<String, String>,
    pub classpath_entries: Vec<String>,
    pub library_path_entries: Vec<String>,
}

/// Immutable description of a requested driver launch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverDescription {
    pub app_name: String,
    pub command: DriverCommand,
    pub memory_mb: u64,
    pub cores: u32,
    /// Resubmit automatically on non-user failure, up to the retry budget.
    pub supervise: bool,
    pub properties: BTreeMap<String, String>,
    pub submitted_at: DateTime<Utc>,
}

impl DriverDescription {
    /// Check the description before any state is created for it.
    pub fn validate(&self) -> Result<()> {
        if self.app_name.trim().is_empty() {
            return Err(SchedulerError::Validation(
                "application name must not be empty".to_string(),
            ));
        }
        if self.command.entrypoint.trim().is_empty() {
            return Err(SchedulerError::Validation(
                "entry point must not be empty".to_string(),
            ));
        }
        if self.memory_mb == 0 {
            return Err(SchedulerError::Validation(
                "requested memory must be positive".to_string(),
            ));
        }
        if self.cores == 0 {
            return Err(SchedulerError::Validation(
                "requested cores must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriverStatus {
    Queued,
    Launched,
    Retrying,
    Finished,
    Failed,
    Killed,
}

impl DriverStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DriverStatus::Finished | DriverStatus::Failed | DriverStatus::Killed
        )
    }
}

impl std::fmt::Display for DriverStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DriverStatus::Queued => write!(f, "queued"),
            DriverStatus::Launched => write!(f, "launched"),
            DriverStatus::Retrying => write!(f, "retrying"),
            DriverStatus::Finished => write!(f, "finished"),
            DriverStatus::Failed => write!(f, "failed"),
            DriverStatus::Killed => write!(f, "killed"),
        }
    }
}

/// Launch-time handles. Not assumed durable across scheduler restarts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverLaunch {
    /// Fully escaped shell command line handed to the execution layer.
    pub command: String,
    pub launched_at: DateTime<Utc>,
}

/// Mutable record of one submission, persisted on every transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverState {
    pub id: SubmissionId,
    pub description: DriverDescription,
    pub status: DriverStatus,
    pub retry_count: u32,
    pub last_failure: Option<String>,
    /// Set once a kill was requested for a launched driver; the transition
    /// to KILLED happens when the execution layer confirms termination.
    #[serde(default)]
    pub kill_requested: bool,
    pub launch: Option<DriverLaunch>,
}

impl DriverState {
    pub fn new(id: SubmissionId, description: DriverDescription) -> Self {
        Self {
            id,
            description,
            status: DriverStatus::Queued,
            retry_count: 0,
            last_failure: None,
            kill_requested: false,
            launch: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn description() -> DriverDescription {
        DriverDescription {
            app_name: "wordcount".to_string(),
            command: DriverCommand {
                entrypoint: "org.example.WordCount".to_string(),
                arguments: vec!["input.txt".to_string()],
                environment: BTreeMap::new(),
                classpath_entries: vec![],
                library_path_entries: vec![],
            },
            memory_mb: 512,
            cores: 1,
            supervise: false,
            properties: BTreeMap::new(),
            submitted_at: Utc::now(),
        }
    }

    #[test]
    fn valid_description_passes() {
        assert!(description().validate().is_ok());
    }

    #[test]
    fn zero_memory_is_rejected() {
        let mut desc = description();
        desc.memory_mb = 0;
        assert!(desc.validate().is_err());
    }

    #[test]
    fn zero_cores_is_rejected() {
        let mut desc = description();
        desc.cores = 0;
        assert!(desc.validate().is_err());
    }

    #[test]
    fn empty_entrypoint_is_rejected() {
        let mut desc = description();
        desc.command.entrypoint = "  ".to_string();
        assert!(desc.validate().is_err());
    }

    #[test]
    fn generator_issues_distinct_ordered_ids() {
        let mut ids = SubmissionIdGenerator::new("driver");
        let a = ids.next();
        let b = ids.next();
        assert_ne!(a, b);
        assert!(a < b);
        assert!(a.as_str().starts_with("driver-"));
    }

    #[test]
    fn new_state_starts_queued() {
        let state = DriverState::new(SubmissionId::from("driver-x-0"), description());
        assert_eq!(state.status, DriverStatus::Queued);
        assert_eq!(state.retry_count, 0);
        assert!(state.launch.is_none());
        assert!(!state.kill_requested);
    }
}
