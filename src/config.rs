use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Where scheduler state is persisted between restarts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PersistenceMode {
    /// No durability. Submissions are lost on restart. Intended for tests
    /// and single-node best-effort deployments.
    #[default]
    None,
    /// One JSON document per submission under the given directory.
    Directory(PathBuf),
}

/// Retry policy for supervised drivers that fail for non-user reasons.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// How many times a supervised driver is resubmitted before it is
    /// moved to terminal FAILED.
    pub max_retries: u32,
    /// Backoff before the first resubmission. Doubles per attempt.
    pub initial_backoff_ms: u64,
    /// Upper bound on the doubling backoff.
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 1_000,
            max_backoff_ms: 60_000,
        }
    }
}

impl RetryPolicy {
    /// Backoff before re-queueing the given attempt (1-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(32);
        let ms = self
            .initial_backoff_ms
            .saturating_mul(factor)
            .min(self.max_backoff_ms);
        Duration::from_millis(ms)
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Address the gRPC submission server listens on.
    pub listen_addr: SocketAddr,
    /// Prefix for generated submission ids.
    pub submission_prefix: String,
    /// Durability backend for submission records.
    pub persistence: PersistenceMode,
    /// Retry policy for supervised drivers.
    pub retry: RetryPolicy,
    /// How many finished/failed/killed drivers to retain for status queries.
    pub retained_drivers: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            // SAFETY: This is a hardcoded valid address that will always parse
            listen_addr: "127.0.0.1:7077"
                .parse()
                .expect("default listen address is valid"),
            submission_prefix: "driver".to_string(),
            persistence: PersistenceMode::None,
            retry: RetryPolicy::default(),
            retained_drivers: 200,
        }
    }
}

impl SchedulerConfig {
    pub fn new(listen_addr: SocketAddr) -> Self {
        Self {
            listen_addr,
            ..Default::default()
        }
    }

    pub fn with_state_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.persistence = PersistenceMode::Directory(dir.into());
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_retained_drivers(mut self, retained: usize) -> Self {
        self.retained_drivers = retained;
        self
    }
}
