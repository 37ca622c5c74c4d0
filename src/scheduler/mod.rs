pub mod driver;
pub mod facade;
pub mod registry;

pub use driver::{
    DriverCommand, DriverDescription, DriverLaunch, DriverState, DriverStatus, SubmissionId,
    SubmissionIdGenerator,
};
pub use facade::{DriverScheduler, KillResult, SubmissionResult};
pub use registry::{Disposition, DriverRegistry, SchedulerSnapshot, TerminationOutcome};
