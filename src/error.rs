use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Invalid driver description: {0}")]
    Validation(String),

    #[error("driver not found: {0}")]
    DriverNotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Scheduler is not ready")]
    NotReady,

    #[error("gRPC error: {0}")]
    Grpc(#[from] tonic::Status),

    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<SchedulerError> for tonic::Status {
    fn from(e: SchedulerError) -> tonic::Status {
        match e {
            SchedulerError::Validation(m) => tonic::Status::invalid_argument(m),
            SchedulerError::DriverNotFound(m) => tonic::Status::not_found(m),
            SchedulerError::NotReady => tonic::Status::unavailable("scheduler is not ready"),
            SchedulerError::Grpc(status) => status,
            other => tonic::Status::internal(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
