pub mod server;
pub mod submission_service;

pub use server::GrpcServer;
pub use submission_service::SubmissionService;
