pub mod config;
pub mod error;
pub mod grpc;
pub mod node;
pub mod persistence;
pub mod scheduler;
pub mod shell;
pub mod shutdown;

// Re-export generated protobuf types
pub mod proto {
    tonic::include_proto!("dispatch");
}
