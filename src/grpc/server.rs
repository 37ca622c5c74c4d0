use std::net::SocketAddr;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tonic::transport::Server;

use crate::grpc::submission_service::SubmissionService;
use crate::proto::driver_scheduler_server::DriverSchedulerServer;
use crate::scheduler::DriverScheduler;

pub struct GrpcServer {
    addr: SocketAddr,
    scheduler: Arc<DriverScheduler>,
}

impl GrpcServer {
    pub fn new(addr: SocketAddr, scheduler: Arc<DriverScheduler>) -> Self {
        Self { addr, scheduler }
    }

    pub async fn run(self, shutdown: CancellationToken) -> Result<(), tonic::transport::Error> {
        let submission_service = SubmissionService::new(self.scheduler.clone());

        tracing::info!(addr = %self.addr, "Starting gRPC server");

        Server::builder()
            .add_service(DriverSchedulerServer::new(submission_service))
            .serve_with_shutdown(self.addr, async move {
                shutdown.cancelled().await;
                tracing::info!("gRPC server draining");
            })
            .await
    }
}
