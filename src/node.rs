use std::sync::Arc;

use crate::config::SchedulerConfig;
use crate::grpc::GrpcServer;
use crate::persistence;
use crate::scheduler::DriverScheduler;
use crate::shutdown::install_shutdown_handler;

/// Main scheduler process that wires all components together.
pub struct SchedulerNode {
    pub config: SchedulerConfig,
}

impl SchedulerNode {
    pub fn new(config: SchedulerConfig) -> Self {
        Self { config }
    }

    /// Run the scheduler node.
    ///
    /// 1. Selects the persistence engine from configuration
    /// 2. Replays persisted submissions into the registry
    /// 3. Serves the gRPC submission API until SIGTERM/SIGINT
    ///
    /// # Errors
    ///
    /// Returns an error if recovery replay fails or the gRPC server cannot
    /// start.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        let engine = persistence::engine_for(&self.config.persistence)?;
        let scheduler = Arc::new(DriverScheduler::new(&self.config, engine));

        scheduler.initialize().await?;
        tracing::info!(
            listen_addr = %self.config.listen_addr,
            persistence = ?self.config.persistence,
            "Scheduler ready"
        );

        let shutdown = install_shutdown_handler();
        let server = GrpcServer::new(self.config.listen_addr, scheduler);
        server.run(shutdown).await?;
        Ok(())
    }
}
