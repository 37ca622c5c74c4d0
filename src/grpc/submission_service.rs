use std::sync::Arc;

use chrono::Utc;
use tonic::{Request, Response, Status};

use crate::proto::driver_scheduler_server::DriverScheduler as DriverSchedulerRpc;
use crate::proto::{
    DriverInfo, GetDriverStatusRequest, GetDriverStatusResponse, GetSchedulerStateRequest,
    GetSchedulerStateResponse, KillDriverRequest, KillDriverResponse, SubmitDriverRequest,
    SubmitDriverResponse,
};
use crate::scheduler::{
    DriverCommand, DriverDescription, DriverScheduler, DriverState, SubmissionId,
};

/// gRPC service for the client-facing submission API.
///
/// Thin translation layer: every request is handed to the facade, which
/// owns validation and all state transitions.
pub struct SubmissionService {
    scheduler: Arc<DriverScheduler>,
}

impl SubmissionService {
    pub fn new(scheduler: Arc<DriverScheduler>) -> Self {
        Self { scheduler }
    }
}

#[tonic::async_trait]
impl DriverSchedulerRpc for SubmissionService {
    async fn submit_driver(
        &self,
        request: Request<SubmitDriverRequest>,
    ) -> Result<Response<SubmitDriverResponse>, Status> {
        let req = request.into_inner();

        let description = DriverDescription {
            app_name: req.app_name,
            command: DriverCommand {
                entrypoint: req.entrypoint,
                arguments: req.arguments,
                environment: req.environment.into_iter().collect(),
                classpath_entries: req.classpath_entries,
                library_path_entries: req.library_path_entries,
            },
            memory_mb: req.memory_mb,
            cores: req.cores,
            supervise: req.supervise,
            properties: req.properties.into_iter().collect(),
            submitted_at: Utc::now(),
        };

        let result = self.scheduler.submit(description).await;
        Ok(Response::new(SubmitDriverResponse {
            success: result.success,
            submission_id: result.submission_id,
            message: result.message,
        }))
    }

    async fn kill_driver(
        &self,
        request: Request<KillDriverRequest>,
    ) -> Result<Response<KillDriverResponse>, Status> {
        let req = request.into_inner();
        let id = SubmissionId::from(req.submission_id);

        let result = self.scheduler.kill(&id).await;
        Ok(Response::new(KillDriverResponse {
            success: result.success,
            message: result.message,
        }))
    }

    async fn get_driver_status(
        &self,
        request: Request<GetDriverStatusRequest>,
    ) -> Result<Response<GetDriverStatusResponse>, Status> {
        let req = request.into_inner();
        let id = SubmissionId::from(req.submission_id);

        let response = match self.scheduler.driver_status(&id).await {
            Some(state) => GetDriverStatusResponse {
                found: true,
                submission_id: state.id.to_string(),
                status: state.status.to_string(),
                retry_count: state.retry_count,
                last_failure: state.last_failure.unwrap_or_default(),
                submitted_at_ms: state.description.submitted_at.timestamp_millis(),
            },
            None => GetDriverStatusResponse {
                found: false,
                submission_id: id.to_string(),
                ..Default::default()
            },
        };
        Ok(Response::new(response))
    }

    async fn get_scheduler_state(
        &self,
        _request: Request<GetSchedulerStateRequest>,
    ) -> Result<Response<GetSchedulerStateResponse>, Status> {
        let snapshot = self.scheduler.snapshot().await;

        Ok(Response::new(GetSchedulerStateResponse {
            ready: self.scheduler.is_ready(),
            queued: snapshot.queued.iter().map(driver_info).collect(),
            launched: snapshot.launched.iter().map(driver_info).collect(),
            retrying: snapshot.retrying.iter().map(driver_info).collect(),
            terminal: snapshot.terminal.iter().map(driver_info).collect(),
        }))
    }
}

fn driver_info(state: &DriverState) -> DriverInfo {
    DriverInfo {
        submission_id: state.id.to_string(),
        app_name: state.description.app_name.clone(),
        status: state.status.to_string(),
        retry_count: state.retry_count,
        last_failure: state.last_failure.clone().unwrap_or_default(),
        submitted_at_ms: state.description.submitted_at.timestamp_millis(),
    }
}
