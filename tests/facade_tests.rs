use std::collections::BTreeMap;

use chrono::Utc;
use dispatchd::config::{RetryPolicy, SchedulerConfig};
use dispatchd::persistence::{self, BlackHoleEngine};
use dispatchd::scheduler::{
    DriverCommand, DriverDescription, DriverScheduler, DriverStatus, SubmissionId,
    TerminationOutcome,
};

fn description(app_name: &str) -> DriverDescription {
    DriverDescription {
        app_name: app_name.to_string(),
        command: DriverCommand {
            entrypoint: "org.example.Main".to_string(),
            arguments: vec![],
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

async fn scheduler() -> DriverScheduler {
    let scheduler = DriverScheduler::new(&SchedulerConfig::default(), Box::new(BlackHoleEngine));
    scheduler.initialize().await.unwrap();
    scheduler
}

#[tokio::test]
async fn submit_then_kill_end_to_end() {
    let scheduler = scheduler().await;

    let first = scheduler.submit(description("app-one")).await;
    assert!(first.success);
    assert_eq!(scheduler.snapshot().await.queued.len(), 1);

    let second = scheduler.submit(description("app-two")).await;
    assert!(second.success);

    let snapshot = scheduler.snapshot().await;
    assert_eq!(snapshot.queued.len(), 2);
    assert_eq!(snapshot.queued[0].id.to_string(), first.submission_id);
    assert_eq!(snapshot.queued[1].id.to_string(), second.submission_id);

    let kill = scheduler
        .kill(&SubmissionId::from(first.submission_id))
        .await;
    assert!(kill.success);

    let snapshot = scheduler.snapshot().await;
    assert_eq!(snapshot.queued.len(), 1);
    assert_eq!(snapshot.queued[0].id.to_string(), second.submission_id);
}

#[tokio::test]
async fn invalid_submission_returns_structured_failure() {
    let scheduler = scheduler().await;

    let mut bad = description("app");
    bad.memory_mb = 0;
    let result = scheduler.submit(bad).await;

    assert!(!result.success);
    assert!(result.submission_id.is_empty());
    assert!(result.message.contains("memory"));
    assert!(scheduler.snapshot().await.queued.is_empty());
}

#[tokio::test]
async fn kill_unknown_id_returns_structured_failure() {
    let scheduler = scheduler().await;

    let result = scheduler.kill(&SubmissionId::from("driver-unknown-0")).await;
    assert!(!result.success);
    assert!(result.message.contains("driver not found"));
}

#[tokio::test]
async fn operations_are_rejected_until_initialized() {
    let scheduler = DriverScheduler::new(&SchedulerConfig::default(), Box::new(BlackHoleEngine));
    assert!(!scheduler.is_ready());

    let submit = scheduler.submit(description("app")).await;
    assert!(!submit.success);
    assert!(submit.message.contains("not ready"));

    let kill = scheduler.kill(&SubmissionId::from("driver-x-0")).await;
    assert!(!kill.success);

    scheduler.initialize().await.unwrap();
    assert!(scheduler.is_ready());
    assert!(scheduler.submit(description("app")).await.success);
}

#[tokio::test]
async fn driver_status_finds_submission_in_any_collection() {
    let scheduler = scheduler().await;

    let result = scheduler.submit(description("app")).await;
    let id = SubmissionId::from(result.submission_id);

    let state = scheduler.driver_status(&id).await.unwrap();
    assert_eq!(state.status, DriverStatus::Queued);

    scheduler.on_offer_accepted(&id).await.unwrap();
    let state = scheduler.driver_status(&id).await.unwrap();
    assert_eq!(state.status, DriverStatus::Launched);

    scheduler
        .on_terminated(&id, TerminationOutcome::Finished)
        .await
        .unwrap();
    let state = scheduler.driver_status(&id).await.unwrap();
    assert_eq!(state.status, DriverStatus::Finished);

    assert!(scheduler
        .driver_status(&SubmissionId::from("driver-unknown-0"))
        .await
        .is_none());
}

#[tokio::test]
async fn supervised_driver_is_requeued_after_backoff() {
    let config = SchedulerConfig::default().with_retry(RetryPolicy {
        max_retries: 2,
        initial_backoff_ms: 20,
        max_backoff_ms: 100,
    });
    let scheduler = DriverScheduler::new(&config, Box::new(BlackHoleEngine));
    scheduler.initialize().await.unwrap();

    let mut desc = description("app");
    desc.supervise = true;
    let result = scheduler.submit(desc).await;
    let id = SubmissionId::from(result.submission_id);

    scheduler.on_offer_accepted(&id).await.unwrap();
    scheduler
        .on_terminated(
            &id,
            TerminationOutcome::Failed {
                reason: "lost executor".to_string(),
            },
        )
        .await
        .unwrap();

    assert_eq!(scheduler.snapshot().await.retrying.len(), 1);

    // Wait past the 20ms backoff for the background requeue
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    let snapshot = scheduler.snapshot().await;
    assert!(snapshot.retrying.is_empty());
    assert_eq!(snapshot.queued.len(), 1);
    assert_eq!(snapshot.queued[0].id, id);
    assert_eq!(snapshot.queued[0].retry_count, 1);
}

#[tokio::test]
async fn facade_recovers_state_across_instances() {
    let dir = tempfile::tempdir().unwrap();
    let config = SchedulerConfig::default().with_state_dir(dir.path());

    let (first, second) = {
        let engine = persistence::engine_for(&config.persistence).unwrap();
        let scheduler = DriverScheduler::new(&config, engine);
        scheduler.initialize().await.unwrap();

        let first = scheduler.submit(description("app-one")).await;
        let second = scheduler.submit(description("app-two")).await;
        (first.submission_id, second.submission_id)
    };

    let engine = persistence::engine_for(&config.persistence).unwrap();
    let restarted = DriverScheduler::new(&config, engine);
    restarted.initialize().await.unwrap();

    let snapshot = restarted.snapshot().await;
    assert_eq!(snapshot.queued.len(), 2);
    assert_eq!(snapshot.queued[0].id.to_string(), first);
    assert_eq!(snapshot.queued[1].id.to_string(), second);

    let queued = restarted.queued_drivers().await;
    assert_eq!(queued.len(), 2);
}
