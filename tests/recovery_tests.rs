use std::collections::BTreeMap;
use std::path::Path;

use chrono::Utc;
use dispatchd::config::RetryPolicy;
use dispatchd::persistence::FileStateEngine;
use dispatchd::scheduler::{
    DriverCommand, DriverDescription, DriverRegistry, DriverStatus, TerminationOutcome,
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

fn registry(dir: &Path) -> DriverRegistry {
    DriverRegistry::new(
        "driver",
        RetryPolicy::default(),
        200,
        Box::new(FileStateEngine::new(dir).unwrap()),
    )
}

#[tokio::test]
async fn recovery_restores_queued_order() {
    let dir = tempfile::tempdir().unwrap();

    let submitted = {
        let mut registry = registry(dir.path());
        let a = registry.submit(description("app-a")).await.unwrap();
        let b = registry.submit(description("app-b")).await.unwrap();
        let c = registry.submit(description("app-c")).await.unwrap();
        vec![a, b, c]
    };

    let mut restarted = registry(dir.path());
    restarted.recover().await.unwrap();

    assert_eq!(restarted.queued_drivers(), submitted);
}

#[tokio::test]
async fn launched_drivers_are_requeued_on_recovery() {
    let dir = tempfile::tempdir().unwrap();

    let id = {
        let mut registry = registry(dir.path());
        let id = registry.submit(description("app")).await.unwrap();
        registry.on_offer_accepted(&id).await.unwrap();
        id
    };

    let mut restarted = registry(dir.path());
    restarted.recover().await.unwrap();

    // Launch handles are not durable, so the driver goes back to the queue
    let snapshot = restarted.snapshot();
    assert!(snapshot.launched.is_empty());
    assert_eq!(snapshot.queued.len(), 1);
    assert_eq!(snapshot.queued[0].id, id);
    assert_eq!(snapshot.queued[0].status, DriverStatus::Queued);
    assert!(snapshot.queued[0].launch.is_none());
}

#[tokio::test]
async fn retrying_drivers_are_requeued_on_recovery() {
    let dir = tempfile::tempdir().unwrap();

    let id = {
        let mut registry = registry(dir.path());
        let mut desc = description("app");
        desc.supervise = true;
        let id = registry.submit(desc).await.unwrap();
        registry.on_offer_accepted(&id).await.unwrap();
        registry
            .on_terminated(
                &id,
                TerminationOutcome::Failed {
                    reason: "lost executor".to_string(),
                },
            )
            .await
            .unwrap();
        id
    };

    let mut restarted = registry(dir.path());
    restarted.recover().await.unwrap();

    let snapshot = restarted.snapshot();
    assert!(snapshot.retrying.is_empty());
    assert_eq!(snapshot.queued.len(), 1);
    assert_eq!(snapshot.queued[0].id, id);
    // The earlier attempt is still counted against the budget
    assert_eq!(snapshot.queued[0].retry_count, 1);
}

#[tokio::test]
async fn terminal_drivers_repopulate_history() {
    let dir = tempfile::tempdir().unwrap();

    let (finished, queued) = {
        let mut registry = registry(dir.path());
        let finished = registry.submit(description("app-done")).await.unwrap();
        registry.on_offer_accepted(&finished).await.unwrap();
        registry
            .on_terminated(&finished, TerminationOutcome::Finished)
            .await
            .unwrap();

        let queued = registry.submit(description("app-waiting")).await.unwrap();
        (finished, queued)
    };

    let mut restarted = registry(dir.path());
    restarted.recover().await.unwrap();

    let snapshot = restarted.snapshot();
    assert_eq!(snapshot.queued.len(), 1);
    assert_eq!(snapshot.queued[0].id, queued);
    assert_eq!(snapshot.terminal.len(), 1);
    assert_eq!(snapshot.terminal[0].id, finished);
    assert_eq!(snapshot.terminal[0].status, DriverStatus::Finished);
}
