mod common;

use common::*;
use serde_json::json;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(15);

/// start() and stop() are idempotent, and the status snapshot tracks the
/// running flag plus the recent event history.
#[tokio::test(flavor = "multi_thread")]
async fn start_and_stop_are_idempotent() {
    let db = test_db().await;
    let controller = controller_for(db);

    assert!(!controller.status().is_running);

    controller.start().await.expect("first start");
    controller.start().await.expect("second start is a no-op");

    let status = controller.status();
    assert!(status.is_running);
    assert!(status.session_manager.is_running);
    assert!(status.worker_manager.is_running);
    assert!(status.mission_manager.is_running);
    assert!(!status.event_history.is_empty());

    controller.stop().await.expect("first stop");
    controller.stop().await.expect("second stop is a no-op");

    let status = controller.status();
    assert!(!status.is_running);
    assert!(!status.session_manager.is_running);
}

/// Cancelling an unknown mission surfaces a not-found error.
#[tokio::test(flavor = "multi_thread")]
async fn cancelling_an_unknown_mission_is_an_error() {
    let db = test_db().await;
    let controller = controller_for(db);

    let result = controller.cancel_mission(uuid::Uuid::new_v4()).await;
    assert!(result.is_err());
}

/// Cancellation of a running mission: the session ends gracefully (the
/// proxy is released without a fail_count increment), the mission fails
/// with the cancellation code and the worker returns to idle. Config
/// overrides from the datastore drive the polling cadence.
#[tokio::test(flavor = "multi_thread")]
async fn cancelling_a_running_mission_tears_everything_down() {
    let server = wiremock::MockServer::start().await;
    mount_session_create_ok(&server).await;
    mount_session_status(&server, json!({"status": "ready"})).await;
    mount_session_delete(&server).await;
    mount_scrape_start(&server, "job-cancel").await;
    mount_scrape_status(&server, json!({"status": "running"})).await;
    wiremock::Mock::given(wiremock::matchers::method("DELETE"))
        .and(wiremock::matchers::path("/scrape/job-cancel"))
        .respond_with(wiremock::ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let db = test_db().await;
    seed_config(&db, "polling_interval_seconds", json!(1)).await;
    let worker_id = seed_worker(&db, &server.uri()).await;
    let proxy_id = seed_proxy(&db).await;
    let mission_id = seed_queued_mission(&db).await;

    let controller = controller_for(db.clone());
    controller.start().await.expect("start");

    assert!(
        wait_until(WAIT, || async {
            let mission = mission_row(&db, mission_id).await;
            mission.status == "RUNNING" && mission.checkpoint.as_deref() == Some("EXTRAINDO")
        })
        .await,
        "mission never started scraping"
    );

    let session_id = mission_row(&db, mission_id)
        .await
        .session_id
        .expect("session recorded on the mission");

    controller.cancel_mission(mission_id).await.expect("cancel");

    let mission = mission_row(&db, mission_id).await;
    assert_eq!(mission.status, "FAILED");
    assert_eq!(mission.error_code.as_deref(), Some("CANCELLED"));
    assert!(mission.finished_at.is_some());

    let sessions = session_rows(&db).await;
    let session = sessions.iter().find(|s| s.id == session_id).unwrap();
    assert_eq!(session.status, "ENDED");

    let proxy = proxy_row(&db, proxy_id).await;
    assert_eq!(proxy.in_use_by_session_id, None);
    assert_eq!(proxy.fail_count, 0, "cancellation is not a proxy fault");

    assert!(
        wait_until(WAIT, || async {
            worker_row(&db, worker_id).await.status == "idle"
        })
        .await,
        "worker never returned to idle"
    );

    let logs = mission_log_rows(&db, mission_id).await;
    assert!(logs.iter().any(|l| l.event == "CANCELLED"));

    controller.stop().await.expect("stop");
}
