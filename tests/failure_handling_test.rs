mod common;

use common::*;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const WAIT: Duration = Duration::from_secs(10);

/// No proxy is available: every session attempt is a terminal failure
/// for that attempt, the worker returns to idle and the mission burns
/// one retry per attempt until it fails permanently with the
/// no-proxy error code.
#[tokio::test(flavor = "multi_thread")]
async fn missing_proxy_fails_the_attempt_and_eventually_the_mission() {
    let server = MockServer::start().await;
    // The session endpoint must never be reached without a proxy lease
    Mock::given(method("POST"))
        .and(path("/session"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"session_id": "never"})))
        .expect(0)
        .mount(&server)
        .await;

    let db = test_db().await;
    let worker_id = seed_worker(&db, &server.uri()).await;
    let mission_id = seed_queued_mission(&db).await;

    let mut config = fast_config();
    config.max_mission_retries = 2;
    let harness = Harness::assemble(db.clone(), config).await;
    harness.run().await;

    assert!(
        wait_until(WAIT, || async {
            mission_row(&db, mission_id).await.status == "FAILED"
        })
        .await,
        "mission never failed"
    );

    let mission = mission_row(&db, mission_id).await;
    assert_eq!(mission.error_code.as_deref(), Some("ERROR401"));
    assert_eq!(mission.retry_count, 1, "one requeue before the cap");

    let logs = mission_log_rows(&db, mission_id).await;
    assert!(logs
        .iter()
        .any(|l| l.event == "MISSION_RETRY" && l.details.contains("Retry 1")));

    let sessions = session_rows(&db).await;
    assert_eq!(sessions.len(), 2, "one session row per attempt");
    for session in &sessions {
        assert_eq!(session.status, "ERROR");
        assert_eq!(session.last_error_code.as_deref(), Some("ERROR401"));
    }

    assert_eq!(worker_row(&db, worker_id).await.status, "idle");

    harness.stop();
    server.verify().await;
}

/// The worker rejects session creation: each attempt leases a fresh
/// proxy, increments its fail_count exactly once and releases it, until
/// the session retry budget is exhausted.
#[tokio::test(flavor = "multi_thread")]
async fn failed_session_creation_retries_and_charges_the_proxy() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/session"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let db = test_db().await;
    seed_worker(&db, &server.uri()).await;
    let proxy_id = seed_proxy(&db).await;
    let mission_id = seed_queued_mission(&db).await;

    let mut config = fast_config();
    config.max_session_retries = 2;
    config.max_mission_retries = 1;
    let harness = Harness::assemble(db.clone(), config).await;
    harness.run().await;

    assert!(
        wait_until(WAIT, || async {
            mission_row(&db, mission_id).await.status == "FAILED"
        })
        .await,
        "mission never failed"
    );

    let mission = mission_row(&db, mission_id).await;
    assert_eq!(mission.error_code.as_deref(), Some("ERROR102"));

    // Initial attempt plus two retries, each on a fresh session row
    let sessions = session_rows(&db).await;
    assert_eq!(sessions.len(), 3);
    for session in &sessions {
        assert_eq!(session.status, "ERROR");
        assert_eq!(session.last_error_code.as_deref(), Some("ERROR102"));
    }

    let proxy = proxy_row(&db, proxy_id).await;
    assert_eq!(proxy.fail_count, 3, "exactly one increment per failed attempt");
    assert_eq!(proxy.in_use_by_session_id, None);

    harness.stop();
}

/// A silently hung worker: status polls keep failing without an explicit
/// error phase. After the consecutive-failure threshold the session is
/// escalated to error anyway.
#[tokio::test(flavor = "multi_thread")]
async fn consecutive_status_failures_escalate_the_session() {
    let server = MockServer::start().await;
    mount_session_create_ok(&server).await;
    Mock::given(method("GET"))
        .and(path("/session/status"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let db = test_db().await;
    seed_worker(&db, &server.uri()).await;
    let proxy_id = seed_proxy(&db).await;
    let mission_id = seed_queued_mission(&db).await;

    let mut config = fast_config();
    config.max_mission_retries = 1;
    let harness = Harness::assemble(db.clone(), config).await;
    harness.run().await;

    assert!(
        wait_until(WAIT, || async {
            session_rows(&db)
                .await
                .iter()
                .any(|s| s.status == "ERROR")
        })
        .await,
        "session never escalated"
    );

    let sessions = session_rows(&db).await;
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].last_error_code.as_deref(), Some("ERROR102"));
    assert_eq!(sessions[0].failure_count, 3);

    assert!(
        wait_until(WAIT, || async {
            proxy_row(&db, proxy_id).await.in_use_by_session_id.is_none()
        })
        .await
    );
    assert_eq!(proxy_row(&db, proxy_id).await.fail_count, 1);

    assert!(
        wait_until(WAIT, || async {
            mission_row(&db, mission_id).await.status == "FAILED"
        })
        .await
    );

    harness.stop();
}

/// A session that never leaves the in-progress phases runs into the
/// session timeout and is escalated with the timeout error code.
#[tokio::test(flavor = "multi_thread")]
async fn slow_session_initialization_times_out() {
    let server = MockServer::start().await;
    mount_session_create_ok(&server).await;
    mount_session_status(&server, json!({"status": "initializing"})).await;

    let db = test_db().await;
    seed_worker(&db, &server.uri()).await;
    seed_proxy(&db).await;
    let mission_id = seed_queued_mission(&db).await;

    let mut config = fast_config();
    config.session_timeout = Duration::from_millis(300);
    config.max_mission_retries = 1;
    let harness = Harness::assemble(db.clone(), config).await;
    harness.run().await;

    assert!(
        wait_until(WAIT, || async {
            mission_row(&db, mission_id).await.status == "FAILED"
        })
        .await,
        "mission never failed"
    );

    let mission = mission_row(&db, mission_id).await;
    assert_eq!(mission.error_code.as_deref(), Some("ERROR101"));

    let sessions = session_rows(&db).await;
    assert_eq!(sessions[0].last_error_code.as_deref(), Some("ERROR101"));

    harness.stop();
}

/// An error-class phase reported by the worker escalates immediately.
#[tokio::test(flavor = "multi_thread")]
async fn error_phase_from_the_worker_escalates_the_session() {
    let server = MockServer::start().await;
    mount_session_create_ok(&server).await;
    mount_session_status(&server, json!({"status": "disconnected"})).await;

    let db = test_db().await;
    seed_worker(&db, &server.uri()).await;
    seed_proxy(&db).await;
    let mission_id = seed_queued_mission(&db).await;

    let mut config = fast_config();
    config.max_mission_retries = 1;
    let harness = Harness::assemble(db.clone(), config).await;
    harness.run().await;

    assert!(
        wait_until(WAIT, || async {
            mission_row(&db, mission_id).await.status == "FAILED"
        })
        .await
    );

    let sessions = session_rows(&db).await;
    assert_eq!(sessions[0].status, "ERROR");
    assert_eq!(sessions[0].last_error_code.as_deref(), Some("ERROR103"));
    assert_eq!(sessions[0].current_phase, "disconnected");

    harness.stop();
}

/// A scrape that never finishes runs into the scrape timeout: the result
/// counts as failed, the session is ended and the mission fails with the
/// scrape error code once retries are exhausted.
#[tokio::test(flavor = "multi_thread")]
async fn stuck_scrape_times_out_and_fails_the_mission() {
    let server = MockServer::start().await;
    mount_session_create_ok(&server).await;
    mount_session_status(&server, json!({"status": "ready"})).await;
    mount_session_delete(&server).await;
    mount_scrape_start(&server, "job-stuck").await;
    mount_scrape_status(&server, json!({"status": "running"})).await;

    let db = test_db().await;
    let worker_id = seed_worker(&db, &server.uri()).await;
    let proxy_id = seed_proxy(&db).await;
    let mission_id = seed_queued_mission(&db).await;

    let mut config = fast_config();
    config.scrape_timeout = Duration::from_millis(300);
    config.max_mission_retries = 1;
    let harness = Harness::assemble(db.clone(), config).await;
    harness.run().await;

    assert!(
        wait_until(WAIT, || async {
            mission_row(&db, mission_id).await.status == "FAILED"
        })
        .await,
        "mission never failed"
    );

    let mission = mission_row(&db, mission_id).await;
    assert_eq!(mission.error_code.as_deref(), Some("ERROR201"));

    let logs = mission_log_rows(&db, mission_id).await;
    assert!(logs.iter().any(|l| l.event == "SCRAPE_FAILED"));

    assert!(
        wait_until(WAIT, || async {
            worker_row(&db, worker_id).await.status == "idle"
        })
        .await
    );

    // The session is ended, not errored, so the proxy is not charged
    assert!(
        wait_until(WAIT, || async {
            session_rows(&db).await.iter().all(|s| s.status == "ENDED")
        })
        .await
    );
    assert_eq!(proxy_row(&db, proxy_id).await.fail_count, 0);

    harness.stop();
}

/// Sessions left over from a previous run are not resumable: starting the
/// session manager forces them to error and releases their proxies
/// without charging them.
#[tokio::test(flavor = "multi_thread")]
async fn orphaned_sessions_are_swept_on_start() {
    let db = test_db().await;
    let worker_id = seed_worker(&db, "http://localhost:1").await;
    let proxy_id = seed_proxy(&db).await;
    let stale_proxy_id = seed_proxy(&db).await;

    let session_id = seed_session(&db, worker_id, "INITIALIZING", Some(proxy_id)).await;
    lease_proxy_to(&db, proxy_id, session_id).await;
    // A lease with no surviving session row at all
    lease_proxy_to(&db, stale_proxy_id, uuid::Uuid::new_v4()).await;

    let harness = Harness::assemble(db.clone(), fast_config()).await;
    harness.sessions.clone().start().await.expect("start");

    let sessions = session_rows(&db).await;
    assert_eq!(sessions[0].status, "ERROR");
    assert_eq!(
        sessions[0].last_error_message.as_deref(),
        Some("orphaned on restart")
    );

    for id in [proxy_id, stale_proxy_id] {
        let proxy = proxy_row(&db, id).await;
        assert_eq!(proxy.in_use_by_session_id, None);
        assert_eq!(proxy.fail_count, 0);
    }

    harness.stop();
}
