#![allow(dead_code)]

use chrono::{NaiveDate, Utc};
use migration::{Migrator, MigratorTrait};
use orchestrs::config::settings::HttpClientSettings;
use orchestrs::domain::models::mission::{MediaType, Mission};
use orchestrs::domain::repositories::mission_repository::MissionRepository;
use orchestrs::infrastructure::clients::worker_client::WorkerClient;
use orchestrs::infrastructure::clients::writer_client::WriterClient;
use orchestrs::infrastructure::database::entities::{
    config as config_entity, mission as mission_entity, mission_log as mission_log_entity,
    proxy as proxy_entity, session as session_entity, worker as worker_entity,
    writer as writer_entity,
};
use orchestrs::infrastructure::repositories::config_repo_impl::ConfigRepositoryImpl;
use orchestrs::infrastructure::repositories::mission_log_repo_impl::MissionLogRepositoryImpl;
use orchestrs::infrastructure::repositories::mission_repo_impl::MissionRepositoryImpl;
use orchestrs::infrastructure::repositories::proxy_repo_impl::ProxyRepositoryImpl;
use orchestrs::infrastructure::repositories::session_repo_impl::SessionRepositoryImpl;
use orchestrs::infrastructure::repositories::worker_repo_impl::WorkerRepositoryImpl;
use orchestrs::infrastructure::repositories::writer_repo_impl::WriterRepositoryImpl;
use orchestrs::orchestrator::config::OrchestratorConfig;
use orchestrs::orchestrator::controller::OrchestratorController;
use orchestrs::orchestrator::event_bus::{EventBus, SubscriptionGuard};
use orchestrs::orchestrator::mission_manager::MissionManager;
use orchestrs::orchestrator::session_manager::SessionManager;
use orchestrs::orchestrator::worker_manager::WorkerManager;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectOptions, Database, DatabaseConnection, EntityTrait,
    QueryFilter, Set,
};
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Fresh in-memory database with the full schema applied. A single
/// connection keeps every query on the same in-memory instance.
pub async fn test_db() -> Arc<DatabaseConnection> {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1).sqlx_logging(false);
    let db = Database::connect(options).await.expect("sqlite connect");
    Migrator::up(&db, None).await.expect("migrations");
    Arc::new(db)
}

/// Polling intervals short enough for tests, timeouts long enough to
/// never fire unless a test shrinks them on purpose.
pub fn fast_config() -> OrchestratorConfig {
    OrchestratorConfig {
        session_polling_interval: Duration::from_millis(50),
        worker_polling_interval: Duration::from_millis(50),
        mission_polling_interval: Duration::from_millis(50),
        session_timeout: Duration::from_secs(30),
        scrape_timeout: Duration::from_secs(30),
        writer_timeout: Duration::from_secs(30),
        ..Default::default()
    }
}

/// The three managers wired to one bus over one database, the way the
/// controller assembles them, but with direct control over the config.
pub struct Harness {
    pub db: Arc<DatabaseConnection>,
    pub bus: EventBus,
    pub sessions: Arc<SessionManager>,
    pub workers: Arc<WorkerManager>,
    pub missions: Arc<MissionManager>,
    guards: Vec<SubscriptionGuard>,
}

impl Harness {
    pub async fn assemble(db: Arc<DatabaseConnection>, config: OrchestratorConfig) -> Self {
        let bus = EventBus::new();
        let http = HttpClientSettings { request_timeout: 5 };

        let mission_repo = Arc::new(MissionRepositoryImpl::new(db.clone()));
        let worker_repo = Arc::new(WorkerRepositoryImpl::new(db.clone()));
        let session_repo = Arc::new(SessionRepositoryImpl::new(db.clone()));
        let proxy_repo = Arc::new(ProxyRepositoryImpl::new(db.clone()));
        let writer_repo = Arc::new(WriterRepositoryImpl::new(db.clone()));
        let log_repo = Arc::new(MissionLogRepositoryImpl::new(db.clone()));

        let sessions = Arc::new(SessionManager::new(
            config.clone(),
            bus.clone(),
            session_repo.clone(),
            proxy_repo,
            worker_repo.clone(),
            log_repo.clone(),
            Arc::new(WorkerClient::new(&http)),
        ));
        let workers = Arc::new(WorkerManager::new(
            config.clone(),
            bus.clone(),
            mission_repo.clone(),
            worker_repo.clone(),
            session_repo,
            log_repo.clone(),
            Arc::new(WorkerClient::new(&http)),
        ));
        let missions = Arc::new(MissionManager::new(
            config,
            bus.clone(),
            mission_repo,
            worker_repo,
            writer_repo,
            log_repo,
            Arc::new(WriterClient::new(&http)),
        ));

        let mut guards = Vec::new();
        guards.extend(sessions.attach());
        guards.extend(workers.attach());
        guards.extend(missions.attach());

        Self {
            db,
            bus,
            sessions,
            workers,
            missions,
            guards,
        }
    }

    /// Start the polling loops in dependency order.
    pub async fn run(&self) {
        self.sessions
            .clone()
            .start()
            .await
            .expect("session manager start");
        self.workers
            .clone()
            .start()
            .await
            .expect("worker manager start");
        self.missions
            .clone()
            .start()
            .await
            .expect("mission manager start");
    }

    pub fn stop(&self) {
        self.missions.stop();
        self.workers.stop();
        self.sessions.stop();
    }
}

/// Build a controller over the given database, sharing its repositories.
pub fn controller_for(db: Arc<DatabaseConnection>) -> Arc<OrchestratorController> {
    let http = HttpClientSettings { request_timeout: 5 };
    Arc::new(OrchestratorController::new(
        EventBus::new(),
        Arc::new(MissionRepositoryImpl::new(db.clone())),
        Arc::new(WorkerRepositoryImpl::new(db.clone())),
        Arc::new(SessionRepositoryImpl::new(db.clone())),
        Arc::new(ProxyRepositoryImpl::new(db.clone())),
        Arc::new(WriterRepositoryImpl::new(db.clone())),
        Arc::new(MissionLogRepositoryImpl::new(db.clone())),
        Arc::new(ConfigRepositoryImpl::new(db)),
        Arc::new(WorkerClient::new(&http)),
        Arc::new(WriterClient::new(&http)),
    ))
}

pub async fn seed_worker(db: &DatabaseConnection, url: &str) -> Uuid {
    let id = Uuid::new_v4();
    worker_entity::ActiveModel {
        id: Set(id),
        name: Set("test-worker".to_string()),
        url: Set(url.to_string()),
        api_key: Set("test-key".to_string()),
        storage_domain: Set(None),
        status: Set("idle".to_string()),
        active: Set(true),
        created_at: Set(Utc::now().into()),
        updated_at: Set(Utc::now().into()),
    }
    .insert(db)
    .await
    .expect("seed worker");
    id
}

pub async fn seed_proxy(db: &DatabaseConnection) -> Uuid {
    let id = Uuid::new_v4();
    proxy_entity::ActiveModel {
        id: Set(id),
        name: Set(Some("test-proxy".to_string())),
        host: Set("10.0.0.1".to_string()),
        port: Set(8080),
        username: Set(Some("user".to_string())),
        password: Set(Some("pass".to_string())),
        active: Set(true),
        in_use_by_session_id: Set(None),
        fail_count: Set(0),
        last_used_at: Set(None),
        created_at: Set(Utc::now().into()),
    }
    .insert(db)
    .await
    .expect("seed proxy");
    id
}

pub async fn seed_writer(db: &DatabaseConnection, url: &str) -> Uuid {
    let id = Uuid::new_v4();
    writer_entity::ActiveModel {
        id: Set(id),
        name: Set("test-writer".to_string()),
        url: Set(url.to_string()),
        api_key: Set("test-key".to_string()),
        active: Set(true),
        created_at: Set(Utc::now().into()),
        updated_at: Set(Utc::now().into()),
    }
    .insert(db)
    .await
    .expect("seed writer");
    id
}

pub async fn seed_queued_mission(db: &Arc<DatabaseConnection>) -> Uuid {
    let mission = Mission::new(
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 1, 7).unwrap(),
        MediaType::Video,
        vec!["en".to_string(), "pt".to_string()],
    );
    MissionRepositoryImpl::new(db.clone())
        .create(&mission)
        .await
        .expect("seed mission");
    mission.id
}

pub async fn seed_session(db: &DatabaseConnection, worker_id: Uuid, status: &str, proxy_id: Option<Uuid>) -> Uuid {
    let id = Uuid::new_v4();
    session_entity::ActiveModel {
        id: Set(id),
        worker_id: Set(worker_id),
        proxy_id: Set(proxy_id),
        external_session_id: Set(None),
        status: Set(status.to_string()),
        current_phase: Set("initializing".to_string()),
        execution_count: Set(0),
        execution_limit: Set(1),
        failure_count: Set(0),
        retry_count: Set(0),
        last_error_code: Set(None),
        last_error_message: Set(None),
        created_at: Set(Utc::now().into()),
        ready_at: Set(None),
        ended_at: Set(None),
    }
    .insert(db)
    .await
    .expect("seed session");
    id
}

pub async fn seed_config(db: &DatabaseConnection, key: &str, value: serde_json::Value) {
    config_entity::ActiveModel {
        key: Set(key.to_string()),
        value: Set(value),
        updated_at: Set(Utc::now().into()),
    }
    .insert(db)
    .await
    .expect("seed config");
}

pub async fn lease_proxy_to(db: &DatabaseConnection, proxy_id: Uuid, session_id: Uuid) {
    let model = proxy_entity::Entity::find_by_id(proxy_id)
        .one(db)
        .await
        .unwrap()
        .unwrap();
    let mut active: proxy_entity::ActiveModel = model.into();
    active.in_use_by_session_id = Set(Some(session_id));
    active.update(db).await.unwrap();
}

pub async fn mission_row(db: &DatabaseConnection, id: Uuid) -> mission_entity::Model {
    mission_entity::Entity::find_by_id(id)
        .one(db)
        .await
        .unwrap()
        .expect("mission row")
}

pub async fn worker_row(db: &DatabaseConnection, id: Uuid) -> worker_entity::Model {
    worker_entity::Entity::find_by_id(id)
        .one(db)
        .await
        .unwrap()
        .expect("worker row")
}

pub async fn proxy_row(db: &DatabaseConnection, id: Uuid) -> proxy_entity::Model {
    proxy_entity::Entity::find_by_id(id)
        .one(db)
        .await
        .unwrap()
        .expect("proxy row")
}

pub async fn session_rows(db: &DatabaseConnection) -> Vec<session_entity::Model> {
    session_entity::Entity::find().all(db).await.unwrap()
}

pub async fn mission_log_rows(
    db: &DatabaseConnection,
    mission_id: Uuid,
) -> Vec<mission_log_entity::Model> {
    mission_log_entity::Entity::find()
        .filter(mission_log_entity::Column::MissionId.eq(mission_id))
        .all(db)
        .await
        .unwrap()
}

/// Poll an async predicate until it holds or the deadline passes.
pub async fn wait_until<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if check().await {
            return true;
        }
        if Instant::now() > deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

pub async fn mount_session_create_ok(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/session"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"session_id": "ext-1"})))
        .mount(server)
        .await;
}

pub async fn mount_session_status(server: &MockServer, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/session/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

pub async fn mount_session_delete(server: &MockServer) {
    Mock::given(method("DELETE"))
        .and(path("/session"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(server)
        .await;
}

pub async fn mount_scrape_start(server: &MockServer, job_id: &str) {
    Mock::given(method("POST"))
        .and(path("/scrape"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"job_id": job_id})))
        .mount(server)
        .await;
}

pub async fn mount_scrape_status(server: &MockServer, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/scrape/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

pub async fn mount_writer_process(server: &MockServer, job_id: &str) {
    Mock::given(method("POST"))
        .and(path("/process"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"job_id": job_id})))
        .mount(server)
        .await;
}

pub async fn mount_writer_status(server: &MockServer, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}
