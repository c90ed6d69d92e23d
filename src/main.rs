// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use orchestrs::config::settings::Settings;
use orchestrs::infrastructure::clients::worker_client::WorkerClient;
use orchestrs::infrastructure::clients::writer_client::WriterClient;
use orchestrs::infrastructure::database::connection;
use orchestrs::infrastructure::repositories::config_repo_impl::ConfigRepositoryImpl;
use orchestrs::infrastructure::repositories::mission_log_repo_impl::MissionLogRepositoryImpl;
use orchestrs::infrastructure::repositories::mission_repo_impl::MissionRepositoryImpl;
use orchestrs::infrastructure::repositories::proxy_repo_impl::ProxyRepositoryImpl;
use orchestrs::infrastructure::repositories::session_repo_impl::SessionRepositoryImpl;
use orchestrs::infrastructure::repositories::worker_repo_impl::WorkerRepositoryImpl;
use orchestrs::infrastructure::repositories::writer_repo_impl::WriterRepositoryImpl;
use orchestrs::orchestrator::controller::OrchestratorController;
use orchestrs::orchestrator::event_bus::EventBus;
use orchestrs::presentation::routes;
use orchestrs::utils::telemetry;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

use migration::{Migrator, MigratorTrait};

/// 主函数
///
/// 应用程序入口点，负责初始化所有组件并启动服务
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize logging
    telemetry::init_telemetry();
    info!("Starting orchestrs...");

    // Initialize Prometheus Metrics
    orchestrs::infrastructure::metrics::init_metrics();

    // 2. Load configuration
    let settings = Arc::new(Settings::new()?);
    info!("Configuration loaded");

    // 3. Connect to database
    let db = connection::create_pool(&settings.database).await?;
    let db = Arc::new(db);
    info!("Database connection established");

    // Run database migrations
    info!("Running database migrations...");
    Migrator::up(db.as_ref(), None).await?;
    info!("Database migrations applied");

    // 4. Initialize Components
    let mission_repo = Arc::new(MissionRepositoryImpl::new(db.clone()));
    let worker_repo = Arc::new(WorkerRepositoryImpl::new(db.clone()));
    let session_repo = Arc::new(SessionRepositoryImpl::new(db.clone()));
    let proxy_repo = Arc::new(ProxyRepositoryImpl::new(db.clone()));
    let writer_repo = Arc::new(WriterRepositoryImpl::new(db.clone()));
    let mission_log_repo = Arc::new(MissionLogRepositoryImpl::new(db.clone()));
    let config_repo = Arc::new(ConfigRepositoryImpl::new(db.clone()));

    let worker_client = Arc::new(WorkerClient::new(&settings.http_client));
    let writer_client = Arc::new(WriterClient::new(&settings.http_client));

    // 5. Assemble the orchestrator
    let bus = EventBus::new();
    let controller = Arc::new(OrchestratorController::new(
        bus,
        mission_repo,
        worker_repo,
        session_repo,
        proxy_repo,
        writer_repo,
        mission_log_repo,
        config_repo,
        worker_client,
        writer_client,
    ));

    // 6. Start the orchestration loops
    controller.start().await?;

    // 7. Serve the control-plane API
    let app = routes::routes(controller.clone());
    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Control API listening on {addr}");

    let server = async { axum::serve(listener, app).await };
    tokio::select! {
        result = server => {
            if let Err(e) = result {
                error!("server error: {e}");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    controller.stop().await?;
    info!("Orchestrator shut down successfully");

    Ok(())
}
