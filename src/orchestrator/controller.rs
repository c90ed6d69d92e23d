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

use crate::domain::models::error_code::ErrorCode;
use crate::domain::models::worker::WorkerStatus;
use crate::domain::repositories::config_repository::ConfigRepository;
use crate::domain::repositories::mission_log_repository::MissionLogRepository;
use crate::domain::repositories::mission_repository::MissionRepository;
use crate::domain::repositories::proxy_repository::ProxyRepository;
use crate::domain::repositories::session_repository::SessionRepository;
use crate::domain::repositories::worker_repository::WorkerRepository;
use crate::domain::repositories::writer_repository::WriterRepository;
use crate::infrastructure::clients::worker_client::WorkerClient;
use crate::infrastructure::clients::writer_client::WriterClient;
use crate::orchestrator::config::OrchestratorConfig;
use crate::orchestrator::event_bus::{EventBus, EventRecord, SubscriptionGuard};
use crate::orchestrator::events::OrchestratorEvent;
use crate::orchestrator::mission_manager::{MissionManager, MissionManagerStatus};
use crate::orchestrator::session_manager::{SessionManager, SessionManagerStatus};
use crate::orchestrator::worker_manager::{WorkerManager, WorkerManagerStatus};
use crate::orchestrator::OrchestratorError;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// 编排器整体状态快照
#[derive(Debug, Clone, Serialize)]
pub struct OrchestratorStatus {
    pub is_running: bool,
    pub session_manager: SessionManagerStatus,
    pub worker_manager: WorkerManagerStatus,
    pub mission_manager: MissionManagerStatus,
    pub event_history: Vec<EventRecord>,
}

/// 当前一代管理器及其订阅
struct ManagerSet {
    session: Arc<SessionManager>,
    worker: Arc<WorkerManager>,
    mission: Arc<MissionManager>,
    guards: Vec<SubscriptionGuard>,
}

/// 管理器的共享依赖
struct Dependencies {
    bus: EventBus,
    missions: Arc<dyn MissionRepository>,
    workers: Arc<dyn WorkerRepository>,
    sessions: Arc<dyn SessionRepository>,
    proxies: Arc<dyn ProxyRepository>,
    writers: Arc<dyn WriterRepository>,
    mission_logs: Arc<dyn MissionLogRepository>,
    worker_client: Arc<WorkerClient>,
    writer_client: Arc<WriterClient>,
}

impl Dependencies {
    /// 用给定配置装配新一代管理器并建立订阅
    fn assemble(&self, config: OrchestratorConfig) -> ManagerSet {
        let session = Arc::new(SessionManager::new(
            config.clone(),
            self.bus.clone(),
            self.sessions.clone(),
            self.proxies.clone(),
            self.workers.clone(),
            self.mission_logs.clone(),
            self.worker_client.clone(),
        ));
        let worker = Arc::new(WorkerManager::new(
            config.clone(),
            self.bus.clone(),
            self.missions.clone(),
            self.workers.clone(),
            self.sessions.clone(),
            self.mission_logs.clone(),
            self.worker_client.clone(),
        ));
        let mission = Arc::new(MissionManager::new(
            config,
            self.bus.clone(),
            self.missions.clone(),
            self.workers.clone(),
            self.writers.clone(),
            self.mission_logs.clone(),
            self.writer_client.clone(),
        ));

        let mut guards = Vec::new();
        guards.extend(session.clone().attach());
        guards.extend(worker.clone().attach());
        guards.extend(mission.clone().attach());

        ManagerSet {
            session,
            worker,
            mission,
            guards,
        }
    }
}

/// 编排控制器
///
/// 组合根：解析配置、构建并按依赖顺序启动/停止三个管理器，
/// 向外部CRUD层暴露取消与状态查询。管理器之间的全部耦合都
/// 集中在这里的装配代码中。
pub struct OrchestratorController {
    deps: Dependencies,
    config_repo: Arc<dyn ConfigRepository>,
    running: AtomicBool,
    managers: Mutex<ManagerSet>,
}

impl OrchestratorController {
    /// 创建新的编排控制器实例
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        bus: EventBus,
        missions: Arc<dyn MissionRepository>,
        workers: Arc<dyn WorkerRepository>,
        sessions: Arc<dyn SessionRepository>,
        proxies: Arc<dyn ProxyRepository>,
        writers: Arc<dyn WriterRepository>,
        mission_logs: Arc<dyn MissionLogRepository>,
        config_repo: Arc<dyn ConfigRepository>,
        worker_client: Arc<WorkerClient>,
        writer_client: Arc<WriterClient>,
    ) -> Self {
        let deps = Dependencies {
            bus,
            missions,
            workers,
            sessions,
            proxies,
            writers,
            mission_logs,
            worker_client,
            writer_client,
        };
        let managers = deps.assemble(OrchestratorConfig::default());

        Self {
            deps,
            config_repo,
            running: AtomicBool::new(false),
            managers: Mutex::new(managers),
        }
    }

    /// 启动编排器
    ///
    /// 幂等：已运行时直接返回。用解析后的配置构建新一代管理器，
    /// 按会话→工作器→任务的顺序启动（会话必须先可轮询，工作器
    /// 必须先被跟踪，任务才能开始分配）。
    pub async fn start(&self) -> Result<(), OrchestratorError> {
        if self.running.load(Ordering::SeqCst) {
            info!("orchestrator already running");
            return Ok(());
        }

        info!("starting orchestrator");

        let overrides = self.config_repo.load_all().await?;
        let config = OrchestratorConfig::default().with_overrides(&overrides);
        info!("orchestrator config resolved: {config:?}");

        let set = self.deps.assemble(config);
        let (session, worker, mission) = (
            set.session.clone(),
            set.worker.clone(),
            set.mission.clone(),
        );
        *self.managers.lock() = set;

        session.start().await?;
        worker.start().await?;
        mission.start().await?;

        self.running.store(true, Ordering::SeqCst);
        self.deps
            .bus
            .emit(OrchestratorEvent::OrchestratorStarted)
            .await;

        info!("orchestrator started");
        Ok(())
    }

    /// 停止编排器
    ///
    /// 幂等：未运行时直接返回。按任务→工作器→会话的逆序停止，
    /// 每个管理器的定时器在返回前都已停住；在途HTTP调用不强制
    /// 中断，只是不再调度。
    pub async fn stop(&self) -> Result<(), OrchestratorError> {
        if !self.running.load(Ordering::SeqCst) {
            info!("orchestrator not running");
            return Ok(());
        }

        info!("stopping orchestrator");

        {
            let mut set = self.managers.lock();
            set.mission.stop();
            set.worker.stop();
            set.session.stop();
            set.guards.clear();
        }

        self.running.store(false, Ordering::SeqCst);
        self.deps
            .bus
            .emit(OrchestratorEvent::OrchestratorStopped)
            .await;

        info!("orchestrator stopped");
        Ok(())
    }

    /// 取消任务
    ///
    /// 结束任务的活动会话（若有）、把任务置为带取消错误码的
    /// FAILED终态、把工作器放回空闲。取消绕过重试逻辑。
    pub async fn cancel_mission(&self, mission_id: Uuid) -> Result<(), OrchestratorError> {
        info!("cancelling mission {mission_id}");

        let Some(mission) = self.deps.missions.find_by_id(mission_id).await? else {
            return Err(OrchestratorError::MissionNotFound(mission_id));
        };
        if mission.status.is_terminal() {
            info!("mission {mission_id} already terminal, nothing to cancel");
            return Ok(());
        }

        // Best effort: tell the worker to drop the in-flight scrape job
        if let (Some(worker_id), Some(job_id)) = (mission.worker_id, &mission.worker_job_id) {
            if let Some(worker) = self.deps.workers.find_by_id(worker_id).await? {
                if let Err(e) = self.deps.worker_client.cancel_scrape(&worker, job_id).await {
                    warn!("failed to cancel scrape job {job_id} on worker {worker_id}: {e}");
                }
            }
        }

        if let Some(session_id) = mission.session_id {
            let session_manager = self.managers.lock().session.clone();
            session_manager.end_session(session_id).await?;
        }

        self.deps
            .missions
            .mark_failed(mission_id, ErrorCode::Cancelled, "cancelled by operator")
            .await?;

        if let Some(worker_id) = mission.worker_id {
            self.deps
                .workers
                .set_status(worker_id, WorkerStatus::Idle)
                .await?;
        }

        self.deps
            .mission_logs
            .append(mission_id, "CANCELLED", "cancelled by operator", 0)
            .await?;

        info!("mission {mission_id} cancelled");
        Ok(())
    }

    /// 读取整体状态快照
    ///
    /// 只读，无副作用，可高频轮询
    pub fn status(&self) -> OrchestratorStatus {
        let set = self.managers.lock();
        OrchestratorStatus {
            is_running: self.running.load(Ordering::SeqCst),
            session_manager: set.session.status(),
            worker_manager: set.worker.status(),
            mission_manager: set.mission.status(),
            event_history: self.deps.bus.history(50),
        }
    }
}
