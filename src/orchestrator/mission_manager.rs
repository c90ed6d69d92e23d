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
use crate::domain::models::mission::{Checkpoint, Mission};
use crate::domain::repositories::mission_log_repository::MissionLogRepository;
use crate::domain::repositories::mission_repository::MissionRepository;
use crate::domain::repositories::worker_repository::WorkerRepository;
use crate::domain::repositories::writer_repository::WriterRepository;
use crate::infrastructure::clients::writer_client::WriterClient;
use crate::orchestrator::config::OrchestratorConfig;
use crate::orchestrator::event_bus::{EventBus, SubscriptionGuard};
use crate::orchestrator::events::{EventTopic, OrchestratorEvent};
use crate::orchestrator::OrchestratorError;
use dashmap::DashMap;
use metrics::counter;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// 任务管理器状态快照
#[derive(Debug, Clone, Serialize)]
pub struct MissionManagerStatus {
    pub is_running: bool,
    pub active_writers: usize,
}

/// 本地跟踪的写入作业
struct ActiveWriter {
    started: Instant,
}

/// 任务管理器
///
/// 拥有任务队列、重试/终态裁决和写入作业状态机。写入步骤是
/// 尽力而为的：写入器缺失、启动失败、上报失败或超时都直接
/// 完成任务，绝不因写入问题判任务失败。
pub struct MissionManager {
    config: OrchestratorConfig,
    bus: EventBus,
    missions: Arc<dyn MissionRepository>,
    workers: Arc<dyn WorkerRepository>,
    writers: Arc<dyn WriterRepository>,
    mission_logs: Arc<dyn MissionLogRepository>,
    writer_client: Arc<WriterClient>,
    running: AtomicBool,
    loop_handle: Mutex<Option<JoinHandle<()>>>,
    active_writers: DashMap<Uuid, ActiveWriter>,
}

impl MissionManager {
    /// 创建新的任务管理器实例
    pub fn new(
        config: OrchestratorConfig,
        bus: EventBus,
        missions: Arc<dyn MissionRepository>,
        workers: Arc<dyn WorkerRepository>,
        writers: Arc<dyn WriterRepository>,
        mission_logs: Arc<dyn MissionLogRepository>,
        writer_client: Arc<WriterClient>,
    ) -> Self {
        Self {
            config,
            bus,
            missions,
            workers,
            writers,
            mission_logs,
            writer_client,
            running: AtomicBool::new(false),
            loop_handle: Mutex::new(None),
            active_writers: DashMap::new(),
        }
    }

    /// 订阅本管理器消费的事件
    pub fn attach(self: Arc<Self>) -> Vec<SubscriptionGuard> {
        let mut guards = Vec::new();

        let manager = Arc::clone(&self);
        guards.push(self.bus.subscribe(EventTopic::ScrapeCompleted, move |event| {
            let manager = Arc::clone(&manager);
            Box::pin(async move {
                if let OrchestratorEvent::ScrapeCompleted {
                    mission_id,
                    session_id,
                    data_url,
                    ads_count,
                    ..
                } = event
                {
                    manager
                        .handle_scrape_complete(mission_id, data_url, ads_count, session_id)
                        .await?;
                }
                Ok(())
            })
        }));

        let manager = Arc::clone(&self);
        guards.push(self.bus.subscribe(EventTopic::ScrapeFailed, move |event| {
            let manager = Arc::clone(&manager);
            Box::pin(async move {
                if let OrchestratorEvent::ScrapeFailed {
                    mission_id,
                    session_id,
                    error,
                    code,
                    ..
                } = event
                {
                    manager
                        .handle_scrape_failed(mission_id, error, code, session_id)
                        .await?;
                }
                Ok(())
            })
        }));

        let manager = Arc::clone(&self);
        guards.push(
            self.bus
                .subscribe(EventTopic::WorkerSessionFailed, move |event| {
                    let manager = Arc::clone(&manager);
                    Box::pin(async move {
                        if let OrchestratorEvent::WorkerSessionFailed {
                            mission_id,
                            error,
                            code,
                            ..
                        } = event
                        {
                            manager.retry_or_fail(mission_id, &error, code).await?;
                        }
                        Ok(())
                    })
                }),
        );

        guards
    }

    /// 启动管理器
    pub async fn start(self: Arc<Self>) -> Result<(), OrchestratorError> {
        if self.running.load(Ordering::SeqCst) {
            return Ok(());
        }
        info!("mission manager starting");

        self.running.store(true, Ordering::SeqCst);
        let manager = Arc::clone(&self);
        let handle = tokio::spawn(async move {
            let mut ticker = interval(manager.config.mission_polling_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if !manager.running.load(Ordering::SeqCst) {
                    break;
                }
                if let Err(e) = manager.process_queued_missions().await {
                    error!("mission queue tick failed: {e}");
                }
                if let Err(e) = manager.monitor_writers().await {
                    error!("writer monitor tick failed: {e}");
                }
            }
        });
        *self.loop_handle.lock() = Some(handle);
        Ok(())
    }

    /// 停止管理器
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.loop_handle.lock().take() {
            handle.abort();
        }
        info!("mission manager stopped");
    }

    /// 获取状态快照
    pub fn status(&self) -> MissionManagerStatus {
        MissionManagerStatus {
            is_running: self.running.load(Ordering::SeqCst),
            active_writers: self.active_writers.len(),
        }
    }

    /// 把排队中的任务分配给空闲工作器
    ///
    /// 分配本身由数据库的原子操作保证排他；没有可分配任务
    /// 是正常情况，不是错误
    async fn process_queued_missions(&self) -> Result<(), OrchestratorError> {
        let idle_workers = self.workers.list_idle_active().await?;

        for worker in idle_workers {
            if !self.running.load(Ordering::SeqCst) {
                break;
            }

            let Some(mission) = self.missions.allocate_next_to_worker(worker.id).await? else {
                continue;
            };

            info!("assigned mission {} to worker {}", mission.id, worker.id);

            self.mission_logs
                .append(
                    mission.id,
                    "MISSION_ASSIGNED",
                    &format!("Assigned to worker {}", worker.id),
                    0,
                )
                .await?;
            counter!("orchestrs_missions_assigned_total").increment(1);

            self.bus
                .emit(OrchestratorEvent::MissionAssigned {
                    mission_id: mission.id,
                    worker_id: worker.id,
                })
                .await;
        }
        Ok(())
    }

    /// 抓取完成：结束会话并进入写入步骤
    async fn handle_scrape_complete(
        &self,
        mission_id: Uuid,
        data_url: String,
        ads_count: i64,
        session_id: Option<Uuid>,
    ) -> Result<(), OrchestratorError> {
        info!("scrape complete for mission {mission_id}");

        self.missions
            .record_scrape_result(mission_id, ads_count, &data_url)
            .await?;
        self.missions.clear_session(mission_id).await?;

        // The session's job is done regardless of the writer outcome
        if let Some(session_id) = session_id {
            self.bus
                .emit(OrchestratorEvent::SessionEndRequested { session_id })
                .await;
        }

        self.start_writer(mission_id, &data_url).await
    }

    /// 抓取失败：结束会话并裁决重试或终态失败
    async fn handle_scrape_failed(
        &self,
        mission_id: Uuid,
        error: String,
        code: ErrorCode,
        session_id: Option<Uuid>,
    ) -> Result<(), OrchestratorError> {
        info!("scrape failed for mission {mission_id}: {error}");

        if let Some(session_id) = session_id {
            self.bus
                .emit(OrchestratorEvent::SessionEndRequested { session_id })
                .await;
        }

        self.retry_or_fail(mission_id, &error, code).await
    }

    /// 重试或终态失败的裁决
    ///
    /// 重试次数只增不减；达到上限后任务转为FAILED且核心不再
    /// 自动重新入队
    async fn retry_or_fail(
        &self,
        mission_id: Uuid,
        error: &str,
        code: ErrorCode,
    ) -> Result<(), OrchestratorError> {
        let Some(mission) = self.missions.find_by_id(mission_id).await? else {
            return Ok(());
        };

        let retry_count = mission.retry_count + 1;

        if mission.can_retry(self.config.max_mission_retries) {
            info!("retrying mission {mission_id} (attempt {retry_count})");

            self.missions
                .requeue_for_retry(mission_id, retry_count)
                .await?;
            self.mission_logs
                .append(
                    mission_id,
                    "MISSION_RETRY",
                    &format!("Retry {retry_count} after: {error}"),
                    0,
                )
                .await?;
            counter!("orchestrs_missions_retried_total").increment(1);
        } else {
            warn!("mission {mission_id} failed permanently: {error}");

            self.missions.mark_failed(mission_id, code, error).await?;
            self.mission_logs
                .append(mission_id, "MISSION_FAILED", error, 0)
                .await?;
            counter!("orchestrs_missions_failed_total", "code" => code.as_str()).increment(1);

            self.bus
                .emit(OrchestratorEvent::MissionFailed {
                    mission_id,
                    error: error.to_string(),
                    code,
                })
                .await;
        }
        Ok(())
    }

    /// 启动写入作业
    ///
    /// 写入器缺失或启动失败都不是任务的失败：跳过存储步骤，
    /// 直接完成任务
    async fn start_writer(
        &self,
        mission_id: Uuid,
        data_url: &str,
    ) -> Result<(), OrchestratorError> {
        info!("starting writer for mission {mission_id}");

        let Some(writer) = self.writers.first_active().await? else {
            info!("no active writer available, completing mission {mission_id} without storage");
            return self.complete_mission(mission_id).await;
        };

        match self
            .writer_client
            .process(&writer, data_url, mission_id)
            .await
        {
            Ok(job_id) => {
                self.missions.begin_storage(mission_id, &job_id).await?;
                self.active_writers.insert(
                    mission_id,
                    ActiveWriter {
                        started: Instant::now(),
                    },
                );

                self.mission_logs
                    .append(mission_id, "WRITER_STARTED", &format!("Job {job_id} started"), 0)
                    .await?;
                counter!("orchestrs_writers_started_total").increment(1);

                self.bus
                    .emit(OrchestratorEvent::WriterStarted { mission_id, job_id })
                    .await;
                Ok(())
            }
            Err(e) => {
                warn!("failed to start writer for mission {mission_id}: {e}");
                self.complete_mission(mission_id).await
            }
        }
    }

    /// 轮询所有进行中的写入作业
    async fn monitor_writers(&self) -> Result<(), OrchestratorError> {
        let missions = self
            .missions
            .find_running_at_checkpoint(Checkpoint::Armazenando)
            .await?;

        for mission in missions {
            if !self.running.load(Ordering::SeqCst) {
                break;
            }
            if let Err(e) = self.check_writer(&mission).await {
                error!("error checking writer for mission {}: {e}", mission.id);
            }
        }
        Ok(())
    }

    async fn check_writer(&self, mission: &Mission) -> Result<(), OrchestratorError> {
        let Some(job_id) = mission.writer_job_id.clone() else {
            return self.complete_mission(mission.id).await;
        };

        let elapsed = self
            .active_writers
            .get(&mission.id)
            .map(|w| w.started.elapsed())
            .unwrap_or_default();

        if elapsed > self.config.writer_timeout {
            info!("writer for mission {} timed out, completing anyway", mission.id);
            return self.complete_mission(mission.id).await;
        }

        let Some(writer) = self.writers.first_active().await? else {
            return self.complete_mission(mission.id).await;
        };

        let status = match self.writer_client.job_status(&writer, &job_id).await {
            Ok(status) => status,
            Err(e) => {
                // Transient; the next tick polls again
                debug!("writer status check failed for mission {}: {e}", mission.id);
                return Ok(());
            }
        };

        if status.is_finished() {
            self.complete_mission(mission.id).await?;
        } else if status.is_failed() {
            info!("writer failed for mission {}, completing anyway", mission.id);
            self.complete_mission(mission.id).await?;
        }

        Ok(())
    }

    /// 完成任务（终态DONE、检查点FINALIZADO）
    async fn complete_mission(&self, mission_id: Uuid) -> Result<(), OrchestratorError> {
        info!("completing mission {mission_id}");

        self.active_writers.remove(&mission_id);

        let ads_count = self
            .missions
            .find_by_id(mission_id)
            .await?
            .and_then(|m| m.ads_count)
            .unwrap_or(0);

        self.missions.mark_done(mission_id).await?;

        self.mission_logs
            .append(
                mission_id,
                "MISSION_COMPLETE",
                &format!("Mission completed with {ads_count} ads"),
                0,
            )
            .await?;
        counter!("orchestrs_missions_completed_total").increment(1);

        self.bus
            .emit(OrchestratorEvent::MissionCompleted {
                mission_id,
                ads_count,
            })
            .await;
        Ok(())
    }
}
