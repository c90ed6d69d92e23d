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
use crate::domain::models::mission::{Checkpoint, MediaType, Mission};
use crate::domain::models::worker::WorkerStatus;
use crate::domain::repositories::mission_log_repository::MissionLogRepository;
use crate::domain::repositories::mission_repository::MissionRepository;
use crate::domain::repositories::session_repository::SessionRepository;
use crate::domain::repositories::worker_repository::WorkerRepository;
use crate::infrastructure::clients::worker_client::{
    DateRange, ScrapeOptions, ScrapeRequest, WorkerClient,
};
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

/// 工作器管理器状态快照
#[derive(Debug, Clone, Serialize)]
pub struct WorkerManagerStatus {
    pub is_running: bool,
    pub active_scrapes: usize,
    pub waiting_workers: usize,
}

/// 本地跟踪的抓取作业
struct ActiveScrape {
    worker_id: Uuid,
    session_id: Uuid,
    started: Instant,
}

/// 抓取作业的轮询结论
enum ScrapeOutcome {
    Completed { ads_count: i64, data_url: String },
    Failed,
    TimedOut,
}

/// 工作器管理器
///
/// 拥有工作器占用状态和抓取作业状态机：会话就绪后启动抓取、
/// 轮询作业进度直到完成/失败/超时，然后把工作器放回空闲。
/// 任务层面的重试决策留给任务管理器。
pub struct WorkerManager {
    config: OrchestratorConfig,
    bus: EventBus,
    missions: Arc<dyn MissionRepository>,
    workers: Arc<dyn WorkerRepository>,
    sessions: Arc<dyn SessionRepository>,
    mission_logs: Arc<dyn MissionLogRepository>,
    client: Arc<WorkerClient>,
    running: AtomicBool,
    loop_handle: Mutex<Option<JoinHandle<()>>>,
    active_scrapes: DashMap<Uuid, ActiveScrape>,
    waiting: DashMap<Uuid, Uuid>,
}

impl WorkerManager {
    /// 创建新的工作器管理器实例
    pub fn new(
        config: OrchestratorConfig,
        bus: EventBus,
        missions: Arc<dyn MissionRepository>,
        workers: Arc<dyn WorkerRepository>,
        sessions: Arc<dyn SessionRepository>,
        mission_logs: Arc<dyn MissionLogRepository>,
        client: Arc<WorkerClient>,
    ) -> Self {
        Self {
            config,
            bus,
            missions,
            workers,
            sessions,
            mission_logs,
            client,
            running: AtomicBool::new(false),
            loop_handle: Mutex::new(None),
            active_scrapes: DashMap::new(),
            waiting: DashMap::new(),
        }
    }

    /// 订阅本管理器消费的事件
    pub fn attach(self: Arc<Self>) -> Vec<SubscriptionGuard> {
        let mut guards = Vec::new();

        let manager = Arc::clone(&self);
        guards.push(self.bus.subscribe(EventTopic::MissionAssigned, move |event| {
            let manager = Arc::clone(&manager);
            Box::pin(async move {
                if let OrchestratorEvent::MissionAssigned {
                    mission_id,
                    worker_id,
                } = event
                {
                    manager.request_session(worker_id, mission_id).await?;
                }
                Ok(())
            })
        }));

        let manager = Arc::clone(&self);
        guards.push(self.bus.subscribe(EventTopic::SessionReady, move |event| {
            let manager = Arc::clone(&manager);
            Box::pin(async move {
                if let OrchestratorEvent::SessionReady {
                    session_id,
                    worker_id,
                } = event
                {
                    manager.handle_session_ready(session_id, worker_id).await?;
                }
                Ok(())
            })
        }));

        let manager = Arc::clone(&self);
        guards.push(self.bus.subscribe(EventTopic::SessionFailed, move |event| {
            let manager = Arc::clone(&manager);
            Box::pin(async move {
                if let OrchestratorEvent::SessionFailed {
                    worker_id,
                    error,
                    code,
                    ..
                } = event
                {
                    manager.handle_session_failed(worker_id, error, code).await?;
                }
                Ok(())
            })
        }));

        let manager = Arc::clone(&self);
        guards.push(
            self.bus
                .subscribe(EventTopic::SessionTerminated, move |event| {
                    let manager = Arc::clone(&manager);
                    Box::pin(async move {
                        if let OrchestratorEvent::SessionTerminated { session_id, .. } = event {
                            manager.handle_session_terminated(session_id).await?;
                        }
                        Ok(())
                    })
                }),
        );

        guards
    }

    /// 启动管理器
    ///
    /// 先把上一次运行遗留的忙碌工作器重置为空闲，再启动轮询循环
    pub async fn start(self: Arc<Self>) -> Result<(), OrchestratorError> {
        if self.running.load(Ordering::SeqCst) {
            return Ok(());
        }
        info!("worker manager starting");

        let reset = self.workers.reset_busy_to_idle().await?;
        if reset > 0 {
            info!("reset {reset} workers to idle");
        }

        self.running.store(true, Ordering::SeqCst);
        let manager = Arc::clone(&self);
        let handle = tokio::spawn(async move {
            let mut ticker = interval(manager.config.worker_polling_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if !manager.running.load(Ordering::SeqCst) {
                    break;
                }
                if let Err(e) = manager.monitor_active_scrapes().await {
                    error!("scrape monitor tick failed: {e}");
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
        info!("worker manager stopped");
    }

    /// 获取状态快照
    pub fn status(&self) -> WorkerManagerStatus {
        WorkerManagerStatus {
            is_running: self.running.load(Ordering::SeqCst),
            active_scrapes: self.active_scrapes.len(),
            waiting_workers: self.waiting.len(),
        }
    }

    /// 为刚分配到任务的工作器请求会话
    async fn request_session(
        &self,
        worker_id: Uuid,
        mission_id: Uuid,
    ) -> Result<(), OrchestratorError> {
        self.workers
            .set_status(worker_id, WorkerStatus::WaitingSession)
            .await?;
        self.waiting.insert(worker_id, mission_id);

        self.bus
            .emit(OrchestratorEvent::SessionRequested {
                worker_id,
                mission_id,
            })
            .await;
        Ok(())
    }

    /// 会话就绪：启动对应任务的抓取作业
    ///
    /// 没有等待中任务的就绪事件直接丢弃，重复投递不会触发
    /// 第二次抓取
    async fn handle_session_ready(
        &self,
        session_id: Uuid,
        worker_id: Uuid,
    ) -> Result<(), OrchestratorError> {
        let Some((_, mission_id)) = self.waiting.remove(&worker_id) else {
            debug!("no waiting mission for worker {worker_id}, dropping session ready");
            return Ok(());
        };

        self.workers
            .set_status(worker_id, WorkerStatus::Ready)
            .await?;
        self.sessions.mark_active(session_id).await?;

        self.start_scrape(worker_id, mission_id, session_id).await
    }

    /// 会话失败：放回工作器并把失败折算到任务层面
    async fn handle_session_failed(
        &self,
        worker_id: Uuid,
        error: String,
        code: ErrorCode,
    ) -> Result<(), OrchestratorError> {
        let waiting = self.waiting.remove(&worker_id);

        self.workers
            .set_status(worker_id, WorkerStatus::Idle)
            .await?;

        if let Some((_, mission_id)) = waiting {
            self.bus
                .emit(OrchestratorEvent::WorkerSessionFailed {
                    worker_id,
                    mission_id,
                    error,
                    code,
                })
                .await;
        }
        Ok(())
    }

    /// 会话已被结束：释放关联的工作器资源
    ///
    /// 覆盖会话在带外被结束的情形。只清除该会话的抓取跟踪；
    /// 等待队列不动，工作器可能已经在为下一个任务等待新会话
    async fn handle_session_terminated(
        &self,
        session_id: Uuid,
    ) -> Result<(), OrchestratorError> {
        let Some(session) = self.sessions.find_by_id(session_id).await? else {
            return Ok(());
        };
        let worker_id = session.worker_id;

        self.active_scrapes
            .retain(|_, scrape| scrape.session_id != session_id);

        self.workers
            .set_status(worker_id, WorkerStatus::Idle)
            .await?;

        debug!("worker {worker_id} reset to idle after session terminated");
        Ok(())
    }

    /// 启动抓取作业
    async fn start_scrape(
        &self,
        worker_id: Uuid,
        mission_id: Uuid,
        session_id: Uuid,
    ) -> Result<(), OrchestratorError> {
        info!("starting scrape for mission {mission_id}");

        let worker = self.workers.find_by_id(worker_id).await?;
        let mission = self.missions.find_by_id(mission_id).await?;
        let (Some(worker), Some(mission)) = (worker, mission) else {
            error!("worker or mission not found for scrape start");
            self.bus
                .emit(OrchestratorEvent::ScrapeFailed {
                    mission_id,
                    worker_id,
                    session_id: Some(session_id),
                    error: "worker or mission not found".to_string(),
                    code: ErrorCode::ScrapeStartFailed,
                })
                .await;
            return Ok(());
        };

        let request = ScrapeRequest {
            date_range: DateRange {
                start: mission.date_start,
                end: mission.date_end,
            },
            format: (mission.media_type != MediaType::All)
                .then(|| mission.media_type.to_string()),
            languages: mission.languages.clone(),
            sort_by: "qtd_ads".to_string(),
            options: ScrapeOptions {
                max_ads: self.config.max_ads_per_mission,
                batch_size: self.config.batch_size,
            },
        };

        match self.client.start_scrape(&worker, &request).await {
            Ok(job_id) => {
                self.workers
                    .set_status(worker_id, WorkerStatus::Scraping)
                    .await?;
                self.missions
                    .begin_extraction(mission_id, worker_id, session_id, &job_id)
                    .await?;
                self.active_scrapes.insert(
                    mission_id,
                    ActiveScrape {
                        worker_id,
                        session_id,
                        started: Instant::now(),
                    },
                );

                self.mission_logs
                    .append(mission_id, "SCRAPE_STARTED", &format!("Job {job_id} started"), 0)
                    .await?;
                counter!("orchestrs_scrapes_started_total").increment(1);
                info!("scrape started for mission {mission_id}, job {job_id}");

                self.bus
                    .emit(OrchestratorEvent::ScrapeStarted {
                        mission_id,
                        worker_id,
                        job_id,
                    })
                    .await;
            }
            Err(e) => {
                warn!("failed to start scrape for mission {mission_id}: {e}");

                self.workers
                    .set_status(worker_id, WorkerStatus::Idle)
                    .await?;

                self.bus
                    .emit(OrchestratorEvent::ScrapeFailed {
                        mission_id,
                        worker_id,
                        session_id: Some(session_id),
                        error: e.to_string(),
                        code: ErrorCode::ScrapeStartFailed,
                    })
                    .await;
            }
        }
        Ok(())
    }

    /// 轮询所有进行中的抓取作业
    async fn monitor_active_scrapes(&self) -> Result<(), OrchestratorError> {
        let missions = self
            .missions
            .find_running_at_checkpoint(Checkpoint::Extraindo)
            .await?;

        for mission in missions {
            if !self.running.load(Ordering::SeqCst) {
                break;
            }
            if let Err(e) = self.check_scrape(&mission).await {
                error!("error checking scrape for mission {}: {e}", mission.id);
            }
        }
        Ok(())
    }

    async fn check_scrape(&self, mission: &Mission) -> Result<(), OrchestratorError> {
        let (Some(worker_id), Some(job_id)) = (mission.worker_id, mission.worker_job_id.clone())
        else {
            return Ok(());
        };

        let elapsed = self
            .active_scrapes
            .get(&mission.id)
            .map(|s| s.started.elapsed())
            .unwrap_or_default();

        if elapsed > self.config.scrape_timeout {
            info!("scrape for mission {} timed out", mission.id);
            return self
                .finish_scrape(mission, worker_id, ScrapeOutcome::TimedOut)
                .await;
        }

        let Some(worker) = self.workers.find_by_id(worker_id).await? else {
            return Ok(());
        };

        let status = match self.client.scrape_status(&worker, &job_id).await {
            Ok(status) => status,
            Err(e) => {
                // Transient; the next tick polls again
                debug!("scrape status check failed for mission {}: {e}", mission.id);
                return Ok(());
            }
        };

        if status.is_finished() {
            let data_url = format!(
                "{}/data/{}.json",
                worker.storage_base().trim_end_matches('/'),
                job_id
            );
            self.missions
                .record_scrape_result(mission.id, status.ads(), &data_url)
                .await?;
            self.finish_scrape(
                mission,
                worker_id,
                ScrapeOutcome::Completed {
                    ads_count: status.ads(),
                    data_url,
                },
            )
            .await?;
        } else if status.is_failed() {
            self.finish_scrape(mission, worker_id, ScrapeOutcome::Failed)
                .await?;
        }

        Ok(())
    }

    /// 结束一个抓取作业的跟踪
    ///
    /// 无论结果如何都把工作器放回空闲并清除本地跟踪；
    /// 失败结果持久化到任务上，重试与否由任务管理器裁决
    async fn finish_scrape(
        &self,
        mission: &Mission,
        worker_id: Uuid,
        outcome: ScrapeOutcome,
    ) -> Result<(), OrchestratorError> {
        let cached = self.active_scrapes.remove(&mission.id).map(|(_, s)| s);
        let session_id = cached.as_ref().map(|s| s.session_id).or(mission.session_id);
        let elapsed_ms = cached
            .as_ref()
            .map(|s| s.started.elapsed().as_millis() as i64)
            .unwrap_or(0);

        self.workers
            .set_status(worker_id, WorkerStatus::Idle)
            .await?;

        match outcome {
            ScrapeOutcome::Completed {
                ads_count,
                data_url,
            } => {
                self.mission_logs
                    .append(
                        mission.id,
                        "SCRAPE_COMPLETE",
                        &format!("Scraped {ads_count} ads"),
                        elapsed_ms,
                    )
                    .await?;
                counter!("orchestrs_scrapes_completed_total").increment(1);

                self.bus
                    .emit(OrchestratorEvent::ScrapeCompleted {
                        mission_id: mission.id,
                        worker_id,
                        session_id,
                        data_url,
                        ads_count,
                    })
                    .await;
            }
            ScrapeOutcome::Failed | ScrapeOutcome::TimedOut => {
                let (code, message) = match outcome {
                    ScrapeOutcome::TimedOut => (ErrorCode::ScrapeTimeout, "scrape timed out"),
                    _ => (ErrorCode::ScrapeFailed, "scrape failed"),
                };

                self.missions.mark_failed(mission.id, code, message).await?;
                self.mission_logs
                    .append(mission.id, "SCRAPE_FAILED", message, elapsed_ms)
                    .await?;
                counter!("orchestrs_scrapes_failed_total", "code" => code.as_str()).increment(1);

                self.bus
                    .emit(OrchestratorEvent::ScrapeFailed {
                        mission_id: mission.id,
                        worker_id,
                        session_id,
                        error: message.to_string(),
                        code,
                    })
                    .await;
            }
        }
        Ok(())
    }
}
