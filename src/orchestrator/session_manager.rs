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
use crate::domain::models::proxy::Proxy;
use crate::domain::models::session::{PhaseClass, Session, SessionStatus};
use crate::domain::models::worker::Worker;
use crate::domain::repositories::mission_log_repository::MissionLogRepository;
use crate::domain::repositories::proxy_repository::ProxyRepository;
use crate::domain::repositories::session_repository::SessionRepository;
use crate::domain::repositories::worker_repository::WorkerRepository;
use crate::infrastructure::clients::worker_client::{
    ProxyConfig, SessionCreateRequest, WorkerClient,
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

/// 会话管理器状态快照
#[derive(Debug, Clone, Serialize)]
pub struct SessionManagerStatus {
    pub is_running: bool,
    pub active_sessions: usize,
    pub pending_requests: usize,
}

/// 本地跟踪的会话信息，用于超时与连续失败计数
struct TrackedSession {
    started: Instant,
    failure_count: i32,
}

/// 等待会话就绪的请求
struct PendingRequest {
    mission_id: Uuid,
}

/// 会话管理器
///
/// 拥有代理租用与远程会话状态机：为工作器建立会话、轮询远程
/// 状态直到就绪或出错、在每条失败路径上释放代理。会话建立
/// 失败时用新的代理租约重建，直到重试上限。
pub struct SessionManager {
    config: OrchestratorConfig,
    bus: EventBus,
    sessions: Arc<dyn SessionRepository>,
    proxies: Arc<dyn ProxyRepository>,
    workers: Arc<dyn WorkerRepository>,
    mission_logs: Arc<dyn MissionLogRepository>,
    client: Arc<WorkerClient>,
    running: AtomicBool,
    loop_handle: Mutex<Option<JoinHandle<()>>>,
    tracked: DashMap<Uuid, TrackedSession>,
    pending: DashMap<Uuid, PendingRequest>,
}

impl SessionManager {
    /// 创建新的会话管理器实例
    pub fn new(
        config: OrchestratorConfig,
        bus: EventBus,
        sessions: Arc<dyn SessionRepository>,
        proxies: Arc<dyn ProxyRepository>,
        workers: Arc<dyn WorkerRepository>,
        mission_logs: Arc<dyn MissionLogRepository>,
        client: Arc<WorkerClient>,
    ) -> Self {
        Self {
            config,
            bus,
            sessions,
            proxies,
            workers,
            mission_logs,
            client,
            running: AtomicBool::new(false),
            loop_handle: Mutex::new(None),
            tracked: DashMap::new(),
            pending: DashMap::new(),
        }
    }

    /// 订阅本管理器消费的事件
    ///
    /// # 返回值
    ///
    /// 返回订阅守卫集合，释放守卫即解除订阅
    pub fn attach(self: Arc<Self>) -> Vec<SubscriptionGuard> {
        let mut guards = Vec::new();

        let manager = Arc::clone(&self);
        guards.push(self.bus.subscribe(EventTopic::SessionRequested, move |event| {
            let manager = Arc::clone(&manager);
            Box::pin(async move {
                if let OrchestratorEvent::SessionRequested {
                    worker_id,
                    mission_id,
                } = event
                {
                    manager
                        .create_session_for_worker(worker_id, mission_id, 0)
                        .await?;
                }
                Ok(())
            })
        }));

        let manager = Arc::clone(&self);
        guards.push(
            self.bus
                .subscribe(EventTopic::SessionEndRequested, move |event| {
                    let manager = Arc::clone(&manager);
                    Box::pin(async move {
                        if let OrchestratorEvent::SessionEndRequested { session_id } = event {
                            manager.end_session(session_id).await?;
                        }
                        Ok(())
                    })
                }),
        );

        guards
    }

    /// 启动管理器
    ///
    /// 先清理上一次运行遗留的会话，再启动轮询循环
    pub async fn start(self: Arc<Self>) -> Result<(), OrchestratorError> {
        if self.running.load(Ordering::SeqCst) {
            return Ok(());
        }
        info!("session manager starting");

        self.cleanup_orphaned_sessions().await?;

        self.running.store(true, Ordering::SeqCst);
        let manager = Arc::clone(&self);
        let handle = tokio::spawn(async move {
            let mut ticker = interval(manager.config.session_polling_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if !manager.running.load(Ordering::SeqCst) {
                    break;
                }
                if let Err(e) = manager.monitor_active_sessions().await {
                    error!("session monitor tick failed: {e}");
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
        info!("session manager stopped");
    }

    /// 获取状态快照
    pub fn status(&self) -> SessionManagerStatus {
        SessionManagerStatus {
            is_running: self.running.load(Ordering::SeqCst),
            active_sessions: self.tracked.len(),
            pending_requests: self.pending.len(),
        }
    }

    /// 清理上一次运行遗留的非终态会话
    ///
    /// 遗留会话不可恢复：全部置为错误并释放代理（不计代理失败），
    /// 最后兜底清空所有残留租约
    async fn cleanup_orphaned_sessions(&self) -> Result<(), OrchestratorError> {
        let orphaned = self.sessions.find_non_terminal().await?;
        let count = orphaned.len();

        for session in orphaned {
            self.sessions.mark_orphaned(session.id).await?;
            if let Some(proxy_id) = session.proxy_id {
                self.proxies.release(proxy_id).await?;
            }
        }

        let cleared = self.proxies.clear_all_leases().await?;
        if count > 0 || cleared > 0 {
            info!("cleaned up {count} orphaned sessions, released {cleared} stale proxy leases");
        }
        Ok(())
    }

    /// 为工作器建立会话
    ///
    /// 每次尝试都插入新的会话记录并租用新的代理；远程创建调用
    /// 失败时释放代理（计失败）并重试，直到重试上限。租不到
    /// 代理对本次请求是终止性失败，不触发重试。
    ///
    /// # 参数
    ///
    /// * `worker_id` - 目标工作器ID
    /// * `mission_id` - 关联任务ID
    /// * `retry_count` - 起始重试序号
    pub async fn create_session_for_worker(
        &self,
        worker_id: Uuid,
        mission_id: Uuid,
        retry_count: i32,
    ) -> Result<(), OrchestratorError> {
        let Some(worker) = self.workers.find_by_id(worker_id).await? else {
            error!("worker {worker_id} not found");
            self.bus
                .emit(OrchestratorEvent::SessionFailed {
                    session_id: None,
                    worker_id,
                    proxy_id: None,
                    error: "worker not found".to_string(),
                    code: ErrorCode::SessionCreateFailed,
                })
                .await;
            return Ok(());
        };

        let mut attempt = retry_count;
        loop {
            info!("creating session for worker {worker_id} (attempt {attempt})");

            let session = Session::new(worker_id, attempt);
            self.sessions.create(&session).await?;

            let Some(proxy) = self.proxies.lease_for_session(session.id).await? else {
                warn!("no proxy available for worker {worker_id}");
                self.sessions
                    .mark_error(
                        session.id,
                        ErrorCode::NoProxyAvailable,
                        "no proxy available",
                        Some("create_failed"),
                    )
                    .await?;
                counter!("orchestrs_sessions_failed_total", "code" => ErrorCode::NoProxyAvailable.as_str())
                    .increment(1);
                self.bus
                    .emit(OrchestratorEvent::SessionFailed {
                        session_id: Some(session.id),
                        worker_id,
                        proxy_id: None,
                        error: "no proxy available".to_string(),
                        code: ErrorCode::NoProxyAvailable,
                    })
                    .await;
                return Ok(());
            };

            self.sessions.set_proxy(session.id, proxy.id).await?;

            match self.request_remote_session(&worker, &proxy).await {
                Ok(external_id) => {
                    self.sessions
                        .mark_initializing(session.id, external_id.as_deref())
                        .await?;
                    self.tracked.insert(
                        session.id,
                        TrackedSession {
                            started: Instant::now(),
                            failure_count: 0,
                        },
                    );
                    self.pending
                        .insert(session.id, PendingRequest { mission_id });

                    counter!("orchestrs_sessions_created_total").increment(1);
                    info!("session {} created, waiting for ready", session.id);

                    self.mission_logs
                        .append(
                            mission_id,
                            "SESSION_STARTED",
                            &format!("Session {} created with proxy {}", session.id, proxy.id),
                            0,
                        )
                        .await?;
                    return Ok(());
                }
                Err(e) => {
                    warn!("failed to create session on worker {worker_id}: {e}");

                    self.proxies.increment_fail_count(proxy.id).await?;
                    self.proxies.release(proxy.id).await?;
                    self.sessions
                        .mark_error(
                            session.id,
                            ErrorCode::SessionCreateFailed,
                            &e.to_string(),
                            Some("create_failed"),
                        )
                        .await?;

                    if attempt < self.config.max_session_retries as i32 {
                        attempt += 1;
                        continue;
                    }

                    counter!("orchestrs_sessions_failed_total", "code" => ErrorCode::SessionCreateFailed.as_str())
                        .increment(1);
                    self.bus
                        .emit(OrchestratorEvent::SessionFailed {
                            session_id: Some(session.id),
                            worker_id,
                            proxy_id: Some(proxy.id),
                            error: e.to_string(),
                            code: ErrorCode::SessionCreateFailed,
                        })
                        .await;
                    return Ok(());
                }
            }
        }
    }

    async fn request_remote_session(
        &self,
        worker: &Worker,
        proxy: &Proxy,
    ) -> Result<Option<String>, OrchestratorError> {
        let request = SessionCreateRequest {
            force_refresh: true,
            proxy: ProxyConfig {
                server: proxy.server(),
                username: proxy.username.clone(),
                password: proxy.password.clone(),
            },
        };

        let response = self.client.create_session(worker, &request).await?;
        Ok(response.external_id().map(str::to_string))
    }

    /// 轮询所有存活会话的远程状态
    async fn monitor_active_sessions(&self) -> Result<(), OrchestratorError> {
        let sessions = self.sessions.find_non_terminal().await?;

        for session in sessions {
            if !self.running.load(Ordering::SeqCst) {
                break;
            }
            // Creation is still in flight for CREATING rows
            if session.status == SessionStatus::Creating {
                continue;
            }
            let Some(worker) = self.workers.find_by_id(session.worker_id).await? else {
                continue;
            };
            if let Err(e) = self.check_session(&session, &worker).await {
                error!("error checking session {}: {e}", session.id);
            }
        }
        Ok(())
    }

    async fn check_session(
        &self,
        session: &Session,
        worker: &Worker,
    ) -> Result<(), OrchestratorError> {
        let elapsed = self
            .tracked
            .get(&session.id)
            .map(|t| t.started.elapsed())
            .unwrap_or_default();

        if elapsed > self.config.session_timeout {
            info!("session {} timed out after {:?}", session.id, elapsed);
            self.escalate(session, ErrorCode::SessionTimeout, "session timed out")
                .await?;
            return Ok(());
        }

        let status = match self.client.session_status(worker).await {
            Ok(status) => status,
            Err(e) => {
                debug!("session {} status check failed: {e}", session.id);
                return self.handle_poll_failure(session).await;
            }
        };

        let phase = status.raw_phase().to_string();
        self.sessions.record_phase(session.id, &phase).await?;
        if let Some(mut tracked) = self.tracked.get_mut(&session.id) {
            tracked.failure_count = 0;
        }

        match PhaseClass::classify(&phase) {
            PhaseClass::Error => {
                self.escalate(
                    session,
                    ErrorCode::SessionInitFailed,
                    &format!("session phase: {phase}"),
                )
                .await?;
            }
            PhaseClass::Ready if session.status == SessionStatus::Initializing => {
                info!("session {} is ready", session.id);
                self.sessions.mark_ready(session.id).await?;

                if let Some((_, pending)) = self.pending.remove(&session.id) {
                    self.mission_logs
                        .append(
                            pending.mission_id,
                            "SESSION_READY",
                            &format!("Session ready after {}ms", elapsed.as_millis()),
                            elapsed.as_millis() as i64,
                        )
                        .await?;
                }

                self.bus
                    .emit(OrchestratorEvent::SessionReady {
                        session_id: session.id,
                        worker_id: session.worker_id,
                    })
                    .await;
            }
            _ => {}
        }

        Ok(())
    }

    /// 处理一次失败的远程状态查询
    ///
    /// 连续失败达到阈值时即便没有明确的错误阶段也升级为错误，
    /// 避免被静默挂死的工作器拖住
    async fn handle_poll_failure(&self, session: &Session) -> Result<(), OrchestratorError> {
        let failures = session.failure_count + 1;
        self.sessions.set_failure_count(session.id, failures).await?;
        if let Some(mut tracked) = self.tracked.get_mut(&session.id) {
            tracked.failure_count = failures;
        }

        if failures >= self.config.max_consecutive_failures as i32 {
            self.escalate(
                session,
                ErrorCode::SessionCreateFailed,
                "too many consecutive status failures",
            )
            .await?;
        }
        Ok(())
    }

    /// 将会话升级为错误
    ///
    /// 持久化错误、释放代理（计失败）、清除本地跟踪并发布事件
    async fn escalate(
        &self,
        session: &Session,
        code: ErrorCode,
        message: &str,
    ) -> Result<(), OrchestratorError> {
        warn!("session {} error: {message}", session.id);

        self.sessions
            .mark_error(session.id, code, message, None)
            .await?;

        if let Some(proxy_id) = session.proxy_id {
            self.proxies.increment_fail_count(proxy_id).await?;
            self.proxies.release(proxy_id).await?;
        }

        self.tracked.remove(&session.id);
        self.pending.remove(&session.id);

        counter!("orchestrs_sessions_failed_total", "code" => code.as_str()).increment(1);
        self.bus
            .emit(OrchestratorEvent::SessionFailed {
                session_id: Some(session.id),
                worker_id: session.worker_id,
                proxy_id: session.proxy_id,
                error: message.to_string(),
                code,
            })
            .await;
        Ok(())
    }

    /// 结束会话
    ///
    /// 对远程的删除调用尽力而为；代理释放不计失败，
    /// 优雅结束不是代理的过错
    pub async fn end_session(&self, session_id: Uuid) -> Result<(), OrchestratorError> {
        let Some(session) = self.sessions.find_by_id(session_id).await? else {
            return Ok(());
        };
        if session.status.is_terminal() {
            return Ok(());
        }
        if !session.status.can_transition_to(SessionStatus::Ended) {
            debug!(
                "ending session {} out of band from {}",
                session.id, session.status
            );
        }

        info!("ending session {session_id}");

        if let Some(worker) = self.workers.find_by_id(session.worker_id).await? {
            if let Err(e) = self.client.end_session(&worker).await {
                warn!("failed to end session on worker {}: {e}", worker.id);
            }
        }

        self.sessions.mark_ended(session_id).await?;

        if let Some(proxy_id) = session.proxy_id {
            self.proxies.release(proxy_id).await?;
        }

        self.tracked.remove(&session_id);
        self.pending.remove(&session_id);

        info!("session {session_id} ended and proxy released");

        self.bus
            .emit(OrchestratorEvent::SessionTerminated {
                session_id,
                proxy_id: session.proxy_id,
            })
            .await;
        Ok(())
    }
}
