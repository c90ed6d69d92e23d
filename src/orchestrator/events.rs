// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::error_code::ErrorCode;
use serde::Serialize;
use uuid::Uuid;

/// 编排事件枚举
///
/// 封闭的事件集合：每个事件携带确定形状的负载，消费方以
/// 穷尽匹配的方式解构，不存在字符串键控的自由负载。
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OrchestratorEvent {
    /// 任务已分配给工作器
    MissionAssigned { mission_id: Uuid, worker_id: Uuid },
    /// 工作器请求建立会话
    SessionRequested { worker_id: Uuid, mission_id: Uuid },
    /// 会话已就绪
    SessionReady { session_id: Uuid, worker_id: Uuid },
    /// 会话失败
    SessionFailed {
        session_id: Option<Uuid>,
        worker_id: Uuid,
        proxy_id: Option<Uuid>,
        error: String,
        code: ErrorCode,
    },
    /// 请求结束会话
    SessionEndRequested { session_id: Uuid },
    /// 会话已结束，代理已释放
    SessionTerminated {
        session_id: Uuid,
        proxy_id: Option<Uuid>,
    },
    /// 会话失败已折算到任务层面
    WorkerSessionFailed {
        worker_id: Uuid,
        mission_id: Uuid,
        error: String,
        code: ErrorCode,
    },
    /// 抓取作业已启动
    ScrapeStarted {
        mission_id: Uuid,
        worker_id: Uuid,
        job_id: String,
    },
    /// 抓取作业成功结束
    ScrapeCompleted {
        mission_id: Uuid,
        worker_id: Uuid,
        session_id: Option<Uuid>,
        data_url: String,
        ads_count: i64,
    },
    /// 抓取作业失败
    ScrapeFailed {
        mission_id: Uuid,
        worker_id: Uuid,
        session_id: Option<Uuid>,
        error: String,
        code: ErrorCode,
    },
    /// 写入作业已启动
    WriterStarted { mission_id: Uuid, job_id: String },
    /// 任务已完成
    MissionCompleted { mission_id: Uuid, ads_count: i64 },
    /// 任务已失败（终态）
    MissionFailed {
        mission_id: Uuid,
        error: String,
        code: ErrorCode,
    },
    /// 编排器已启动
    OrchestratorStarted,
    /// 编排器已停止
    OrchestratorStopped,
}

/// 事件主题枚举
///
/// 订阅时使用的键，与事件变体一一对应
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventTopic {
    MissionAssigned,
    SessionRequested,
    SessionReady,
    SessionFailed,
    SessionEndRequested,
    SessionTerminated,
    WorkerSessionFailed,
    ScrapeStarted,
    ScrapeCompleted,
    ScrapeFailed,
    WriterStarted,
    MissionCompleted,
    MissionFailed,
    OrchestratorStarted,
    OrchestratorStopped,
}

impl OrchestratorEvent {
    /// 获取事件所属主题
    pub fn topic(&self) -> EventTopic {
        match self {
            OrchestratorEvent::MissionAssigned { .. } => EventTopic::MissionAssigned,
            OrchestratorEvent::SessionRequested { .. } => EventTopic::SessionRequested,
            OrchestratorEvent::SessionReady { .. } => EventTopic::SessionReady,
            OrchestratorEvent::SessionFailed { .. } => EventTopic::SessionFailed,
            OrchestratorEvent::SessionEndRequested { .. } => EventTopic::SessionEndRequested,
            OrchestratorEvent::SessionTerminated { .. } => EventTopic::SessionTerminated,
            OrchestratorEvent::WorkerSessionFailed { .. } => EventTopic::WorkerSessionFailed,
            OrchestratorEvent::ScrapeStarted { .. } => EventTopic::ScrapeStarted,
            OrchestratorEvent::ScrapeCompleted { .. } => EventTopic::ScrapeCompleted,
            OrchestratorEvent::ScrapeFailed { .. } => EventTopic::ScrapeFailed,
            OrchestratorEvent::WriterStarted { .. } => EventTopic::WriterStarted,
            OrchestratorEvent::MissionCompleted { .. } => EventTopic::MissionCompleted,
            OrchestratorEvent::MissionFailed { .. } => EventTopic::MissionFailed,
            OrchestratorEvent::OrchestratorStarted => EventTopic::OrchestratorStarted,
            OrchestratorEvent::OrchestratorStopped => EventTopic::OrchestratorStopped,
        }
    }
}
