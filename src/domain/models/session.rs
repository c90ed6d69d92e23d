// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// 会话实体
///
/// 表示在某个工作器上租用的、由一个代理支撑的认证执行上下文。
/// 会话具有明确的状态机、连续失败计数和重试机制等属性。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// 会话唯一标识符
    pub id: Uuid,
    /// 所属工作器ID
    pub worker_id: Uuid,
    /// 租用的代理ID，创建成功后填充
    pub proxy_id: Option<Uuid>,
    /// 远程工作器返回的会话标识（可选）
    pub external_session_id: Option<String>,
    /// 会话状态，跟踪会话在其生命周期中的当前阶段
    pub status: SessionStatus,
    /// 远程工作器报告的原始阶段字符串，仅用于日志
    pub current_phase: String,
    /// 已执行作业数量
    pub execution_count: i32,
    /// 允许执行的作业数量上限
    pub execution_limit: i32,
    /// 连续状态查询失败次数，成功查询后归零
    pub failure_count: i32,
    /// 创建重试序号，每次重建会话递增
    pub retry_count: i32,
    /// 最近一次错误码
    pub last_error_code: Option<String>,
    /// 最近一次错误信息
    pub last_error_message: Option<String>,
    /// 创建时间
    pub created_at: DateTime<FixedOffset>,
    /// 就绪时间
    pub ready_at: Option<DateTime<FixedOffset>>,
    /// 结束时间
    pub ended_at: Option<DateTime<FixedOffset>>,
}

/// 会话状态枚举
///
/// 状态转换遵循以下流程：
/// Creating → Initializing → Ready → Active，
/// Error可从任意非终态进入，Ended仅可从Ready/Active进入。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    /// 创建中，正在租用代理并调用远程创建接口
    #[default]
    Creating,
    /// 初始化中，等待远程工作器报告就绪
    Initializing,
    /// 已就绪，可以开始执行作业
    Ready,
    /// 执行中，作业已在该会话上启动
    Active,
    /// 已出错（终态）
    Error,
    /// 已结束（终态），通过显式结束请求到达
    Ended,
}

impl SessionStatus {
    /// 判断状态是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Error | SessionStatus::Ended)
    }

    /// 判断是否允许转换到目标状态
    ///
    /// 状态机只允许前进，Error可从任意非终态进入，
    /// Ended仅可从Ready或Active进入。
    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        match (self, next) {
            (SessionStatus::Creating, SessionStatus::Initializing) => true,
            (SessionStatus::Initializing, SessionStatus::Ready) => true,
            (SessionStatus::Ready, SessionStatus::Active) => true,
            (SessionStatus::Ready | SessionStatus::Active, SessionStatus::Ended) => true,
            (current, SessionStatus::Error) => !current.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SessionStatus::Creating => write!(f, "CREATING"),
            SessionStatus::Initializing => write!(f, "INITIALIZING"),
            SessionStatus::Ready => write!(f, "READY"),
            SessionStatus::Active => write!(f, "ACTIVE"),
            SessionStatus::Error => write!(f, "ERROR"),
            SessionStatus::Ended => write!(f, "ENDED"),
        }
    }
}

impl FromStr for SessionStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATING" => Ok(SessionStatus::Creating),
            "INITIALIZING" => Ok(SessionStatus::Initializing),
            "READY" => Ok(SessionStatus::Ready),
            "ACTIVE" => Ok(SessionStatus::Active),
            "ERROR" => Ok(SessionStatus::Error),
            "ENDED" => Ok(SessionStatus::Ended),
            _ => Err(()),
        }
    }
}

/// 阶段分类枚举
///
/// 远程工作器的阶段词汇表是开放的，进入内部逻辑前
/// 必须先归一化为三个固定分类；原始字符串仅保留用于日志。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseClass {
    /// 就绪类阶段，会话可以承接作业
    Ready,
    /// 错误类阶段，会话必须升级为错误
    Error,
    /// 进行中阶段，继续等待
    InProgress,
}

impl PhaseClass {
    /// 归一化远程阶段字符串
    ///
    /// # 参数
    ///
    /// * `raw` - 远程工作器报告的原始阶段或状态字符串
    ///
    /// # 返回值
    ///
    /// 返回归一化后的阶段分类；未知词汇一律视为进行中
    pub fn classify(raw: &str) -> Self {
        match raw {
            "ready" | "active" | "idle" => PhaseClass::Ready,
            "failed" | "error" | "stuck" | "disconnected" | "terminated" => PhaseClass::Error,
            _ => PhaseClass::InProgress,
        }
    }
}

impl Session {
    /// 创建一个新的会话
    ///
    /// # 参数
    ///
    /// * `worker_id` - 所属工作器ID
    /// * `retry_count` - 创建重试序号
    ///
    /// # 返回值
    ///
    /// 返回新创建的会话实例，状态为Creating
    pub fn new(worker_id: Uuid, retry_count: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            worker_id,
            proxy_id: None,
            external_session_id: None,
            status: SessionStatus::Creating,
            current_phase: "creating".to_string(),
            execution_count: 0,
            execution_limit: 1,
            failure_count: 0,
            retry_count,
            last_error_code: None,
            last_error_message: None,
            created_at: Utc::now().into(),
            ready_at: None,
            ended_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_only_move_forward() {
        use SessionStatus::*;

        assert!(Creating.can_transition_to(Initializing));
        assert!(Initializing.can_transition_to(Ready));
        assert!(Ready.can_transition_to(Active));
        assert!(Ready.can_transition_to(Ended));
        assert!(Active.can_transition_to(Ended));

        // No backward moves
        assert!(!Active.can_transition_to(Creating));
        assert!(!Ready.can_transition_to(Initializing));
        assert!(!Initializing.can_transition_to(Creating));

        // Ended is unreachable from early states
        assert!(!Creating.can_transition_to(Ended));
        assert!(!Initializing.can_transition_to(Ended));
    }

    #[test]
    fn error_reachable_from_any_non_terminal_state() {
        use SessionStatus::*;

        for status in [Creating, Initializing, Ready, Active] {
            assert!(status.can_transition_to(Error));
        }
        assert!(!Error.can_transition_to(Error));
        assert!(!Ended.can_transition_to(Error));
    }

    #[test]
    fn phase_vocabulary_maps_to_three_buckets() {
        for raw in ["ready", "active", "idle"] {
            assert_eq!(PhaseClass::classify(raw), PhaseClass::Ready);
        }
        for raw in ["failed", "error", "stuck", "disconnected", "terminated"] {
            assert_eq!(PhaseClass::classify(raw), PhaseClass::Error);
        }
        for raw in [
            "initializing",
            "connecting",
            "authenticating",
            "warming_up",
            "scraping",
            "unknown",
            "",
        ] {
            assert_eq!(PhaseClass::classify(raw), PhaseClass::InProgress);
        }
    }
}
