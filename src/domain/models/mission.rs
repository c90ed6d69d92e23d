// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// 任务实体
///
/// 表示一个抓取加存储的工作单元，覆盖一个日期范围、
/// 媒体类型过滤和语言列表。任务具有状态、检查点、
/// 重试机制和工作器/会话关联等属性。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mission {
    /// 任务唯一标识符
    pub id: Uuid,
    /// 抓取日期范围起点
    pub date_start: NaiveDate,
    /// 抓取日期范围终点
    pub date_end: NaiveDate,
    /// 媒体类型过滤，决定抓取哪类广告素材
    pub media_type: MediaType,
    /// 语言列表，限定抓取的广告语言
    pub languages: Vec<String>,
    /// 任务状态，跟踪任务在其生命周期中的当前阶段
    pub status: MissionStatus,
    /// 检查点，RUNNING状态下的子阶段
    pub checkpoint: Option<Checkpoint>,
    /// 已抓取的广告数量
    pub ads_count: Option<i64>,
    /// 错误码，任务失败时的稳定错误标识
    pub error_code: Option<String>,
    /// 错误信息，任务失败时的可读描述
    pub error_message: Option<String>,
    /// 当前分配的工作器ID
    pub worker_id: Option<Uuid>,
    /// 当前关联的会话ID
    pub session_id: Option<Uuid>,
    /// 远程抓取作业ID
    pub worker_job_id: Option<String>,
    /// 远程写入作业ID
    pub writer_job_id: Option<String>,
    /// 抓取结果数据URL
    pub worker_data_url: Option<String>,
    /// 已重试次数，只增不减
    pub retry_count: i32,
    /// 创建时间
    pub created_at: DateTime<FixedOffset>,
    /// 入队时间
    pub queued_at: Option<DateTime<FixedOffset>>,
    /// 开始执行时间
    pub started_at: Option<DateTime<FixedOffset>>,
    /// 结束时间
    pub finished_at: Option<DateTime<FixedOffset>>,
}

/// 任务状态枚举
///
/// 状态转换遵循以下流程：
/// Pending → Queued → Running → Done/Failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MissionStatus {
    /// 已创建，尚未进入调度队列
    #[default]
    Pending,
    /// 已入队，等待分配给空闲工作器
    Queued,
    /// 执行中，细分阶段由检查点描述
    Running,
    /// 已完成（终态）
    Done,
    /// 已失败（终态），由操作员显式重新入队才会再执行
    Failed,
}

impl MissionStatus {
    /// 判断状态是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(self, MissionStatus::Done | MissionStatus::Failed)
    }
}

impl fmt::Display for MissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MissionStatus::Pending => write!(f, "PENDING"),
            MissionStatus::Queued => write!(f, "QUEUED"),
            MissionStatus::Running => write!(f, "RUNNING"),
            MissionStatus::Done => write!(f, "DONE"),
            MissionStatus::Failed => write!(f, "FAILED"),
        }
    }
}

impl FromStr for MissionStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(MissionStatus::Pending),
            "QUEUED" => Ok(MissionStatus::Queued),
            "RUNNING" => Ok(MissionStatus::Running),
            "DONE" => Ok(MissionStatus::Done),
            "FAILED" => Ok(MissionStatus::Failed),
            _ => Err(()),
        }
    }
}

/// 任务检查点枚举
///
/// 表示RUNNING状态任务的子阶段。终态任务的检查点
/// 为FINALIZADO（完成）或空（失败后清除）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Checkpoint {
    /// 已分配给工作器，等待会话就绪
    Atribuido,
    /// 抓取进行中
    Extraindo,
    /// 写入进行中
    Armazenando,
    /// 已完成
    Finalizado,
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Checkpoint::Atribuido => write!(f, "ATRIBUIDO"),
            Checkpoint::Extraindo => write!(f, "EXTRAINDO"),
            Checkpoint::Armazenando => write!(f, "ARMAZENANDO"),
            Checkpoint::Finalizado => write!(f, "FINALIZADO"),
        }
    }
}

impl FromStr for Checkpoint {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ATRIBUIDO" => Ok(Checkpoint::Atribuido),
            "EXTRAINDO" => Ok(Checkpoint::Extraindo),
            "ARMAZENANDO" => Ok(Checkpoint::Armazenando),
            "FINALIZADO" => Ok(Checkpoint::Finalizado),
            _ => Err(()),
        }
    }
}

/// 媒体类型枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    /// 全部媒体类型，不做过滤
    #[default]
    All,
    /// 仅视频广告
    Video,
    /// 仅图片广告
    Image,
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MediaType::All => write!(f, "all"),
            MediaType::Video => write!(f, "video"),
            MediaType::Image => write!(f, "image"),
        }
    }
}

impl FromStr for MediaType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(MediaType::All),
            "video" => Ok(MediaType::Video),
            "image" => Ok(MediaType::Image),
            _ => Err(()),
        }
    }
}

impl Mission {
    /// 创建一个新的任务
    ///
    /// # 参数
    ///
    /// * `date_start` - 日期范围起点
    /// * `date_end` - 日期范围终点
    /// * `media_type` - 媒体类型过滤
    /// * `languages` - 语言列表
    ///
    /// # 返回值
    ///
    /// 返回新创建的任务实例，状态为Queued
    pub fn new(
        date_start: NaiveDate,
        date_end: NaiveDate,
        media_type: MediaType,
        languages: Vec<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            date_start,
            date_end,
            media_type,
            languages,
            status: MissionStatus::Queued,
            checkpoint: None,
            ads_count: None,
            error_code: None,
            error_message: None,
            worker_id: None,
            session_id: None,
            worker_job_id: None,
            writer_job_id: None,
            worker_data_url: None,
            retry_count: 0,
            created_at: Utc::now().into(),
            queued_at: Some(Utc::now().into()),
            started_at: None,
            finished_at: None,
        }
    }

    /// 判断任务是否还可以重试
    ///
    /// # 返回值
    ///
    /// 如果再次失败后的重试次数仍低于上限则返回true
    pub fn can_retry(&self, max_retries: u32) -> bool {
        self.retry_count + 1 < max_retries as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            MissionStatus::Pending,
            MissionStatus::Queued,
            MissionStatus::Running,
            MissionStatus::Done,
            MissionStatus::Failed,
        ] {
            assert_eq!(status.to_string().parse::<MissionStatus>(), Ok(status));
        }
        assert!("running".parse::<MissionStatus>().is_err());
    }

    #[test]
    fn terminal_statuses() {
        assert!(MissionStatus::Done.is_terminal());
        assert!(MissionStatus::Failed.is_terminal());
        assert!(!MissionStatus::Running.is_terminal());
    }

    #[test]
    fn retry_budget_counts_the_next_attempt() {
        let mut mission = Mission::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 7).unwrap(),
            MediaType::All,
            vec!["en".into()],
        );
        assert!(mission.can_retry(3));
        mission.retry_count = 2;
        assert!(!mission.can_retry(3));
    }
}
