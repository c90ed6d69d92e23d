// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// 工作器实体
///
/// 表示一个远程抓取服务实例。工作器由操作员注册，
/// 编排核心只在其生命周期内循环更新占用状态。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worker {
    /// 工作器唯一标识符
    pub id: Uuid,
    /// 工作器名称
    pub name: String,
    /// 工作器服务基础URL
    pub url: String,
    /// 调用工作器接口使用的API密钥
    pub api_key: String,
    /// 抓取结果存储域名，缺省时退回工作器URL
    pub storage_domain: Option<String>,
    /// 占用状态
    pub status: WorkerStatus,
    /// 是否参与任务分配
    pub active: bool,
    /// 创建时间
    pub created_at: DateTime<FixedOffset>,
    /// 更新时间
    pub updated_at: DateTime<FixedOffset>,
}

/// 工作器占用状态枚举
///
/// 编排期间循环转换：idle → waiting_session → ready → scraping → idle。
/// 错误情形一律折回idle，下一轮调度可以再次使用该工作器。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    /// 空闲，可接受新任务
    #[default]
    Idle,
    /// 等待会话建立
    WaitingSession,
    /// 会话就绪，即将开始抓取
    Ready,
    /// 抓取进行中
    Scraping,
    /// 出错，仅作为过渡记录，核心会将其重置为空闲
    Error,
}

impl fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            WorkerStatus::Idle => write!(f, "idle"),
            WorkerStatus::WaitingSession => write!(f, "waiting_session"),
            WorkerStatus::Ready => write!(f, "ready"),
            WorkerStatus::Scraping => write!(f, "scraping"),
            WorkerStatus::Error => write!(f, "error"),
        }
    }
}

impl FromStr for WorkerStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(WorkerStatus::Idle),
            "waiting_session" => Ok(WorkerStatus::WaitingSession),
            "ready" => Ok(WorkerStatus::Ready),
            "scraping" => Ok(WorkerStatus::Scraping),
            "error" => Ok(WorkerStatus::Error),
            _ => Err(()),
        }
    }
}

impl Worker {
    /// 获取抓取结果数据的基础域名
    pub fn storage_base(&self) -> &str {
        self.storage_domain.as_deref().unwrap_or(&self.url)
    }
}
