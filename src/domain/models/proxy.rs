// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 代理实体
///
/// 表示一个可独占租用的网络出口凭证。一个代理同一时刻
/// 最多被一个会话持有；fail_count只增不减，优雅结束不计失败。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proxy {
    /// 代理唯一标识符
    pub id: Uuid,
    /// 代理名称（可选）
    pub name: Option<String>,
    /// 代理主机
    pub host: String,
    /// 代理端口
    pub port: i32,
    /// 认证用户名（可选）
    pub username: Option<String>,
    /// 认证密码（可选）
    pub password: Option<String>,
    /// 是否参与租用
    pub active: bool,
    /// 当前持有该代理的会话ID
    pub in_use_by_session_id: Option<Uuid>,
    /// 累计失败次数
    pub fail_count: i32,
    /// 最近一次被租用的时间
    pub last_used_at: Option<DateTime<FixedOffset>>,
    /// 创建时间
    pub created_at: DateTime<FixedOffset>,
}

impl Proxy {
    /// 获取 host:port 形式的代理服务器地址
    pub fn server(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
