// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 写入器实体
///
/// 表示一个远程持久化服务实例。写入器按作业临时选取，
/// 不做锁定或预约。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Writer {
    /// 写入器唯一标识符
    pub id: Uuid,
    /// 写入器名称
    pub name: String,
    /// 写入器服务基础URL
    pub url: String,
    /// 调用写入器接口使用的API密钥
    pub api_key: String,
    /// 是否参与作业选取
    pub active: bool,
    /// 创建时间
    pub created_at: DateTime<FixedOffset>,
    /// 更新时间
    pub updated_at: DateTime<FixedOffset>,
}
