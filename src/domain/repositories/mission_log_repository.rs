// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::mission_repository::RepositoryError;
use async_trait::async_trait;
use uuid::Uuid;

/// 任务日志仓库特质
///
/// 定义任务事件日志的追加接口
#[async_trait]
pub trait MissionLogRepository: Send + Sync {
    /// 追加一条任务事件日志
    async fn append(
        &self,
        mission_id: Uuid,
        event: &str,
        details: &str,
        duration_ms: i64,
    ) -> Result<(), RepositoryError>;
}
