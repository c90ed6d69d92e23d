// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::mission_repository::RepositoryError;
use crate::domain::models::worker::{Worker, WorkerStatus};
use async_trait::async_trait;
use uuid::Uuid;

/// 工作器仓库特质
///
/// 定义工作器数据访问接口
#[async_trait]
pub trait WorkerRepository: Send + Sync {
    /// 根据ID查找工作器
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Worker>, RepositoryError>;
    /// 查找所有空闲且启用的工作器
    async fn list_idle_active(&self) -> Result<Vec<Worker>, RepositoryError>;
    /// 更新工作器占用状态
    async fn set_status(&self, id: Uuid, status: WorkerStatus) -> Result<(), RepositoryError>;
    /// 将所有忙碌状态的工作器重置为空闲（进程重启时调用）
    async fn reset_busy_to_idle(&self) -> Result<u64, RepositoryError>;
}
