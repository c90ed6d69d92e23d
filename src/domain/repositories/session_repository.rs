// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::mission_repository::RepositoryError;
use crate::domain::models::error_code::ErrorCode;
use crate::domain::models::session::Session;
use async_trait::async_trait;
use uuid::Uuid;

/// 会话仓库特质
///
/// 定义会话数据访问接口
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// 创建会话记录
    async fn create(&self, session: &Session) -> Result<Session, RepositoryError>;
    /// 根据ID查找会话
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Session>, RepositoryError>;
    /// 查找所有非终态会话
    async fn find_non_terminal(&self) -> Result<Vec<Session>, RepositoryError>;
    /// 记录租用的代理
    async fn set_proxy(&self, id: Uuid, proxy_id: Uuid) -> Result<(), RepositoryError>;
    /// 标记会话进入初始化并记录远程会话标识
    async fn mark_initializing(
        &self,
        id: Uuid,
        external_session_id: Option<&str>,
    ) -> Result<(), RepositoryError>;
    /// 将进程重启前遗留的会话标记为出错
    async fn mark_orphaned(&self, id: Uuid) -> Result<(), RepositoryError>;
    /// 记录远程报告的阶段并清零连续失败计数
    async fn record_phase(&self, id: Uuid, phase: &str) -> Result<(), RepositoryError>;
    /// 更新连续失败计数
    async fn set_failure_count(&self, id: Uuid, count: i32) -> Result<(), RepositoryError>;
    /// 标记会话就绪并记录就绪时间
    async fn mark_ready(&self, id: Uuid) -> Result<(), RepositoryError>;
    /// 标记会话进入执行并递增执行计数
    async fn mark_active(&self, id: Uuid) -> Result<(), RepositoryError>;
    /// 标记会话出错（终态）
    async fn mark_error(
        &self,
        id: Uuid,
        code: ErrorCode,
        message: &str,
        phase: Option<&str>,
    ) -> Result<(), RepositoryError>;
    /// 标记会话结束（终态）并记录结束时间
    async fn mark_ended(&self, id: Uuid) -> Result<(), RepositoryError>;
}
