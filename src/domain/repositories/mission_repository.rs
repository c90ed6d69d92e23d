// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::error_code::ErrorCode;
use crate::domain::models::mission::{Checkpoint, Mission};
use async_trait::async_trait;
use sea_orm::DbErr;
use thiserror::Error;
use uuid::Uuid;

/// 仓库错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// 数据库错误
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
    /// 记录未找到
    #[error("Record not found")]
    NotFound,
}

/// 任务仓库特质
///
/// 定义任务数据访问接口。`allocate_next_to_worker`是排他的：
/// 同一个任务绝不会被同时分配给两个工作器。
#[async_trait]
pub trait MissionRepository: Send + Sync {
    /// 创建新任务
    async fn create(&self, mission: &Mission) -> Result<Mission, RepositoryError>;
    /// 根据ID查找任务
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Mission>, RepositoryError>;
    /// 原子地把下一个可分配任务分配给指定工作器
    ///
    /// 按入队顺序取最早的QUEUED任务，置为RUNNING/ATRIBUIDO并
    /// 记录工作器ID。没有可分配任务时返回None。
    async fn allocate_next_to_worker(
        &self,
        worker_id: Uuid,
    ) -> Result<Option<Mission>, RepositoryError>;
    /// 记录抓取作业已启动（RUNNING/EXTRAINDO、作业ID、开始时间）
    async fn begin_extraction(
        &self,
        id: Uuid,
        worker_id: Uuid,
        session_id: Uuid,
        worker_job_id: &str,
    ) -> Result<(), RepositoryError>;
    /// 持久化抓取结果（广告数量与数据URL）
    async fn record_scrape_result(
        &self,
        id: Uuid,
        ads_count: i64,
        data_url: &str,
    ) -> Result<(), RepositoryError>;
    /// 清除任务上的会话引用
    async fn clear_session(&self, id: Uuid) -> Result<(), RepositoryError>;
    /// 记录写入作业已启动（ARMAZENANDO、写入作业ID）
    async fn begin_storage(&self, id: Uuid, writer_job_id: &str) -> Result<(), RepositoryError>;
    /// 重新入队以便重试（QUEUED、清空检查点/工作器/会话/错误字段）
    async fn requeue_for_retry(&self, id: Uuid, retry_count: i32) -> Result<(), RepositoryError>;
    /// 标记任务失败（终态）
    async fn mark_failed(
        &self,
        id: Uuid,
        code: ErrorCode,
        message: &str,
    ) -> Result<(), RepositoryError>;
    /// 标记任务完成（终态，检查点FINALIZADO）
    async fn mark_done(&self, id: Uuid) -> Result<(), RepositoryError>;
    /// 查找处于指定检查点的RUNNING任务
    async fn find_running_at_checkpoint(
        &self,
        checkpoint: Checkpoint,
    ) -> Result<Vec<Mission>, RepositoryError>;
}
