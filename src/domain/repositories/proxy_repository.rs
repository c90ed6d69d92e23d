// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::mission_repository::RepositoryError;
use crate::domain::models::proxy::Proxy;
use async_trait::async_trait;
use uuid::Uuid;

/// 代理仓库特质
///
/// 定义代理数据访问接口。`lease_for_session`必须是原子的：
/// 并发调用下同一个代理绝不会被两个会话同时租用。
#[async_trait]
pub trait ProxyRepository: Send + Sync {
    /// 原子地为指定会话租用一个空闲代理
    ///
    /// 没有可用代理时返回None。
    async fn lease_for_session(&self, session_id: Uuid)
        -> Result<Option<Proxy>, RepositoryError>;
    /// 释放代理租约
    async fn release(&self, proxy_id: Uuid) -> Result<(), RepositoryError>;
    /// 失败计数加一
    async fn increment_fail_count(&self, proxy_id: Uuid) -> Result<(), RepositoryError>;
    /// 清空所有租约（进程重启时调用）
    async fn clear_all_leases(&self) -> Result<u64, RepositoryError>;
}
