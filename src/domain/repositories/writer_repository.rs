// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::mission_repository::RepositoryError;
use crate::domain::models::writer::Writer;
use async_trait::async_trait;

/// 写入器仓库特质
///
/// 定义写入器数据访问接口
#[async_trait]
pub trait WriterRepository: Send + Sync {
    /// 取第一个启用的写入器，没有则返回None
    async fn first_active(&self) -> Result<Option<Writer>, RepositoryError>;
}
