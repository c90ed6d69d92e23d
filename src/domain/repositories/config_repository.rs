// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::mission_repository::RepositoryError;
use async_trait::async_trait;
use std::collections::HashMap;

/// 配置仓库特质
///
/// 定义可调参数的读取接口
#[async_trait]
pub trait ConfigRepository: Send + Sync {
    /// 读取全部配置键值对
    async fn load_all(&self) -> Result<HashMap<String, serde_json::Value>, RepositoryError>;
}
