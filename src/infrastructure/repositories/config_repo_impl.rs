// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::domain::repositories::config_repository::ConfigRepository;
use crate::domain::repositories::mission_repository::RepositoryError;
use crate::infrastructure::database::entities::config as config_entity;
use async_trait::async_trait;
use sea_orm::{DatabaseConnection, EntityTrait};
use std::collections::HashMap;
use std::sync::Arc;

/// 配置仓库实现
///
/// 基于SeaORM实现的配置读取
#[derive(Clone)]
pub struct ConfigRepositoryImpl {
    /// 数据库连接
    db: Arc<DatabaseConnection>,
}

impl ConfigRepositoryImpl {
    /// 创建新的配置仓库实例
    ///
    /// # 参数
    ///
    /// * `db` - 数据库连接
    ///
    /// # 返回值
    ///
    /// 返回新的配置仓库实例
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ConfigRepository for ConfigRepositoryImpl {
    async fn load_all(&self) -> Result<HashMap<String, serde_json::Value>, RepositoryError> {
        let rows = config_entity::Entity::find().all(self.db.as_ref()).await?;

        Ok(rows.into_iter().map(|row| (row.key, row.value)).collect())
    }
}
