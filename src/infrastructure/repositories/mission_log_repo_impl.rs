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

use crate::domain::repositories::mission_log_repository::MissionLogRepository;
use crate::domain::repositories::mission_repository::RepositoryError;
use crate::infrastructure::database::entities::mission_log as log_entity;
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, NotSet, Set};
use std::sync::Arc;
use uuid::Uuid;

/// 任务日志仓库实现
///
/// 基于SeaORM实现的任务日志追加
#[derive(Clone)]
pub struct MissionLogRepositoryImpl {
    /// 数据库连接
    db: Arc<DatabaseConnection>,
}

impl MissionLogRepositoryImpl {
    /// 创建新的任务日志仓库实例
    ///
    /// # 参数
    ///
    /// * `db` - 数据库连接
    ///
    /// # 返回值
    ///
    /// 返回新的任务日志仓库实例
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MissionLogRepository for MissionLogRepositoryImpl {
    async fn append(
        &self,
        mission_id: Uuid,
        event: &str,
        details: &str,
        duration_ms: i64,
    ) -> Result<(), RepositoryError> {
        let model = log_entity::ActiveModel {
            id: NotSet,
            mission_id: Set(mission_id),
            event: Set(event.to_string()),
            details: Set(details.to_string()),
            duration_ms: Set(duration_ms),
            created_at: Set(Utc::now().into()),
        };

        model.insert(self.db.as_ref()).await?;
        Ok(())
    }
}
