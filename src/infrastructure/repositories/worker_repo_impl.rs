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

use crate::domain::models::worker::{Worker, WorkerStatus};
use crate::domain::repositories::mission_repository::RepositoryError;
use crate::domain::repositories::worker_repository::WorkerRepository;
use crate::infrastructure::database::entities::worker as worker_entity;
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
};
use std::sync::Arc;
use uuid::Uuid;

/// 工作器仓库实现
///
/// 基于SeaORM实现的工作器数据访问层
#[derive(Clone)]
pub struct WorkerRepositoryImpl {
    /// 数据库连接
    db: Arc<DatabaseConnection>,
}

impl WorkerRepositoryImpl {
    /// 创建新的工作器仓库实例
    ///
    /// # 参数
    ///
    /// * `db` - 数据库连接
    ///
    /// # 返回值
    ///
    /// 返回新的工作器仓库实例
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl From<worker_entity::Model> for Worker {
    fn from(model: worker_entity::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            url: model.url,
            api_key: model.api_key,
            storage_domain: model.storage_domain,
            status: model.status.parse().unwrap_or_default(),
            active: model.active,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[async_trait]
impl WorkerRepository for WorkerRepositoryImpl {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Worker>, RepositoryError> {
        let model = worker_entity::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?;

        Ok(model.map(Into::into))
    }

    async fn list_idle_active(&self) -> Result<Vec<Worker>, RepositoryError> {
        let models = worker_entity::Entity::find()
            .filter(worker_entity::Column::Status.eq(WorkerStatus::Idle.to_string()))
            .filter(worker_entity::Column::Active.eq(true))
            .all(self.db.as_ref())
            .await?;

        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn set_status(&self, id: Uuid, status: WorkerStatus) -> Result<(), RepositoryError> {
        worker_entity::Entity::update_many()
            .col_expr(worker_entity::Column::Status, Expr::value(status.to_string()))
            .col_expr(
                worker_entity::Column::UpdatedAt,
                Expr::value(sea_orm::prelude::DateTimeWithTimeZone::from(Utc::now())),
            )
            .filter(worker_entity::Column::Id.eq(id))
            .exec(self.db.as_ref())
            .await?;
        Ok(())
    }

    async fn reset_busy_to_idle(&self) -> Result<u64, RepositoryError> {
        let busy = [
            WorkerStatus::WaitingSession,
            WorkerStatus::Ready,
            WorkerStatus::Scraping,
            WorkerStatus::Error,
        ]
        .map(|s| s.to_string());

        let result = worker_entity::Entity::update_many()
            .col_expr(
                worker_entity::Column::Status,
                Expr::value(WorkerStatus::Idle.to_string()),
            )
            .filter(worker_entity::Column::Status.is_in(busy))
            .exec(self.db.as_ref())
            .await?;
        Ok(result.rows_affected)
    }
}
