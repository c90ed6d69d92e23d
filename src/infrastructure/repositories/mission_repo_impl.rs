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

use crate::domain::models::error_code::ErrorCode;
use crate::domain::models::mission::{Checkpoint, Mission, MissionStatus};
use crate::domain::repositories::mission_repository::{MissionRepository, RepositoryError};
use crate::infrastructure::database::entities::mission as mission_entity;
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    sea_query::{LockBehavior, LockType},
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbBackend, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use std::sync::Arc;
use uuid::Uuid;

/// 任务仓库实现
///
/// 基于SeaORM实现的任务数据访问层
#[derive(Clone)]
pub struct MissionRepositoryImpl {
    /// 数据库连接
    db: Arc<DatabaseConnection>,
}

impl MissionRepositoryImpl {
    /// 创建新的任务仓库实例
    ///
    /// # 参数
    ///
    /// * `db` - 数据库连接
    ///
    /// # 返回值
    ///
    /// 返回新的任务仓库实例
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl From<mission_entity::Model> for Mission {
    fn from(model: mission_entity::Model) -> Self {
        Self {
            id: model.id,
            date_start: model.date_start,
            date_end: model.date_end,
            media_type: model.media_type.parse().unwrap_or_default(),
            languages: serde_json::from_value(model.languages).unwrap_or_default(),
            status: model.status.parse().unwrap_or_default(),
            checkpoint: model.checkpoint.as_deref().and_then(|s| s.parse().ok()),
            ads_count: model.ads_count,
            error_code: model.error_code,
            error_message: model.error_message,
            worker_id: model.worker_id,
            session_id: model.session_id,
            worker_job_id: model.worker_job_id,
            writer_job_id: model.writer_job_id,
            worker_data_url: model.worker_data_url,
            retry_count: model.retry_count,
            created_at: model.created_at,
            queued_at: model.queued_at,
            started_at: model.started_at,
            finished_at: model.finished_at,
        }
    }
}

impl From<Mission> for mission_entity::ActiveModel {
    fn from(mission: Mission) -> Self {
        Self {
            id: Set(mission.id),
            date_start: Set(mission.date_start),
            date_end: Set(mission.date_end),
            media_type: Set(mission.media_type.to_string()),
            languages: Set(serde_json::json!(mission.languages)),
            status: Set(mission.status.to_string()),
            checkpoint: Set(mission.checkpoint.map(|c| c.to_string())),
            ads_count: Set(mission.ads_count),
            error_code: Set(mission.error_code.clone()),
            error_message: Set(mission.error_message.clone()),
            worker_id: Set(mission.worker_id),
            session_id: Set(mission.session_id),
            worker_job_id: Set(mission.worker_job_id.clone()),
            writer_job_id: Set(mission.writer_job_id.clone()),
            worker_data_url: Set(mission.worker_data_url.clone()),
            retry_count: Set(mission.retry_count),
            created_at: Set(mission.created_at),
            queued_at: Set(mission.queued_at),
            started_at: Set(mission.started_at),
            finished_at: Set(mission.finished_at),
        }
    }
}

#[async_trait]
impl MissionRepository for MissionRepositoryImpl {
    async fn create(&self, mission: &Mission) -> Result<Mission, RepositoryError> {
        let model: mission_entity::ActiveModel = mission.clone().into();

        model.insert(self.db.as_ref()).await?;
        Ok(mission.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Mission>, RepositoryError> {
        let model = mission_entity::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?;

        Ok(model.map(Into::into))
    }

    async fn allocate_next_to_worker(
        &self,
        worker_id: Uuid,
    ) -> Result<Option<Mission>, RepositoryError> {
        let txn = self.db.begin().await?;

        let mut query = mission_entity::Entity::find()
            .filter(mission_entity::Column::Status.eq(MissionStatus::Queued.to_string()))
            .order_by_asc(mission_entity::Column::QueuedAt)
            .order_by_asc(mission_entity::Column::CreatedAt);

        // SQLite runs single-writer and rejects row locks
        if self.db.get_database_backend() == DbBackend::Postgres {
            query = query.lock_with_behavior(LockType::Update, LockBehavior::SkipLocked);
        }

        let mission = query.one(&txn).await?;

        if let Some(mission) = mission {
            let mut active: mission_entity::ActiveModel = mission.into();
            active.status = Set(MissionStatus::Running.to_string());
            active.checkpoint = Set(Some(Checkpoint::Atribuido.to_string()));
            active.worker_id = Set(Some(worker_id));

            let updated = active.update(&txn).await?;

            txn.commit().await?;

            return Ok(Some(updated.into()));
        } else {
            txn.commit().await?;
        }

        Ok(None)
    }

    async fn begin_extraction(
        &self,
        id: Uuid,
        worker_id: Uuid,
        session_id: Uuid,
        worker_job_id: &str,
    ) -> Result<(), RepositoryError> {
        let model = mission_entity::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or(RepositoryError::NotFound)?;

        let mut active: mission_entity::ActiveModel = model.into();
        active.status = Set(MissionStatus::Running.to_string());
        active.checkpoint = Set(Some(Checkpoint::Extraindo.to_string()));
        active.worker_id = Set(Some(worker_id));
        active.session_id = Set(Some(session_id));
        active.worker_job_id = Set(Some(worker_job_id.to_string()));
        active.started_at = Set(Some(Utc::now().into()));
        active.update(self.db.as_ref()).await?;
        Ok(())
    }

    async fn record_scrape_result(
        &self,
        id: Uuid,
        ads_count: i64,
        data_url: &str,
    ) -> Result<(), RepositoryError> {
        let model = mission_entity::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or(RepositoryError::NotFound)?;

        let mut active: mission_entity::ActiveModel = model.into();
        active.ads_count = Set(Some(ads_count));
        active.worker_data_url = Set(Some(data_url.to_string()));
        active.update(self.db.as_ref()).await?;
        Ok(())
    }

    async fn clear_session(&self, id: Uuid) -> Result<(), RepositoryError> {
        let model = mission_entity::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or(RepositoryError::NotFound)?;

        let mut active: mission_entity::ActiveModel = model.into();
        active.session_id = Set(None);
        active.update(self.db.as_ref()).await?;
        Ok(())
    }

    async fn begin_storage(&self, id: Uuid, writer_job_id: &str) -> Result<(), RepositoryError> {
        let model = mission_entity::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or(RepositoryError::NotFound)?;

        let mut active: mission_entity::ActiveModel = model.into();
        active.checkpoint = Set(Some(Checkpoint::Armazenando.to_string()));
        active.writer_job_id = Set(Some(writer_job_id.to_string()));
        active.update(self.db.as_ref()).await?;
        Ok(())
    }

    async fn requeue_for_retry(&self, id: Uuid, retry_count: i32) -> Result<(), RepositoryError> {
        let model = mission_entity::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or(RepositoryError::NotFound)?;

        let mut active: mission_entity::ActiveModel = model.into();
        active.status = Set(MissionStatus::Queued.to_string());
        active.checkpoint = Set(None);
        active.retry_count = Set(retry_count);
        active.worker_id = Set(None);
        active.session_id = Set(None);
        active.worker_job_id = Set(None);
        active.writer_job_id = Set(None);
        active.error_code = Set(None);
        active.error_message = Set(None);
        active.queued_at = Set(Some(Utc::now().into()));
        active.started_at = Set(None);
        active.update(self.db.as_ref()).await?;
        Ok(())
    }

    async fn mark_failed(
        &self,
        id: Uuid,
        code: ErrorCode,
        message: &str,
    ) -> Result<(), RepositoryError> {
        let model = mission_entity::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or(RepositoryError::NotFound)?;

        let mut active: mission_entity::ActiveModel = model.into();
        active.status = Set(MissionStatus::Failed.to_string());
        active.checkpoint = Set(None);
        active.error_code = Set(Some(code.as_str().to_string()));
        active.error_message = Set(Some(message.to_string()));
        active.finished_at = Set(Some(Utc::now().into()));
        active.update(self.db.as_ref()).await?;
        Ok(())
    }

    async fn mark_done(&self, id: Uuid) -> Result<(), RepositoryError> {
        let model = mission_entity::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or(RepositoryError::NotFound)?;

        let mut active: mission_entity::ActiveModel = model.into();
        active.status = Set(MissionStatus::Done.to_string());
        active.checkpoint = Set(Some(Checkpoint::Finalizado.to_string()));
        active.finished_at = Set(Some(Utc::now().into()));
        active.update(self.db.as_ref()).await?;
        Ok(())
    }

    async fn find_running_at_checkpoint(
        &self,
        checkpoint: Checkpoint,
    ) -> Result<Vec<Mission>, RepositoryError> {
        let models = mission_entity::Entity::find()
            .filter(mission_entity::Column::Status.eq(MissionStatus::Running.to_string()))
            .filter(mission_entity::Column::Checkpoint.eq(checkpoint.to_string()))
            .all(self.db.as_ref())
            .await?;

        Ok(models.into_iter().map(Into::into).collect())
    }
}
