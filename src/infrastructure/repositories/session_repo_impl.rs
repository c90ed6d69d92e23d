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
use crate::domain::models::session::{Session, SessionStatus};
use crate::domain::repositories::mission_repository::RepositoryError;
use crate::domain::repositories::session_repository::SessionRepository;
use crate::infrastructure::database::entities::session as session_entity;
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use std::sync::Arc;
use uuid::Uuid;

/// 会话仓库实现
///
/// 基于SeaORM实现的会话数据访问层
#[derive(Clone)]
pub struct SessionRepositoryImpl {
    /// 数据库连接
    db: Arc<DatabaseConnection>,
}

impl SessionRepositoryImpl {
    /// 创建新的会话仓库实例
    ///
    /// # 参数
    ///
    /// * `db` - 数据库连接
    ///
    /// # 返回值
    ///
    /// 返回新的会话仓库实例
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn load(&self, id: Uuid) -> Result<session_entity::Model, RepositoryError> {
        session_entity::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or(RepositoryError::NotFound)
    }
}

impl From<session_entity::Model> for Session {
    fn from(model: session_entity::Model) -> Self {
        Self {
            id: model.id,
            worker_id: model.worker_id,
            proxy_id: model.proxy_id,
            external_session_id: model.external_session_id,
            status: model.status.parse().unwrap_or_default(),
            current_phase: model.current_phase,
            execution_count: model.execution_count,
            execution_limit: model.execution_limit,
            failure_count: model.failure_count,
            retry_count: model.retry_count,
            last_error_code: model.last_error_code,
            last_error_message: model.last_error_message,
            created_at: model.created_at,
            ready_at: model.ready_at,
            ended_at: model.ended_at,
        }
    }
}

impl From<Session> for session_entity::ActiveModel {
    fn from(session: Session) -> Self {
        Self {
            id: Set(session.id),
            worker_id: Set(session.worker_id),
            proxy_id: Set(session.proxy_id),
            external_session_id: Set(session.external_session_id.clone()),
            status: Set(session.status.to_string()),
            current_phase: Set(session.current_phase.clone()),
            execution_count: Set(session.execution_count),
            execution_limit: Set(session.execution_limit),
            failure_count: Set(session.failure_count),
            retry_count: Set(session.retry_count),
            last_error_code: Set(session.last_error_code.clone()),
            last_error_message: Set(session.last_error_message.clone()),
            created_at: Set(session.created_at),
            ready_at: Set(session.ready_at),
            ended_at: Set(session.ended_at),
        }
    }
}

#[async_trait]
impl SessionRepository for SessionRepositoryImpl {
    async fn create(&self, session: &Session) -> Result<Session, RepositoryError> {
        let model: session_entity::ActiveModel = session.clone().into();

        model.insert(self.db.as_ref()).await?;
        Ok(session.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Session>, RepositoryError> {
        let model = session_entity::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?;

        Ok(model.map(Into::into))
    }

    async fn find_non_terminal(&self) -> Result<Vec<Session>, RepositoryError> {
        let non_terminal = [
            SessionStatus::Creating,
            SessionStatus::Initializing,
            SessionStatus::Ready,
            SessionStatus::Active,
        ]
        .map(|s| s.to_string());

        let models = session_entity::Entity::find()
            .filter(session_entity::Column::Status.is_in(non_terminal))
            .all(self.db.as_ref())
            .await?;

        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn set_proxy(&self, id: Uuid, proxy_id: Uuid) -> Result<(), RepositoryError> {
        let mut active: session_entity::ActiveModel = self.load(id).await?.into();
        active.proxy_id = Set(Some(proxy_id));
        active.update(self.db.as_ref()).await?;
        Ok(())
    }

    async fn mark_initializing(
        &self,
        id: Uuid,
        external_session_id: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let mut active: session_entity::ActiveModel = self.load(id).await?.into();
        active.status = Set(SessionStatus::Initializing.to_string());
        active.current_phase = Set("initializing".to_string());
        active.external_session_id = Set(external_session_id.map(str::to_string));
        active.update(self.db.as_ref()).await?;
        Ok(())
    }

    async fn mark_orphaned(&self, id: Uuid) -> Result<(), RepositoryError> {
        let mut active: session_entity::ActiveModel = self.load(id).await?.into();
        active.status = Set(SessionStatus::Error.to_string());
        active.last_error_message = Set(Some("orphaned on restart".to_string()));
        active.update(self.db.as_ref()).await?;
        Ok(())
    }

    async fn record_phase(&self, id: Uuid, phase: &str) -> Result<(), RepositoryError> {
        let mut active: session_entity::ActiveModel = self.load(id).await?.into();
        active.current_phase = Set(phase.to_string());
        active.failure_count = Set(0);
        active.update(self.db.as_ref()).await?;
        Ok(())
    }

    async fn set_failure_count(&self, id: Uuid, count: i32) -> Result<(), RepositoryError> {
        let mut active: session_entity::ActiveModel = self.load(id).await?.into();
        active.failure_count = Set(count);
        active.update(self.db.as_ref()).await?;
        Ok(())
    }

    async fn mark_ready(&self, id: Uuid) -> Result<(), RepositoryError> {
        let mut active: session_entity::ActiveModel = self.load(id).await?.into();
        active.status = Set(SessionStatus::Ready.to_string());
        active.ready_at = Set(Some(Utc::now().into()));
        active.update(self.db.as_ref()).await?;
        Ok(())
    }

    async fn mark_active(&self, id: Uuid) -> Result<(), RepositoryError> {
        let model = self.load(id).await?;
        let executions = model.execution_count + 1;

        let mut active: session_entity::ActiveModel = model.into();
        active.status = Set(SessionStatus::Active.to_string());
        active.execution_count = Set(executions);
        active.update(self.db.as_ref()).await?;
        Ok(())
    }

    async fn mark_error(
        &self,
        id: Uuid,
        code: ErrorCode,
        message: &str,
        phase: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let mut active: session_entity::ActiveModel = self.load(id).await?.into();
        active.status = Set(SessionStatus::Error.to_string());
        active.last_error_code = Set(Some(code.as_str().to_string()));
        active.last_error_message = Set(Some(message.to_string()));
        if let Some(phase) = phase {
            active.current_phase = Set(phase.to_string());
        }
        active.update(self.db.as_ref()).await?;
        Ok(())
    }

    async fn mark_ended(&self, id: Uuid) -> Result<(), RepositoryError> {
        let mut active: session_entity::ActiveModel = self.load(id).await?.into();
        active.status = Set(SessionStatus::Ended.to_string());
        active.ended_at = Set(Some(Utc::now().into()));
        active.update(self.db.as_ref()).await?;
        Ok(())
    }
}
