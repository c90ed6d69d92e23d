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

use crate::domain::models::writer::Writer;
use crate::domain::repositories::mission_repository::RepositoryError;
use crate::domain::repositories::writer_repository::WriterRepository;
use crate::infrastructure::database::entities::writer as writer_entity;
use async_trait::async_trait;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use std::sync::Arc;

/// 写入器仓库实现
///
/// 基于SeaORM实现的写入器数据访问层
#[derive(Clone)]
pub struct WriterRepositoryImpl {
    /// 数据库连接
    db: Arc<DatabaseConnection>,
}

impl WriterRepositoryImpl {
    /// 创建新的写入器仓库实例
    ///
    /// # 参数
    ///
    /// * `db` - 数据库连接
    ///
    /// # 返回值
    ///
    /// 返回新的写入器仓库实例
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl From<writer_entity::Model> for Writer {
    fn from(model: writer_entity::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            url: model.url,
            api_key: model.api_key,
            active: model.active,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[async_trait]
impl WriterRepository for WriterRepositoryImpl {
    async fn first_active(&self) -> Result<Option<Writer>, RepositoryError> {
        let model = writer_entity::Entity::find()
            .filter(writer_entity::Column::Active.eq(true))
            .order_by_asc(writer_entity::Column::CreatedAt)
            .one(self.db.as_ref())
            .await?;

        Ok(model.map(Into::into))
    }
}
