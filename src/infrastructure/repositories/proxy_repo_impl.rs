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

use crate::domain::models::proxy::Proxy;
use crate::domain::repositories::mission_repository::RepositoryError;
use crate::domain::repositories::proxy_repository::ProxyRepository;
use crate::infrastructure::database::entities::proxy as proxy_entity;
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    sea_query::{Expr, LockBehavior, LockType},
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbBackend, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use std::sync::Arc;
use uuid::Uuid;

/// 代理仓库实现
///
/// 基于SeaORM实现的代理数据访问层，租用操作在事务内
/// 行锁保护下完成，保证并发调用不会重复租用同一个代理
#[derive(Clone)]
pub struct ProxyRepositoryImpl {
    /// 数据库连接
    db: Arc<DatabaseConnection>,
}

impl ProxyRepositoryImpl {
    /// 创建新的代理仓库实例
    ///
    /// # 参数
    ///
    /// * `db` - 数据库连接
    ///
    /// # 返回值
    ///
    /// 返回新的代理仓库实例
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl From<proxy_entity::Model> for Proxy {
    fn from(model: proxy_entity::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            host: model.host,
            port: model.port,
            username: model.username,
            password: model.password,
            active: model.active,
            in_use_by_session_id: model.in_use_by_session_id,
            fail_count: model.fail_count,
            last_used_at: model.last_used_at,
            created_at: model.created_at,
        }
    }
}

#[async_trait]
impl ProxyRepository for ProxyRepositoryImpl {
    async fn lease_for_session(
        &self,
        session_id: Uuid,
    ) -> Result<Option<Proxy>, RepositoryError> {
        let txn = self.db.begin().await?;

        let mut query = proxy_entity::Entity::find()
            .filter(proxy_entity::Column::Active.eq(true))
            .filter(proxy_entity::Column::InUseBySessionId.is_null())
            .order_by_asc(proxy_entity::Column::FailCount)
            .order_by_asc(proxy_entity::Column::LastUsedAt);

        // SQLite runs single-writer and rejects row locks
        if self.db.get_database_backend() == DbBackend::Postgres {
            query = query.lock_with_behavior(LockType::Update, LockBehavior::SkipLocked);
        }

        let proxy = query.one(&txn).await?;

        if let Some(proxy) = proxy {
            let mut active: proxy_entity::ActiveModel = proxy.into();
            active.in_use_by_session_id = Set(Some(session_id));
            active.last_used_at = Set(Some(Utc::now().into()));

            let updated = active.update(&txn).await?;

            txn.commit().await?;

            return Ok(Some(updated.into()));
        } else {
            txn.commit().await?;
        }

        Ok(None)
    }

    async fn release(&self, proxy_id: Uuid) -> Result<(), RepositoryError> {
        proxy_entity::Entity::update_many()
            .col_expr(proxy_entity::Column::InUseBySessionId, Expr::value(Option::<Uuid>::None))
            .filter(proxy_entity::Column::Id.eq(proxy_id))
            .exec(self.db.as_ref())
            .await?;
        Ok(())
    }

    async fn increment_fail_count(&self, proxy_id: Uuid) -> Result<(), RepositoryError> {
        proxy_entity::Entity::update_many()
            .col_expr(
                proxy_entity::Column::FailCount,
                Expr::col(proxy_entity::Column::FailCount).add(1),
            )
            .filter(proxy_entity::Column::Id.eq(proxy_id))
            .exec(self.db.as_ref())
            .await?;
        Ok(())
    }

    async fn clear_all_leases(&self) -> Result<u64, RepositoryError> {
        let result = proxy_entity::Entity::update_many()
            .col_expr(proxy_entity::Column::InUseBySessionId, Expr::value(Option::<Uuid>::None))
            .filter(proxy_entity::Column::InUseBySessionId.is_not_null())
            .exec(self.db.as_ref())
            .await?;
        Ok(result.rows_affected)
    }
}
