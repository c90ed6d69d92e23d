// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm::entity::prelude::*;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "sessions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub worker_id: Uuid,
    pub proxy_id: Option<Uuid>,
    pub external_session_id: Option<String>,
    pub status: String,
    pub current_phase: String,
    pub execution_count: i32,
    pub execution_limit: i32,
    pub failure_count: i32,
    pub retry_count: i32,
    pub last_error_code: Option<String>,
    pub last_error_message: Option<String>,
    pub created_at: ChronoDateTimeWithTimeZone,
    pub ready_at: Option<ChronoDateTimeWithTimeZone>,
    pub ended_at: Option<ChronoDateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
