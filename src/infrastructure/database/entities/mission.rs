// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm::entity::prelude::*;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "missions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub date_start: Date,
    pub date_end: Date,
    pub media_type: String,
    pub languages: Json,
    pub status: String,
    pub checkpoint: Option<String>,
    pub ads_count: Option<i64>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub worker_id: Option<Uuid>,
    pub session_id: Option<Uuid>,
    pub worker_job_id: Option<String>,
    pub writer_job_id: Option<String>,
    pub worker_data_url: Option<String>,
    pub retry_count: i32,
    pub created_at: ChronoDateTimeWithTimeZone,
    pub queued_at: Option<ChronoDateTimeWithTimeZone>,
    pub started_at: Option<ChronoDateTimeWithTimeZone>,
    pub finished_at: Option<ChronoDateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
