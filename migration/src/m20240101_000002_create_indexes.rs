use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_index(
                Index::create()
                    .name("idx_missions_status_queued_at")
                    .table(Missions::Table)
                    .col(Missions::Status)
                    .col(Missions::QueuedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_missions_status_checkpoint")
                    .table(Missions::Table)
                    .col(Missions::Status)
                    .col(Missions::Checkpoint)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_sessions_status")
                    .table(Sessions::Table)
                    .col(Sessions::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_sessions_worker_id")
                    .table(Sessions::Table)
                    .col(Sessions::WorkerId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_proxies_in_use")
                    .table(Proxies::Table)
                    .col(Proxies::InUseBySessionId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_mission_logs_mission_id")
                    .table(MissionLogs::Table)
                    .col(MissionLogs::MissionId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_mission_logs_mission_id")
                    .table(MissionLogs::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_proxies_in_use")
                    .table(Proxies::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_sessions_worker_id")
                    .table(Sessions::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_sessions_status")
                    .table(Sessions::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_missions_status_checkpoint")
                    .table(Missions::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_missions_status_queued_at")
                    .table(Missions::Table)
                    .to_owned(),
            )
            .await
    }
}

#[derive(Iden)]
enum Missions {
    Table,
    Status,
    Checkpoint,
    QueuedAt,
}

#[derive(Iden)]
enum Sessions {
    Table,
    WorkerId,
    Status,
}

#[derive(Iden)]
enum Proxies {
    Table,
    InUseBySessionId,
}

#[derive(Iden)]
enum MissionLogs {
    Table,
    MissionId,
}
