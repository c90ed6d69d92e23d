use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create missions table
        manager
            .create_table(
                Table::create()
                    .table(Missions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Missions::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Missions::DateStart).date().not_null())
                    .col(ColumnDef::new(Missions::DateEnd).date().not_null())
                    .col(ColumnDef::new(Missions::MediaType).string().not_null())
                    .col(ColumnDef::new(Missions::Languages).json().not_null())
                    .col(ColumnDef::new(Missions::Status).string().not_null())
                    .col(ColumnDef::new(Missions::Checkpoint).string())
                    .col(ColumnDef::new(Missions::AdsCount).big_integer())
                    .col(ColumnDef::new(Missions::ErrorCode).string())
                    .col(ColumnDef::new(Missions::ErrorMessage).string())
                    .col(ColumnDef::new(Missions::WorkerId).uuid())
                    .col(ColumnDef::new(Missions::SessionId).uuid())
                    .col(ColumnDef::new(Missions::WorkerJobId).string())
                    .col(ColumnDef::new(Missions::WriterJobId).string())
                    .col(ColumnDef::new(Missions::WorkerDataUrl).string())
                    .col(
                        ColumnDef::new(Missions::RetryCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Missions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Missions::QueuedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Missions::StartedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Missions::FinishedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        // Create workers table
        manager
            .create_table(
                Table::create()
                    .table(Workers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Workers::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Workers::Name).string().not_null())
                    .col(ColumnDef::new(Workers::Url).string().not_null())
                    .col(ColumnDef::new(Workers::ApiKey).string().not_null())
                    .col(ColumnDef::new(Workers::StorageDomain).string())
                    .col(
                        ColumnDef::new(Workers::Status)
                            .string()
                            .not_null()
                            .default("idle"),
                    )
                    .col(
                        ColumnDef::new(Workers::Active)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Workers::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Workers::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Create sessions table
        manager
            .create_table(
                Table::create()
                    .table(Sessions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Sessions::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Sessions::WorkerId).uuid().not_null())
                    .col(ColumnDef::new(Sessions::ProxyId).uuid())
                    .col(ColumnDef::new(Sessions::ExternalSessionId).string())
                    .col(ColumnDef::new(Sessions::Status).string().not_null())
                    .col(ColumnDef::new(Sessions::CurrentPhase).string().not_null())
                    .col(
                        ColumnDef::new(Sessions::ExecutionCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Sessions::ExecutionLimit)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(Sessions::FailureCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Sessions::RetryCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Sessions::LastErrorCode).string())
                    .col(ColumnDef::new(Sessions::LastErrorMessage).string())
                    .col(
                        ColumnDef::new(Sessions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Sessions::ReadyAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Sessions::EndedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        // Create proxies table
        manager
            .create_table(
                Table::create()
                    .table(Proxies::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Proxies::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Proxies::Name).string())
                    .col(ColumnDef::new(Proxies::Host).string().not_null())
                    .col(ColumnDef::new(Proxies::Port).integer().not_null())
                    .col(ColumnDef::new(Proxies::Username).string())
                    .col(ColumnDef::new(Proxies::Password).string())
                    .col(
                        ColumnDef::new(Proxies::Active)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(Proxies::InUseBySessionId).uuid())
                    .col(
                        ColumnDef::new(Proxies::FailCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Proxies::LastUsedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Proxies::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Create writers table
        manager
            .create_table(
                Table::create()
                    .table(Writers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Writers::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Writers::Name).string().not_null())
                    .col(ColumnDef::new(Writers::Url).string().not_null())
                    .col(ColumnDef::new(Writers::ApiKey).string().not_null())
                    .col(
                        ColumnDef::new(Writers::Active)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Writers::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Writers::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Create mission_logs table
        manager
            .create_table(
                Table::create()
                    .table(MissionLogs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MissionLogs::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(MissionLogs::MissionId).uuid().not_null())
                    .col(ColumnDef::new(MissionLogs::Event).string().not_null())
                    .col(ColumnDef::new(MissionLogs::Details).string().not_null())
                    .col(
                        ColumnDef::new(MissionLogs::DurationMs)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(MissionLogs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Create config table
        manager
            .create_table(
                Table::create()
                    .table(Config::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Config::Key)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Config::Value).json().not_null())
                    .col(
                        ColumnDef::new(Config::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Config::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(MissionLogs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Writers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Proxies::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Sessions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Workers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Missions::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Missions {
    Table,
    Id,
    DateStart,
    DateEnd,
    MediaType,
    Languages,
    Status,
    Checkpoint,
    AdsCount,
    ErrorCode,
    ErrorMessage,
    WorkerId,
    SessionId,
    WorkerJobId,
    WriterJobId,
    WorkerDataUrl,
    RetryCount,
    CreatedAt,
    QueuedAt,
    StartedAt,
    FinishedAt,
}

#[derive(Iden)]
enum Workers {
    Table,
    Id,
    Name,
    Url,
    ApiKey,
    StorageDomain,
    Status,
    Active,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Sessions {
    Table,
    Id,
    WorkerId,
    ProxyId,
    ExternalSessionId,
    Status,
    CurrentPhase,
    ExecutionCount,
    ExecutionLimit,
    FailureCount,
    RetryCount,
    LastErrorCode,
    LastErrorMessage,
    CreatedAt,
    ReadyAt,
    EndedAt,
}

#[derive(Iden)]
enum Proxies {
    Table,
    Id,
    Name,
    Host,
    Port,
    Username,
    Password,
    Active,
    InUseBySessionId,
    FailCount,
    LastUsedAt,
    CreatedAt,
}

#[derive(Iden)]
enum Writers {
    Table,
    Id,
    Name,
    Url,
    ApiKey,
    Active,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum MissionLogs {
    Table,
    Id,
    MissionId,
    Event,
    Details,
    DurationMs,
    CreatedAt,
}

#[derive(Iden)]
enum Config {
    Table,
    Key,
    Value,
    UpdatedAt,
}
