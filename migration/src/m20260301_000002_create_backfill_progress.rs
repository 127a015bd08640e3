use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(BackfillProgress::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BackfillProgress::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(BackfillProgress::AreaCode)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BackfillProgress::EndpointName)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BackfillProgress::PeriodStart)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BackfillProgress::PeriodEnd)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BackfillProgress::Status)
                            .string_len(20)
                            .not_null()
                            .default("PENDING"),
                    )
                    .col(
                        ColumnDef::new(BackfillProgress::TotalChunks)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(BackfillProgress::CompletedChunks)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(BackfillProgress::NoDataChunks)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(BackfillProgress::FailedChunks)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(BackfillProgress::TotalDataPoints)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(BackfillProgress::CurrentChunkStart)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(BackfillProgress::CurrentChunkEnd)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(BackfillProgress::RateLimitDelayMs)
                            .big_integer()
                            .not_null()
                            .default(1000),
                    )
                    .col(
                        ColumnDef::new(BackfillProgress::StartedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(BackfillProgress::CompletedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(BackfillProgress::LastError).text().null())
                    .col(
                        ColumnDef::new(BackfillProgress::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(BackfillProgress::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_backfill_progress_area_endpoint")
                    .table(BackfillProgress::Table)
                    .col(BackfillProgress::AreaCode)
                    .col(BackfillProgress::EndpointName)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_backfill_progress_status")
                    .table(BackfillProgress::Table)
                    .col(BackfillProgress::Status)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(BackfillProgress::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum BackfillProgress {
    Table,
    Id,
    AreaCode,
    EndpointName,
    PeriodStart,
    PeriodEnd,
    Status,
    TotalChunks,
    CompletedChunks,
    NoDataChunks,
    FailedChunks,
    TotalDataPoints,
    CurrentChunkStart,
    CurrentChunkEnd,
    RateLimitDelayMs,
    StartedAt,
    CompletedAt,
    LastError,
    CreatedAt,
    UpdatedAt,
}
