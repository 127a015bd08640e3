use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(EnergyDataPoints::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EnergyDataPoints::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(EnergyDataPoints::Timestamp)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EnergyDataPoints::AreaCode)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EnergyDataPoints::DataType)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EnergyDataPoints::BusinessType)
                            .string_len(8)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EnergyDataPoints::Value)
                            .decimal_len(20, 6)
                            .not_null(),
                    )
                    .col(ColumnDef::new(EnergyDataPoints::Unit).string_len(32).not_null())
                    .col(
                        ColumnDef::new(EnergyDataPoints::DocumentMrid)
                            .string_len(128)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EnergyDataPoints::RevisionNumber)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EnergyDataPoints::TimeSeriesMrid)
                            .string_len(128)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EnergyDataPoints::Resolution)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(ColumnDef::new(EnergyDataPoints::Position).integer().not_null())
                    .col(
                        ColumnDef::new(EnergyDataPoints::PeriodStart)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EnergyDataPoints::PeriodEnd)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EnergyDataPoints::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(EnergyDataPoints::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Natural key, target of ON CONFLICT upserts
        manager
            .create_index(
                Index::create()
                    .name("idx_energy_data_points_natural_key")
                    .table(EnergyDataPoints::Table)
                    .col(EnergyDataPoints::Timestamp)
                    .col(EnergyDataPoints::AreaCode)
                    .col(EnergyDataPoints::DataType)
                    .col(EnergyDataPoints::BusinessType)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Coverage queries filter by area + type over a time range
        manager
            .create_index(
                Index::create()
                    .name("idx_energy_data_points_area_type_ts")
                    .table(EnergyDataPoints::Table)
                    .col(EnergyDataPoints::AreaCode)
                    .col(EnergyDataPoints::DataType)
                    .col(EnergyDataPoints::Timestamp)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(EnergyDataPoints::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum EnergyDataPoints {
    Table,
    Id,
    Timestamp,
    AreaCode,
    DataType,
    BusinessType,
    Value,
    Unit,
    DocumentMrid,
    RevisionNumber,
    TimeSeriesMrid,
    Resolution,
    Position,
    PeriodStart,
    PeriodEnd,
    CreatedAt,
    UpdatedAt,
}
