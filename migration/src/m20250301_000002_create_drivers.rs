use sea_orm_migration::{prelude::*, schema::*};

use super::m20250301_000001_create_users::User;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Driver::Table)
                    .if_not_exists()
                    .col(uuid(Driver::Id).primary_key())
                    .col(uuid(Driver::UserId).not_null().unique_key())
                    .col(string_len(Driver::LicenseNumber, 50).not_null())
                    .col(string_len(Driver::ApprovalState, 20).not_null())
                    .col(string_null(Driver::RejectionReason))
                    .col(boolean(Driver::IsAvailable).not_null().default(false))
                    // JSON array of catalog codes; membership is checked in Rust
                    .col(json(Driver::VehicleTypes).not_null())
                    .col(string_len(Driver::PrimaryVehicle, 30).not_null())
                    .col(double(Driver::Rating).not_null().default(0.0))
                    .col(integer(Driver::RatingCount).not_null().default(0))
                    .col(integer(Driver::TotalTrips).not_null().default(0))
                    .col(
                        timestamp_with_time_zone(Driver::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_driver_user")
                            .from(Driver::Table, Driver::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Driver::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Driver {
    Table,
    Id,
    UserId,
    LicenseNumber,
    ApprovalState,
    RejectionReason,
    IsAvailable,
    VehicleTypes,
    PrimaryVehicle,
    Rating,
    RatingCount,
    TotalTrips,
    CreatedAt,
}
