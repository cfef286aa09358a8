use sea_orm_migration::{prelude::*, schema::*};

use super::m20250301_000001_create_users::User;
use super::m20250301_000002_create_drivers::Driver;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Booking::Table)
                    .if_not_exists()
                    .col(uuid(Booking::Id).primary_key())
                    .col(uuid(Booking::UserId).not_null())
                    .col(uuid_null(Booking::DriverId))
                    .col(string_len(Booking::PickupAddress, 500).not_null())
                    .col(double(Booking::PickupLat).not_null())
                    .col(double(Booking::PickupLng).not_null())
                    .col(string_len(Booking::DropAddress, 500).not_null())
                    .col(double(Booking::DropLat).not_null())
                    .col(double(Booking::DropLng).not_null())
                    .col(string_len(Booking::VehicleType, 30).not_null())
                    .col(timestamp_with_time_zone(Booking::ScheduledTime).not_null())
                    .col(string_null(Booking::SpecialInstructions))
                    .col(string_len(Booking::Status, 20).not_null())
                    .col(double_null(Booking::Fare))
                    .col(integer_null(Booking::RatingScore))
                    .col(string_null(Booking::RatingFeedback))
                    .col(string_null(Booking::CancelReason))
                    .col(string_len_null(Booking::CancelledBy, 20))
                    .col(
                        timestamp_with_time_zone(Booking::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(timestamp_with_time_zone_null(Booking::AcceptedAt))
                    .col(timestamp_with_time_zone_null(Booking::StartedAt))
                    .col(timestamp_with_time_zone_null(Booking::CompletedAt))
                    .col(timestamp_with_time_zone_null(Booking::CancelledAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_booking_user")
                            .from(Booking::Table, Booking::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_booking_driver")
                            .from(Booking::Table, Booking::DriverId)
                            .to(Driver::Table, Driver::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        // The dispatcher and the role-scoped listings both filter on status.
        manager
            .create_index(
                Index::create()
                    .name("idx_booking_status")
                    .table(Booking::Table)
                    .col(Booking::Status)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Booking::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Booking {
    Table,
    Id,
    UserId,
    DriverId,
    PickupAddress,
    PickupLat,
    PickupLng,
    DropAddress,
    DropLat,
    DropLng,
    VehicleType,
    ScheduledTime,
    SpecialInstructions,
    Status,
    Fare,
    RatingScore,
    RatingFeedback,
    CancelReason,
    CancelledBy,
    CreatedAt,
    AcceptedAt,
    StartedAt,
    CompletedAt,
    CancelledAt,
}
