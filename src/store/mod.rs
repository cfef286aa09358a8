//! Booking store: the single source of truth for bookings. All status
//! changes go through [`transition`], an optimistic compare-and-set against
//! the currently stored status. That CAS is what resolves the multi-driver
//! accept race: concurrent callers never block, at most one observes success.

use chrono::{Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog;
use crate::entities::booking::{self, BookingStatus};
use crate::entities::driver;
use crate::error::{AppError, AppResult};
use crate::lifecycle;

/// Minimum lead time between booking creation and the scheduled pickup.
pub const MIN_LEAD_MINUTES: i64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub address: String,
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub user_id: Uuid,
    pub pickup: Location,
    pub drop: Location,
    pub vehicle_type: String,
    pub scheduled_time: chrono::DateTime<Utc>,
    pub special_instructions: Option<String>,
}

/// Persist a new booking as REQUESTED.
pub async fn create(db: &DatabaseConnection, new: NewBooking) -> AppResult<booking::Model> {
    if new.pickup.address.trim().is_empty() || new.drop.address.trim().is_empty() {
        return Err(AppError::Validation(
            "Pickup and drop locations are required".to_string(),
        ));
    }

    if !catalog::is_valid_code(&new.vehicle_type) {
        return Err(AppError::Validation(format!(
            "Unknown vehicle type: {}",
            new.vehicle_type
        )));
    }

    let now = Utc::now();
    if new.scheduled_time < now + Duration::minutes(MIN_LEAD_MINUTES) {
        return Err(AppError::Validation(format!(
            "Scheduled time must be at least {} minutes from now",
            MIN_LEAD_MINUTES
        )));
    }

    let model = booking::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(new.user_id),
        driver_id: Set(None),
        pickup_address: Set(new.pickup.address),
        pickup_lat: Set(new.pickup.lat),
        pickup_lng: Set(new.pickup.lng),
        drop_address: Set(new.drop.address),
        drop_lat: Set(new.drop.lat),
        drop_lng: Set(new.drop.lng),
        vehicle_type: Set(new.vehicle_type),
        scheduled_time: Set(new.scheduled_time.into()),
        special_instructions: Set(new.special_instructions),
        status: Set(BookingStatus::Requested),
        fare: Set(None),
        rating_score: Set(None),
        rating_feedback: Set(None),
        cancel_reason: Set(None),
        cancelled_by: Set(None),
        created_at: Set(now.into()),
        accepted_at: Set(None),
        started_at: Set(None),
        completed_at: Set(None),
        cancelled_at: Set(None),
    };

    let created = model.insert(db).await?;
    tracing::info!(booking_id = %created.id, user_id = %created.user_id, "booking created");
    Ok(created)
}

pub async fn read(db: &DatabaseConnection, id: Uuid) -> AppResult<booking::Model> {
    booking::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))
}

/// Atomically move a booking from `from` to `to`, applying `patch` (extra
/// columns such as driver_id, fare, or cancellation metadata) in the same
/// statement. Succeeds only if the stored status still equals `from`;
/// otherwise the caller lost a race and gets `StateConflict`.
pub async fn transition(
    db: &DatabaseConnection,
    id: Uuid,
    from: BookingStatus,
    to: BookingStatus,
    actor: Uuid,
    mut patch: booking::ActiveModel,
) -> AppResult<booking::Model> {
    if !lifecycle::can_transition(from, to) {
        return Err(AppError::InvalidTransition {
            from: from.as_str().to_string(),
            to: to.as_str().to_string(),
        });
    }

    let now = Utc::now();
    patch.status = Set(to);
    match to {
        BookingStatus::Accepted => patch.accepted_at = Set(Some(now.into())),
        BookingStatus::InProgress => patch.started_at = Set(Some(now.into())),
        BookingStatus::Completed => patch.completed_at = Set(Some(now.into())),
        BookingStatus::Cancelled => patch.cancelled_at = Set(Some(now.into())),
        BookingStatus::Requested | BookingStatus::Broadcasted => {}
    }

    let result = booking::Entity::update_many()
        .set(patch)
        .filter(booking::Column::Id.eq(id))
        .filter(booking::Column::Status.eq(from))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        // Distinguish a missing booking from a lost race.
        let current = booking::Entity::find_by_id(id).one(db).await?;
        return match current {
            None => Err(AppError::NotFound("Booking not found".to_string())),
            Some(b) => {
                tracing::debug!(
                    booking_id = %id,
                    actor = %actor,
                    expected = from.as_str(),
                    found = b.status.as_str(),
                    "transition lost the race"
                );
                Err(AppError::StateConflict(
                    "Booking is no longer available".to_string(),
                ))
            }
        };
    }

    tracing::info!(
        booking_id = %id,
        actor = %actor,
        from = from.as_str(),
        to = to.as_str(),
        "booking transitioned"
    );
    read(db, id).await
}

/// Statuses a user sees on the active dashboard. Unrated COMPLETED bookings
/// are included so the client can prompt for a rating.
pub async fn active_for_user(
    db: &DatabaseConnection,
    user_id: Uuid,
) -> AppResult<Vec<booking::Model>> {
    Ok(booking::Entity::find()
        .filter(booking::Column::UserId.eq(user_id))
        .filter(
            booking::Column::Status
                .is_in([
                    BookingStatus::Requested,
                    BookingStatus::Broadcasted,
                    BookingStatus::Accepted,
                    BookingStatus::InProgress,
                ])
                .or(booking::Column::Status
                    .eq(BookingStatus::Completed)
                    .and(booking::Column::RatingScore.is_null())),
        )
        .order_by_desc(booking::Column::CreatedAt)
        .all(db)
        .await?)
}

pub async fn all_for_user(
    db: &DatabaseConnection,
    user_id: Uuid,
) -> AppResult<Vec<booking::Model>> {
    Ok(booking::Entity::find()
        .filter(booking::Column::UserId.eq(user_id))
        .order_by_desc(booking::Column::CreatedAt)
        .all(db)
        .await?)
}

pub async fn history_for_user(
    db: &DatabaseConnection,
    user_id: Uuid,
) -> AppResult<Vec<booking::Model>> {
    Ok(booking::Entity::find()
        .filter(booking::Column::UserId.eq(user_id))
        .filter(booking::Column::Status.is_in([BookingStatus::Completed, BookingStatus::Cancelled]))
        .order_by_desc(booking::Column::CreatedAt)
        .all(db)
        .await?)
}

/// REQUESTED bookings awaiting a first broadcast; re-evaluated whenever a
/// driver becomes available.
pub async fn requested(db: &DatabaseConnection) -> AppResult<Vec<booking::Model>> {
    Ok(booking::Entity::find()
        .filter(booking::Column::Status.eq(BookingStatus::Requested))
        .order_by_asc(booking::Column::CreatedAt)
        .all(db)
        .await?)
}

/// BROADCASTED bookings this driver is eligible to accept. Vehicle-type
/// membership is filtered in Rust since `vehicle_types` is a JSON column.
pub async fn broadcasted_for_driver(
    db: &DatabaseConnection,
    drv: &driver::Model,
) -> AppResult<Vec<booking::Model>> {
    let broadcasted = booking::Entity::find()
        .filter(booking::Column::Status.eq(BookingStatus::Broadcasted))
        .order_by_asc(booking::Column::ScheduledTime)
        .all(db)
        .await?;

    Ok(broadcasted
        .into_iter()
        .filter(|b| drv.drives(&b.vehicle_type))
        .collect())
}

pub async fn for_driver(
    db: &DatabaseConnection,
    driver_id: Uuid,
    statuses: &[BookingStatus],
) -> AppResult<Vec<booking::Model>> {
    Ok(booking::Entity::find()
        .filter(booking::Column::DriverId.eq(driver_id))
        .filter(booking::Column::Status.is_in(statuses.iter().copied()))
        .order_by_desc(booking::Column::CreatedAt)
        .all(db)
        .await?)
}

pub async fn all(db: &DatabaseConnection) -> AppResult<Vec<booking::Model>> {
    Ok(booking::Entity::find()
        .order_by_desc(booking::Column::CreatedAt)
        .all(db)
        .await?)
}
