//! Matching dispatcher: decides which drivers see a new booking and moves it
//! from REQUESTED to BROADCASTED. Repeated evaluation is idempotent, so the
//! clients' periodic polling can drive it safely.

use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use uuid::Uuid;

use crate::entities::booking::{self, BookingStatus};
use crate::entities::driver::{self, ApprovalState};
use crate::entities::user::UserRole;
use crate::error::{AppError, AppResult};
use crate::notify::{Event, Notifier};
use crate::store;

/// Candidate set for a vehicle type: approved, currently available, and
/// listing the type among their vehicle types.
pub async fn eligible_drivers(
    db: &DatabaseConnection,
    vehicle_type: &str,
) -> AppResult<Vec<driver::Model>> {
    let available = driver::Entity::find()
        .filter(driver::Column::ApprovalState.eq(ApprovalState::Approved))
        .filter(driver::Column::IsAvailable.eq(true))
        .all(db)
        .await?;

    Ok(available
        .into_iter()
        .filter(|d| d.drives(vehicle_type))
        .collect())
}

/// Broadcast a REQUESTED booking to its candidate drivers. With no
/// candidates the booking stays REQUESTED (visible to no driver) until a
/// matching driver becomes available. The store transition commits before
/// any notification is attempted; a concurrent evaluation losing the CAS is
/// treated as already-done, not an error.
pub async fn broadcast(
    db: &DatabaseConnection,
    notifier: &Notifier,
    b: booking::Model,
) -> AppResult<booking::Model> {
    if b.status != BookingStatus::Requested {
        return Ok(b);
    }

    let candidates = eligible_drivers(db, &b.vehicle_type).await?;
    if candidates.is_empty() {
        tracing::debug!(booking_id = %b.id, vehicle_type = %b.vehicle_type, "no eligible drivers yet");
        return Ok(b);
    }

    let updated = match store::transition(
        db,
        b.id,
        BookingStatus::Requested,
        BookingStatus::Broadcasted,
        b.user_id,
        booking::ActiveModel::default(),
    )
    .await
    {
        Ok(updated) => updated,
        // Another evaluation broadcast it first; converge on stored state.
        Err(AppError::StateConflict(_)) => store::read(db, b.id).await?,
        Err(e) => return Err(e),
    };

    if updated.status == BookingStatus::Broadcasted {
        tracing::info!(
            booking_id = %updated.id,
            candidates = candidates.len(),
            "booking broadcast to candidate drivers"
        );
        for candidate in &candidates {
            notifier.publish(
                UserRole::Driver,
                candidate.id,
                Event::new_booking_for_driver(candidate.id, &updated),
            );
        }
    }

    Ok(updated)
}

/// Re-evaluate every REQUESTED booking; called when a driver turns
/// available. Returns how many bookings got broadcast.
pub async fn rebroadcast_pending(db: &DatabaseConnection, notifier: &Notifier) -> AppResult<usize> {
    let pending = store::requested(db).await?;
    let mut sent = 0;
    for b in pending {
        let updated = broadcast(db, notifier, b).await?;
        if updated.status == BookingStatus::Broadcasted {
            sent += 1;
        }
    }
    Ok(sent)
}

/// Look up a driver profile by its owning user account.
pub async fn driver_for_user(db: &DatabaseConnection, user_id: Uuid) -> AppResult<driver::Model> {
    driver::Entity::find()
        .filter(driver::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Driver profile not found".to_string()))
}
